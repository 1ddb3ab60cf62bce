use anyhow::bail;
use notify::Hint;

/// Parses a `TYPE:NAME:VALUE` hint given on the command line.
pub fn parse(spec: &str) -> anyhow::Result<(String, Hint)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(kind), Some(key), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Invalid hint syntax specified. Use TYPE:NAME:VALUE.");
    };

    let hint = match kind.to_ascii_lowercase().as_str() {
        "string" => Some(Hint::String(value.into())),
        "int" => leading_digits(value).map(|digits| {
            // Wraps around, so "4294967295" ends up as -1.
            Hint::Int32(digits.parse::<u64>().unwrap_or(u64::MAX) as i32)
        }),
        "double" => leading_digits(value).and_then(|_| leading_double(value).map(Hint::Double)),
        "byte" => match leading_digits(value) {
            Some(digits) => Some(Hint::byte(key, digits.parse().unwrap_or(i64::MAX))?),
            None => None,
        },
        _ => bail!("Invalid hint type \"{kind}\". Valid types are int, double, string and byte."),
    };

    match hint {
        Some(hint) => Ok((key.into(), hint)),
        None => bail!("Value \"{value}\" of hint \"{key}\" could not be parsed as type \"{kind}\"."),
    }
}

fn leading_digits(value: &str) -> Option<&str> {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());

    (end > 0).then(|| &value[..end])
}

/// Longest prefix of `value` that reads as a floating point number.
fn leading_double(value: &str) -> Option<f64> {
    (1..=value.len())
        .rev()
        .filter(|end| value.is_char_boundary(*end))
        .find_map(|end| value[..end].parse().ok())
}
