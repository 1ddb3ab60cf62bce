/// Splits a `[NAME=]TEXT` action argument. Unnamed actions are called
/// after their 1-based position on the command line.
pub fn parse(position: usize, spec: &str) -> (String, String) {
    match spec.split_once('=') {
        Some((name, label)) => (name.into(), label.into()),
        None => (position.to_string(), spec.into()),
    }
}
