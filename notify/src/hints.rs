use crate::{Error, Result};
use image::DynamicImage;
use std::collections::HashMap;
use zbus::zvariant::{StructureBuilder, Value};

pub const ICON_DATA: &str = "icon_data";

#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    Int32(i32),
    Double(f64),
    Byte(u8),
    Bool(bool),
    String(String),
    ByteArray(Vec<u8>),
    Struct(Vec<Hint>),
}

impl Hint {
    /// Checked byte hint. `key` is only used for the error message.
    pub fn byte(key: &str, value: i64) -> Result<Self> {
        u8::try_from(value)
            .map(Hint::Byte)
            .map_err(|_| Error::ValueOutOfRange {
                key: key.into(),
                value,
            })
    }

    pub fn to_value(&self) -> Result<Value<'_>> {
        let value = match self {
            Hint::Int32(n) => Value::I32(*n),
            Hint::Double(n) => Value::F64(*n),
            Hint::Byte(n) => Value::U8(*n),
            Hint::Bool(b) => Value::Bool(*b),
            Hint::String(s) => Value::from(s.as_str()),
            Hint::ByteArray(bytes) => Value::from(bytes.clone()),
            Hint::Struct(fields) => {
                let builder = fields
                    .iter()
                    .try_fold(StructureBuilder::new(), |builder, field| {
                        field.to_value().map(|value| builder.append_field(value))
                    })?;

                Value::Structure(builder.build()?)
            }
        };

        Ok(value)
    }
}

impl From<i32> for Hint {
    fn from(value: i32) -> Self {
        Hint::Int32(value)
    }
}

impl From<f64> for Hint {
    fn from(value: f64) -> Self {
        Hint::Double(value)
    }
}

impl From<&str> for Hint {
    fn from(value: &str) -> Self {
        Hint::String(value.into())
    }
}

impl From<String> for Hint {
    fn from(value: String) -> Self {
        Hint::String(value)
    }
}

impl From<Vec<u8>> for Hint {
    fn from(value: Vec<u8>) -> Self {
        Hint::ByteArray(value)
    }
}

/// Length of the pixel buffer sent for a raster: every row but the last
/// spans `rowstride`, the last one only its used width.
pub fn image_len(
    width: i32,
    height: i32,
    rowstride: i32,
    channels: i32,
    bits_per_sample: i32,
) -> Option<usize> {
    if width <= 0 || height <= 0 || rowstride <= 0 || channels <= 0 || bits_per_sample <= 0 {
        return None;
    }

    let pixel_size = (i64::from(channels) * i64::from(bits_per_sample) + 7) / 8;
    let row = i64::from(width) * pixel_size;
    if i64::from(rowstride) < row {
        return None;
    }

    usize::try_from((i64::from(height) - 1) * i64::from(rowstride) + row).ok()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Hints(HashMap<String, Hint>);

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K>(&mut self, key: K, value: Hint) -> Result<()>
    where
        K: Into<String>,
    {
        self.0
            .try_reserve(1)
            .map_err(|_| Error::ResourceExhausted)?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    pub fn set_byte(&mut self, key: &str, value: i64) -> Result<()> {
        let hint = Hint::byte(key, value)?;
        self.set(key, hint)
    }

    pub fn get(&self, key: &str) -> Option<&Hint> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Hint> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hint)> {
        self.0.iter().map(|(key, hint)| (key.as_str(), hint))
    }

    /// Stores a raw raster under `icon_data` as the
    /// `(width, height, rowstride, has_alpha, bits_per_sample, channels, data)`
    /// structure. Only `image_len` bytes of `pixels` are sent.
    #[allow(clippy::too_many_arguments)]
    pub fn set_icon_from_raster(
        &mut self,
        pixels: &[u8],
        width: i32,
        height: i32,
        rowstride: i32,
        channels: i32,
        bits_per_sample: i32,
        has_alpha: bool,
    ) -> Result<()> {
        let len = image_len(width, height, rowstride, channels, bits_per_sample).ok_or_else(
            || {
                Error::invalid(format!(
                    "invalid raster geometry {width}x{height}, rowstride {rowstride}, \
                     {channels} channels of {bits_per_sample} bits"
                ))
            },
        )?;

        if pixels.len() < len {
            return Err(Error::invalid(format!(
                "raster holds {} bytes but {len} are required",
                pixels.len()
            )));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted)?;
        data.extend_from_slice(&pixels[..len]);

        self.set(
            ICON_DATA,
            Hint::Struct(vec![
                Hint::Int32(width),
                Hint::Int32(height),
                Hint::Int32(rowstride),
                Hint::Bool(has_alpha),
                Hint::Int32(bits_per_sample),
                Hint::Int32(channels),
                Hint::ByteArray(data),
            ]),
        )
    }

    pub fn set_icon_from_image(&mut self, image: &DynamicImage) -> Result<()> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let width = i32::try_from(width).map_err(|_| Error::invalid("image too wide"))?;
        let height = i32::try_from(height).map_err(|_| Error::invalid("image too tall"))?;
        let rowstride = width
            .checked_mul(4)
            .ok_or_else(|| Error::invalid("image too wide"))?;

        self.set_icon_from_raster(rgba.as_raw(), width, height, rowstride, 4, 8, true)
    }

    pub fn to_wire(&self) -> Result<HashMap<&str, Value<'_>>> {
        self.0
            .iter()
            .map(|(key, hint)| Ok((key.as_str(), hint.to_value()?)))
            .collect()
    }
}
