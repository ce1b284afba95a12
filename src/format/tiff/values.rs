//! Reading IFD entry values, inline or at an offset.
//!
//! Arrays such as TileOffsets are fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads entry values from a TIFF file in the file's byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw bytes of an entry's value.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            let size = (size as usize).min(entry.value_offset_bytes.len());
            return Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]));
        }

        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// Single SHORT or LONG value.
    pub async fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }
        let values = self.read_u64_array(entry).await?;
        match values.as_slice() {
            [value] => u32::try_from(*value).map_err(|_| TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("value {} does not fit in 32 bits", value),
            }),
            _ => Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected count 1, got {}", entry.count),
            }),
        }
    }

    /// Array of SHORT, LONG or LONG8 values widened to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        match field_type {
            FieldType::Short | FieldType::Long | FieldType::Long8 => Ok(parse_u64_array(
                &bytes,
                entry.count as usize,
                field_type,
                self.header.byte_order,
            )),
            other => Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected Short, Long, or Long8 for array, got {:?}", other),
            }),
        }
    }

    /// ASCII value with the NUL terminator stripped.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        match entry.field_type {
            Some(FieldType::Ascii) => {}
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag: "unknown",
                    message: format!("expected Ascii type for string, got {:?}", other),
                })
            }
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Opaque bytes (JPEGTables).
    pub async fn read_raw_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        self.read_bytes(entry).await
    }

    /// First RATIONAL value as a float. A zero denominator yields `None`.
    pub async fn read_rational(&self, entry: &IfdEntry) -> Result<Option<f64>, TiffError> {
        if entry.field_type != Some(FieldType::Rational) || entry.count == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected Rational, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        if bytes.len() < 8 {
            return Ok(None);
        }
        let byte_order = self.header.byte_order;
        let numerator = byte_order.read_u32(&bytes[0..4]);
        let denominator = byte_order.read_u32(&bytes[4..8]);
        if denominator == 0 {
            return Ok(None);
        }
        Ok(Some(numerator as f64 / denominator as f64))
    }
}

/// Parse `count` integers of `field_type` from raw bytes.
///
/// Values that would run past the end of `bytes` are dropped.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .filter_map(|chunk| match field_type {
            FieldType::Short => Some(byte_order.read_u16(chunk) as u64),
            FieldType::Long => Some(byte_order.read_u32(chunk) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(chunk)),
            _ => None,
        })
        .collect()
}
