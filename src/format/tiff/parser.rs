//! TIFF header and image file directory parsing.
//!
//! ```text
//! Classic TIFF (8 bytes):  II|MM  42  first-IFD(u32)
//! BigTIFF     (16 bytes):  II|MM  43  8  0  first-IFD(u64)
//! ```
//!
//! An IFD is an entry count, the entries, then the offset of the next IFD.
//! Entry values that fit in the value field are stored inline; larger values
//! live at the offset held in that field.

use std::collections::HashMap;

use crate::error::TiffError;
use crate::io::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;
const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on entries in one IFD. Real slides use a few dozen.
const MAX_IFD_ENTRIES: u64 = 4096;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) declared by the TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit counts and offsets)
    pub is_bigtiff: bool,

    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a header from the first bytes of a file.
    ///
    /// Pass at least 16 bytes so BigTIFF headers can be read. The first IFD
    /// offset must fall inside `file_size`.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(&bytes[2..4]) {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Read and parse the header of a file.
    pub async fn read<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let size = reader.size();
        let len = (BIGTIFF_HEADER_SIZE as u64).min(size) as usize;
        let bytes = reader.read_exact_at(0, len).await?;
        Self::parse(&bytes, size)
    }

    /// Size of an IFD entry: 12 bytes, or 20 in BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next-IFD offset, and of an entry's value field.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single IFD entry with its value field kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// Decoded field type, `None` for types the reader does not handle
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// The 4 or 8 byte value field, in file byte order
    pub value_offset_bytes: Vec<u8>,

    /// Whether `value_offset_bytes` holds the value itself
    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size of the value in bytes, if the field type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| (ft.size_in_bytes() as u64).saturating_mul(self.count))
    }

    /// Interpret the value field as an offset into the file.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Single inline SHORT or LONG value.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// Single inline SHORT, LONG or LONG8 value.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        match self.field_type? {
            FieldType::Long8 if self.is_inline && self.count == 1 => {
                Some(byte_order.read_u64(&self.value_offset_bytes))
            }
            _ => self.inline_u32(byte_order).map(u64::from),
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed image file directory.
#[derive(Debug, Clone, Default)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,

    /// Tag id to position in `entries`
    pub entries_by_tag: HashMap<u16, usize>,

    /// Offset of the next IFD, 0 for the last one
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// An IFD with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Byte size of an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.value_offset_size()
    }

    /// Parse an IFD from bytes starting at the IFD offset.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = if header.is_bigtiff {
            byte_order.read_u64(bytes)
        } else {
            byte_order.read_u16(bytes) as u64
        };
        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.value_offset_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut entries_by_tag = HashMap::with_capacity(entry_count as usize);

        for i in 0..entry_count as usize {
            let raw = &bytes[count_size + i * entry_size..count_size + (i + 1) * entry_size];
            let tag_id = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let field_type = FieldType::from_u16(field_type_raw);
            let (count, value_offset_bytes) = if header.is_bigtiff {
                (byte_order.read_u64(&raw[4..12]), raw[12..20].to_vec())
            } else {
                (byte_order.read_u32(&raw[4..8]) as u64, raw[8..12].to_vec())
            };
            let is_inline = field_type
                .map(|ft| ft.fits_inline(count, header.is_bigtiff))
                .unwrap_or(true);

            // First occurrence wins on duplicate tags
            entries_by_tag.entry(tag_id).or_insert(entries.len());
            entries.push(IfdEntry {
                tag_id,
                field_type,
                field_type_raw,
                count,
                value_offset_bytes,
                is_inline,
            });
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_bytes = &bytes[next_start..next_start + value_size];
        let next_ifd_offset = if header.is_bigtiff {
            byte_order.read_u64(next_bytes)
        } else {
            byte_order.read_u32(next_bytes) as u64
        };

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    /// Read and parse the IFD at `offset`.
    pub async fn read_at<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        offset: u64,
    ) -> Result<Self, TiffError> {
        if offset >= reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(&count_bytes)
        } else {
            header.byte_order.read_u16(&count_bytes) as u64
        };
        if entry_count > MAX_IFD_ENTRIES {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let size = Self::calculate_size(entry_count, header);
        let bytes = reader.read_exact_at(offset, size).await?;
        Self::parse(&bytes, header)
    }

    pub fn get_entry(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag_id)
            .and_then(|&idx| self.entries.get(idx))
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get_entry(tag.as_u16())
    }

    fn inline_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::TileLength, byte_order)
    }

    pub fn rows_per_strip(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::RowsPerStrip, byte_order)
    }

    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.inline_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    pub fn new_subfile_type(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::NewSubfileType, byte_order)
    }

    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> Option<u16> {
        self.inline_u32(TiffTag::SamplesPerPixel, byte_order)
            .map(|v| v as u16)
    }

    pub fn photometric_interpretation(&self, byte_order: ByteOrder) -> Option<u16> {
        self.inline_u32(TiffTag::PhotometricInterpretation, byte_order)
            .map(|v| v as u16)
    }

    /// Has tile geometry and tile location tags.
    pub fn is_tiled(&self) -> bool {
        [
            TiffTag::TileWidth,
            TiffTag::TileLength,
            TiffTag::TileOffsets,
            TiffTag::TileByteCounts,
        ]
        .iter()
        .all(|&tag| self.get_entry_by_tag(tag).is_some())
    }

    /// Has strip location tags.
    pub fn is_stripped(&self) -> bool {
        self.get_entry_by_tag(TiffTag::StripOffsets).is_some()
            && self.get_entry_by_tag(TiffTag::StripByteCounts).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
