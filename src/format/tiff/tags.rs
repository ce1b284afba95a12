//! TIFF field types, tag identifiers and compression values.

// =============================================================================
// Field Types
// =============================================================================

/// TIFF field types that determine how entry values are encoded.
///
/// Only the types found in slide files are listed. Entries with other types
/// keep their raw type code and are skipped by the value readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,

    /// NUL-terminated 8-bit ASCII
    Ascii = 2,

    /// Unsigned 16-bit integer
    Short = 3,

    /// Unsigned 32-bit integer
    Long = 4,

    /// Two LONGs: numerator and denominator
    Rational = 5,

    /// Opaque bytes
    Undefined = 7,

    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Whether `count` values of this type fit in the entry's value field.
    ///
    /// The value field is 4 bytes in classic TIFF and 8 bytes in BigTIFF.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff { 8 } else { 4 };
        (self.size_in_bytes() as u64).saturating_mul(count) <= threshold
    }
}

// =============================================================================
// Tags
// =============================================================================

/// TIFF tag IDs read by the slide reader. Other tags are kept in the IFD but
/// have no named variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    /// Subfile kind bitfield (reduced resolution, page, mask)
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    StripOffsets = 273,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    XResolution = 282,
    YResolution = 283,
    PlanarConfiguration = 284,
    ResolutionUnit = 296,
    Software = 305,
    DateTime = 306,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    /// Shared quantization and Huffman tables for abbreviated JPEG tiles
    JpegTables = 347,
    YCbCrSubSampling = 530,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        let tag = match value {
            254 => TiffTag::NewSubfileType,
            256 => TiffTag::ImageWidth,
            257 => TiffTag::ImageLength,
            258 => TiffTag::BitsPerSample,
            259 => TiffTag::Compression,
            262 => TiffTag::PhotometricInterpretation,
            270 => TiffTag::ImageDescription,
            271 => TiffTag::Make,
            272 => TiffTag::Model,
            273 => TiffTag::StripOffsets,
            277 => TiffTag::SamplesPerPixel,
            278 => TiffTag::RowsPerStrip,
            279 => TiffTag::StripByteCounts,
            282 => TiffTag::XResolution,
            283 => TiffTag::YResolution,
            284 => TiffTag::PlanarConfiguration,
            296 => TiffTag::ResolutionUnit,
            305 => TiffTag::Software,
            306 => TiffTag::DateTime,
            322 => TiffTag::TileWidth,
            323 => TiffTag::TileLength,
            324 => TiffTag::TileOffsets,
            325 => TiffTag::TileByteCounts,
            347 => TiffTag::JpegTables,
            530 => TiffTag::YCbCrSubSampling,
            _ => return None,
        };
        Some(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Name used in `tiff.*` slide properties.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::Make => "Make",
            TiffTag::Model => "Model",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::XResolution => "XResolution",
            TiffTag::YResolution => "YResolution",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::ResolutionUnit => "ResolutionUnit",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::JpegTables => "JPEGTables",
            TiffTag::YCbCrSubSampling => "YCbCrSubSampling",
        }
    }
}

// =============================================================================
// Compression
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Tiles and strips can be read when they are JPEG compressed or stored
/// uncompressed. Aperio's JPEG 2000 variants are recognised but not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    None = 1,
    Lzw = 5,
    OldJpeg = 6,
    Jpeg = 7,
    Deflate = 8,
    AdobeDeflate = 32946,
    /// Aperio JPEG 2000, YCbCr
    Jpeg2000YCbCr = 33003,
    /// Aperio JPEG 2000, RGB
    Jpeg2000Rgb = 33005,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000YCbCr),
            33005 => Some(Compression::Jpeg2000Rgb),
            _ => None,
        }
    }

    /// Whether tiles with this compression can be decoded.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::None | Compression::Jpeg)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000YCbCr => "JPEG 2000 (YCbCr)",
            Compression::Jpeg2000Rgb => "JPEG 2000 (RGB)",
        }
    }
}
