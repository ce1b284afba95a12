//! TIFF and BigTIFF parsing for pyramidal slide files.
//!
//! Byte order comes from the header and applies to every multi-byte value.
//! Classic TIFF uses 32-bit offsets, BigTIFF 64-bit ones; the parser handles
//! both. Each IFD describes one image: a pyramid level or an associated image.

mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{
    associated_keyword, describes_associated_image, read_ifd_chain, PyramidLevel, TiffPyramid,
    TileData,
};
pub use tags::{Compression, FieldType, TiffTag};
pub use validation::{validate_level, validate_pyramid, ValidationError, ValidationResult};
pub use values::{parse_u64_array, ValueReader};
