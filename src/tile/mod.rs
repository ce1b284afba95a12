//! Tile geometry and encoding.
//!
//! Output tiles are fixed-size squares cut from a level in level pixel
//! coordinates. The pipeline decodes them to RGB and hands them to an
//! [`Encoder`] that produces the output frames.

mod encoder;
mod geometry;

pub use encoder::{
    clamp_quality, is_valid_quality, Encoder, JpegEncoder, DEFAULT_JPEG_QUALITY,
    JPEG_BASELINE_TRANSFER_SYNTAX, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use geometry::{Point, Region, Size};
