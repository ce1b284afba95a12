//! Tile encoders.
//!
//! Decoded tiles are RGB pixel buffers. An [`Encoder`] turns them into the
//! frame bytes of the output image together with the DICOM attributes that
//! describe that encoding.

use bytes::Bytes;
use image::codecs::jpeg;
use image::RgbImage;

use crate::error::SourceError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const MIN_JPEG_QUALITY: u8 = 1;

pub const MAX_JPEG_QUALITY: u8 = 100;

/// DICOM JPEG Baseline (Process 1) transfer syntax UID
pub const JPEG_BASELINE_TRANSFER_SYNTAX: &str = "1.2.840.10008.1.2.4.50";

/// Encodes decoded tiles into output frames.
pub trait Encoder: Send + Sync {
    fn encode(&self, image: &RgbImage) -> Result<Bytes, SourceError>;

    /// Transfer syntax UID of the encoded frames.
    fn transfer_syntax(&self) -> &'static str;

    /// Photometric interpretation of the encoded frames.
    fn photometric_interpretation(&self) -> &'static str;
}

/// Baseline JPEG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Encoder with the given quality, clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl Encoder for JpegEncoder {
    fn encode(&self, image: &RgbImage) -> Result<Bytes, SourceError> {
        let mut output = Vec::new();
        jpeg::JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode_image(image)
            .map_err(|e| SourceError::Encode {
                message: e.to_string(),
            })?;
        Ok(Bytes::from(output))
    }

    fn transfer_syntax(&self) -> &'static str {
        JPEG_BASELINE_TRANSFER_SYNTAX
    }

    fn photometric_interpretation(&self) -> &'static str {
        "YBR_FULL_422"
    }
}

#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
