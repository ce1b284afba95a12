//! Slide format detection.
//!
//! - **Aperio SVS**: "Aperio" in the first ImageDescription
//! - **Generic pyramidal TIFF**: the first IFD is tiled
//!
//! Anything else, including plain striped TIFFs, is unsupported.

use crate::error::FormatError;
use crate::io::RangeReader;

use super::tiff::{ByteOrder, Ifd, TiffHeader, TiffTag, TIFF_HEADER_SIZE};

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideFormat {
    /// Aperio SVS (abbreviated JPEG tiles, associated images)
    AperioSvs,

    /// Standard tiled TIFF with reduced-resolution levels
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }

    /// Value of the `openslide.vendor` property.
    pub const fn vendor(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "aperio",
            SlideFormat::GenericTiff => "generic-tiff",
        }
    }
}

/// Bytes of the first ImageDescription examined for vendor markers
const MAX_DESCRIPTION_BYTES: usize = 1024;

const APERIO_MARKER: &[u8] = b"Aperio";

/// Detect the format of a slide.
///
/// Fails with [`FormatError::UnsupportedFormat`] for files that are not
/// tiled TIFFs and with [`FormatError::Tiff`] for malformed TIFF structure.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    if reader.size() < TIFF_HEADER_SIZE as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("file is {} bytes, too small for a TIFF", reader.size()),
        });
    }

    let header = TiffHeader::read(reader).await?;
    let ifd = Ifd::read_at(reader, &header, header.first_ifd_offset).await?;

    if let Some(description) = read_description_prefix(reader, &ifd, &header).await? {
        if contains_aperio_marker(&description) {
            return Ok(SlideFormat::AperioSvs);
        }
    }

    if ifd.is_tiled() {
        Ok(SlideFormat::GenericTiff)
    } else {
        Err(FormatError::UnsupportedFormat {
            reason: "first image directory is not tiled".to_string(),
        })
    }
}

/// Leading bytes of the ImageDescription, if present.
async fn read_description_prefix<R: RangeReader>(
    reader: &R,
    ifd: &Ifd,
    header: &TiffHeader,
) -> Result<Option<Vec<u8>>, FormatError> {
    let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) else {
        return Ok(None);
    };
    let len = (entry.count as usize).min(MAX_DESCRIPTION_BYTES);
    if len == 0 {
        return Ok(None);
    }

    let bytes = if entry.is_inline {
        entry.value_offset_bytes[..len.min(entry.value_offset_bytes.len())].to_vec()
    } else {
        let offset = entry.value_offset(header.byte_order);
        reader.read_exact_at(offset, len).await?.to_vec()
    };
    Ok(Some(bytes))
}

fn contains_aperio_marker(data: &[u8]) -> bool {
    data.windows(APERIO_MARKER.len())
        .any(|window| window == APERIO_MARKER)
}

/// Quick check of TIFF/BigTIFF magic and version.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }
    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };
    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}
