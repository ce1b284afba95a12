//! Pyramid level identification.
//!
//! A slide file holds several IFDs: the pyramid levels plus associated images
//! (label, macro, thumbnail). Tiled IFDs become levels unless their
//! ImageDescription names them as a label or macro; everything else is kept
//! aside for associated image classification.
//!
//! Levels are ordered by area, largest first. The downsample of a level is
//! the mean of the base/level width and height ratios and is reported as-is.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs followed in the chain
const MAX_IFDS: usize = 256;

/// Description keywords marking a directory as an associated image
const ASSOCIATED_KEYWORDS: [&str; 2] = ["label", "macro"];

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid. Level 0 has the highest resolution.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Position in the pyramid (0 = base)
    pub level_index: usize,

    /// Position of the IFD in the file's IFD chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Downsample relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Raw compression value (1 = none, 7 = JPEG)
    pub compression: u16,

    pub ifd: Ifd,
}

impl PyramidLevel {
    fn from_ifd(ifd: Ifd, ifd_index: usize, header: &TiffHeader) -> Option<Self> {
        if !ifd.is_tiled() {
            return None;
        }
        let byte_order = header.byte_order;
        let tile_width = ifd.tile_width(byte_order)?;
        let tile_height = ifd.tile_height(byte_order)?;
        let width = ifd.image_width(byte_order)?;
        let height = ifd.image_height(byte_order)?;
        if width == 0 || height == 0 {
            return None;
        }
        let compression = ifd
            .compression(byte_order)
            .unwrap_or(Compression::None as u16);

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width.max(1)),
            tiles_y: height.div_ceil(tile_height.max(1)),
            downsample: 1.0,
            compression,
            ifd,
        })
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Linear tile index, row-major. `None` outside the tile grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixel size of a tile clipped to the level bounds.
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        self.tile_index(tile_x, tile_y)?;
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// All IFDs of a TIFF file split into pyramid levels and other directories.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Pyramid levels, level 0 first
    pub levels: Vec<PyramidLevel>,

    /// Non-level IFDs with their position in the chain
    pub other_ifds: Vec<(usize, Ifd)>,

    /// ImageDescription of each IFD, by position in the chain
    pub descriptions: Vec<Option<String>>,
}

impl TiffPyramid {
    /// Read the header and the whole IFD chain, then identify the levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header = TiffHeader::read(reader).await?;
        let ifds = read_ifd_chain(reader, &header).await?;

        let values = ValueReader::new(reader, &header);
        let mut descriptions = Vec::with_capacity(ifds.len());
        for ifd in &ifds {
            let description = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
                Some(entry) => Some(values.read_string(entry).await?),
                None => None,
            };
            descriptions.push(description);
        }

        Self::from_ifds(header, ifds, descriptions)
    }

    /// Identify pyramid levels among already parsed IFDs.
    pub fn from_ifds(
        header: TiffHeader,
        ifds: Vec<Ifd>,
        descriptions: Vec<Option<String>>,
    ) -> Result<Self, TiffError> {
        let mut candidates = Vec::new();
        let mut other_ifds = Vec::new();

        for (ifd_index, ifd) in ifds.into_iter().enumerate() {
            let named_associated = descriptions
                .get(ifd_index)
                .and_then(|d| d.as_deref())
                .map(describes_associated_image)
                .unwrap_or(false);

            if named_associated {
                other_ifds.push((ifd_index, ifd));
                continue;
            }
            match PyramidLevel::from_ifd(ifd.clone(), ifd_index, &header) {
                Some(level) => candidates.push(level),
                None => other_ifds.push((ifd_index, ifd)),
            }
        }

        if candidates.is_empty() {
            return Err(TiffError::NoPyramidLevels);
        }

        // Stable sort keeps file order for equal areas
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let base_width = candidates[0].width as f64;
        let base_height = candidates[0].height as f64;
        let levels: Vec<PyramidLevel> = candidates
            .into_iter()
            .enumerate()
            .map(|(level_index, mut level)| {
                let downsample_x = base_width / level.width as f64;
                let downsample_y = base_height / level.height as f64;
                level.level_index = level_index;
                level.downsample = (downsample_x + downsample_y) / 2.0;
                level
            })
            .collect();

        debug!(
            levels = levels.len(),
            other = other_ifds.len(),
            "identified pyramid levels"
        );

        Ok(TiffPyramid {
            header,
            levels,
            other_ifds,
            descriptions,
        })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }

    pub fn base_level(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base_level().map(|l| (l.width, l.height))
    }

    pub fn downsamples(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.downsample).collect()
    }

    /// ImageDescription of the IFD at `ifd_index`.
    pub fn description(&self, ifd_index: usize) -> Option<&str> {
        self.descriptions.get(ifd_index).and_then(|d| d.as_deref())
    }
}

/// Follow the next-IFD chain from the first IFD.
///
/// Stops at offset 0, at `MAX_IFDS`, or when an offset repeats.
pub async fn read_ifd_chain<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS && seen.insert(offset) {
        let ifd = Ifd::read_at(reader, header, offset).await?;
        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}

/// Whether a description names a label or macro image.
///
/// Aperio writes the kind at the start of the line after the banner,
/// e.g. `"Aperio Image Library v10.0.51\r\nlabel 387x463"`.
pub fn describes_associated_image(description: &str) -> bool {
    associated_keyword(description).is_some()
}

/// The associated image keyword (`"label"` or `"macro"`) a description names.
pub fn associated_keyword(description: &str) -> Option<&'static str> {
    description
        .split(['\r', '\n', '|'])
        .map(|line| line.trim().to_ascii_lowercase())
        .find_map(|line| {
            ASSOCIATED_KEYWORDS.iter().copied().find(|kw| {
                line == *kw || line.starts_with(&format!("{} ", kw))
            })
        })
}

// =============================================================================
// Tile Data
// =============================================================================

/// Byte locations of the tiles (or strips) of one IFD, plus JPEGTables.
#[derive(Debug, Clone, Default)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load tile locations, or strip locations for untiled IFDs.
    pub async fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        let (offsets_tag, counts_tag) = if ifd.is_tiled() {
            (TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };
        let values = ValueReader::new(reader, header);

        let offsets_entry = ifd
            .get_entry_by_tag(offsets_tag)
            .ok_or(TiffError::MissingTag(offsets_tag.name()))?;
        let counts_entry = ifd
            .get_entry_by_tag(counts_tag)
            .ok_or(TiffError::MissingTag(counts_tag.name()))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;
        if offsets.len() != byte_counts.len() {
            return Err(TiffError::InvalidTagValue {
                tag: counts_tag.name(),
                message: format!(
                    "{} offsets but {} byte counts",
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match ifd.get_entry_by_tag(TiffTag::JpegTables) {
            Some(entry) => Some(values.read_raw_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of the chunk at `index`.
    pub fn get_tile_location(&self, index: u32) -> Option<(u64, u64)> {
        let idx = index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
