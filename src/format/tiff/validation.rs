//! Checks that a parsed pyramid can be read by the slide reader.
//!
//! Levels must be tiled with non-zero tile dimensions and use a compression
//! the reader decodes (JPEG or none). Problems that do not prevent reading
//! are reported as warnings.

use tracing::warn;

use crate::error::TiffError;

use super::pyramid::{PyramidLevel, TiffPyramid};
use super::tags::{Compression, TiffTag};

// =============================================================================
// Validation Result
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// First error as a `TiffError`, after logging the warnings.
    pub fn into_result(self) -> Result<(), TiffError> {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnsupportedCompression { level: usize, name: String },
    MissingTileTags { level: usize, missing: Vec<&'static str> },
    InvalidTileDimensions { level: usize, tile_width: u32, tile_height: u32 },
    NoPyramidLevels,
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UnsupportedCompression { name, .. } => {
                TiffError::UnsupportedCompression(name)
            }
            ValidationError::MissingTileTags { missing, .. } => {
                TiffError::MissingTag(missing.first().copied().unwrap_or("TileOffsets"))
            }
            ValidationError::InvalidTileDimensions {
                tile_width,
                tile_height,
                ..
            } => TiffError::InvalidTagValue {
                tag: "TileWidth/TileLength",
                message: format!("invalid tile size {}x{}", tile_width, tile_height),
            },
            ValidationError::NoPyramidLevels => TiffError::NoPyramidLevels,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

pub fn validate_level(level: &PyramidLevel) -> ValidationResult {
    let mut result = ValidationResult::default();
    let index = level.level_index;

    match Compression::from_u16(level.compression) {
        Some(compression) if compression.is_supported() => {}
        Some(compression) => result.errors.push(ValidationError::UnsupportedCompression {
            level: index,
            name: compression.name().to_string(),
        }),
        None => result.errors.push(ValidationError::UnsupportedCompression {
            level: index,
            name: format!("Unknown ({})", level.compression),
        }),
    }

    let missing: Vec<&'static str> = [TiffTag::TileOffsets, TiffTag::TileByteCounts]
        .into_iter()
        .filter(|&tag| level.ifd.get_entry_by_tag(tag).is_none())
        .map(TiffTag::name)
        .collect();
    if !missing.is_empty() {
        result.errors.push(ValidationError::MissingTileTags {
            level: index,
            missing,
        });
    }

    if level.tile_width == 0 || level.tile_height == 0 {
        result.errors.push(ValidationError::InvalidTileDimensions {
            level: index,
            tile_width: level.tile_width,
            tile_height: level.tile_height,
        });
    } else if level.tile_width % 16 != 0 || level.tile_height % 16 != 0 {
        result.warnings.push(format!(
            "level {}: tile size {}x{} is not a multiple of 16",
            index, level.tile_width, level.tile_height
        ));
    }

    result
}

pub fn validate_pyramid(pyramid: &TiffPyramid) -> ValidationResult {
    let mut result = ValidationResult::default();
    if pyramid.levels.is_empty() {
        result.errors.push(ValidationError::NoPyramidLevels);
        return result;
    }
    for level in &pyramid.levels {
        result.merge(validate_level(level));
    }
    result
}
