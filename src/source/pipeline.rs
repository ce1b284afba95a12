use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::SourceError;
use crate::metadata::WsiMetadata;
use crate::tile::{Encoder, JpegEncoder};

use super::options::{SourceOptions, MAX_TILE_SIZE};

/// Pipeline state shared by every source: validated tile size, merged
/// metadata, level selection and the tile encoder.
#[derive(Clone)]
pub struct SourceCore {
    tile_size: u32,
    metadata: WsiMetadata,
    include_levels: Option<Vec<u32>>,
    encoder: Arc<dyn Encoder>,
}

impl fmt::Debug for SourceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCore")
            .field("tile_size", &self.tile_size)
            .field("include_levels", &self.include_levels)
            .field("transfer_syntax", &self.encoder.transfer_syntax())
            .finish_non_exhaustive()
    }
}

impl SourceCore {
    /// Validate `options` and merge metadata.
    ///
    /// Precedence is caller overrides, then `base` (read from the slide),
    /// then caller defaults. Confidential fields are dropped afterwards
    /// unless `include_confidential` is set.
    pub fn new(options: &SourceOptions, base: &WsiMetadata) -> Result<Self, SourceError> {
        if options.tile_size == 0 || options.tile_size > MAX_TILE_SIZE {
            return Err(SourceError::InvalidTileSize(options.tile_size));
        }

        let mut metadata = base.clone();
        if let Some(defaults) = &options.default_metadata {
            metadata = metadata.merge(defaults);
        }
        if let Some(overrides) = &options.metadata {
            metadata = overrides.merge(&metadata);
        }
        if !options.include_confidential {
            debug!("dropping confidential metadata");
            metadata = metadata.without_confidential();
        }

        let encoder = match &options.encoder {
            Some(encoder) => Arc::clone(encoder),
            None => Arc::new(JpegEncoder::new(options.jpeg_quality)) as Arc<dyn Encoder>,
        };

        Ok(Self {
            tile_size: options.tile_size,
            metadata,
            include_levels: options.include_levels.clone(),
            encoder,
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Merged metadata.
    pub fn metadata(&self) -> &WsiMetadata {
        &self.metadata
    }

    pub fn encoder(&self) -> Arc<dyn Encoder> {
        Arc::clone(&self.encoder)
    }

    /// Whether pyramid level `level` was selected for conversion.
    pub fn includes_level(&self, level: u32) -> bool {
        self.include_levels
            .as_ref()
            .map_or(true, |levels| levels.contains(&level))
    }
}
