use std::fmt;
use std::sync::Arc;

use crate::io::FileOptions;
use crate::metadata::WsiMetadata;
use crate::tile::{Encoder, DEFAULT_JPEG_QUALITY};

/// Default output tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Largest tile size a DICOM frame can describe (Rows/Columns are 16-bit).
pub const MAX_TILE_SIZE: u32 = 65535;

/// Options for opening a source.
#[derive(Clone)]
pub struct SourceOptions {
    /// Output tile size in pixels
    pub tile_size: u32,

    /// JPEG quality of encoded tiles (1-100), used when no encoder is given
    pub jpeg_quality: u8,

    /// Encoder shared by every image data of the source
    pub encoder: Option<Arc<dyn Encoder>>,

    /// Metadata that takes precedence over the slide's own
    pub metadata: Option<WsiMetadata>,

    /// Metadata used where neither the overrides nor the slide provide a value
    pub default_metadata: Option<WsiMetadata>,

    /// Keep identifying fields in the merged metadata
    pub include_confidential: bool,

    /// Filesystem options passed with the locator
    pub file_options: FileOptions,

    /// Pyramid levels to convert; `None` selects all of them
    pub include_levels: Option<Vec<u32>>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            encoder: None,
            metadata: None,
            default_metadata: None,
            include_confidential: true,
            file_options: FileOptions::new(),
            include_levels: None,
        }
    }
}

impl fmt::Debug for SourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOptions")
            .field("tile_size", &self.tile_size)
            .field("jpeg_quality", &self.jpeg_quality)
            .field(
                "encoder",
                &self.encoder.as_ref().map(|encoder| encoder.transfer_syntax()),
            )
            .field("metadata", &self.metadata)
            .field("default_metadata", &self.default_metadata)
            .field("include_confidential", &self.include_confidential)
            .field("file_options", &self.file_options)
            .field("include_levels", &self.include_levels)
            .finish()
    }
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Use `encoder` for every tile instead of a JPEG encoder built from
    /// `jpeg_quality`.
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_metadata(mut self, metadata: WsiMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_default_metadata(mut self, metadata: WsiMetadata) -> Self {
        self.default_metadata = Some(metadata);
        self
    }

    pub fn with_include_confidential(mut self, include: bool) -> Self {
        self.include_confidential = include;
        self
    }

    pub fn with_file_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.file_options.insert(key.into(), value.into());
        self
    }

    pub fn with_include_levels(mut self, levels: Vec<u32>) -> Self {
        self.include_levels = Some(levels);
        self
    }
}
