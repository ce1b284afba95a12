//! # WSI Dicomizer
//!
//! Exposes pyramidal Whole Slide Images (Aperio SVS and generic pyramidal
//! TIFF) to a DICOM conversion pipeline.
//!
//! A native reader parses the slide's TIFF structure, decodes tiles and
//! strips into RGB, and reports levels, associated images and properties.
//! A source adapter sits on top of it: it derives the pyramid level of each
//! native level, builds a metadata snapshot and serves tiles of a fixed
//! output size, encoded for the DICOM writer.
//!
//! ## Architecture
//!
//! - [`io`] - Range readers, block caching and locator resolution
//! - [`mod@format`] - TIFF/SVS parsing and JPEG stream handling
//! - [`slide`] - Native slide reader
//! - [`metadata`] - Metadata model, merging and confidentiality filtering
//! - [`tile`] - Tile geometry and encoders
//! - [`image_data`] - Tiled image providers for levels and associated images
//! - [`source`] - Source trait, slide source adapter and registry
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_dicomizer::{DicomizerSource, Point, SlideSource, SourceOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wsi_dicomizer::SourceError> {
//!     let source = SlideSource::open("CMU-1.svs", SourceOptions::default()).await?;
//!
//!     for index in source.selected_levels()? {
//!         let level = source.level_image_data(index).await?;
//!         let frame = level.get_encoded_tile(Point::new(0, 0)).await?;
//!         println!("level {}: {} tiles, first frame {} bytes", index, level.tiled_size(), frame.len());
//!     }
//!
//!     source.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod image_data;
pub mod io;
pub mod metadata;
pub mod slide;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, InspectConfig, ProbeConfig, SourceArgs, TileConfig};
pub use error::{FormatError, IoError, SlideError, SourceError, TiffError};
pub use format::{detect_format, is_tiff_header, SlideFormat, SvsMetadata};
pub use image_data::{AssociatedImageData, ImageData, LevelImageData};
pub use io::{
    resolve_locator, BlockCache, FileOptions, Filesystem, LocalFileReader, RangeReader,
    ResolvedLocator,
};
pub use metadata::{PixelSpacing, WsiMetadata};
pub use slide::{AssociatedImageKind, Slide};
pub use source::{
    pyramid_levels_from_downsamples, DicomizerSource, SlideSource, SlideSourceFactory,
    SourceCore, SourceFactory, SourceOptions, SourceRegistry,
};
pub use tile::{Encoder, JpegEncoder, Point, Size};
