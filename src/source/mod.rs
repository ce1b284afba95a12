//! Sources for the DICOM conversion pipeline.
//!
//! A [`DicomizerSource`] hands the pipeline everything it needs to write a
//! DICOM WSI series: the pyramid levels, per-level and associated image
//! data, and metadata. [`SlideSource`] implements it on top of the native
//! [`Slide`](crate::slide::Slide) reader; [`SourceRegistry`] picks a source
//! for a locator.

mod dicomizer;
mod levels;
mod options;
mod pipeline;
mod registry;
mod slide_source;

pub use dicomizer::DicomizerSource;
pub use levels::pyramid_levels_from_downsamples;
pub use options::{SourceOptions, DEFAULT_TILE_SIZE, MAX_TILE_SIZE};
pub use pipeline::SourceCore;
pub use registry::{SlideSourceFactory, SourceFactory, SourceRegistry};
pub use slide_source::SlideSource;
