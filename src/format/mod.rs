//! Slide file formats.
//!
//! TIFF parsing is the foundation for both supported formats. Use
//! [`detect_format`] to identify a slide:
//!
//! - **Aperio SVS**: "Aperio" marker in the first ImageDescription
//! - **Generic Pyramidal TIFF**: tiled TIFF with reduced-resolution levels

pub mod detect;
pub mod jpeg;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use svs::SvsMetadata;
