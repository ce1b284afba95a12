//! Native slide reader.
//!
//! [`Slide`] opens a local Aperio SVS or generic pyramidal TIFF file and
//! exposes its levels, associated images and properties in the manner of
//! OpenSlide:
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ Slide (handle, open/close, accessors)     │
//! ├─────────────────────┬─────────────────────┤
//! │ ImageDirectory      │ properties          │
//! │ (tiles/strips →RGB) │ (openslide.*, ...)  │
//! ├─────────────────────┴─────────────────────┤
//! │ format::tiff (IFDs, pyramid, values)      │
//! ├───────────────────────────────────────────┤
//! │ io (LocalFileReader + BlockCache)         │
//! └───────────────────────────────────────────┘
//! ```

mod associated;
mod directory;
mod handle;
mod properties;

pub use associated::AssociatedImageKind;
pub use directory::BACKGROUND;
pub use handle::Slide;
pub use properties::{
    APERIO_PREFIX, PROPERTY_NAME_BACKGROUND_COLOR, PROPERTY_NAME_COMMENT,
    PROPERTY_NAME_LEVEL_COUNT, PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y,
    PROPERTY_NAME_OBJECTIVE_POWER, PROPERTY_NAME_VENDOR, TIFF_PREFIX,
};
