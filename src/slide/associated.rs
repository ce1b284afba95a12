use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::format::tiff::associated_keyword;
use crate::format::SlideFormat;

/// Kind of an associated (non-pyramid) image stored in a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociatedImageKind {
    /// Photo of the slide label
    Label,
    /// Low magnification photo of the whole glass slide (the overview)
    Macro,
    /// Downscaled rendering of the base level
    Thumbnail,
}

impl AssociatedImageKind {
    pub const ALL: [AssociatedImageKind; 3] = [
        AssociatedImageKind::Label,
        AssociatedImageKind::Macro,
        AssociatedImageKind::Thumbnail,
    ];

    /// Key the slide reader uses for this image.
    pub const fn key(self) -> &'static str {
        match self {
            AssociatedImageKind::Label => "label",
            AssociatedImageKind::Macro => "macro",
            AssociatedImageKind::Thumbnail => "thumbnail",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for AssociatedImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AssociatedImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| format!("unknown associated image '{}'", s))
    }
}

/// NewSubfileType Aperio writes for label directories
const APERIO_LABEL_SUBFILE_TYPE: u32 = 1;

/// NewSubfileType Aperio writes for macro directories
const APERIO_MACRO_SUBFILE_TYPE: u32 = 9;

/// Position of the thumbnail in an Aperio IFD chain
const APERIO_THUMBNAIL_IFD: usize = 1;

/// Classify a non-level directory.
///
/// Description keywords apply to every format. Aperio files also mark
/// labels and macros through NewSubfileType and put the thumbnail in the
/// second directory.
pub(crate) fn classify_directory(
    format: SlideFormat,
    ifd_index: usize,
    description: Option<&str>,
    new_subfile_type: Option<u32>,
) -> Option<AssociatedImageKind> {
    match description.and_then(associated_keyword) {
        Some("label") => return Some(AssociatedImageKind::Label),
        Some("macro") => return Some(AssociatedImageKind::Macro),
        _ => {}
    }

    if format != SlideFormat::AperioSvs {
        return None;
    }
    match new_subfile_type {
        Some(APERIO_LABEL_SUBFILE_TYPE) => Some(AssociatedImageKind::Label),
        Some(APERIO_MACRO_SUBFILE_TYPE) => Some(AssociatedImageKind::Macro),
        _ if ifd_index == APERIO_THUMBNAIL_IFD => Some(AssociatedImageKind::Thumbnail),
        _ => None,
    }
}
