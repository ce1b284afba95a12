use thiserror::Error;

use crate::slide::AssociatedImageKind;

/// I/O errors that can occur when reading slide files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Build an `IoError` from a `std::io::Error`, keeping the path for context.
    pub fn from_std(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.to_string())
        } else {
            IoError::Io {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Errors related to format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG and uncompressed data are supported)")]
    UnsupportedCompression(String),

    /// No tiled pyramid level was found in the file
    #[error("No pyramid levels found")]
    NoPyramidLevels,

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised by the native slide reader.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// I/O error while reading the slide file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The file is not a valid pyramidal TIFF
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The file is not a recognized slide format
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Requested associated image is not present in the slide
    #[error("Associated image '{}' not found", .0.key())]
    AssociatedImageNotFound(AssociatedImageKind),

    /// Level index outside the slide's pyramid
    #[error("Level {level} out of range (slide has {count} levels)")]
    LevelOutOfRange { level: usize, count: usize },

    /// Tile or strip data could not be decoded
    #[error("Failed to decode image data: {message}")]
    Decode { message: String },

    /// The slide handle has been closed
    #[error("Slide handle is closed")]
    Closed,
}

/// Errors raised by dicomizer sources and the conversion pipeline.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The locator resolved to a filesystem this source cannot read
    #[error("Unsupported source '{locator}': only local files are supported (resolved scheme '{scheme}')")]
    UnsupportedSource { locator: String, scheme: String },

    /// The native reader failed to open the slide
    #[error("Failed to open slide '{path}': {source}")]
    NativeOpen {
        path: String,
        #[source]
        source: SlideError,
    },

    /// A native reader operation failed after the slide was opened
    #[error(transparent)]
    Slide(#[from] SlideError),

    /// The locator could not be parsed
    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    /// Tile size outside the range a DICOM frame can hold
    #[error("Invalid tile size {0}: must be between 1 and 65535")]
    InvalidTileSize(u32),

    /// Requested level index does not exist
    #[error("Level {level} not found (source has {count} levels)")]
    LevelNotFound { level: usize, count: usize },

    /// Tile coordinate outside the tiled image
    #[error("Tile ({x}, {y}) out of range for tiled size {width}x{height}")]
    TileOutOfRange {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// No registered source accepted the file
    #[error("No source supports '{0}'")]
    NoMatchingSource(String),

    /// The encoder failed to encode a tile
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },
}

impl SourceError {
    /// Returns `true` when the error was caused by a closed handle.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            SourceError::Slide(SlideError::Closed)
                | SourceError::NativeOpen {
                    source: SlideError::Closed,
                    ..
                }
        )
    }
}
