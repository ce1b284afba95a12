use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::SlideError;
use crate::format::tiff::{validate_pyramid, TiffHeader, TiffPyramid};
use crate::format::{detect_format, SlideFormat};
use crate::io::{BlockCache, LocalFileReader};

use super::associated::{classify_directory, AssociatedImageKind};
use super::directory::ImageDirectory;
use super::properties::{build_properties, PropertySource};

/// An open pyramidal slide.
///
/// The handle owns the open file. [`Slide::close`] releases it; every
/// accessor called afterwards fails with [`SlideError::Closed`].
pub struct Slide {
    path: PathBuf,
    format: SlideFormat,
    state: RwLock<Option<SlideState>>,
}

struct SlideState {
    /// Cached reader for directory parsing
    reader: BlockCache<LocalFileReader>,
    /// Level directories with their downsample, level 0 first
    levels: Vec<(ImageDirectory, f64)>,
    associated: BTreeMap<AssociatedImageKind, ImageDirectory>,
    properties: BTreeMap<String, String>,
}

impl SlideState {
    fn level(&self, level: usize) -> Result<&(ImageDirectory, f64), SlideError> {
        self.levels.get(level).ok_or(SlideError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })
    }

    /// Uncached reader for bulk pixel data
    fn pixel_reader(&self) -> &LocalFileReader {
        self.reader.inner()
    }
}

/// Detect the format, then parse, validate and load the pyramid levels.
async fn read_levels(
    reader: &BlockCache<LocalFileReader>,
) -> Result<(SlideFormat, TiffPyramid, Vec<(ImageDirectory, f64)>), SlideError> {
    let format = detect_format(reader).await?;
    let pyramid = TiffPyramid::parse(reader).await?;
    validate_pyramid(&pyramid).into_result()?;

    let mut levels = Vec::with_capacity(pyramid.level_count());
    for level in &pyramid.levels {
        let directory =
            ImageDirectory::load(reader, &pyramid.header, &level.ifd, level.ifd_index).await?;
        levels.push((directory, level.downsample));
    }
    Ok((format, pyramid, levels))
}

impl fmt::Debug for Slide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slide")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Slide {
    /// Open a slide file.
    ///
    /// Detects the format, parses and validates the pyramid, loads tile
    /// tables, classifies associated images and builds the property map.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        let path = path.as_ref().to_path_buf();
        let reader = BlockCache::new(LocalFileReader::open(&path).await?);

        let (format, pyramid, levels) = read_levels(&reader).await?;
        let header: TiffHeader = pyramid.header;

        let mut associated = BTreeMap::new();
        for (ifd_index, ifd) in &pyramid.other_ifds {
            let kind = classify_directory(
                format,
                *ifd_index,
                pyramid.description(*ifd_index),
                ifd.new_subfile_type(header.byte_order),
            );
            let Some(kind) = kind else {
                continue;
            };
            if associated.contains_key(&kind) {
                continue;
            }
            match ImageDirectory::load(&reader, &header, ifd, *ifd_index).await {
                Ok(directory) => {
                    associated.insert(kind, directory);
                }
                Err(e) => debug!(ifd = ifd_index, kind = %kind, error = %e, "skipping associated image"),
            }
        }

        // Level 0 may come from any IFD, but tiff.* properties describe the first one
        let first_ifd = match pyramid.levels.iter().find(|l| l.ifd_index == 0) {
            Some(level) => level.ifd.clone(),
            None => pyramid
                .other_ifds
                .iter()
                .find(|(i, _)| *i == 0)
                .map(|(_, ifd)| ifd.clone())
                .unwrap_or_default(),
        };
        let properties = build_properties(
            &reader,
            PropertySource {
                format,
                header: &header,
                first_ifd: &first_ifd,
                first_description: pyramid.description(0),
                levels: &levels,
                associated: &associated,
            },
        )
        .await?;

        info!(
            path = %path.display(),
            format = format.name(),
            levels = levels.len(),
            associated = associated.len(),
            "opened slide"
        );

        Ok(Slide {
            path,
            format,
            state: RwLock::new(Some(SlideState {
                reader,
                levels,
                associated,
                properties,
            })),
        })
    }

    /// Format of the file at `path`, or `None` if it cannot be read as a slide.
    ///
    /// Runs the same pyramid checks as [`Slide::open`], so files with no
    /// tiled levels or with levels in an unsupported compression are
    /// rejected here.
    pub async fn detect_format(path: impl AsRef<Path>) -> Option<SlideFormat> {
        let path = path.as_ref();
        let reader = match LocalFileReader::open(path).await {
            Ok(reader) => BlockCache::new(reader),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot probe slide");
                return None;
            }
        };
        match read_levels(&reader).await {
            Ok((format, _, _)) => Some(format),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "not a supported slide");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub async fn is_open(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Release the file. Returns `false` if the slide was already closed.
    pub async fn close(&self) -> bool {
        let was_open = self.state.write().await.take().is_some();
        if was_open {
            debug!(path = %self.path.display(), "closed slide");
        }
        was_open
    }

    async fn with_state<T>(
        &self,
        f: impl FnOnce(&SlideState) -> Result<T, SlideError>,
    ) -> Result<T, SlideError> {
        match self.state.read().await.as_ref() {
            Some(state) => f(state),
            None => Err(SlideError::Closed),
        }
    }

    pub async fn level_count(&self) -> Result<usize, SlideError> {
        self.with_state(|s| Ok(s.levels.len())).await
    }

    /// Size of level 0.
    pub async fn dimensions(&self) -> Result<(u32, u32), SlideError> {
        self.level_dimensions(0).await
    }

    pub async fn level_dimensions(&self, level: usize) -> Result<(u32, u32), SlideError> {
        self.with_state(|s| s.level(level).map(|(d, _)| (d.width, d.height)))
            .await
    }

    /// Downsample of every level relative to level 0, in native level order.
    pub async fn level_downsamples(&self) -> Result<Vec<f64>, SlideError> {
        self.with_state(|s| Ok(s.levels.iter().map(|(_, ds)| *ds).collect()))
            .await
    }

    /// Native tile size of a level.
    pub async fn level_tile_size(&self, level: usize) -> Result<(u32, u32), SlideError> {
        self.with_state(|s| s.level(level).map(|(d, _)| (d.chunk_width, d.chunk_height)))
            .await
    }

    /// Associated images present in the slide.
    pub async fn associated_images(&self) -> Result<Vec<AssociatedImageKind>, SlideError> {
        self.with_state(|s| Ok(s.associated.keys().copied().collect()))
            .await
    }

    pub async fn has_associated_image(&self, kind: AssociatedImageKind) -> Result<bool, SlideError> {
        self.with_state(|s| Ok(s.associated.contains_key(&kind)))
            .await
    }

    pub async fn associated_image_dimensions(
        &self,
        kind: AssociatedImageKind,
    ) -> Result<(u32, u32), SlideError> {
        self.with_state(|s| {
            s.associated
                .get(&kind)
                .map(|d| (d.width, d.height))
                .ok_or(SlideError::AssociatedImageNotFound(kind))
        })
        .await
    }

    pub async fn properties(&self) -> Result<BTreeMap<String, String>, SlideError> {
        self.with_state(|s| Ok(s.properties.clone())).await
    }

    pub async fn property(&self, key: &str) -> Result<Option<String>, SlideError> {
        self.with_state(|s| Ok(s.properties.get(key).cloned())).await
    }

    /// Read a region of a level in that level's pixel coordinates.
    ///
    /// Pixels outside the level are white.
    pub async fn read_region(
        &self,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, SlideError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(SlideError::Closed)?;
        let (directory, _) = state.level(level)?;
        directory
            .read_region(state.pixel_reader(), x, y, width, height)
            .await
    }

    /// Decode a whole associated image.
    pub async fn read_associated_image(
        &self,
        kind: AssociatedImageKind,
    ) -> Result<RgbImage, SlideError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(SlideError::Closed)?;
        let directory = state
            .associated
            .get(&kind)
            .ok_or(SlideError::AssociatedImageNotFound(kind))?;
        directory
            .read_region(state.pixel_reader(), 0, 0, directory.width, directory.height)
            .await
    }
}
