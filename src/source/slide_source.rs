//! Source backed by the native slide reader.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{SlideError, SourceError};
use crate::image_data::{AssociatedImageData, ImageData, LevelImageData};
use crate::io::resolve_locator;
use crate::metadata::WsiMetadata;
use crate::slide::{AssociatedImageKind, Slide};

use super::dicomizer::DicomizerSource;
use super::levels::pyramid_levels_from_downsamples;
use super::options::SourceOptions;
use super::pipeline::SourceCore;

/// A local SVS or pyramidal TIFF slide exposed to the pipeline.
pub struct SlideSource {
    path: PathBuf,
    slide: Arc<Slide>,
    pyramid_levels: Vec<u32>,
    base_metadata: WsiMetadata,
    core: SourceCore,
    closed: AtomicBool,
}

impl fmt::Debug for SlideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideSource")
            .field("path", &self.path)
            .field("pyramid_levels", &self.pyramid_levels)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl SlideSource {
    /// Open the slide at `locator`.
    ///
    /// Locators on a remote filesystem are rejected before anything is
    /// opened. If a later step fails, the slide is closed again before the
    /// error is returned.
    pub async fn open(locator: &str, options: SourceOptions) -> Result<Self, SourceError> {
        let path = resolve_locator(locator, &options.file_options)?.into_local_path()?;

        let slide = Slide::open(&path)
            .await
            .map_err(|source| SourceError::NativeOpen {
                path: path.display().to_string(),
                source,
            })?;

        match Self::initialize(&slide, &options).await {
            Ok((pyramid_levels, base_metadata, core)) => {
                info!(
                    path = %path.display(),
                    levels = ?pyramid_levels,
                    tile_size = core.tile_size(),
                    "opened slide source"
                );
                Ok(Self {
                    path,
                    slide: Arc::new(slide),
                    pyramid_levels,
                    base_metadata,
                    core,
                    closed: AtomicBool::new(false),
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to initialize source, closing slide");
                slide.close().await;
                Err(e)
            }
        }
    }

    async fn initialize(
        slide: &Slide,
        options: &SourceOptions,
    ) -> Result<(Vec<u32>, WsiMetadata, SourceCore), SourceError> {
        let downsamples = slide.level_downsamples().await?;
        let pyramid_levels = pyramid_levels_from_downsamples(&downsamples);
        let base_metadata = WsiMetadata::from_slide_properties(&slide.properties().await?);
        let core = SourceCore::new(options, &base_metadata)?;
        Ok((pyramid_levels, base_metadata, core))
    }

    /// Whether the file at `path` can be opened by this source. Never fails.
    pub async fn is_supported(path: impl AsRef<Path>) -> bool {
        Slide::detect_format(path).await.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The native slide handle.
    pub fn slide(&self) -> &Arc<Slide> {
        &self.slide
    }

    fn ensure_open(&self) -> Result<(), SourceError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SlideError::Closed.into())
        } else {
            Ok(())
        }
    }

    async fn associated_image_data(
        &self,
        kind: AssociatedImageKind,
    ) -> Result<Box<dyn ImageData>, SourceError> {
        self.ensure_open()?;
        let data = AssociatedImageData::new(Arc::clone(&self.slide), kind, self.core.encoder()).await?;
        Ok(Box::new(data))
    }
}

#[async_trait]
impl DicomizerSource for SlideSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn base_metadata(&self) -> Result<&WsiMetadata, SourceError> {
        self.ensure_open()?;
        Ok(&self.base_metadata)
    }

    fn pyramid_levels(&self) -> Result<&[u32], SourceError> {
        self.ensure_open()?;
        Ok(&self.pyramid_levels)
    }

    async fn has_label(&self) -> Result<bool, SourceError> {
        self.ensure_open()?;
        Ok(self.slide.has_associated_image(AssociatedImageKind::Label).await?)
    }

    async fn has_overview(&self) -> Result<bool, SourceError> {
        self.ensure_open()?;
        Ok(self.slide.has_associated_image(AssociatedImageKind::Macro).await?)
    }

    async fn create_level_image_data(
        &self,
        level_index: usize,
    ) -> Result<Box<dyn ImageData>, SourceError> {
        self.ensure_open()?;
        let data = LevelImageData::new(
            Arc::clone(&self.slide),
            level_index,
            self.core.tile_size(),
            self.core.metadata().image.clone(),
            self.core.encoder(),
        )
        .await?;
        Ok(Box::new(data))
    }

    async fn create_label_image_data(&self) -> Result<Box<dyn ImageData>, SourceError> {
        self.associated_image_data(AssociatedImageKind::Label).await
    }

    async fn create_overview_image_data(&self) -> Result<Box<dyn ImageData>, SourceError> {
        self.associated_image_data(AssociatedImageKind::Macro).await
    }

    async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!(path = %self.path.display(), "source already closed");
            return false;
        }
        self.slide.close().await
    }
}
