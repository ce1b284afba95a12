use async_trait::async_trait;

use crate::error::SourceError;
use crate::image_data::ImageData;
use crate::metadata::WsiMetadata;

use super::pipeline::SourceCore;

/// A slide the conversion pipeline can read.
///
/// Implementors provide level enumeration, image data and metadata. The
/// provided methods carry the pipeline rules: level index checks, presence
/// checks before creating associated images, and level selection.
///
/// After [`DicomizerSource::close`] every method that reaches the slide
/// fails with a closed-handle error.
#[async_trait]
pub trait DicomizerSource: Send + Sync {
    /// Validated options and merged metadata.
    fn core(&self) -> &SourceCore;

    /// Metadata read from the slide itself.
    fn base_metadata(&self) -> Result<&WsiMetadata, SourceError>;

    /// Pyramid level of each native level, in native order.
    fn pyramid_levels(&self) -> Result<&[u32], SourceError>;

    async fn has_label(&self) -> Result<bool, SourceError>;

    async fn has_overview(&self) -> Result<bool, SourceError>;

    /// Image data of the native level at `level_index`.
    async fn create_level_image_data(
        &self,
        level_index: usize,
    ) -> Result<Box<dyn ImageData>, SourceError>;

    async fn create_label_image_data(&self) -> Result<Box<dyn ImageData>, SourceError>;

    async fn create_overview_image_data(&self) -> Result<Box<dyn ImageData>, SourceError>;

    /// Release the slide. Returns `false` if it was already released.
    async fn close(&self) -> bool;

    /// Merged metadata (overrides, slide, defaults).
    fn metadata(&self) -> Result<&WsiMetadata, SourceError> {
        self.base_metadata()?;
        Ok(self.core().metadata())
    }

    fn tile_size(&self) -> u32 {
        self.core().tile_size()
    }

    /// Image data of a native level, after checking the index.
    async fn level_image_data(
        &self,
        level_index: usize,
    ) -> Result<Box<dyn ImageData>, SourceError> {
        let count = self.pyramid_levels()?.len();
        if level_index >= count {
            return Err(SourceError::LevelNotFound {
                level: level_index,
                count,
            });
        }
        self.create_level_image_data(level_index).await
    }

    /// Label image data, or `None` if the slide has no label.
    async fn label_image_data(&self) -> Result<Option<Box<dyn ImageData>>, SourceError> {
        if !self.has_label().await? {
            return Ok(None);
        }
        self.create_label_image_data().await.map(Some)
    }

    /// Overview image data, or `None` if the slide has no overview.
    async fn overview_image_data(&self) -> Result<Option<Box<dyn ImageData>>, SourceError> {
        if !self.has_overview().await? {
            return Ok(None);
        }
        self.create_overview_image_data().await.map(Some)
    }

    /// Native level indices selected for conversion.
    fn selected_levels(&self) -> Result<Vec<usize>, SourceError> {
        Ok(self
            .pyramid_levels()?
            .iter()
            .enumerate()
            .filter(|&(_, &level)| self.core().includes_level(level))
            .map(|(index, _)| index)
            .collect())
    }
}
