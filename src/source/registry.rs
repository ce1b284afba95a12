use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::io::resolve_locator;

use super::dicomizer::DicomizerSource;
use super::options::SourceOptions;
use super::slide_source::SlideSource;

/// A probe and a constructor for one kind of source.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this factory can open the local file at `path`. Never fails.
    async fn is_supported(&self, path: &Path) -> bool;

    async fn open(
        &self,
        locator: &str,
        options: SourceOptions,
    ) -> Result<Box<dyn DicomizerSource>, SourceError>;
}

/// Factory for [`SlideSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideSourceFactory;

#[async_trait]
impl SourceFactory for SlideSourceFactory {
    fn name(&self) -> &'static str {
        "slide"
    }

    async fn is_supported(&self, path: &Path) -> bool {
        SlideSource::is_supported(path).await
    }

    async fn open(
        &self,
        locator: &str,
        options: SourceOptions,
    ) -> Result<Box<dyn DicomizerSource>, SourceError> {
        Ok(Box::new(SlideSource::open(locator, options).await?))
    }
}

/// Source factories tried in registration order.
pub struct SourceRegistry {
    factories: Vec<Box<dyn SourceFactory>>,
}

impl Default for SourceRegistry {
    /// Registry with the slide factory.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SlideSourceFactory);
        registry
    }
}

impl SourceRegistry {
    /// Registry without any factory.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Append a factory; earlier factories take priority.
    pub fn register(&mut self, factory: impl SourceFactory + 'static) {
        self.factories.push(Box::new(factory));
    }

    pub fn factory_names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Name of the first factory that supports the local file at `path`.
    pub async fn probe(&self, path: &Path) -> Option<&'static str> {
        for factory in &self.factories {
            if factory.is_supported(path).await {
                return Some(factory.name());
            }
        }
        None
    }

    /// Open `locator` with the first factory that supports it.
    pub async fn open(
        &self,
        locator: &str,
        options: SourceOptions,
    ) -> Result<Box<dyn DicomizerSource>, SourceError> {
        let path = resolve_locator(locator, &options.file_options)?.into_local_path()?;

        for factory in &self.factories {
            if factory.is_supported(&path).await {
                debug!(locator, factory = factory.name(), "selected source factory");
                return factory.open(locator, options).await;
            }
        }
        Err(SourceError::NoMatchingSource(locator.to_string()))
    }
}
