//! Image data providers handed to the conversion pipeline.
//!
//! An [`ImageData`] exposes one image (a pyramid level or an associated
//! image) as a grid of fixed-size tiles. Tiles are addressed in tile
//! coordinates; the last row and column may extend past the image, in which
//! case the overhang is filled with the slide background.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbImage;
use tracing::trace;

use crate::error::SourceError;
use crate::metadata::{ImageMetadata, PixelSpacing};
use crate::slide::{AssociatedImageKind, Slide, BACKGROUND};
use crate::tile::{Encoder, Point, Size};

/// A tiled image the pipeline can read frames from.
#[async_trait]
pub trait ImageData: Send + Sync {
    /// Image size in pixels.
    fn image_size(&self) -> Size;

    /// Tile size in pixels.
    fn tile_size(&self) -> Size;

    /// Pixel spacing in mm, if known.
    fn pixel_spacing(&self) -> Option<PixelSpacing>;

    /// Transfer syntax UID of the encoded tiles.
    fn transfer_syntax(&self) -> &'static str;

    /// Number of tiles along each axis.
    fn tiled_size(&self) -> Size {
        self.image_size().tiled_by(self.tile_size())
    }

    /// Decoded RGB pixels of one tile.
    async fn get_decoded_tile(&self, tile: Point) -> Result<RgbImage, SourceError>;

    /// Encoded frame of one tile.
    async fn get_encoded_tile(&self, tile: Point) -> Result<Bytes, SourceError>;
}

fn check_tile(tile: Point, tiled_size: Size) -> Result<(), SourceError> {
    if tiled_size.contains(tile) {
        Ok(())
    } else {
        Err(SourceError::TileOutOfRange {
            x: tile.x,
            y: tile.y,
            width: tiled_size.width,
            height: tiled_size.height,
        })
    }
}

/// Tiles of one pyramid level, read from the shared slide handle.
pub struct LevelImageData {
    slide: Arc<Slide>,
    level: usize,
    size: Size,
    tile_size: Size,
    downsample: f64,
    metadata: ImageMetadata,
    encoder: Arc<dyn Encoder>,
}

impl LevelImageData {
    /// Bind to native level `level` of `slide`.
    pub async fn new(
        slide: Arc<Slide>,
        level: usize,
        tile_size: u32,
        metadata: ImageMetadata,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, SourceError> {
        let (width, height) = slide.level_dimensions(level).await?;
        let downsamples = slide.level_downsamples().await?;
        let downsample = downsamples.get(level).copied().unwrap_or(1.0);

        Ok(Self {
            slide,
            level,
            size: Size::new(width, height),
            tile_size: Size::new(tile_size, tile_size),
            downsample,
            metadata,
            encoder,
        })
    }

    /// Native level index.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn downsample(&self) -> f64 {
        self.downsample
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }
}

#[async_trait]
impl ImageData for LevelImageData {
    fn image_size(&self) -> Size {
        self.size
    }

    fn tile_size(&self) -> Size {
        self.tile_size
    }

    fn pixel_spacing(&self) -> Option<PixelSpacing> {
        self.metadata
            .pixel_spacing
            .map(|spacing| spacing.scaled(self.downsample))
    }

    fn transfer_syntax(&self) -> &'static str {
        self.encoder.transfer_syntax()
    }

    async fn get_decoded_tile(&self, tile: Point) -> Result<RgbImage, SourceError> {
        check_tile(tile, self.tiled_size())?;
        trace!(level = self.level, tile = %tile, "reading level tile");
        let image = self
            .slide
            .read_region(
                self.level,
                tile.x * self.tile_size.width,
                tile.y * self.tile_size.height,
                self.tile_size.width,
                self.tile_size.height,
            )
            .await?;
        Ok(image)
    }

    async fn get_encoded_tile(&self, tile: Point) -> Result<Bytes, SourceError> {
        let image = self.get_decoded_tile(tile).await?;
        self.encoder.encode(&image)
    }
}

/// An associated image (label, overview or thumbnail) as a single tile.
pub struct AssociatedImageData {
    slide: Arc<Slide>,
    kind: AssociatedImageKind,
    size: Size,
    encoder: Arc<dyn Encoder>,
}

impl AssociatedImageData {
    pub async fn new(
        slide: Arc<Slide>,
        kind: AssociatedImageKind,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, SourceError> {
        let (width, height) = slide.associated_image_dimensions(kind).await?;
        Ok(Self {
            slide,
            kind,
            size: Size::new(width, height),
            encoder,
        })
    }

    pub fn kind(&self) -> AssociatedImageKind {
        self.kind
    }
}

#[async_trait]
impl ImageData for AssociatedImageData {
    fn image_size(&self) -> Size {
        self.size
    }

    fn tile_size(&self) -> Size {
        self.size
    }

    fn pixel_spacing(&self) -> Option<PixelSpacing> {
        None
    }

    fn transfer_syntax(&self) -> &'static str {
        self.encoder.transfer_syntax()
    }

    fn tiled_size(&self) -> Size {
        Size::new(1, 1)
    }

    async fn get_decoded_tile(&self, tile: Point) -> Result<RgbImage, SourceError> {
        check_tile(tile, self.tiled_size())?;
        let image = self.slide.read_associated_image(self.kind).await?;
        if image.dimensions() == (self.size.width, self.size.height) {
            return Ok(image);
        }
        // Keep the frame size stable even if the decoder disagrees with the tags
        let mut frame = RgbImage::from_pixel(self.size.width, self.size.height, BACKGROUND);
        image::imageops::replace(&mut frame, &image, 0, 0);
        Ok(frame)
    }

    async fn get_encoded_tile(&self, tile: Point) -> Result<Bytes, SourceError> {
        let image = self.get_decoded_tile(tile).await?;
        self.encoder.encode(&image)
    }
}
