//! Pixel access for one image directory (a level or an associated image).
//!
//! Tiled and striped directories are handled the same way: the image is a
//! grid of chunks, where a strip is a chunk as wide as the image.

use image::{imageops, ImageFormat, Rgb, RgbImage};
use tracing::warn;

use crate::error::{SlideError, TiffError};
use crate::format::jpeg::prepare_tile_jpeg;
use crate::format::tiff::{Compression, Ifd, TiffHeader, TileData};
use crate::io::RangeReader;

/// Fill color for areas without image data
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

const PHOTOMETRIC_WHITE_IS_ZERO: u16 = 0;

const PHOTOMETRIC_RGB: u16 = 2;

#[derive(Debug, Clone)]
pub(crate) struct ImageDirectory {
    pub ifd_index: usize,
    pub tiled: bool,
    pub width: u32,
    pub height: u32,
    pub chunk_width: u32,
    pub chunk_height: u32,
    pub compression: u16,
    pub samples_per_pixel: u16,
    pub photometric: Option<u16>,
    pub chunks: TileData,
}

impl ImageDirectory {
    /// Read geometry and chunk locations of `ifd`.
    pub async fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
        ifd_index: usize,
    ) -> Result<Self, SlideError> {
        let byte_order = header.byte_order;
        let width = ifd
            .image_width(byte_order)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = ifd
            .image_height(byte_order)
            .ok_or(TiffError::MissingTag("ImageLength"))?;

        let (chunk_width, chunk_height) = if ifd.is_tiled() {
            (
                ifd.tile_width(byte_order)
                    .ok_or(TiffError::MissingTag("TileWidth"))?,
                ifd.tile_height(byte_order)
                    .ok_or(TiffError::MissingTag("TileLength"))?,
            )
        } else {
            // A missing RowsPerStrip means a single strip
            let rows = ifd.rows_per_strip(byte_order).unwrap_or(height);
            (width, rows.min(height))
        };
        if width == 0 || height == 0 || chunk_width == 0 || chunk_height == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "ImageWidth/ImageLength",
                message: format!(
                    "image {}x{} with chunks {}x{}",
                    width, height, chunk_width, chunk_height
                ),
            }
            .into());
        }

        let chunks = TileData::load(reader, header, ifd).await?;

        let directory = ImageDirectory {
            ifd_index,
            tiled: ifd.is_tiled(),
            width,
            height,
            chunk_width,
            chunk_height,
            compression: ifd
                .compression(byte_order)
                .unwrap_or(Compression::None as u16),
            samples_per_pixel: ifd.samples_per_pixel(byte_order).unwrap_or(1),
            photometric: ifd.photometric_interpretation(byte_order),
            chunks,
        };
        if directory.is_rgb_jpeg() {
            warn!(
                ifd = ifd_index,
                "JPEG data with RGB photometric interpretation is decoded as YCbCr, colors may be shifted"
            );
        }
        Ok(directory)
    }

    /// JPEG chunks declared as RGB rather than YCbCr.
    pub fn is_rgb_jpeg(&self) -> bool {
        self.photometric == Some(PHOTOMETRIC_RGB)
            && Compression::from_u16(self.compression) == Some(Compression::Jpeg)
    }

    pub fn chunks_x(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }

    pub fn chunks_y(&self) -> u32 {
        self.height.div_ceil(self.chunk_height)
    }

    /// Decode the chunk at grid position (`cx`, `cy`).
    ///
    /// Tiles decode at full tile size, including padding past the image
    /// edge. The last strip holds only the remaining rows.
    pub async fn read_chunk<R: RangeReader>(
        &self,
        reader: &R,
        cx: u32,
        cy: u32,
    ) -> Result<RgbImage, SlideError> {
        let expected_height = if self.tiled {
            self.chunk_height
        } else {
            self.chunk_height.min(self.height - cy * self.chunk_height)
        };

        let index = cy * self.chunks_x() + cx;
        let (offset, length) = match self.chunks.get_tile_location(index) {
            Some(location) => location,
            None => return Ok(RgbImage::from_pixel(self.chunk_width, expected_height, BACKGROUND)),
        };
        // Sparse files leave missing tiles at offset 0 with no bytes
        if length == 0 {
            return Ok(RgbImage::from_pixel(self.chunk_width, expected_height, BACKGROUND));
        }
        let data = reader.read_exact_at(offset, length as usize).await?;

        match Compression::from_u16(self.compression) {
            Some(Compression::Jpeg) => {
                let stream = prepare_tile_jpeg(self.chunks.jpeg_tables.as_deref(), &data);
                image::load_from_memory_with_format(&stream, ImageFormat::Jpeg)
                    .map(|decoded| decoded.to_rgb8())
                    .map_err(|e| SlideError::Decode {
                        message: format!("chunk {} of IFD {}: {}", index, self.ifd_index, e),
                    })
            }
            Some(Compression::None) => {
                self.unpack_uncompressed(&data, self.chunk_width, expected_height)
            }
            Some(other) => Err(TiffError::UnsupportedCompression(other.name().to_string()).into()),
            None => Err(TiffError::UnsupportedCompression(format!(
                "Unknown ({})",
                self.compression
            ))
            .into()),
        }
    }

    fn unpack_uncompressed(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RgbImage, SlideError> {
        let samples = self.samples_per_pixel.max(1) as usize;
        let pixels = width as usize * height as usize;
        if data.len() < pixels * samples {
            return Err(SlideError::Decode {
                message: format!(
                    "uncompressed chunk has {} bytes, expected {}",
                    data.len(),
                    pixels * samples
                ),
            });
        }

        let invert = self.photometric == Some(PHOTOMETRIC_WHITE_IS_ZERO);
        let mut rgb = Vec::with_capacity(pixels * 3);
        for pixel in data.chunks_exact(samples).take(pixels) {
            if samples >= 3 {
                rgb.extend_from_slice(&pixel[..3]);
            } else {
                let value = if invert { 255 - pixel[0] } else { pixel[0] };
                rgb.extend_from_slice(&[value, value, value]);
            }
        }

        RgbImage::from_raw(width, height, rgb).ok_or_else(|| SlideError::Decode {
            message: "pixel buffer does not match chunk size".to_string(),
        })
    }

    /// Read a `width` x `height` region whose top-left corner is (`x`, `y`).
    ///
    /// Parts of the region outside the image are filled with [`BACKGROUND`].
    pub async fn read_region<R: RangeReader>(
        &self,
        reader: &R,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, SlideError> {
        let mut region = RgbImage::from_pixel(width, height, BACKGROUND);
        if width == 0 || height == 0 || x >= self.width || y >= self.height {
            return Ok(region);
        }

        // Region clipped to the image, in image coordinates, end exclusive
        let x_end = (x as u64 + width as u64).min(self.width as u64) as u32;
        let y_end = (y as u64 + height as u64).min(self.height as u64) as u32;

        for cy in y / self.chunk_height..=(y_end - 1) / self.chunk_height {
            for cx in x / self.chunk_width..=(x_end - 1) / self.chunk_width {
                let chunk = self.read_chunk(reader, cx, cy).await?;
                let chunk_x = cx * self.chunk_width;
                let chunk_y = cy * self.chunk_height;

                let src_x = x.max(chunk_x);
                let src_y = y.max(chunk_y);
                let src_x_end = x_end.min(chunk_x + chunk.width());
                let src_y_end = y_end.min(chunk_y + chunk.height());
                if src_x >= src_x_end || src_y >= src_y_end {
                    continue;
                }

                let part = imageops::crop_imm(
                    &chunk,
                    src_x - chunk_x,
                    src_y - chunk_y,
                    src_x_end - src_x,
                    src_y_end - src_y,
                )
                .to_image();
                imageops::replace(&mut region, &part, (src_x - x) as i64, (src_y - y) as i64);
            }
        }

        Ok(region)
    }
}
