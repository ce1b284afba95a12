//! Test utilities for integration tests.
//!
//! Builds small but structurally complete slide files (Aperio SVS and
//! generic pyramidal TIFF) and writes them to temporary files, since the
//! native reader only opens local paths.

use std::io::Write;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tempfile::NamedTempFile;

// =============================================================================
// Tags and field types
// =============================================================================

pub const TAG_NEW_SUBFILE_TYPE: u16 = 254;
pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;
pub const TAG_PHOTOMETRIC: u16 = 262;
pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_MAKE: u16 = 271;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_ROWS_PER_STRIP: u16 = 278;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_X_RESOLUTION: u16 = 282;
pub const TAG_Y_RESOLUTION: u16 = 283;
pub const TAG_RESOLUTION_UNIT: u16 = 296;
pub const TAG_TILE_WIDTH: u16 = 322;
pub const TAG_TILE_LENGTH: u16 = 323;
pub const TAG_TILE_OFFSETS: u16 = 324;
pub const TAG_TILE_BYTE_COUNTS: u16 = 325;
pub const TAG_JPEG_TABLES: u16 = 347;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;

pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_LZW: u16 = 5;
pub const COMPRESSION_JPEG: u16 = 7;

const PHOTOMETRIC_RGB: u16 = 2;

fn type_size(field_type: u16) -> usize {
    match field_type {
        TYPE_SHORT => 2,
        TYPE_LONG => 4,
        TYPE_RATIONAL => 8,
        _ => 1,
    }
}

// =============================================================================
// Image directory builder
// =============================================================================

/// One image directory: its tags and the encoded tiles or strips.
pub struct TestDirectory {
    entries: Vec<(u16, u16, Vec<u8>)>,
    chunks: Vec<Vec<u8>>,
    tiled: bool,
}

impl TestDirectory {
    fn new(width: u32, height: u32, compression: u16, tiled: bool, chunks: Vec<Vec<u8>>) -> Self {
        let mut dir = Self {
            entries: Vec::new(),
            chunks,
            tiled,
        };
        dir.long(TAG_IMAGE_WIDTH, width)
            .long(TAG_IMAGE_LENGTH, height)
            .shorts(TAG_BITS_PER_SAMPLE, &[8, 8, 8])
            .short(TAG_COMPRESSION, compression)
            .short(TAG_PHOTOMETRIC, PHOTOMETRIC_RGB)
            .short(TAG_SAMPLES_PER_PIXEL, 3);
        dir
    }

    /// Tiled RGB directory.
    pub fn tiled(
        width: u32,
        height: u32,
        tile_size: u32,
        compression: u16,
        tiles: Vec<Vec<u8>>,
    ) -> Self {
        let mut dir = Self::new(width, height, compression, true, tiles);
        dir.long(TAG_TILE_WIDTH, tile_size)
            .long(TAG_TILE_LENGTH, tile_size);
        dir
    }

    /// Striped RGB directory.
    pub fn striped(
        width: u32,
        height: u32,
        rows_per_strip: u32,
        compression: u16,
        strips: Vec<Vec<u8>>,
    ) -> Self {
        let mut dir = Self::new(width, height, compression, false, strips);
        dir.long(TAG_ROWS_PER_STRIP, rows_per_strip);
        dir
    }

    pub fn short(&mut self, tag: u16, value: u16) -> &mut Self {
        self.shorts(tag, &[value])
    }

    pub fn shorts(&mut self, tag: u16, values: &[u16]) -> &mut Self {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.set(tag, TYPE_SHORT, bytes)
    }

    pub fn long(&mut self, tag: u16, value: u32) -> &mut Self {
        self.set(tag, TYPE_LONG, value.to_le_bytes().to_vec())
    }

    pub fn ascii(&mut self, tag: u16, value: &str) -> &mut Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.set(tag, TYPE_ASCII, bytes)
    }

    pub fn rational(&mut self, tag: u16, numerator: u32, denominator: u32) -> &mut Self {
        let mut bytes = numerator.to_le_bytes().to_vec();
        bytes.extend_from_slice(&denominator.to_le_bytes());
        self.set(tag, TYPE_RATIONAL, bytes)
    }

    pub fn description(&mut self, value: &str) -> &mut Self {
        self.ascii(TAG_IMAGE_DESCRIPTION, value)
    }

    pub fn subfile_type(&mut self, value: u32) -> &mut Self {
        self.long(TAG_NEW_SUBFILE_TYPE, value)
    }

    pub fn jpeg_tables(&mut self, tables: Vec<u8>) -> &mut Self {
        self.set(TAG_JPEG_TABLES, TYPE_UNDEFINED, tables)
    }

    fn set(&mut self, tag: u16, field_type: u16, bytes: Vec<u8>) -> &mut Self {
        self.entries.retain(|(t, _, _)| *t != tag);
        self.entries.push((tag, field_type, bytes));
        self
    }
}

// =============================================================================
// TIFF writer
// =============================================================================

fn pad_to_word(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

/// Serialize directories into a little-endian classic TIFF, in order.
pub fn build_tiff(directories: &[TestDirectory]) -> Vec<u8> {
    let mut data = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
    let mut next_pointer = 4usize;

    for dir in directories {
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for chunk in &dir.chunks {
            pad_to_word(&mut data);
            offsets.extend_from_slice(&(data.len() as u32).to_le_bytes());
            counts.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            data.extend_from_slice(chunk);
        }

        let (offsets_tag, counts_tag) = if dir.tiled {
            (TAG_TILE_OFFSETS, TAG_TILE_BYTE_COUNTS)
        } else {
            (TAG_STRIP_OFFSETS, TAG_STRIP_BYTE_COUNTS)
        };
        let mut entries = dir.entries.clone();
        entries.push((offsets_tag, TYPE_LONG, offsets));
        entries.push((counts_tag, TYPE_LONG, counts));
        entries.sort_by_key(|(tag, _, _)| *tag);

        // Out-of-line values first, so the directory can point at them
        let mut fields = Vec::with_capacity(entries.len());
        for (tag, field_type, bytes) in &entries {
            let count = (bytes.len() / type_size(*field_type)) as u32;
            let value = if bytes.len() <= 4 {
                let mut inline = bytes.clone();
                inline.resize(4, 0);
                inline
            } else {
                pad_to_word(&mut data);
                let offset = data.len() as u32;
                data.extend_from_slice(bytes);
                offset.to_le_bytes().to_vec()
            };
            fields.push((*tag, *field_type, count, value));
        }

        pad_to_word(&mut data);
        let ifd_offset = data.len() as u32;
        data[next_pointer..next_pointer + 4].copy_from_slice(&ifd_offset.to_le_bytes());

        data.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for (tag, field_type, count, value) in fields {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&field_type.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&value);
        }
        next_pointer = data.len();
        data.extend_from_slice(&0u32.to_le_bytes());
    }

    data
}

/// Write `data` to a temporary file with the given suffix.
pub fn write_temp_slide(data: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("wsi-dicomizer-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

// =============================================================================
// Pixel data
// =============================================================================

/// Distinct solid color of tile (`tx`, `ty`) on `level`.
pub fn tile_color(level: u32, tx: u32, ty: u32) -> Rgb<u8> {
    Rgb([
        (40 + level * 60) as u8,
        (30 + tx * 50) as u8,
        (20 + ty * 60) as u8,
    ])
}

/// Whether two colors differ by at most `tolerance` per channel.
pub fn color_close(a: Rgb<u8>, b: Rgb<u8>, tolerance: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .all(|(x, y)| x.abs_diff(*y) <= tolerance)
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image).unwrap();
    buf
}

/// Split a complete JPEG stream into a JPEGTables blob (DQT and DHT) and an
/// abbreviated stream holding everything else.
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut stream = vec![0xFF, 0xD8];

    let mut i = 2;
    while i + 4 <= jpeg.len() {
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            stream.extend_from_slice(&jpeg[i..]);
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        let segment = &jpeg[i..i + 2 + len];
        if marker == 0xDB || marker == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            stream.extend_from_slice(segment);
        }
        i += 2 + len;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, stream)
}

/// Solid-color JPEG tiles for a level, row-major.
fn jpeg_tiles(level: u32, width: u32, height: u32, tile_size: u32) -> Vec<Vec<u8>> {
    let mut tiles = Vec::new();
    for ty in 0..height.div_ceil(tile_size) {
        for tx in 0..width.div_ceil(tile_size) {
            let tile = RgbImage::from_pixel(tile_size, tile_size, tile_color(level, tx, ty));
            tiles.push(encode_jpeg(&tile, 90));
        }
    }
    tiles
}

/// Solid-color uncompressed tiles for a level, row-major.
fn raw_tiles(level: u32, width: u32, height: u32, tile_size: u32) -> Vec<Vec<u8>> {
    let mut tiles = Vec::new();
    for ty in 0..height.div_ceil(tile_size) {
        for tx in 0..width.div_ceil(tile_size) {
            let tile = RgbImage::from_pixel(tile_size, tile_size, tile_color(level, tx, ty));
            tiles.push(tile.into_raw());
        }
    }
    tiles
}

/// Uncompressed strips of a solid-color image.
fn raw_strips(width: u32, height: u32, rows_per_strip: u32, color: Rgb<u8>) -> Vec<Vec<u8>> {
    (0..height.div_ceil(rows_per_strip))
        .map(|strip| {
            let rows = rows_per_strip.min(height - strip * rows_per_strip);
            RgbImage::from_pixel(width, rows, color).into_raw()
        })
        .collect()
}

// =============================================================================
// Slide fixtures
// =============================================================================

pub const SVS_WIDTH: u32 = 1024;
pub const SVS_HEIGHT: u32 = 768;
pub const SVS_TILE: u32 = 256;

pub const LABEL_COLOR: Rgb<u8> = Rgb([200, 10, 10]);
pub const MACRO_COLOR: Rgb<u8> = Rgb([10, 200, 10]);
pub const THUMBNAIL_COLOR: Rgb<u8> = Rgb([10, 10, 200]);

pub const SVS_DESCRIPTION: &str = "Aperio Image Library v11.2.1\r\n\
    1024x768 [0,0 1024x768] (256x256) JPEG/RGB Q=90|AppMag = 20|MPP = 0.5\
    |ScanScope ID = SS1234|Date = 03/12/15|Time = 13:14:15";

/// Options for [`create_svs`].
#[derive(Clone, Copy)]
pub struct SvsFixture {
    pub label: bool,
    pub macro_image: bool,
}

impl Default for SvsFixture {
    fn default() -> Self {
        Self {
            label: true,
            macro_image: true,
        }
    }
}

/// Aperio SVS with two levels (1024x768 and 256x192, 256px JPEG tiles
/// sharing JPEGTables), a striped thumbnail and optional label and macro.
///
/// IFD order follows Aperio: level 0, thumbnail, level 1, label, macro.
pub fn create_svs(fixture: SvsFixture) -> Vec<u8> {
    let level0 = jpeg_tiles(0, SVS_WIDTH, SVS_HEIGHT, SVS_TILE);
    let (tables, _) = split_jpeg_tables(&level0[0]);
    let abbreviated = |tiles: Vec<Vec<u8>>| -> Vec<Vec<u8>> {
        tiles.iter().map(|t| split_jpeg_tables(t).1).collect()
    };

    let mut directories = Vec::new();

    let mut base = TestDirectory::tiled(
        SVS_WIDTH,
        SVS_HEIGHT,
        SVS_TILE,
        COMPRESSION_JPEG,
        abbreviated(level0),
    );
    base.description(SVS_DESCRIPTION)
        .jpeg_tables(tables.clone())
        .ascii(TAG_MAKE, "Aperio");
    directories.push(base);

    let mut thumbnail = TestDirectory::striped(
        64,
        48,
        16,
        COMPRESSION_NONE,
        raw_strips(64, 48, 16, THUMBNAIL_COLOR),
    );
    thumbnail.description("Aperio Image Library v11.2.1\r\n1024x768 -> 64x48 - ");
    directories.push(thumbnail);

    let mut level1 = TestDirectory::tiled(
        256,
        192,
        SVS_TILE,
        COMPRESSION_JPEG,
        abbreviated(jpeg_tiles(1, 256, 192, SVS_TILE)),
    );
    level1
        .description("Aperio Image Library v11.2.1\r\n1024x768 -> 256x192 JPEG/RGB Q=90")
        .jpeg_tables(tables);
    directories.push(level1);

    if fixture.label {
        let mut label =
            TestDirectory::striped(40, 30, 30, COMPRESSION_NONE, raw_strips(40, 30, 30, LABEL_COLOR));
        label
            .description("Aperio Image Library v11.2.1\r\nlabel 40x30")
            .subfile_type(1);
        directories.push(label);
    }

    if fixture.macro_image {
        let mut macro_image =
            TestDirectory::striped(80, 30, 8, COMPRESSION_NONE, raw_strips(80, 30, 8, MACRO_COLOR));
        macro_image
            .description("Aperio Image Library v11.2.1\r\nmacro 80x30")
            .subfile_type(9);
        directories.push(macro_image);
    }

    build_tiff(&directories)
}

/// Generic pyramidal TIFF with uncompressed 64px tiles and the given level
/// sizes, base level first. Resolution is 40000 px/cm (0.25 µm/px).
pub fn create_generic_tiff(level_sizes: &[(u32, u32)]) -> Vec<u8> {
    let directories: Vec<TestDirectory> = level_sizes
        .iter()
        .enumerate()
        .map(|(level, &(width, height))| {
            let mut dir = TestDirectory::tiled(
                width,
                height,
                64,
                COMPRESSION_NONE,
                raw_tiles(level as u32, width, height, 64),
            );
            dir.rational(TAG_X_RESOLUTION, 40000, 1)
                .rational(TAG_Y_RESOLUTION, 40000, 1)
                .short(TAG_RESOLUTION_UNIT, 3);
            dir
        })
        .collect();
    build_tiff(&directories)
}

/// Three-level pyramid 256x256, 128x128, 64x64.
pub fn create_pyramid_tiff() -> Vec<u8> {
    create_generic_tiff(&[(256, 256), (128, 128), (64, 64)])
}

/// Tiled TIFF whose only level uses LZW.
pub fn create_lzw_tiff() -> Vec<u8> {
    build_tiff(&[TestDirectory::tiled(
        64,
        64,
        64,
        COMPRESSION_LZW,
        vec![vec![0u8; 128]],
    )])
}

/// Plain striped TIFF (not a slide).
pub fn create_striped_tiff() -> Vec<u8> {
    build_tiff(&[TestDirectory::striped(
        32,
        32,
        32,
        COMPRESSION_NONE,
        raw_strips(32, 32, 32, Rgb([1, 2, 3])),
    )])
}

/// Check if data is a complete JPEG stream (SOI ... EOI).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}
