//! Format-specific integration tests.
//!
//! Tests verify:
//! - Aperio SVS and generic TIFF are told apart
//! - Pyramid levels and associated directories are identified
//! - Abbreviated JPEG tiles decode once JPEGTables are merged

use wsi_dicomizer::format::jpeg::{is_abbreviated_stream, prepare_tile_jpeg};
use wsi_dicomizer::format::tiff::{TiffPyramid, TileData};
use wsi_dicomizer::io::{MemoryReader, RangeReader};
use wsi_dicomizer::{detect_format, is_tiff_header, FormatError, SlideFormat};

use super::test_utils::{
    create_pyramid_tiff, create_striped_tiff, create_svs, encode_jpeg, is_valid_jpeg,
    split_jpeg_tables, SvsFixture,
};

// =============================================================================
// Detection
// =============================================================================

#[tokio::test]
async fn test_detect_svs() {
    let data = create_svs(SvsFixture::default());
    assert!(is_tiff_header(&data));

    let reader = MemoryReader::new(data, "mem://slide.svs");
    assert_eq!(detect_format(&reader).await.unwrap(), SlideFormat::AperioSvs);
}

#[tokio::test]
async fn test_detect_generic_tiff() {
    let reader = MemoryReader::new(create_pyramid_tiff(), "mem://slide.tif");
    assert_eq!(detect_format(&reader).await.unwrap(), SlideFormat::GenericTiff);
}

#[tokio::test]
async fn test_detect_striped_tiff_unsupported() {
    let reader = MemoryReader::new(create_striped_tiff(), "mem://plain.tif");
    assert!(matches!(
        detect_format(&reader).await,
        Err(FormatError::UnsupportedFormat { .. })
    ));
}

#[tokio::test]
async fn test_detect_non_tiff() {
    let reader = MemoryReader::new(b"just some text, not an image".to_vec(), "mem://a.txt");
    assert!(detect_format(&reader).await.is_err());
}

// =============================================================================
// Pyramid Structure
// =============================================================================

#[tokio::test]
async fn test_svs_pyramid_levels() {
    let reader = MemoryReader::new(create_svs(SvsFixture::default()), "mem://slide.svs");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();

    assert_eq!(pyramid.level_count(), 2);
    assert_eq!(pyramid.dimensions(), Some((1024, 768)));
    assert_eq!(pyramid.downsamples(), vec![1.0, 4.0]);

    // Level 1 lives in IFD 2, after the thumbnail
    assert_eq!(pyramid.get_level(1).map(|l| l.ifd_index), Some(2));

    let others: Vec<usize> = pyramid.other_ifds.iter().map(|(i, _)| *i).collect();
    assert_eq!(others, vec![1, 3, 4]);
}

#[tokio::test]
async fn test_generic_pyramid_downsamples() {
    let reader = MemoryReader::new(create_pyramid_tiff(), "mem://slide.tif");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();

    assert_eq!(pyramid.level_count(), 3);
    assert_eq!(pyramid.downsamples(), vec![1.0, 2.0, 4.0]);
    assert!(pyramid.other_ifds.is_empty());
}

// =============================================================================
// JPEGTables
// =============================================================================

#[tokio::test]
async fn test_svs_tiles_are_abbreviated() {
    let reader = MemoryReader::new(create_svs(SvsFixture::default()), "mem://slide.svs");
    let pyramid = TiffPyramid::parse(&reader).await.unwrap();
    let level = pyramid.base_level().unwrap();

    let tiles = TileData::load(&reader, &pyramid.header, &level.ifd)
        .await
        .unwrap();
    assert_eq!(tiles.len(), 12);
    let tables = tiles.jpeg_tables.clone().expect("JPEGTables present");

    let (offset, length) = tiles.get_tile_location(0).unwrap();
    let tile = reader.read_exact_at(offset, length as usize).await.unwrap();
    assert!(is_abbreviated_stream(&tile));

    let merged = prepare_tile_jpeg(Some(&tables[..]), &tile);
    assert!(is_valid_jpeg(&merged));
    let decoded = image::load_from_memory(&merged).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (256, 256));
}

#[test]
fn test_complete_stream_left_alone() {
    let jpeg = encode_jpeg(&image::RgbImage::new(16, 16), 80);
    let (tables, _) = split_jpeg_tables(&jpeg);

    let prepared = prepare_tile_jpeg(Some(tables.as_slice()), &jpeg);
    assert_eq!(&prepared[..], &jpeg[..]);
}
