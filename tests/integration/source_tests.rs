//! Slide source adapter tests: construction contract, level derivation,
//! image data, metadata and the closed-handle policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::RgbImage;

use wsi_dicomizer::image_data::ImageData;
use wsi_dicomizer::metadata::WsiMetadata;
use wsi_dicomizer::slide::BACKGROUND;
use wsi_dicomizer::{
    DicomizerSource, Encoder, Point, Size, SlideError, SlideSource, SourceError,
    SourceOptions,
};

use super::test_utils::{
    color_close, create_generic_tiff, create_lzw_tiff, create_pyramid_tiff, create_striped_tiff,
    create_svs, is_valid_jpeg, tile_color, write_temp_slide, SvsFixture, LABEL_COLOR,
};

async fn open_svs(options: SourceOptions) -> (tempfile::NamedTempFile, SlideSource) {
    let file = write_temp_slide(&create_svs(SvsFixture::default()), ".svs");
    let locator = file.path().to_string_lossy().into_owned();
    let source = SlideSource::open(&locator, options).await.unwrap();
    (file, source)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn test_open_svs() {
    let (_file, source) = open_svs(SourceOptions::default()).await;

    assert_eq!(source.pyramid_levels().unwrap(), &[0, 2]);
    assert_eq!(source.tile_size(), 512);
    assert!(source.has_label().await.unwrap());
    assert!(source.has_overview().await.unwrap());
    assert!(source.slide().is_open().await);
}

#[tokio::test]
async fn test_open_file_url() {
    let file = write_temp_slide(&create_pyramid_tiff(), ".tif");
    let url = url::Url::from_file_path(file.path()).unwrap();

    let source = SlideSource::open(url.as_str(), SourceOptions::default())
        .await
        .unwrap();
    assert_eq!(source.pyramid_levels().unwrap(), &[0, 1, 2]);
    assert_eq!(source.path(), file.path());
}

#[tokio::test]
async fn test_remote_locator_rejected() {
    for locator in ["s3://bucket/slide.svs", "https://example.com/slide.svs"] {
        let result = SlideSource::open(locator, SourceOptions::default()).await;
        match result {
            Err(SourceError::UnsupportedSource { locator: l, .. }) => assert_eq!(l, locator),
            other => panic!("expected UnsupportedSource, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_remote_locator_rejected_with_file_options() {
    let options = SourceOptions::default().with_file_option("anon", "true");
    let result = SlideSource::open("gs://bucket/slide.svs", options).await;
    assert!(matches!(
        result,
        Err(SourceError::UnsupportedSource { ref scheme, .. }) if scheme == "gs"
    ));
}

#[tokio::test]
async fn test_native_open_error() {
    let text = write_temp_slide(b"not a slide at all", ".svs");
    let locator = text.path().to_string_lossy().into_owned();

    let result = SlideSource::open(&locator, SourceOptions::default()).await;
    assert!(matches!(result, Err(SourceError::NativeOpen { .. })));

    let result = SlideSource::open("/nonexistent/slide.svs", SourceOptions::default()).await;
    assert!(matches!(result, Err(SourceError::NativeOpen { .. })));
}

#[tokio::test]
async fn test_invalid_tile_size_after_open() {
    let file = write_temp_slide(&create_pyramid_tiff(), ".tif");
    let locator = file.path().to_string_lossy().into_owned();

    for tile_size in [0, 70000] {
        let options = SourceOptions::default().with_tile_size(tile_size);
        let result = SlideSource::open(&locator, options).await;
        assert!(matches!(result, Err(SourceError::InvalidTileSize(s)) if s == tile_size));
    }
}

// =============================================================================
// Pyramid Levels
// =============================================================================

#[tokio::test]
async fn test_non_power_of_two_downsamples_round() {
    let file = write_temp_slide(&create_generic_tiff(&[(398, 398), (100, 100)]), ".tif");
    let locator = file.path().to_string_lossy().into_owned();
    let source = SlideSource::open(&locator, SourceOptions::default())
        .await
        .unwrap();

    assert_eq!(source.slide().level_downsamples().await.unwrap(), vec![1.0, 3.98]);
    assert_eq!(source.pyramid_levels().unwrap(), &[0, 2]);
}

#[tokio::test]
async fn test_selected_levels() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    assert_eq!(source.selected_levels().unwrap(), vec![0, 1]);

    let options = SourceOptions::default().with_include_levels(vec![2]);
    let (_file, source) = open_svs(options).await;
    assert_eq!(source.selected_levels().unwrap(), vec![1]);
}

// =============================================================================
// Image Data
// =============================================================================

#[tokio::test]
async fn test_level_image_data() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    let level = source.level_image_data(0).await.unwrap();

    assert_eq!(level.image_size(), Size::new(1024, 768));
    assert_eq!(level.tile_size(), Size::new(512, 512));
    assert_eq!(level.tiled_size(), Size::new(2, 2));
    assert_eq!(level.transfer_syntax(), "1.2.840.10008.1.2.4.50");

    let spacing = level.pixel_spacing().unwrap();
    assert!(approx(spacing.x_mm, 0.0005));

    let level1 = source.level_image_data(1).await.unwrap();
    assert_eq!(level1.tiled_size(), Size::new(1, 1));
    assert!(approx(level1.pixel_spacing().unwrap().y_mm, 0.002));
}

#[tokio::test]
async fn test_decoded_tile_contents() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    let level = source.level_image_data(0).await.unwrap();

    let tile = level.get_decoded_tile(Point::new(1, 1)).await.unwrap();
    assert_eq!(tile.dimensions(), (512, 512));
    // Level pixel (512, 512) is native tile (2, 2)
    assert!(color_close(*tile.get_pixel(0, 0), tile_color(0, 2, 2), 8));
    // Level pixel (1023, 1023) is below the 768 px image
    assert_eq!(*tile.get_pixel(511, 511), BACKGROUND);
}

#[tokio::test]
async fn test_encoded_tile() {
    let options = SourceOptions::default().with_tile_size(256);
    let (_file, source) = open_svs(options).await;
    let level = source.level_image_data(0).await.unwrap();
    assert_eq!(level.tiled_size(), Size::new(4, 3));

    let encoded = level.get_encoded_tile(Point::new(3, 2)).await.unwrap();
    assert!(is_valid_jpeg(&encoded));
    let decoded = image::load_from_memory(&encoded).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (256, 256));
    assert!(color_close(*decoded.get_pixel(128, 128), tile_color(0, 3, 2), 12));
}

/// Encoder that records the tiles it was given.
struct RecordingEncoder {
    calls: AtomicUsize,
}

impl Encoder for RecordingEncoder {
    fn encode(&self, image: &RgbImage) -> Result<Bytes, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("{}x{}", image.width(), image.height())))
    }

    fn transfer_syntax(&self) -> &'static str {
        "1.2.840.10008.1.2.1"
    }

    fn photometric_interpretation(&self) -> &'static str {
        "RGB"
    }
}

#[tokio::test]
async fn test_caller_encoder_used_for_tiles() {
    let encoder = Arc::new(RecordingEncoder {
        calls: AtomicUsize::new(0),
    });
    let options = SourceOptions::default()
        .with_tile_size(256)
        .with_encoder(Arc::clone(&encoder) as Arc<dyn Encoder>);
    let (_file, source) = open_svs(options).await;

    let level = source.level_image_data(1).await.unwrap();
    assert_eq!(level.transfer_syntax(), "1.2.840.10008.1.2.1");
    let frame = level.get_encoded_tile(Point::new(0, 0)).await.unwrap();
    assert_eq!(&frame[..], b"256x256");

    let label = source.label_image_data().await.unwrap().expect("label");
    let frame = label.get_encoded_tile(Point::new(0, 0)).await.unwrap();
    assert_eq!(&frame[..], b"40x30");

    assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tile_out_of_range() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    let level = source.level_image_data(0).await.unwrap();

    assert!(matches!(
        level.get_decoded_tile(Point::new(2, 0)).await,
        Err(SourceError::TileOutOfRange { x: 2, y: 0, width: 2, height: 2 })
    ));
}

#[tokio::test]
async fn test_level_index_checked() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    assert!(matches!(
        source.level_image_data(2).await,
        Err(SourceError::LevelNotFound { level: 2, count: 2 })
    ));
}

#[tokio::test]
async fn test_label_and_overview_image_data() {
    let (_file, source) = open_svs(SourceOptions::default()).await;

    let label = source.label_image_data().await.unwrap().expect("label");
    assert_eq!(label.image_size(), Size::new(40, 30));
    assert_eq!(label.tiled_size(), Size::new(1, 1));
    assert!(label.pixel_spacing().is_none());
    let pixels = label.get_decoded_tile(Point::new(0, 0)).await.unwrap();
    assert_eq!(*pixels.get_pixel(20, 15), LABEL_COLOR);
    assert!(matches!(
        label.get_decoded_tile(Point::new(1, 0)).await,
        Err(SourceError::TileOutOfRange { .. })
    ));

    let overview = source.overview_image_data().await.unwrap().expect("overview");
    assert_eq!(overview.image_size(), Size::new(80, 30));
    let encoded = overview.get_encoded_tile(Point::new(0, 0)).await.unwrap();
    assert!(is_valid_jpeg(&encoded));
}

#[tokio::test]
async fn test_missing_label() {
    let data = create_svs(SvsFixture {
        label: false,
        macro_image: false,
    });
    let file = write_temp_slide(&data, ".svs");
    let locator = file.path().to_string_lossy().into_owned();
    let source = SlideSource::open(&locator, SourceOptions::default())
        .await
        .unwrap();

    assert!(!source.has_label().await.unwrap());
    assert!(!source.has_overview().await.unwrap());
    assert!(source.label_image_data().await.unwrap().is_none());
    assert!(source.overview_image_data().await.unwrap().is_none());

    assert!(matches!(
        source.create_label_image_data().await,
        Err(SourceError::Slide(SlideError::AssociatedImageNotFound(_)))
    ));
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_base_metadata() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    let metadata = source.base_metadata().unwrap();

    assert_eq!(metadata.equipment.manufacturer.as_deref(), Some("Aperio"));
    assert_eq!(metadata.equipment.device_serial_number.as_deref(), Some("SS1234"));
    assert_eq!(metadata.equipment.software_versions.as_deref(), Some("v11.2.1"));
    assert_eq!(metadata.optical_path.objective_lens_power, Some(20.0));
    assert!(metadata.image.acquisition_datetime.is_some());
}

#[tokio::test]
async fn test_metadata_merge_and_confidentiality() {
    let mut overrides = WsiMetadata::default();
    overrides.equipment.model_name = Some("ScanScope XT".into());
    overrides.slide.identifier = Some("SLIDE-1".into());

    let (_file, source) = open_svs(SourceOptions::default().with_metadata(overrides.clone())).await;
    let metadata = source.metadata().unwrap();
    assert_eq!(metadata.equipment.model_name.as_deref(), Some("ScanScope XT"));
    assert_eq!(metadata.slide.identifier.as_deref(), Some("SLIDE-1"));
    assert_eq!(metadata.equipment.manufacturer.as_deref(), Some("Aperio"));

    let options = SourceOptions::default()
        .with_metadata(overrides)
        .with_include_confidential(false);
    let (_file, source) = open_svs(options).await;
    let metadata = source.metadata().unwrap();
    assert!(metadata.slide.identifier.is_none());
    assert!(metadata.equipment.device_serial_number.is_none());
    assert!(metadata.image.acquisition_datetime.is_none());
    assert_eq!(metadata.equipment.model_name.as_deref(), Some("ScanScope XT"));

    // The snapshot read from the slide is untouched by the filter
    assert!(source.base_metadata().unwrap().equipment.device_serial_number.is_some());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_close_policy() {
    let (_file, source) = open_svs(SourceOptions::default()).await;
    let level = source.level_image_data(0).await.unwrap();

    assert!(source.close().await);
    assert!(!source.close().await);
    assert!(!source.slide().is_open().await);

    assert!(source.pyramid_levels().unwrap_err().is_closed());
    assert!(source.base_metadata().unwrap_err().is_closed());
    assert!(source.metadata().unwrap_err().is_closed());
    assert!(source.has_label().await.unwrap_err().is_closed());
    assert!(source.has_overview().await.unwrap_err().is_closed());
    assert!(matches!(source.level_image_data(0).await, Err(e) if e.is_closed()));
    assert!(matches!(
        source.create_overview_image_data().await,
        Err(e) if e.is_closed()
    ));
    assert!(source.selected_levels().unwrap_err().is_closed());

    // Image data created before the close cannot read anymore
    assert!(level
        .get_decoded_tile(Point::new(0, 0))
        .await
        .unwrap_err()
        .is_closed());
}

#[tokio::test]
async fn test_is_supported() {
    let svs = write_temp_slide(&create_svs(SvsFixture::default()), ".svs");
    let tiff = write_temp_slide(&create_pyramid_tiff(), ".tif");
    let text = write_temp_slide(b"plain text", ".txt");
    let empty = write_temp_slide(b"", ".svs");

    assert!(SlideSource::is_supported(svs.path()).await);
    assert!(SlideSource::is_supported(tiff.path()).await);
    assert!(!SlideSource::is_supported(text.path()).await);
    assert!(!SlideSource::is_supported(empty.path()).await);
    assert!(!SlideSource::is_supported("/nonexistent/slide.svs").await);
}

#[tokio::test]
async fn test_is_supported_matches_open() {
    let lzw = write_temp_slide(&create_lzw_tiff(), ".tif");
    let striped = write_temp_slide(&create_striped_tiff(), ".tif");

    for file in [&lzw, &striped] {
        let locator = file.path().to_string_lossy().into_owned();
        assert!(!SlideSource::is_supported(file.path()).await);
        assert!(SlideSource::open(&locator, SourceOptions::default())
            .await
            .is_err());
    }

    let tiff = write_temp_slide(&create_pyramid_tiff(), ".tif");
    assert!(SlideSource::is_supported(tiff.path()).await);
    let locator = tiff.path().to_string_lossy().into_owned();
    let source = SlideSource::open(&locator, SourceOptions::default())
        .await
        .unwrap();
    assert!(!source.pyramid_levels().unwrap().is_empty());
}
