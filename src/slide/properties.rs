//! Slide property map.
//!
//! Keys follow the OpenSlide naming scheme: `openslide.*` for normalized
//! values, `tiff.*` for raw TIFF tags of the first directory and `aperio.*`
//! for Aperio ImageDescription pairs.

use std::collections::BTreeMap;

use crate::error::SlideError;
use crate::format::tiff::{Ifd, TiffHeader, TiffTag, ValueReader};
use crate::format::{SlideFormat, SvsMetadata};
use crate::io::RangeReader;

use super::associated::AssociatedImageKind;
use super::directory::ImageDirectory;

pub const PROPERTY_NAME_VENDOR: &str = "openslide.vendor";
pub const PROPERTY_NAME_COMMENT: &str = "openslide.comment";
pub const PROPERTY_NAME_MPP_X: &str = "openslide.mpp-x";
pub const PROPERTY_NAME_MPP_Y: &str = "openslide.mpp-y";
pub const PROPERTY_NAME_OBJECTIVE_POWER: &str = "openslide.objective-power";
pub const PROPERTY_NAME_LEVEL_COUNT: &str = "openslide.level-count";
pub const PROPERTY_NAME_BACKGROUND_COLOR: &str = "openslide.background-color";

/// Prefix of Aperio ImageDescription pairs
pub const APERIO_PREFIX: &str = "aperio.";

/// Prefix of raw TIFF tag values
pub const TIFF_PREFIX: &str = "tiff.";

/// Inputs for [`build_properties`].
pub(crate) struct PropertySource<'a> {
    pub format: SlideFormat,
    pub header: &'a TiffHeader,
    pub first_ifd: &'a Ifd,
    pub first_description: Option<&'a str>,
    pub levels: &'a [(ImageDirectory, f64)],
    pub associated: &'a BTreeMap<AssociatedImageKind, ImageDirectory>,
}

const RESOLUTION_UNIT_INCH: u32 = 2;
const RESOLUTION_UNIT_CENTIMETER: u32 = 3;

pub(crate) async fn build_properties<R: RangeReader>(
    reader: &R,
    source: PropertySource<'_>,
) -> Result<BTreeMap<String, String>, SlideError> {
    let mut properties = BTreeMap::new();
    let values = ValueReader::new(reader, source.header);
    let byte_order = source.header.byte_order;

    properties.insert(PROPERTY_NAME_VENDOR.to_string(), source.format.vendor().to_string());
    properties.insert(PROPERTY_NAME_BACKGROUND_COLOR.to_string(), "FFFFFF".to_string());
    properties.insert(
        PROPERTY_NAME_LEVEL_COUNT.to_string(),
        source.levels.len().to_string(),
    );
    for (index, (level, downsample)) in source.levels.iter().enumerate() {
        let prefix = format!("openslide.level[{}]", index);
        properties.insert(format!("{}.width", prefix), level.width.to_string());
        properties.insert(format!("{}.height", prefix), level.height.to_string());
        properties.insert(format!("{}.downsample", prefix), downsample.to_string());
        properties.insert(format!("{}.tile-width", prefix), level.chunk_width.to_string());
        properties.insert(format!("{}.tile-height", prefix), level.chunk_height.to_string());
    }
    for (kind, directory) in source.associated {
        let prefix = format!("openslide.associated.{}", kind.key());
        properties.insert(format!("{}.width", prefix), directory.width.to_string());
        properties.insert(format!("{}.height", prefix), directory.height.to_string());
    }

    // Raw TIFF tags of the first directory
    if let Some(description) = source.first_description {
        properties.insert(PROPERTY_NAME_COMMENT.to_string(), description.to_string());
        properties.insert(
            format!("{}{}", TIFF_PREFIX, TiffTag::ImageDescription.name()),
            description.to_string(),
        );
    }
    for tag in [TiffTag::Make, TiffTag::Model, TiffTag::Software, TiffTag::DateTime] {
        if let Some(entry) = source.first_ifd.get_entry_by_tag(tag) {
            if let Ok(value) = values.read_string(entry).await {
                properties.insert(format!("{}{}", TIFF_PREFIX, tag.name()), value);
            }
        }
    }
    let mut resolution = [None, None];
    for (slot, tag) in [TiffTag::XResolution, TiffTag::YResolution].into_iter().enumerate() {
        if let Some(entry) = source.first_ifd.get_entry_by_tag(tag) {
            if let Ok(Some(value)) = values.read_rational(entry).await {
                properties.insert(format!("{}{}", TIFF_PREFIX, tag.name()), value.to_string());
                resolution[slot] = Some(value);
            }
        }
    }
    let explicit_unit = source
        .first_ifd
        .get_entry_by_tag(TiffTag::ResolutionUnit)
        .and_then(|entry| entry.inline_u32(byte_order));
    let unit_name = match explicit_unit.unwrap_or(RESOLUTION_UNIT_INCH) {
        RESOLUTION_UNIT_INCH => "inch",
        RESOLUTION_UNIT_CENTIMETER => "centimeter",
        _ => "none",
    };
    properties.insert(
        format!("{}{}", TIFF_PREFIX, TiffTag::ResolutionUnit.name()),
        unit_name.to_string(),
    );

    match source.format {
        SlideFormat::AperioSvs => {
            let svs = SvsMetadata::parse(source.first_description.unwrap_or_default());
            for (key, value) in &svs.properties {
                properties.insert(format!("{}{}", APERIO_PREFIX, key), value.clone());
            }
            if let Some(mpp) = svs.mpp {
                properties.insert(PROPERTY_NAME_MPP_X.to_string(), mpp.to_string());
                properties.insert(PROPERTY_NAME_MPP_Y.to_string(), mpp.to_string());
            }
            if let Some(magnification) = svs.magnification {
                properties.insert(
                    PROPERTY_NAME_OBJECTIVE_POWER.to_string(),
                    magnification.to_string(),
                );
            }
        }
        SlideFormat::GenericTiff => {
            // Only an explicit unit gives a physical pixel size
            let microns_per_unit = match explicit_unit {
                Some(RESOLUTION_UNIT_INCH) => Some(25_400.0),
                Some(RESOLUTION_UNIT_CENTIMETER) => Some(10_000.0),
                _ => None,
            };
            if let Some(microns) = microns_per_unit {
                for (key, value) in [PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y]
                    .into_iter()
                    .zip(resolution)
                {
                    if let Some(pixels_per_unit) = value.filter(|v| *v > 0.0) {
                        properties.insert(key.to_string(), (microns / pixels_per_unit).to_string());
                    }
                }
            }
        }
    }

    Ok(properties)
}
