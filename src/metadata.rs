//! Slide metadata model.
//!
//! [`WsiMetadata`] groups the values a DICOM writer needs into sections.
//! Every field is optional so that metadata from several origins (caller
//! overrides, the slide itself, caller defaults) can be layered with
//! [`WsiMetadata::merge`].

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::format::SvsMetadata;
use crate::slide::{
    APERIO_PREFIX, PROPERTY_NAME_COMMENT, PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y,
    PROPERTY_NAME_OBJECTIVE_POWER, PROPERTY_NAME_VENDOR, TIFF_PREFIX,
};

/// Pixel spacing in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSpacing {
    pub x_mm: f64,
    pub y_mm: f64,
}

impl PixelSpacing {
    pub fn new(x_mm: f64, y_mm: f64) -> Self {
        Self { x_mm, y_mm }
    }

    /// Spacing of a level downsampled by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x_mm * factor, self.y_mm * factor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentMetadata {
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    /// Confidential
    pub device_serial_number: Option<String>,
    pub software_versions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Confidential
    pub acquisition_datetime: Option<NaiveDateTime>,
    /// Spacing of the base level
    pub pixel_spacing: Option<PixelSpacing>,
    pub focus_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalPathMetadata {
    pub objective_lens_power: Option<f64>,
    pub illumination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideMetadata {
    /// Confidential
    pub identifier: Option<String>,
    pub stains: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMetadata {
    /// Confidential
    pub text: Option<String>,
    /// Confidential
    pub barcode: Option<String>,
}

/// Metadata of a whole slide image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WsiMetadata {
    pub equipment: EquipmentMetadata,
    pub image: ImageMetadata,
    pub optical_path: OpticalPathMetadata,
    pub slide: SlideMetadata,
    pub label: LabelMetadata,
}

macro_rules! merge_fields {
    ($primary:expr, $fallback:expr, $($field:ident),+) => {
        Self {
            $($field: $primary.$field.clone().or_else(|| $fallback.$field.clone()),)+
        }
    };
}

impl EquipmentMetadata {
    fn merge(&self, fallback: &Self) -> Self {
        merge_fields!(self, fallback, manufacturer, model_name, device_serial_number, software_versions)
    }
}

impl ImageMetadata {
    fn merge(&self, fallback: &Self) -> Self {
        merge_fields!(self, fallback, acquisition_datetime, pixel_spacing, focus_method)
    }
}

impl OpticalPathMetadata {
    fn merge(&self, fallback: &Self) -> Self {
        merge_fields!(self, fallback, objective_lens_power, illumination)
    }
}

impl SlideMetadata {
    fn merge(&self, fallback: &Self) -> Self {
        merge_fields!(self, fallback, identifier, stains)
    }
}

impl LabelMetadata {
    fn merge(&self, fallback: &Self) -> Self {
        merge_fields!(self, fallback, text, barcode)
    }
}

impl WsiMetadata {
    /// Field-wise merge: values set in `self` win, unset ones come from `fallback`.
    pub fn merge(&self, fallback: &WsiMetadata) -> WsiMetadata {
        WsiMetadata {
            equipment: self.equipment.merge(&fallback.equipment),
            image: self.image.merge(&fallback.image),
            optical_path: self.optical_path.merge(&fallback.optical_path),
            slide: self.slide.merge(&fallback.slide),
            label: self.label.merge(&fallback.label),
        }
    }

    /// Copy with the fields that can identify a patient, a device or a
    /// session removed.
    pub fn without_confidential(&self) -> WsiMetadata {
        let mut metadata = self.clone();
        metadata.equipment.device_serial_number = None;
        metadata.image.acquisition_datetime = None;
        metadata.slide.identifier = None;
        metadata.label.text = None;
        metadata.label.barcode = None;
        metadata
    }

    /// Metadata carried by a slide's property map.
    pub fn from_slide_properties(properties: &BTreeMap<String, String>) -> WsiMetadata {
        let get = |key: &str| properties.get(key).map(String::as_str);
        let tiff = |tag: &str| get(&format!("{}{}", TIFF_PREFIX, tag));
        let aperio = |key: &str| get(&format!("{}{}", APERIO_PREFIX, key));
        let parse_f64 = |key: &str| get(key).and_then(|v| v.parse::<f64>().ok());
        let is_aperio = get(PROPERTY_NAME_VENDOR) == Some("aperio");

        let svs = if is_aperio {
            get(PROPERTY_NAME_COMMENT).map(SvsMetadata::parse)
        } else {
            None
        };

        let manufacturer = tiff("Make")
            .map(str::to_string)
            .or_else(|| is_aperio.then(|| "Aperio".to_string()));
        let software_versions = svs
            .as_ref()
            .and_then(|s| s.software_version().map(str::to_string))
            .or_else(|| tiff("Software").map(str::to_string));
        let acquisition_datetime = svs
            .as_ref()
            .and_then(SvsMetadata::acquisition_datetime)
            .or_else(|| {
                tiff("DateTime")
                    .and_then(|v| NaiveDateTime::parse_from_str(v, "%Y:%m:%d %H:%M:%S").ok())
            });
        let pixel_spacing = match (parse_f64(PROPERTY_NAME_MPP_X), parse_f64(PROPERTY_NAME_MPP_Y)) {
            (Some(x), Some(y)) if x > 0.0 && y > 0.0 => {
                Some(PixelSpacing::new(x / 1000.0, y / 1000.0))
            }
            _ => None,
        };

        WsiMetadata {
            equipment: EquipmentMetadata {
                manufacturer,
                model_name: tiff("Model").map(str::to_string),
                device_serial_number: aperio("ScanScope ID").map(str::to_string),
                software_versions,
            },
            image: ImageMetadata {
                acquisition_datetime,
                pixel_spacing,
                focus_method: None,
            },
            optical_path: OpticalPathMetadata {
                objective_lens_power: parse_f64(PROPERTY_NAME_OBJECTIVE_POWER),
                illumination: None,
            },
            slide: SlideMetadata::default(),
            label: LabelMetadata::default(),
        }
    }
}
