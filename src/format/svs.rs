//! Aperio SVS ImageDescription metadata.
//!
//! The base level description looks like:
//!
//! ```text
//! Aperio Image Library v10.0.51
//! 46920x33014 [0,100 46000x32914] (256x256) JPEG/RGB Q=30|AppMag = 20|MPP = 0.4990|Date = 12/29/09|...
//! ```
//!
//! The first line is the software banner; the rest is a pipe-separated list
//! whose first item is the image summary and whose other items are
//! `key = value` pairs.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parsed Aperio metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// Software banner, e.g. `Aperio Image Library v10.0.51`
    pub banner: Option<String>,

    /// Microns per pixel
    pub mpp: Option<f64>,

    /// Objective magnification (`AppMag`)
    pub magnification: Option<f64>,

    /// Scanner serial (`ScanScope ID`)
    pub scanner_id: Option<String>,

    /// Raw `Date` value (MM/DD/YY)
    pub date: Option<String>,

    /// Raw `Time` value (HH:MM:SS)
    pub time: Option<String>,

    /// Every `key = value` pair; later duplicates win
    pub properties: BTreeMap<String, String>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        let mut parts = description.split('|');
        if let Some(first) = parts.next() {
            metadata.banner = first
                .lines()
                .next()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string);
        }

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                continue;
            }
            metadata
                .properties
                .insert(key.to_string(), value.to_string());

            match key {
                "MPP" => metadata.mpp = value.parse().ok(),
                "AppMag" => metadata.magnification = value.parse().ok(),
                "ScanScope ID" => metadata.scanner_id = Some(value.to_string()),
                "Date" => metadata.date = Some(value.to_string()),
                "Time" => metadata.time = Some(value.to_string()),
                _ => {}
            }
        }

        metadata
    }

    /// Software version from the banner, e.g. `v10.0.51`.
    pub fn software_version(&self) -> Option<&str> {
        self.banner
            .as_deref()?
            .split_whitespace()
            .find(|word| word.starts_with('v') && word[1..].starts_with(|c: char| c.is_ascii_digit()))
    }

    /// Acquisition date and time, when both parse.
    pub fn acquisition_datetime(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%m/%d/%y").ok()?;
        let time = NaiveTime::parse_from_str(self.time.as_deref()?, "%H:%M:%S").ok()?;
        Some(date.and_time(time))
    }
}
