//! Command-line configuration for WSI Dicomizer.
//!
//! Options can be given as arguments or as environment variables with the
//! `WSI_DICOMIZER_` prefix:
//!
//! - `WSI_DICOMIZER_TILE_SIZE` - Output tile size in pixels (default: 512)
//! - `WSI_DICOMIZER_JPEG_QUALITY` - JPEG quality of encoded tiles (default: 80)
//! - `WSI_DICOMIZER_NO_CONFIDENTIAL` - Drop identifying metadata (default: false)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io::FileOptions;
use crate::source::{SourceOptions, DEFAULT_TILE_SIZE, MAX_TILE_SIZE};
use crate::tile::{is_valid_quality, DEFAULT_JPEG_QUALITY};

/// WSI Dicomizer - expose Whole Slide Images to a DICOM conversion pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-dicomizer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check whether a file is a supported slide.
    Probe(ProbeConfig),

    /// Open a slide and print its pyramid, associated images and metadata as JSON.
    Inspect(InspectConfig),

    /// Encode one output tile of a pyramid level to a file.
    Tile(TileConfig),
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Options shared by commands that open a source.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SourceArgs {
    /// Slide locator: a local path or a `file://` URL.
    pub locator: String,

    /// Output tile size in pixels (1-65535).
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_DICOMIZER_TILE_SIZE")]
    pub tile_size: u32,

    /// Drop identifying metadata (serial numbers, dates, label text).
    #[arg(long, default_value_t = false, env = "WSI_DICOMIZER_NO_CONFIDENTIAL")]
    pub no_confidential: bool,

    /// Filesystem option passed with the locator, as `key=value`.
    #[arg(long = "file-option", value_parser = parse_key_value)]
    pub file_options: Vec<(String, String)>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SourceArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.locator.trim().is_empty() {
            return Err("locator must not be empty".to_string());
        }
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
        }
        Ok(())
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            tile_size: self.tile_size,
            include_confidential: !self.no_confidential,
            file_options: self.file_options.iter().cloned().collect::<FileOptions>(),
            ..SourceOptions::default()
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Path of the file to check.
    pub path: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct InspectConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print compact JSON instead of pretty-printed JSON.
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TileConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Native level index.
    #[arg(long, default_value_t = 0)]
    pub level: usize,

    /// Tile column.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Tile row.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// File to write the encoded tile to.
    #[arg(short, long)]
    pub output: PathBuf,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_DICOMIZER_JPEG_QUALITY")]
    pub quality: u8,
}

impl TileConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;
        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    pub fn source_options(&self) -> SourceOptions {
        self.source.source_options().with_jpeg_quality(self.quality)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}
