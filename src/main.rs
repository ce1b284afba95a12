//! WSI Dicomizer - command-line front end for slide sources.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_dicomizer::{
    config::{Cli, Command, InspectConfig, ProbeConfig, TileConfig},
    error::SourceError,
    metadata::{PixelSpacing, WsiMetadata},
    source::{DicomizerSource, SourceRegistry},
    tile::{Point, Size},
    Slide,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Probe(config) => run_probe(config).await,
        Command::Inspect(config) => run_inspect(config).await,
        Command::Tile(config) => run_tile(config).await,
    }
}

/// Initialize the tracing/logging subsystem. Logs go to stderr so that
/// reports on stdout stay machine-readable.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_dicomizer=debug"
    } else {
        "wsi_dicomizer=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Probe Command
// =============================================================================

async fn run_probe(config: ProbeConfig) -> ExitCode {
    init_logging(config.verbose);

    match Slide::detect_format(&config.path).await {
        Some(format) => {
            println!("{}: supported ({})", config.path.display(), format.name());
            ExitCode::SUCCESS
        }
        None => {
            println!("{}: not supported", config.path.display());
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

#[derive(Debug, Serialize)]
struct InspectReport {
    locator: String,
    tile_size: u32,
    pyramid_levels: Vec<u32>,
    selected_levels: Vec<usize>,
    levels: Vec<LevelReport>,
    has_label: bool,
    has_overview: bool,
    metadata: WsiMetadata,
}

#[derive(Debug, Serialize)]
struct LevelReport {
    index: usize,
    pyramid_level: u32,
    size: Size,
    tiled_size: Size,
    pixel_spacing: Option<PixelSpacing>,
}

async fn run_inspect(config: InspectConfig) -> ExitCode {
    init_logging(config.source.verbose);

    if let Err(e) = config.source.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let registry = SourceRegistry::default();
    let source = match registry
        .open(&config.source.locator, config.source.source_options())
        .await
    {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = build_report(&config.source.locator, source.as_ref()).await;
    source.close().await;

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let json = if config.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize report: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn build_report(
    locator: &str,
    source: &dyn DicomizerSource,
) -> Result<InspectReport, SourceError> {
    let pyramid_levels = source.pyramid_levels()?.to_vec();

    let mut levels = Vec::with_capacity(pyramid_levels.len());
    for (index, &pyramid_level) in pyramid_levels.iter().enumerate() {
        let data = source.level_image_data(index).await?;
        levels.push(LevelReport {
            index,
            pyramid_level,
            size: data.image_size(),
            tiled_size: data.tiled_size(),
            pixel_spacing: data.pixel_spacing(),
        });
    }

    Ok(InspectReport {
        locator: locator.to_string(),
        tile_size: source.tile_size(),
        selected_levels: source.selected_levels()?,
        pyramid_levels,
        levels,
        has_label: source.has_label().await?,
        has_overview: source.has_overview().await?,
        metadata: source.metadata()?.clone(),
    })
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    init_logging(config.source.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let registry = SourceRegistry::default();
    let source = match registry
        .open(&config.source.locator, config.source_options())
        .await
    {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let tile = Point::new(config.x, config.y);
    let encoded = match source.level_image_data(config.level).await {
        Ok(data) => data.get_encoded_tile(tile).await,
        Err(e) => Err(e),
    };
    source.close().await;

    let encoded = match encoded {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!(bytes = encoded.len(), "encoded tile");

    if let Err(e) = tokio::fs::write(&config.output, &encoded).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        level = config.level,
        tile = %tile,
        output = %config.output.display(),
        "wrote tile"
    );
    ExitCode::SUCCESS
}
