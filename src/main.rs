//! VidConv command-line video converter
//!
//! # Usage
//!
//! ```bash
//! vidconv convert -i recording.ts -o recording.mp4 --preset mp4-gpu-fast
//! vidconv batch --output-dir out --preset speed-2x lecture1.mkv lecture2.mkv
//! vidconv estimate -i recording.ts --preset hevc-cpu
//! vidconv presets --category audio
//! vidconv encoders
//! vidconv probe -i recording.ts
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vidconv_cli::cli::{commands, Cli, Commands};
use vidconv_cli::config_initialization::initialize_configuration;
use vidconv_cli::utils::logging::init_logging;

/// Main entry point for the VidConv CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = initialize_configuration(&cli.config_overrides())
        .context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("Starting VidConv");
    info!("Encoder: {}", config.encoder.ffmpeg_path);

    match cli.command {
        Commands::Convert(args) => commands::convert(args, &config).await?,
        Commands::Batch(args) => commands::batch(args, &config).await?,
        Commands::Estimate(args) => commands::estimate(args, &config).await?,
        Commands::Presets(args) => commands::presets(args, &config)?,
        Commands::Encoders(args) => commands::encoders(args, &config).await?,
        Commands::Probe(args) => commands::probe(args, &config).await?,
    }

    info!("VidConv completed successfully");
    Ok(())
}
