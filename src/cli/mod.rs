//! CLI module for VidConv
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::ConfigOverrides;
use crate::utils::logging::LogFormat;

pub mod args;
pub mod commands;
pub mod report;

pub use args::{
    BatchArgs, ConvertArgs, EncodersArgs, EstimateArgs, PresetsArgs, ProbeArgs, SettingsArgs,
};

/// VidConv video converter
///
/// Converts, remuxes and re-times video files through an external FFmpeg
/// encoder, with size and time estimates before anything runs.
#[derive(Parser, Debug)]
#[command(name = "vidconv")]
#[command(about = "VidConv - batch video conversion on top of FFmpeg")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./vidconv.toml, then the per-user config)
    #[arg(long, env = "VIDCONV_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Encoder executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<String>,

    /// Probe executable
    #[arg(long, global = true)]
    pub ffprobe: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Command-line layer of the configuration hierarchy
    pub fn config_overrides(&self) -> ConfigOverrides {
        let output_dir = match &self.command {
            Commands::Batch(args) => args.output_dir.clone(),
            _ => None,
        };
        ConfigOverrides {
            config_file: self.config.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            output_dir,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a single file
    Convert(ConvertArgs),
    /// Convert several files one after another
    Batch(BatchArgs),
    /// Preview output size and encode time without converting
    Estimate(EstimateArgs),
    /// List conversion presets
    Presets(PresetsArgs),
    /// Show which encoders this machine can use
    Encoders(EncodersArgs),
    /// Show metadata for a video file
    Probe(ProbeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "vidconv",
            "--ffmpeg",
            "/opt/ffmpeg",
            "--log-format",
            "json",
            "batch",
            "--output-dir",
            "/tmp/out",
            "a.ts",
        ])
        .unwrap();

        let overrides = cli.config_overrides();
        assert_eq!(overrides.ffmpeg.as_deref(), Some("/opt/ffmpeg"));
        assert_eq!(overrides.log_format, Some(LogFormat::Json));
        assert_eq!(overrides.output_dir, Some(PathBuf::from("/tmp/out")));
        assert!(overrides.ffprobe.is_none());
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["vidconv", "--log-format", "xml", "presets"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
