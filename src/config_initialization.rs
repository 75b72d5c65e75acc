//! Configuration initialization and hierarchy management

use std::path::PathBuf;

use tracing::info;

use crate::adapters::toml_config::{AppConfig, TomlConfigAdapter};
use crate::error::ConvertResult;
use crate::utils::logging::LogFormat;

/// Environment variables and the settings they override
pub const ENV_FFMPEG: &str = "VIDCONV_FFMPEG";
pub const ENV_FFPROBE: &str = "VIDCONV_FFPROBE";
pub const ENV_LOG_LEVEL: &str = "VIDCONV_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "VIDCONV_LOG_FORMAT";
pub const ENV_OUTPUT_DIR: &str = "VIDCONV_OUTPUT_DIR";

/// Values given on the command line; `None` leaves lower layers alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub output_dir: Option<PathBuf>,
}

/// Resolve configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration(overrides: &ConfigOverrides) -> ConvertResult<AppConfig> {
    let adapter = TomlConfigAdapter::new();

    let mut config = match adapter.discover(overrides.config_file.as_deref())? {
        Some(path) => adapter.load(&path)?,
        None => {
            info!("No config file found, using defaults");
            AppConfig::default()
        }
    };

    apply_environment(&mut config, |key| std::env::var(key).ok())?;
    apply_cli_overrides(&mut config, overrides);
    Ok(config)
}

/// Apply environment overrides read through `lookup`
pub fn apply_environment<F>(config: &mut AppConfig, lookup: F) -> ConvertResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    let mut take = |key: &str| {
        let value = lookup(key).filter(|v| !v.trim().is_empty());
        if value.is_some() {
            info!("Found environment override: {}", key);
            applied += 1;
        }
        value
    };

    if let Some(path) = take(ENV_FFMPEG) {
        config.encoder.ffmpeg_path = path;
    }
    if let Some(path) = take(ENV_FFPROBE) {
        config.encoder.ffprobe_path = path;
    }
    if let Some(level) = take(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    if let Some(format) = take(ENV_LOG_FORMAT) {
        config.logging.format = format.parse()?;
    }
    if let Some(dir) = take(ENV_OUTPUT_DIR) {
        config.output.directory = Some(PathBuf::from(dir));
    }

    if applied > 0 {
        info!("Applied {} environment variable overrides", applied);
    }
    Ok(())
}

/// Apply command-line overrides
pub fn apply_cli_overrides(config: &mut AppConfig, overrides: &ConfigOverrides) {
    if let Some(path) = &overrides.ffmpeg {
        config.encoder.ffmpeg_path = path.clone();
    }
    if let Some(path) = &overrides.ffprobe {
        config.encoder.ffprobe_path = path.clone();
    }
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = overrides.log_format {
        config.logging.format = format;
    }
    if let Some(dir) = &overrides.output_dir {
        config.output.directory = Some(dir.clone());
    }
}
