// TOML config adapter - Configuration management using TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::Settings;
use crate::domain::presets::{Preset, PresetCategory};
use crate::error::{ConvertError, ConvertResult};
use crate::utils::logging::LoggingConfig;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "vidconv.toml";

/// Where the encoder and probe executables live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub probe_timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            probe_timeout_secs: 30,
        }
    }
}

/// Where batch output goes and how it is named
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            suffix: "_converted".to_string(),
        }
    }
}

/// A `[presets.<name>]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreset {
    #[serde(default)]
    pub description: String,
    #[serde(default = "custom_category")]
    pub category: PresetCategory,
    #[serde(default = "default_container_ext")]
    pub container_ext: String,
    #[serde(default)]
    pub settings: Settings,
}

fn custom_category() -> PresetCategory {
    PresetCategory::Custom
}

fn default_container_ext() -> String {
    ".mp4".to_string()
}

impl UserPreset {
    pub fn into_preset(self, name: &str) -> Preset {
        let hardware = self.settings.uses_hardware_encoder();
        Preset {
            name: name.to_string(),
            description: self.description,
            category: self.category,
            container_ext: self.container_ext,
            settings: self.settings,
            hardware,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub encoder: EncoderConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub presets: BTreeMap<String, UserPreset>,
}

impl AppConfig {
    /// User presets as catalog entries
    pub fn user_presets(&self) -> Vec<Preset> {
        self.presets
            .iter()
            .map(|(name, preset)| preset.clone().into_preset(name))
            .collect()
    }
}

/// TOML configuration adapter
#[derive(Debug, Default)]
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Per-user config path: `$XDG_CONFIG_HOME`, `%APPDATA%` or `~/.config`
    pub fn default_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from))
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("vidconv").join("config.toml"))
    }

    /// Pick the config file to read.
    ///
    /// An explicit path must exist. Without one, `./vidconv.toml` and then
    /// the per-user path are tried; finding neither is not an error.
    pub fn discover(&self, explicit: Option<&Path>) -> ConvertResult<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConvertError::ConfigError {
                    message: format!("Config file does not exist: {}", path.display()),
                });
            }
            return Ok(Some(path.to_path_buf()));
        }

        let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), Self::default_config_path()];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                debug!("Found config file {}", candidate.display());
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Read and parse one config file
    pub fn load(&self, path: &Path) -> ConvertResult<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        let config = self.parse(&content).map_err(|e| ConvertError::ConfigError {
            message: format!("{} ({})", e, path.display()),
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse config text
    pub fn parse(&self, content: &str) -> ConvertResult<AppConfig> {
        toml::from_str(content).map_err(|e| ConvertError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })
    }

    /// Write a config file, creating parent directories
    pub fn save(&self, config: &AppConfig, path: &Path) -> ConvertResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(config).map_err(|e| ConvertError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
