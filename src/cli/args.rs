//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::domain::model::{CodecChoice, Resolution};
use crate::domain::presets::{Preset, PresetCatalog, PresetCategory};
use crate::error::{ConvertError, ConvertResult};

/// Conversion settings shared by convert, batch and estimate
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Start from a named preset (see `vidconv presets`)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Video codec: an encoder name, `copy`, or `none`
    #[arg(long)]
    pub vcodec: Option<CodecChoice>,

    /// Audio codec: an encoder name, `copy`, or `none`
    #[arg(long)]
    pub acodec: Option<CodecChoice>,

    /// Video bitrate in kbps
    #[arg(long)]
    pub video_bitrate: Option<u32>,

    /// Audio bitrate in kbps
    #[arg(long)]
    pub audio_bitrate: Option<u32>,

    /// Encoder speed/quality preset (ultrafast ... veryslow)
    #[arg(long)]
    pub encoder_preset: Option<String>,

    /// Output frame size as W:H
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Output frame rate
    #[arg(long, value_parser = positive_number)]
    pub fps: Option<f64>,

    /// Playback speed factor (2 = twice as fast)
    #[arg(long, value_parser = positive_number)]
    pub speed: Option<f64>,

    /// Brightness adjustment (-1.0 to 1.0)
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f64>,

    /// Contrast multiplier
    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f64>,

    /// Saturation multiplier
    #[arg(long, allow_hyphen_values = true)]
    pub saturation: Option<f64>,
}

fn positive_number(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("'{}' must be greater than zero", s))
    }
}

impl SettingsArgs {
    /// The named preset (or the default custom one) with flag overrides applied
    pub fn resolve(&self, catalog: &PresetCatalog) -> ConvertResult<Preset> {
        let mut preset = match &self.preset {
            Some(name) => catalog.find(name).cloned().ok_or_else(|| {
                ConvertError::invalid_setting(format!(
                    "Unknown preset '{}'. Run `vidconv presets` to list them",
                    name
                ))
            })?,
            None => Preset::custom(Default::default()),
        };

        let settings = &mut preset.settings;
        if let Some(video) = &self.vcodec {
            settings.video = video.clone();
        }
        if let Some(audio) = &self.acodec {
            settings.audio = audio.clone();
        }
        if self.video_bitrate.is_some() {
            settings.video_bitrate = self.video_bitrate;
        }
        if self.audio_bitrate.is_some() {
            settings.audio_bitrate = self.audio_bitrate;
        }
        if self.encoder_preset.is_some() {
            settings.preset = self.encoder_preset.clone();
        }
        if self.resolution.is_some() {
            settings.resolution = self.resolution;
        }
        if self.fps.is_some() {
            settings.fps = self.fps;
        }
        if self.speed.is_some() {
            settings.speed = self.speed;
        }
        if self.brightness.is_some() {
            settings.color.brightness = self.brightness;
        }
        if self.contrast.is_some() {
            settings.color.contrast = self.contrast;
        }
        if self.saturation.is_some() {
            settings.color.saturation = self.saturation;
        }

        preset.hardware = preset.settings.uses_hardware_encoder();
        Ok(preset)
    }
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path (default: next to the input, or in the configured output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Report progress as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the batch command
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input video files, converted in the given order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for converted files
    #[arg(short = 'd', long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Report progress as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the estimate command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the presets command
#[derive(Args, Debug)]
pub struct PresetsArgs {
    /// Only list one category
    #[arg(short, long)]
    pub category: Option<PresetCategory>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the encoders command
#[derive(Args, Debug)]
pub struct EncodersArgs {
    /// List GPU encoders without confirming them with a test encode
    #[arg(long)]
    pub no_test: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_gives_default_custom_preset() {
        let preset = SettingsArgs::default()
            .resolve(&PresetCatalog::default())
            .unwrap();
        assert_eq!(preset.category, PresetCategory::Custom);
        assert_eq!(preset.settings, Default::default());
    }

    #[test]
    fn test_flags_override_named_preset() {
        let args = SettingsArgs {
            preset: Some("MP4-GPU-FAST".to_string()),
            vcodec: Some(CodecChoice::encode("libx264")),
            video_bitrate: Some(2500),
            speed: Some(2.0),
            ..Default::default()
        };
        let preset = args.resolve(&PresetCatalog::default()).unwrap();

        assert_eq!(preset.name, "mp4-gpu-fast");
        assert_eq!(preset.settings.video, CodecChoice::encode("libx264"));
        assert_eq!(preset.settings.video_bitrate, Some(2500));
        assert_eq!(preset.settings.audio_bitrate, Some(192));
        assert_eq!(preset.settings.speed, Some(2.0));
        assert!(!preset.hardware);
    }

    #[test]
    fn test_unknown_preset_is_error() {
        let args = SettingsArgs {
            preset: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(args.resolve(&PresetCatalog::default()).is_err());
    }

    #[derive(clap::Parser, Debug)]
    struct SettingsOnly {
        #[command(flatten)]
        settings: SettingsArgs,
    }

    #[test]
    fn test_negative_color_values_parse() {
        use clap::Parser;
        let parsed = SettingsOnly::try_parse_from([
            "vidconv",
            "--brightness",
            "-0.2",
            "--contrast",
            "-0.5",
            "--saturation",
            "-1",
        ])
        .unwrap();
        assert_eq!(parsed.settings.brightness, Some(-0.2));
        assert_eq!(parsed.settings.contrast, Some(-0.5));
        assert_eq!(parsed.settings.saturation, Some(-1.0));
    }

    #[test]
    fn test_positive_number() {
        assert_eq!(positive_number("1.5"), Ok(1.5));
        assert!(positive_number("0").is_err());
        assert!(positive_number("-2").is_err());
        assert!(positive_number("fast").is_err());
    }
}
