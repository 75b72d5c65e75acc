//! Built-in conversion presets
//!
//! Presets are named [`Settings`] plus the bits of context the estimator
//! needs (category, container, whether a GPU encoder is used).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::model::{CodecChoice, Resolution, Settings};
use crate::error::ConvertError;

/// Encoder speed/quality vocabulary for software encoders, fastest first
pub const SOFTWARE_PRESETS: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Common output sizes offered to users
pub const RESOLUTIONS: [(&str, Resolution); 6] = [
    ("4K (3840x2160)", Resolution { width: 3840, height: 2160 }),
    ("1440p (2560x1440)", Resolution { width: 2560, height: 1440 }),
    ("1080p (1920x1080)", Resolution { width: 1920, height: 1080 }),
    ("720p (1280x720)", Resolution { width: 1280, height: 720 }),
    ("480p (854x480)", Resolution { width: 854, height: 480 }),
    ("360p (640x360)", Resolution { width: 640, height: 360 }),
];

/// Common output frame rates
pub const FRAME_RATES: [f64; 4] = [60.0, 30.0, 24.0, 15.0];

/// Video bitrate ladder in kbps
pub const VIDEO_BITRATES: [u32; 16] = [
    500, 1000, 1500, 2000, 2500, 3000, 4000, 5000, 6000, 8000, 10000, 15000, 20000, 25000,
    30000, 50000,
];

/// Audio bitrate ladder in kbps
pub const AUDIO_BITRATES: [u32; 8] = [64, 96, 128, 160, 192, 224, 256, 320];

/// Video encoders worth reporting, in display order
pub const VIDEO_ENCODERS: [(&str, &str); 6] = [
    ("h264_nvenc", "H.264 (NVIDIA GPU)"),
    ("hevc_nvenc", "H.265/HEVC (NVIDIA GPU)"),
    ("libx264", "H.264 (CPU)"),
    ("libx265", "H.265/HEVC (CPU)"),
    ("libvpx-vp9", "VP9 (WebM)"),
    ("libaom-av1", "AV1 (CPU)"),
];

/// Audio encoders worth reporting, in display order
pub const AUDIO_ENCODERS: [(&str, &str); 6] = [
    ("aac", "AAC"),
    ("libmp3lame", "MP3"),
    ("flac", "FLAC (lossless)"),
    ("pcm_s16le", "WAV (PCM)"),
    ("libopus", "Opus"),
    ("libvorbis", "Vorbis (OGG)"),
];

/// GPU encoders that need a test encode before they count as available
pub const HARDWARE_ENCODERS: [&str; 3] = ["h264_nvenc", "hevc_nvenc", "av1_nvenc"];

/// Grouping used when listing presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    /// Container change only, streams copied
    Copy,
    /// Full video re-encode
    Video,
    /// Audio extraction
    Audio,
    /// Playback speed change
    Speed,
    /// Resolution change
    Resize,
    /// User-defined
    Custom,
}

impl PresetCategory {
    pub const ALL: [PresetCategory; 6] = [
        PresetCategory::Copy,
        PresetCategory::Video,
        PresetCategory::Audio,
        PresetCategory::Speed,
        PresetCategory::Resize,
        PresetCategory::Custom,
    ];
}

impl fmt::Display for PresetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PresetCategory::Copy => "copy",
            PresetCategory::Video => "video",
            PresetCategory::Audio => "audio",
            PresetCategory::Speed => "speed",
            PresetCategory::Resize => "resize",
            PresetCategory::Custom => "custom",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for PresetCategory {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetCategory::ALL
            .into_iter()
            .find(|category| category.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConvertError::invalid_setting(format!(
                    "Unknown preset category '{}'. Valid categories: copy, video, audio, speed, resize, custom",
                    s
                ))
            })
    }
}

/// A named, ready-to-use conversion profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: PresetCategory,
    /// Output file extension including the dot
    #[serde(default = "default_container_ext")]
    pub container_ext: String,
    #[serde(default)]
    pub settings: Settings,
    /// Whether the video encoder runs on the GPU
    #[serde(default)]
    pub hardware: bool,
}

fn default_container_ext() -> String {
    ".mp4".to_string()
}

impl Preset {
    fn new(
        name: &str,
        description: &str,
        category: PresetCategory,
        container_ext: &str,
        settings: Settings,
    ) -> Self {
        let hardware = settings.uses_hardware_encoder();
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            container_ext: container_ext.to_string(),
            settings,
            hardware,
        }
    }

    /// Wrap arbitrary settings as a Custom preset
    pub fn custom(settings: Settings) -> Self {
        Self::new(
            "Custom",
            "User-defined settings",
            PresetCategory::Custom,
            ".mp4",
            settings,
        )
    }

    /// Output has no video stream
    pub fn audio_only(&self) -> bool {
        self.settings.is_audio_only()
    }

    /// Streams are remuxed, either by codec or by category
    pub fn is_copy_mode(&self) -> bool {
        self.settings.is_copy() || self.category == PresetCategory::Copy
    }
}

fn remux(name: &str, description: &str) -> Preset {
    Preset::new(name, description, PresetCategory::Copy, ".mp4", Settings::stream_copy())
}

#[allow(clippy::too_many_arguments)]
fn encode(
    name: &str,
    description: &str,
    ext: &str,
    video: &str,
    audio: &str,
    video_kbps: u32,
    audio_kbps: u32,
    preset: Option<&str>,
) -> Preset {
    let mut settings = Settings::default()
        .with_video(CodecChoice::encode(video))
        .with_audio(CodecChoice::encode(audio))
        .with_video_bitrate(video_kbps)
        .with_audio_bitrate(audio_kbps);
    settings.preset = preset.map(str::to_string);
    Preset::new(name, description, PresetCategory::Video, ext, settings)
}

fn extract_audio(name: &str, description: &str, ext: &str, audio: &str, kbps: Option<u32>) -> Preset {
    let mut settings = Settings::default()
        .with_video(CodecChoice::Disabled)
        .with_audio(CodecChoice::encode(audio));
    settings.audio_bitrate = kbps;
    Preset::new(name, description, PresetCategory::Audio, ext, settings)
}

fn nvenc_base(video_kbps: u32, audio_kbps: u32) -> Settings {
    Settings::default()
        .with_video(CodecChoice::encode("h264_nvenc"))
        .with_audio(CodecChoice::encode("aac"))
        .with_video_bitrate(video_kbps)
        .with_audio_bitrate(audio_kbps)
        .with_preset("fast")
}

fn speed(name: &str, description: &str, factor: f64) -> Preset {
    Preset::new(
        name,
        description,
        PresetCategory::Speed,
        ".mp4",
        nvenc_base(5000, 192).with_speed(factor),
    )
}

fn resize(name: &str, description: &str, resolution: Resolution, video_kbps: u32, audio_kbps: u32) -> Preset {
    Preset::new(
        name,
        description,
        PresetCategory::Resize,
        ".mp4",
        nvenc_base(video_kbps, audio_kbps).with_resolution(resolution),
    )
}

/// The full built-in catalog, in display order
pub fn builtin() -> Vec<Preset> {
    vec![
        remux("remux-mp4", "Change container only, streams untouched"),
        remux("ts-to-mp4", "MPEG-TS to MP4 without quality loss"),
        remux("mkv-to-mp4", "Matroska to MP4 without quality loss"),
        remux("avi-to-mp4", "AVI to MP4 without quality loss"),
        encode("mp4-gpu-fast", "Fast H.264 on an NVIDIA GPU", ".mp4", "h264_nvenc", "aac", 5000, 192, Some("fast")),
        encode("mp4-gpu-quality", "High quality H.264 on an NVIDIA GPU", ".mp4", "h264_nvenc", "aac", 8000, 256, Some("slow")),
        encode("hevc-gpu", "HEVC on an NVIDIA GPU, roughly half the size", ".mp4", "hevc_nvenc", "aac", 4000, 192, Some("fast")),
        encode("mp4-cpu", "Standard H.264 on the CPU", ".mp4", "libx264", "aac", 5000, 192, Some("medium")),
        encode("mp4-cpu-fast", "Fast, lower quality H.264 on the CPU", ".mp4", "libx264", "aac", 4000, 192, Some("veryfast")),
        encode("mp4-cpu-quality", "High quality H.264 on the CPU (slow)", ".mp4", "libx264", "aac", 10000, 320, Some("slow")),
        encode("hevc-cpu", "Small HEVC files on the CPU (very slow)", ".mp4", "libx265", "aac", 3000, 192, Some("medium")),
        encode("webm-vp9", "VP9/Opus for web browsers", ".webm", "libvpx-vp9", "libopus", 3000, 128, None),
        encode("xvid-avi", "Xvid/MP3 for legacy players", ".avi", "libxvid", "libmp3lame", 4000, 192, None),
        extract_audio("mp3-320", "Extract high quality MP3", ".mp3", "libmp3lame", Some(320)),
        extract_audio("mp3-192", "Extract standard MP3", ".mp3", "libmp3lame", Some(192)),
        extract_audio("wav", "Extract lossless WAV", ".wav", "pcm_s16le", None),
        extract_audio("aac", "Extract AAC audio", ".m4a", "aac", Some(256)),
        extract_audio("flac", "Extract lossless FLAC", ".flac", "flac", None),
        speed("speed-2x", "Play twice as fast", 2.0),
        speed("speed-4x", "Play four times as fast", 4.0),
        speed("speed-10x", "Timelapse at ten times speed", 10.0),
        speed("slow-0.5x", "Play at half speed", 0.5),
        speed("slow-0.25x", "Slow motion at quarter speed", 0.25),
        resize("1080p", "Scale to Full HD", Resolution::new(1920, 1080), 5000, 192),
        resize("720p", "Scale down to HD", Resolution::new(1280, 720), 3000, 192),
        resize("480p", "Scale down to SD", Resolution::new(854, 480), 1500, 128),
        resize("4k", "Scale up to 4K UHD", Resolution::new(3840, 2160), 20000, 256),
        Preset::new(
            "custom",
            "Start from standard CPU settings and override anything",
            PresetCategory::Custom,
            ".mp4",
            Settings::default()
                .with_video_bitrate(5000)
                .with_audio_bitrate(192)
                .with_preset("medium"),
        ),
    ]
}

/// Built-in catalog extended by user-defined presets
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self { presets: builtin() }
    }
}

impl PresetCatalog {
    /// Add or replace presets by name
    pub fn with_user_presets(mut self, user: impl IntoIterator<Item = Preset>) -> Self {
        for preset in user {
            match self
                .presets
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&preset.name))
            {
                Some(existing) => *existing = preset,
                None => self.presets.push(preset),
            }
        }
        self
    }

    /// Case-insensitive lookup
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn by_category(&self, category: PresetCategory) -> Vec<&Preset> {
        self.presets.iter().filter(|p| p.category == category).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }
}
