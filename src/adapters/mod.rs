// Adapters - External system implementations

pub mod encoders_ffmpeg;
pub mod probe_ffprobe;
pub mod toml_config;

// Re-export adapters
pub use encoders_ffmpeg::FfmpegEncodersAdapter;
pub use probe_ffprobe::FfprobeAdapter;
pub use toml_config::{AppConfig, TomlConfigAdapter};
