//! Output size and encode time estimation
//!
//! Everything here is a heuristic preview computed before any process is
//! started. Unknown inputs degrade to "unknown" text instead of failing.

use serde::Serialize;
use tracing::debug;

use crate::domain::model::VideoMetadata;
use crate::domain::presets::Preset;

/// Container and metadata overhead on top of the raw stream bitrate
const CONTAINER_OVERHEAD: f64 = 1.05;

/// Assumed remux throughput in MB/s
const COPY_THROUGHPUT_MB: f64 = 100.0;

/// Default video bitrate in kbps when a preset leaves it unset
pub const DEFAULT_VIDEO_BITRATE: u32 = 5000;

/// Default audio bitrate in kbps when a preset leaves it unset
pub const DEFAULT_AUDIO_BITRATE: u32 = 192;

/// Software encoder speed by preset, in multiples of realtime
const SOFTWARE_SPEEDS: [(&str, f64); 9] = [
    ("ultrafast", 15.0),
    ("superfast", 10.0),
    ("veryfast", 7.0),
    ("faster", 5.0),
    ("fast", 3.5),
    ("medium", 2.5),
    ("slow", 1.2),
    ("slower", 0.6),
    ("veryslow", 0.3),
];
const SOFTWARE_DEFAULT_SPEED: f64 = 2.5;

/// NVENC speed by preset, in multiples of realtime
const HARDWARE_SPEEDS: [(&str, f64); 10] = [
    ("p1", 50.0),
    ("p2", 40.0),
    ("p3", 30.0),
    ("p4", 20.0),
    ("p5", 15.0),
    ("p6", 10.0),
    ("p7", 7.0),
    ("fast", 30.0),
    ("medium", 20.0),
    ("slow", 10.0),
];
const HARDWARE_DEFAULT_SPEED: f64 = 20.0;

/// A formatted preview of one conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    /// Estimated output size, 0 when unknown
    pub size_bytes: u64,
    /// Estimated wall-clock encode time in seconds
    pub duration_secs: f64,
    pub size_text: String,
    pub duration_text: String,
    /// Shrink/growth relative to the input, when the input size is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_text: Option<String>,
}

/// Estimated output size in bytes.
///
/// Returns 0 ("unknown, size preserved") in copy mode.
pub fn estimate_file_size(
    duration: f64,
    video_bitrate_kbps: u32,
    audio_bitrate_kbps: u32,
    audio_only: bool,
    copy_mode: bool,
) -> u64 {
    if copy_mode || !duration.is_finite() || duration <= 0.0 {
        return 0;
    }

    let total_kbps = if audio_only {
        audio_bitrate_kbps as f64
    } else {
        video_bitrate_kbps as f64 + audio_bitrate_kbps as f64
    };

    let bytes = total_kbps * 1000.0 * duration / 8.0 * CONTAINER_OVERHEAD;
    bytes.round() as u64
}

/// Encoder speed multiplier for a preset, with the per-table fallback
pub fn encode_speed(preset: &str, is_hardware: bool) -> f64 {
    let (table, default): (&[(&str, f64)], f64) = if is_hardware {
        (&HARDWARE_SPEEDS[..], HARDWARE_DEFAULT_SPEED)
    } else {
        (&SOFTWARE_SPEEDS[..], SOFTWARE_DEFAULT_SPEED)
    };

    table
        .iter()
        .find(|(name, _)| *name == preset)
        .map(|(_, speed)| *speed)
        .unwrap_or(default)
}

/// Estimated wall-clock encode time in seconds
pub fn estimate_duration(
    media_duration: f64,
    preset: &str,
    is_hardware: bool,
    speed_factor: f64,
) -> f64 {
    let mut seconds = media_duration.max(0.0) / encode_speed(preset, is_hardware);
    if speed_factor > 1.0 {
        seconds /= speed_factor;
    }
    seconds
}

/// New media duration and the fraction of frames dropped for a speed change
pub fn calculate_speed_effect(speed: f64, duration: f64) -> (f64, f64) {
    let new_duration = duration / speed;
    let frame_drop = if speed > 1.0 { 1.0 - 1.0 / speed } else { 0.0 };
    (new_duration, frame_drop)
}

/// `2.35 GB`, `512.3 MB`, `12 KB`, `800 B`; 0 means unknown
pub fn format_estimated_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if bytes == 0 {
        "unknown (unchanged)".to_string()
    } else if size >= GB {
        format!("{:.2} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else if size >= KB {
        format!("{:.0} KB", size / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// `1h 2m 3s`, `2m 3s` or `45s`
pub fn format_estimated_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

fn size_change(estimated: u64, original: u64) -> Option<String> {
    if estimated == 0 || original == 0 {
        return None;
    }

    let ratio = estimated as f64 / original as f64;
    let text = if ratio < 1.0 {
        format!("~{}% smaller", ((1.0 - ratio) * 100.0) as u64)
    } else if ratio > 1.0 {
        format!("~{}% larger", ((ratio - 1.0) * 100.0) as u64)
    } else {
        "~same size".to_string()
    };
    Some(text)
}

/// Turn raw numbers into display text
pub fn format_estimate(bytes: u64, seconds: f64, metadata: Option<&VideoMetadata>) -> Estimate {
    Estimate {
        size_bytes: bytes,
        duration_secs: seconds,
        size_text: format_estimated_size(bytes),
        duration_text: format_estimated_duration(seconds),
        info_text: metadata.and_then(|m| size_change(bytes, m.size)),
    }
}

/// Full preview for converting `metadata`'s file with `preset`
pub fn estimate_with_preset(metadata: &VideoMetadata, preset: &Preset) -> Estimate {
    let settings = &preset.settings;
    let speed = settings.effective_speed();
    let speed = if speed > 0.0 && speed.is_finite() { speed } else { 1.0 };

    let output_duration = if speed != 1.0 {
        calculate_speed_effect(speed, metadata.duration).0
    } else {
        metadata.duration
    };

    let copy_mode = preset.is_copy_mode();
    let bytes = estimate_file_size(
        output_duration,
        settings.video_bitrate.unwrap_or(DEFAULT_VIDEO_BITRATE),
        settings.audio_bitrate.unwrap_or(DEFAULT_AUDIO_BITRATE),
        preset.audio_only(),
        copy_mode,
    );

    let seconds = if copy_mode {
        let size_mb = metadata.size as f64 / (1024.0 * 1024.0);
        (size_mb / COPY_THROUGHPUT_MB).max(1.0)
    } else {
        estimate_duration(
            metadata.duration,
            settings.preset.as_deref().unwrap_or("medium"),
            preset.hardware,
            speed,
        )
    };

    debug!(
        "Estimate for preset '{}': {} bytes, {:.1}s (copy_mode={})",
        preset.name, bytes, seconds, copy_mode
    );

    format_estimate(bytes, seconds, Some(metadata))
}
