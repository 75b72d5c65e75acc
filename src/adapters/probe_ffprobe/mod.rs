//! FFprobe adapter for media file probing
//!
//! Runs `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON report onto [`VideoMetadata`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::domain::model::VideoMetadata;
use crate::error::{ConvertError, ConvertResult};
use crate::ports::ProbePort;

/// Default time allowed for one probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// FFprobe-based probe adapter
#[derive(Debug, Clone)]
pub struct FfprobeAdapter {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeAdapter {
    /// Create an adapter for the given executable (absolute or on PATH)
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProbePort for FfprobeAdapter {
    async fn probe(&self, path: &Path) -> ConvertResult<VideoMetadata> {
        if !path.exists() {
            return Err(ConvertError::ProbeError {
                message: format!("File not found: {}", path.display()),
            });
        }

        debug!("Probing {} with {}", path.display(), self.ffprobe_path);
        let child = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ConvertError::ProbeError {
                message: format!(
                    "ffprobe timed out after {}s on {}",
                    self.timeout.as_secs(),
                    path.display()
                ),
            })?
            .map_err(|e| ConvertError::ProbeError {
                message: format!("Failed to run '{}': {}", self.ffprobe_path, e),
            })?;

        if !output.status.success() {
            return Err(ConvertError::ProbeError {
                message: format!(
                    "ffprobe exited with {} on {}",
                    output.status,
                    path.display()
                ),
            });
        }

        let mut metadata = parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))?;
        if metadata.size == 0 {
            metadata.size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        }
        Ok(metadata)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// ffprobe encodes numbers in the format section as strings
#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// `"30000/1001"` to frames per second, rounded to two decimals
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den <= 0.0 {
        return None;
    }
    Some((num / den * 100.0).round() / 100.0)
}

fn parse_number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

/// Map an ffprobe JSON report onto metadata; missing fields become 0/empty
pub fn parse_ffprobe_json(json: &str) -> ConvertResult<VideoMetadata> {
    let report: ProbeReport = serde_json::from_str(json)?;

    let mut metadata = VideoMetadata {
        duration: parse_number::<f64>(&report.format.duration).unwrap_or(0.0),
        size: parse_number(&report.format.size).unwrap_or(0),
        bitrate: parse_number(&report.format.bit_rate).unwrap_or(0),
        ..Default::default()
    };

    let of_type = |kind: &str| {
        report
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };

    if let Some(video) = of_type("video") {
        metadata.width = video.width.unwrap_or(0);
        metadata.height = video.height.unwrap_or(0);
        metadata.video_codec = video.codec_name.clone().unwrap_or_default();
        metadata.fps = video
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .unwrap_or(0.0);
    }

    if let Some(audio) = of_type("audio") {
        metadata.audio_codec = audio.codec_name.clone().unwrap_or_default();
    }

    Ok(metadata)
}
