// Domain models - Core types and data structures

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};


/// Substring that identifies a GPU (NVENC) encoder name
pub const HARDWARE_MARKER: &str = "nvenc";

/// What to do with one kind of stream (video or audio).
///
/// Serialized as a plain string: `"none"` drops the stream, `"copy"`
/// remuxes it untouched, anything else names an encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CodecChoice {
    /// Drop the stream from the output
    Disabled,
    /// Remux without re-encoding
    StreamCopy,
    /// Re-encode with the named encoder
    Encode(String),
}

impl CodecChoice {
    /// Shorthand for `Encode(name)`
    pub fn encode(name: impl Into<String>) -> Self {
        CodecChoice::Encode(name.into())
    }

    /// Encoder name when the stream is re-encoded
    pub fn encoder(&self) -> Option<&str> {
        match self {
            CodecChoice::Encode(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, CodecChoice::Encode(_))
    }

    /// True when the encoder name carries the hardware marker
    pub fn is_hardware(&self) -> bool {
        self.encoder()
            .map(|name| name.to_ascii_lowercase().contains(HARDWARE_MARKER))
            .unwrap_or(false)
    }
}

impl FromStr for CodecChoice {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Err(ConvertError::invalid_setting(
                "Codec cannot be empty (use 'none' to drop the stream)",
            )),
            "none" | "disabled" => Ok(CodecChoice::Disabled),
            "copy" => Ok(CodecChoice::StreamCopy),
            _ => Ok(CodecChoice::Encode(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for CodecChoice {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CodecChoice> for String {
    fn from(value: CodecChoice) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecChoice::Disabled => write!(f, "none"),
            CodecChoice::StreamCopy => write!(f, "copy"),
            CodecChoice::Encode(name) => write!(f, "{}", name),
        }
    }
}

/// Target frame size, written as `W:H`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FromStr for Resolution {
    type Err = ConvertError;

    /// Accepts `W:H` or `WxH`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (w, h) = trimmed
            .split_once(':')
            .or_else(|| trimmed.split_once(['x', 'X']))
            .ok_or_else(|| {
                ConvertError::invalid_setting(format!(
                    "Invalid resolution '{}'. Expected W:H, e.g. 1280:720",
                    trimmed
                ))
            })?;

        let parse = |part: &str| {
            part.trim().parse::<u32>().map_err(|_| {
                ConvertError::invalid_setting(format!("Invalid resolution '{}'", trimmed))
            })
        };

        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

impl TryFrom<String> for Resolution {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Optional `eq` filter parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorAdjustments {
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub saturation: Option<f64>,
}

impl ColorAdjustments {
    /// True when no adjustment is set
    pub fn is_empty(&self) -> bool {
        self.brightness.is_none() && self.contrast.is_none() && self.saturation.is_none()
    }
}

/// Immutable description of one conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Video stream handling
    pub video: CodecChoice,
    /// Audio stream handling
    pub audio: CodecChoice,
    /// Video bitrate in kbps
    pub video_bitrate: Option<u32>,
    /// Audio bitrate in kbps
    pub audio_bitrate: Option<u32>,
    /// Encoder speed/quality preset (ultrafast..veryslow or p1..p7)
    pub preset: Option<String>,
    /// Output frame size
    pub resolution: Option<Resolution>,
    /// Output frame rate
    pub fps: Option<f64>,
    /// Playback speed multiplier, 1.0 leaves timing unchanged
    pub speed: Option<f64>,
    /// Brightness/contrast/saturation
    pub color: ColorAdjustments,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            video: CodecChoice::encode("libx264"),
            audio: CodecChoice::encode("aac"),
            video_bitrate: None,
            audio_bitrate: None,
            preset: None,
            resolution: None,
            fps: None,
            speed: None,
            color: ColorAdjustments::default(),
        }
    }
}

impl Settings {
    /// Remux both streams without touching them
    pub fn stream_copy() -> Self {
        Self {
            video: CodecChoice::StreamCopy,
            audio: CodecChoice::StreamCopy,
            ..Self::default()
        }
    }

    pub fn with_video(mut self, video: CodecChoice) -> Self {
        self.video = video;
        self
    }

    pub fn with_audio(mut self, audio: CodecChoice) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_video_bitrate(mut self, kbps: u32) -> Self {
        self.video_bitrate = Some(kbps);
        self
    }

    pub fn with_audio_bitrate(mut self, kbps: u32) -> Self {
        self.audio_bitrate = Some(kbps);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_color(mut self, color: ColorAdjustments) -> Self {
        self.color = color;
        self
    }

    /// Output has no video stream
    pub fn is_audio_only(&self) -> bool {
        self.video == CodecChoice::Disabled
    }

    /// Video is remuxed rather than re-encoded
    pub fn is_copy(&self) -> bool {
        self.video == CodecChoice::StreamCopy
    }

    /// Video goes through a GPU encoder
    pub fn uses_hardware_encoder(&self) -> bool {
        self.video.is_hardware()
    }

    /// Speed multiplier with the unset case resolved to 1.0
    pub fn effective_speed(&self) -> f64 {
        self.speed.unwrap_or(1.0)
    }
}

/// Facts about an input file, as reported by the metadata probe.
///
/// `Default` is the "unknown" value used when probing fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Frames per second
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: String,
    /// File size in bytes
    pub size: u64,
    /// Container bitrate in bits per second
    pub bitrate: u64,
}

impl VideoMetadata {
    /// Whether a usable duration is known
    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }
}

/// An encoder offered by the local encoder build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderInfo {
    pub name: String,
    /// Human-readable description
    pub label: String,
}

impl EncoderInfo {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Encoders available on this machine.
///
/// `hardware` holds the GPU encoders that are actually usable, which is
/// stricter than being listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    pub video: Vec<EncoderInfo>,
    pub audio: Vec<EncoderInfo>,
    pub hardware: Vec<String>,
}

impl EncoderCapabilities {
    /// Assumed set when the encoder cannot be queried
    pub fn fallback() -> Self {
        Self {
            video: vec![EncoderInfo::new("libx264", "H.264 (CPU)")],
            audio: vec![EncoderInfo::new("aac", "AAC")],
            hardware: Vec::new(),
        }
    }

    pub fn has_hardware(&self) -> bool {
        !self.hardware.is_empty()
    }

    pub fn supports_hardware(&self, encoder: &str) -> bool {
        self.hardware.iter().any(|name| name == encoder)
    }
}

/// One best-effort decoding of an encoder output line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Frames written so far
    pub frame: Option<u64>,
    /// Encoder throughput in frames per second
    pub fps: Option<f64>,
    /// Position in the output timeline, seconds
    pub current_time: Option<f64>,
    /// Encode speed relative to realtime
    pub speed: Option<f64>,
    /// Bytes written so far
    pub size: Option<u64>,
    /// Completion in [0, 100], only when the total duration is known
    pub percent: Option<f64>,
}

impl ProgressSnapshot {
    /// True when no field was extracted
    pub fn is_empty(&self) -> bool {
        self.frame.is_none()
            && self.fps.is_none()
            && self.current_time.is_none()
            && self.speed.is_none()
            && self.size.is_none()
            && self.percent.is_none()
    }
}

/// Lifecycle of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, Failed and Cancelled never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// A conversion request plus its status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub settings: Settings,
    /// Media duration in seconds, 0 when unknown
    pub duration: f64,
    pub status: JobStatus,
    /// Failure message for Failed/Cancelled jobs
    pub error: Option<String>,
}

impl Job {
    /// Create a pending job
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            settings,
            duration: 0.0,
            status: JobStatus::Pending,
            error: None,
        }
    }

    /// Move to `next`, rejecting transitions out of terminal states
    pub fn transition(&mut self, next: JobStatus) -> ConvertResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ConvertError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Move to a terminal failure state and keep the message
    pub fn fail(&mut self, next: JobStatus, message: impl Into<String>) -> ConvertResult<()> {
        self.transition(next)?;
        self.error = Some(message.into());
        Ok(())
    }
}
