//! Error handling module for VidConv

use thiserror::Error;

/// Main error type for VidConv operations
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Encoder executable could not be started
    #[error("Failed to launch encoder '{path}': {message}")]
    Launch { path: String, message: String },

    /// Encoder ran to completion but reported failure
    #[error("Encoder exited with code {code}")]
    EncoderFailed { code: i32, stderr: String },

    /// Encoder was killed without producing an exit code
    #[error("Encoder terminated without an exit code")]
    Terminated,

    /// A conversion is already in flight on this runner
    #[error("Runner is busy with another conversion")]
    RunnerBusy,

    /// Queue mutation or restart attempted while a batch is running
    #[error("Batch is already running")]
    BatchRunning,

    /// No Tokio runtime to spawn the conversion on
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// Job status change that the lifecycle does not allow
    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Media probe error
    #[error("Failed to probe media file: {message}")]
    ProbeError { message: String },

    /// Encoder capability query failed
    #[error("Failed to query encoders: {message}")]
    DetectionError { message: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A settings value could not be parsed
    #[error("Invalid setting: {message}")]
    InvalidSetting { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ConvertError {
    pub(crate) fn invalid_setting(message: impl Into<String>) -> Self {
        ConvertError::InvalidSetting {
            message: message.into(),
        }
    }
}

/// Result type alias for VidConv operations
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Terminal failure of a single conversion job.
///
/// Delivered through the job's event stream and the error callback, so it
/// has to be cheap to clone.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// Executable not found, not executable, or spawn failure
    #[error("Failed to launch encoder: {0}")]
    Launch(String),

    /// Non-zero exit that was not caused by cancellation
    #[error("Encoder exited with code {code}{}", detail_suffix(.detail))]
    Exit { code: i32, detail: Option<String> },

    /// Process ended by a signal we did not send
    #[error("Encoder terminated by a signal")]
    Signal,

    /// Cancellation was requested and observed
    #[error("Conversion cancelled")]
    Cancelled,

    /// Reading the encoder output or waiting on it failed
    #[error("Failed to supervise encoder: {0}")]
    Io(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl JobError {
    /// Whether this failure was a requested cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }

    /// Exit code reported by the encoder, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobError::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }
}
