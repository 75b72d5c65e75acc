//! VidConv video conversion engine
//!
//! Drives an external FFmpeg-compatible encoder: builds its argument list
//! from typed settings, parses its progress output, estimates output size
//! and encode time ahead of a run, supervises one conversion at a time and
//! sequences batches of conversions.

pub mod adapters;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::model::{
    CodecChoice, Job, JobStatus, ProgressSnapshot, Resolution, Settings, VideoMetadata,
};
pub use domain::presets::{Preset, PresetCatalog, PresetCategory};
pub use engine::{build_command, parse_progress, BatchQueue, JobEvent, JobRunner};
pub use error::{ConvertError, ConvertResult, JobError};
pub use estimator::{estimate_with_preset, format_estimate, Estimate};
