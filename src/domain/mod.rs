// Domain layer - Conversion settings, job lifecycle and presets

pub mod model;
pub mod presets;

pub use model::{
    CodecChoice, ColorAdjustments, EncoderCapabilities, EncoderInfo, Job, JobStatus,
    ProgressSnapshot, Resolution, Settings, VideoMetadata,
};
pub use presets::{Preset, PresetCatalog, PresetCategory};
