//! Common utilities and helpers

pub mod format;
pub mod logging;
pub mod path;
pub mod time;

pub use format::{format_clock, format_size};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use path::{generate_output_path, is_video_file, validate_output_dir};
pub use time::parse_clock;
