//! Conversion engine: command building, progress parsing, process
//! supervision and batch sequencing

use std::path::PathBuf;

use crate::domain::model::ProgressSnapshot;
use crate::error::JobError;

pub mod batch;
pub mod command;
pub mod progress;
pub mod runner;

pub use batch::{BatchCallbacks, BatchQueue};
pub use command::build_command;
pub use progress::parse_progress;
pub use runner::{JobCallbacks, JobHandle, JobRunner, RunnerState};

/// What a running job reports, in order.
///
/// Zero or more `Progress` events are followed by exactly one `Completed`
/// or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(ProgressSnapshot),
    Completed(PathBuf),
    Error(JobError),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}
