//! Progress reporting for the command line

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::domain::model::{Job, JobStatus, ProgressSnapshot};
use crate::utils::format::{format_clock, format_size};

/// Receives job lifecycle events for display
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, input: &Path, output: &Path);
    /// `item` is the batch index, `None` for a single conversion
    fn on_progress(&self, item: Option<usize>, snapshot: &ProgressSnapshot);
    fn on_complete(&self, output: &Path);
    fn on_error(&self, error: &str);
    fn on_cancel(&self);
    fn on_batch_progress(&self, done: usize, total: usize);
    fn on_batch_summary(&self, items: &[Job]);
}

/// Pick the reporter for `--json`
pub fn reporter(json: bool) -> Arc<dyn ProgressReporter> {
    if json {
        Arc::new(JsonReporter)
    } else {
        Arc::new(ConsoleReporter::default())
    }
}

/// Progress bar on a single, rewritten console line
#[derive(Debug)]
pub struct ConsoleReporter {
    bar_length: usize,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self { bar_length: 20 }
    }
}

impl ConsoleReporter {
    fn progress_line(&self, item: Option<usize>, snapshot: &ProgressSnapshot) -> String {
        let mut line = String::new();
        if let Some(index) = item {
            line.push_str(&format!("#{} ", index + 1));
        }
        if let Some(percent) = snapshot.percent {
            let filled = ((percent / 100.0) * self.bar_length as f64) as usize;
            let filled = filled.min(self.bar_length);
            line.push_str(&format!(
                "[{}{}] {:>5.1}%",
                "#".repeat(filled),
                "-".repeat(self.bar_length - filled),
                percent
            ));
        }
        if let Some(time) = snapshot.current_time {
            line.push_str(&format!(" {}", format_clock(time)));
        }
        if let Some(size) = snapshot.size {
            line.push_str(&format!(" {}", format_size(size)));
        }
        if let Some(speed) = snapshot.speed {
            line.push_str(&format!(" {:.2}x", speed));
        }
        line
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_start(&self, input: &Path, output: &Path) {
        println!("Converting {} -> {}", input.display(), output.display());
    }

    fn on_progress(&self, item: Option<usize>, snapshot: &ProgressSnapshot) {
        if snapshot.percent.is_none() && snapshot.current_time.is_none() {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r{}", self.progress_line(item, snapshot));
        let _ = stdout.flush();
    }

    fn on_complete(&self, output: &Path) {
        println!("\nCompleted: {}", output.display());
    }

    fn on_error(&self, error: &str) {
        println!("\nError: {}", error);
    }

    fn on_cancel(&self) {
        println!("\nConversion cancelled");
    }

    fn on_batch_progress(&self, done: usize, total: usize) {
        println!("\nBatch: {}/{} finished", done, total);
    }

    fn on_batch_summary(&self, items: &[Job]) {
        println!();
        println!("Batch Summary");
        println!("=============");
        for (i, job) in items.iter().enumerate() {
            println!("  {:>3}. [{}] {}", i + 1, job.status, job.input.display());
        }

        let failed: Vec<&Job> = items
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .collect();
        if !failed.is_empty() {
            println!();
            println!("Failures:");
            for job in failed {
                println!(
                    "  {}: {}",
                    job.input.display(),
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

/// One JSON object per line on stdout
#[derive(Debug, Default)]
pub struct JsonReporter;

impl ProgressReporter for JsonReporter {
    fn on_start(&self, input: &Path, output: &Path) {
        let event = serde_json::json!({
            "event": "start",
            "input": input,
            "output": output,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_progress(&self, item: Option<usize>, snapshot: &ProgressSnapshot) {
        let event = serde_json::json!({
            "event": "progress",
            "item": item,
            "progress": snapshot,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_complete(&self, output: &Path) {
        let event = serde_json::json!({
            "event": "complete",
            "output": output,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_error(&self, error: &str) {
        let event = serde_json::json!({
            "event": "error",
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_cancel(&self) {
        let event = serde_json::json!({
            "event": "cancel",
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_batch_progress(&self, done: usize, total: usize) {
        let event = serde_json::json!({
            "event": "batch_progress",
            "completed": done,
            "total": total,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_batch_summary(&self, items: &[Job]) {
        let event = serde_json::json!({
            "event": "batch_complete",
            "items": items,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }
}
