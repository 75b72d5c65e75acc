//! Sequential batch queue
//!
//! Items run one at a time through a shared [`JobRunner`]. A failed item is
//! recorded and the queue moves on; cancelling stops the queue and leaves
//! the items that never started as Pending.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::model::{Job, JobStatus, ProgressSnapshot, Settings};
use crate::engine::runner::JobRunner;
use crate::engine::JobEvent;
use crate::error::{ConvertError, ConvertResult};
use crate::ports::{probe_or_default, ProbePort};

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;
type CompleteFn = dyn Fn(&[Job]) + Send + Sync;
type ItemProgressFn = dyn Fn(usize, &ProgressSnapshot) + Send + Sync;

/// Batch observers
#[derive(Clone, Default)]
pub struct BatchCallbacks {
    progress: Option<Arc<ProgressFn>>,
    complete: Option<Arc<CompleteFn>>,
    item_progress: Option<Arc<ItemProgressFn>>,
}

impl BatchCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(finished_count, total_count)` after every finished item
    pub fn on_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    /// All items with their final status, once the queue has run through
    pub fn on_complete(mut self, f: impl Fn(&[Job]) + Send + Sync + 'static) -> Self {
        self.complete = Some(Arc::new(f));
        self
    }

    /// Encoder progress for the item at `index`
    pub fn on_item_progress(
        mut self,
        f: impl Fn(usize, &ProgressSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.item_progress = Some(Arc::new(f));
        self
    }
}

/// Runs queued jobs strictly one after another
pub struct BatchQueue {
    runner: Arc<JobRunner>,
    probe: Arc<dyn ProbePort>,
    items: Arc<Mutex<Vec<Job>>>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    callbacks: BatchCallbacks,
}

fn lock(items: &Mutex<Vec<Job>>) -> MutexGuard<'_, Vec<Job>> {
    items.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchQueue {
    pub fn new(runner: Arc<JobRunner>, probe: Arc<dyn ProbePort>) -> Self {
        Self {
            runner,
            probe,
            items: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            callbacks: BatchCallbacks::default(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: BatchCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of all items and their status
    pub fn items(&self) -> Vec<Job> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a job; returns its index
    pub fn enqueue(
        &self,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        settings: Settings,
    ) -> ConvertResult<usize> {
        if self.is_running() {
            return Err(ConvertError::BatchRunning);
        }
        let mut items = lock(&self.items);
        items.push(Job::new(input, output, settings));
        Ok(items.len() - 1)
    }

    pub fn clear(&self) -> ConvertResult<()> {
        if self.is_running() {
            return Err(ConvertError::BatchRunning);
        }
        lock(&self.items).clear();
        Ok(())
    }

    /// Start processing Pending items in order.
    ///
    /// Returns `None` when there is nothing to run. The join handle resolves
    /// to the item list once the batch finishes or is cancelled.
    pub fn start(&self) -> ConvertResult<Option<JoinHandle<Vec<Job>>>> {
        let runtime = Handle::try_current().map_err(|e| ConvertError::NoRuntime(e.to_string()))?;

        let pending = lock(&self.items)
            .iter()
            .any(|job| job.status == JobStatus::Pending);
        if !pending {
            info!("Batch queue is empty, nothing to start");
            return Ok(None);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConvertError::BatchRunning);
        }
        self.stop.store(false, Ordering::SeqCst);

        let worker = BatchWorker {
            runner: self.runner.clone(),
            probe: self.probe.clone(),
            items: self.items.clone(),
            running: self.running.clone(),
            stop: self.stop.clone(),
            callbacks: self.callbacks.clone(),
        };
        Ok(Some(runtime.spawn(worker.run())))
    }

    /// Cancel the active item and stop advancing
    pub fn cancel(&self) {
        if !self.is_running() {
            return;
        }
        info!("Batch cancellation requested");
        self.stop.store(true, Ordering::SeqCst);
        self.runner.cancel();
    }
}

struct BatchWorker {
    runner: Arc<JobRunner>,
    probe: Arc<dyn ProbePort>,
    items: Arc<Mutex<Vec<Job>>>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    callbacks: BatchCallbacks,
}

impl BatchWorker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Index and a copy of the next Pending item
    fn next_pending(&self) -> Option<(usize, Job)> {
        lock(&self.items)
            .iter()
            .enumerate()
            .find(|(_, job)| job.status == JobStatus::Pending)
            .map(|(i, job)| (i, job.clone()))
    }

    fn update(&self, index: usize, f: impl FnOnce(&mut Job) -> ConvertResult<()>) {
        let mut items = lock(&self.items);
        if let Some(job) = items.get_mut(index) {
            if let Err(e) = f(job) {
                warn!("Batch item {}: {}", index, e);
            }
        }
    }

    fn finished_count(&self) -> (usize, usize) {
        let items = lock(&self.items);
        let done = items.iter().filter(|job| job.status.is_terminal()).count();
        (done, items.len())
    }

    async fn run(self) -> Vec<Job> {
        let total = lock(&self.items).len();
        info!("Batch started with {} items", total);

        while let Some((index, job)) = self.next_pending() {
            if self.stopped() {
                break;
            }

            let metadata = probe_or_default(self.probe.as_ref(), &job.input).await;
            self.update(index, |item| {
                item.duration = metadata.duration;
                item.transition(JobStatus::Running)
            });

            if self.stopped() {
                self.update(index, |item| item.fail(JobStatus::Cancelled, "Cancelled"));
                break;
            }

            info!("Batch item {}/{}: {}", index + 1, total, job.input.display());
            let outcome = match self
                .runner
                .convert(&job.input, &job.output, &job.settings, metadata.duration)
            {
                Ok(mut handle) => {
                    // A cancel issued while the job was being set up
                    if self.stopped() {
                        handle.cancel();
                    }
                    let mut outcome = None;
                    while let Some(event) = handle.next_event().await {
                        match event {
                            JobEvent::Progress(snapshot) => {
                                if let Some(cb) = &self.callbacks.item_progress {
                                    cb(index, &snapshot);
                                }
                            }
                            JobEvent::Completed(_) => outcome = Some(Ok(())),
                            JobEvent::Error(err) => outcome = Some(Err(err.to_string())),
                        }
                    }
                    outcome.unwrap_or_else(|| Err("encoder task ended without a result".to_string()))
                }
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => self.update(index, |item| item.transition(JobStatus::Completed)),
                Err(message) if self.stopped() => {
                    self.update(index, |item| item.fail(JobStatus::Cancelled, message));
                    break;
                }
                Err(message) => {
                    warn!("Batch item {} failed: {}", index + 1, message);
                    self.update(index, |item| item.fail(JobStatus::Failed, message));
                }
            }

            let (done, total) = self.finished_count();
            if let Some(cb) = &self.callbacks.progress {
                cb(done, total);
            }
        }

        let items = lock(&self.items).clone();
        let cancelled = self.stopped();
        self.running.store(false, Ordering::SeqCst);

        if cancelled {
            info!("Batch cancelled");
        } else {
            let failed = items.iter().filter(|j| j.status == JobStatus::Failed).count();
            info!("Batch finished: {} items, {} failed", items.len(), failed);
            if let Some(cb) = &self.callbacks.complete {
                cb(items.as_slice());
            }
        }
        items
    }
}
