//! Single-process job runner
//!
//! A [`JobRunner`] supervises at most one encoder process at a time. The
//! conversion runs on its own Tokio task; callers observe it through the
//! returned [`JobHandle`] event stream and through optional callbacks.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::domain::model::{ProgressSnapshot, Settings};
use crate::engine::command::build_command;
use crate::engine::progress::parse_progress;
use crate::engine::JobEvent;
use crate::error::{ConvertError, ConvertResult, JobError};

type ProgressFn = dyn Fn(&ProgressSnapshot) + Send + Sync;
type CompleteFn = dyn Fn(&Path) + Send + Sync;
type ErrorFn = dyn Fn(&JobError) + Send + Sync;

/// Optional observers, each slot settable on its own
#[derive(Clone, Default)]
pub struct JobCallbacks {
    progress: Option<Arc<ProgressFn>>,
    complete: Option<Arc<CompleteFn>>,
    error: Option<Arc<ErrorFn>>,
}

impl JobCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(&ProgressSnapshot) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.complete = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&JobError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for JobCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCallbacks")
            .field("progress", &self.progress.is_some())
            .field("complete", &self.complete.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Runner lifecycle. Terminal states behave like Idle for the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunnerState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunnerState::Running)
    }

    fn after(result: &Result<PathBuf, JobError>) -> Self {
        match result {
            Ok(_) => RunnerState::Completed,
            Err(JobError::Cancelled) => RunnerState::Cancelled,
            Err(_) => RunnerState::Failed,
        }
    }
}

#[derive(Debug)]
struct RunnerInner {
    state: RunnerState,
    cancel: Option<CancellationToken>,
}

fn lock(inner: &Mutex<RunnerInner>) -> MutexGuard<'_, RunnerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one in-flight conversion
#[derive(Debug)]
pub struct JobHandle {
    events: UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
}

impl JobHandle {
    /// Next event in encoder output order. The last event is always
    /// `Completed` or `Error`; after it the stream ends.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Request cancellation of this job
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the event stream and return the outcome
    pub async fn wait(mut self) -> Result<PathBuf, JobError> {
        while let Some(event) = self.events.recv().await {
            match event {
                JobEvent::Progress(_) => {}
                JobEvent::Completed(path) => return Ok(path),
                JobEvent::Error(err) => return Err(err),
            }
        }
        Err(JobError::Io("encoder task ended without a result".to_string()))
    }
}

/// Supervises one external encoder process at a time
#[derive(Debug)]
pub struct JobRunner {
    encoder_path: String,
    callbacks: JobCallbacks,
    inner: Arc<Mutex<RunnerInner>>,
}

impl JobRunner {
    /// Create a runner for the given encoder executable (absolute or on PATH)
    pub fn new(encoder_path: impl Into<String>) -> Self {
        Self {
            encoder_path: encoder_path.into(),
            callbacks: JobCallbacks::default(),
            inner: Arc::new(Mutex::new(RunnerInner {
                state: RunnerState::Idle,
                cancel: None,
            })),
        }
    }

    pub fn with_callbacks(mut self, callbacks: JobCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn encoder_path(&self) -> &str {
        &self.encoder_path
    }

    pub fn state(&self) -> RunnerState {
        lock(&self.inner).state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Start a conversion and return immediately.
    ///
    /// `duration` is the input length in seconds (0 when unknown) and only
    /// feeds the percent-complete field. Fails with `RunnerBusy` while a
    /// previous conversion is still running.
    pub fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        settings: &Settings,
        duration: f64,
    ) -> ConvertResult<JobHandle> {
        let runtime = Handle::try_current().map_err(|e| ConvertError::NoRuntime(e.to_string()))?;

        let cancel = {
            let mut inner = lock(&self.inner);
            if inner.state.is_running() {
                return Err(ConvertError::RunnerBusy);
            }
            let cancel = CancellationToken::new();
            inner.state = RunnerState::Running;
            inner.cancel = Some(cancel.clone());
            cancel
        };

        let input = input.as_ref().to_path_buf();
        let output = output.as_ref().to_path_buf();
        let args = build_command(&input, &output, settings);
        info!("Starting conversion: {} -> {}", input.display(), output.display());
        debug!("Encoder command: {} {}", self.encoder_path, args.join(" "));

        let (events, receiver) = mpsc::unbounded_channel();
        let task = JobTask {
            encoder_path: self.encoder_path.clone(),
            args,
            output,
            duration,
            cancel: cancel.clone(),
            callbacks: self.callbacks.clone(),
            events,
            inner: self.inner.clone(),
        };
        runtime.spawn(task.run());

        Ok(JobHandle {
            events: receiver,
            cancel,
        })
    }

    /// Cancel the running conversion, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let inner = lock(&self.inner);
        match (&inner.cancel, inner.state) {
            (Some(cancel), RunnerState::Running) => {
                info!("Cancellation requested");
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run a conversion to completion on the current thread.
    ///
    /// No progress is streamed. Returns the encoder's diagnostic output on
    /// success.
    pub fn convert_sync(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        settings: &Settings,
    ) -> ConvertResult<String> {
        {
            let mut inner = lock(&self.inner);
            if inner.state.is_running() {
                return Err(ConvertError::RunnerBusy);
            }
            inner.state = RunnerState::Running;
            inner.cancel = None;
        }

        let args = build_command(input.as_ref(), output.as_ref(), settings);
        debug!("Encoder command: {} {}", self.encoder_path, args.join(" "));

        let result = std::process::Command::new(&self.encoder_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ConvertError::Launch {
                path: self.encoder_path.clone(),
                message: e.to_string(),
            })
            .and_then(|out| {
                let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                match out.status.code() {
                    Some(0) => Ok(stderr),
                    Some(code) => Err(ConvertError::EncoderFailed { code, stderr }),
                    None => Err(ConvertError::Terminated),
                }
            });

        lock(&self.inner).state = match &result {
            Ok(_) => RunnerState::Completed,
            Err(_) => RunnerState::Failed,
        };
        result
    }
}

/// Everything the supervising task owns
struct JobTask {
    encoder_path: String,
    args: Vec<String>,
    output: PathBuf,
    duration: f64,
    cancel: CancellationToken,
    callbacks: JobCallbacks,
    events: UnboundedSender<JobEvent>,
    inner: Arc<Mutex<RunnerInner>>,
}

impl JobTask {
    async fn run(self) {
        let result = self.supervise().await;

        // The runner is free again before anyone hears about the outcome
        {
            let mut inner = lock(&self.inner);
            inner.state = RunnerState::after(&result);
            inner.cancel = None;
        }

        match result {
            Ok(path) => {
                info!("Conversion completed: {}", path.display());
                if let Some(cb) = &self.callbacks.complete {
                    cb(path.as_path());
                }
                let _ = self.events.send(JobEvent::Completed(path));
            }
            Err(err) => {
                if err.is_cancelled() {
                    info!("Conversion cancelled");
                } else {
                    warn!("Conversion failed: {}", err);
                }
                if let Some(cb) = &self.callbacks.error {
                    cb(&err);
                }
                let _ = self.events.send(JobEvent::Error(err));
            }
        }
    }

    async fn supervise(&self) -> Result<PathBuf, JobError> {
        let mut child = Command::new(&self.encoder_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::Launch(format!("{}: {}", self.encoder_path, e)))?;

        let (line_tx, mut lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut last_message: Option<String> = None;
        match self.read_output(&mut lines, &mut last_message).await {
            ReadEnd::Eof => {}
            ReadEnd::Cancelled => return Err(self.abort(&mut child).await),
            ReadEnd::Failed(e) => {
                warn!("Failed to read encoder output: {}", e);
                terminate(&mut child).await;
                return Err(JobError::Io(e.to_string()));
            }
        }

        // Streams can close long before the process exits
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            return Err(self.abort(&mut child).await);
        };
        let status = status.map_err(|e| JobError::Io(e.to_string()))?;

        // Cancel can land between the last line and exit
        if self.cancel.is_cancelled() {
            return Err(self.abort(&mut child).await);
        }

        match status.code() {
            Some(0) => Ok(self.output.clone()),
            Some(code) => Err(JobError::Exit {
                code,
                detail: last_message,
            }),
            None => Err(JobError::Signal),
        }
    }

    /// Consume encoder output until both streams end, cancel is requested,
    /// or a read fails
    async fn read_output(
        &self,
        lines: &mut UnboundedReceiver<io::Result<String>>,
        last_message: &mut Option<String>,
    ) -> ReadEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ReadEnd::Cancelled,
                line = lines.recv() => match line {
                    Some(Ok(line)) => self.handle_line(line, last_message),
                    Some(Err(e)) => return ReadEnd::Failed(e),
                    None => return ReadEnd::Eof,
                },
            }
        }
    }

    fn handle_line(&self, line: String, last_message: &mut Option<String>) {
        match parse_progress(&line, self.duration) {
            Some(snapshot) => {
                if let Some(cb) = &self.callbacks.progress {
                    cb(&snapshot);
                }
                let _ = self.events.send(JobEvent::Progress(snapshot));
            }
            None => {
                trace!("encoder: {}", line);
                if !is_progress_key(&line) {
                    *last_message = Some(line);
                }
            }
        }
    }

    /// Kill the process, wait for it, and remove the partial output
    async fn abort(&self, child: &mut Child) -> JobError {
        terminate(child).await;

        match tokio::fs::remove_file(&self.output).await {
            Ok(()) => info!("Removed partial output {}", self.output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial output {}: {}", self.output.display(), e),
        }
        JobError::Cancelled
    }
}

/// How reading the encoder output ended
#[derive(Debug)]
enum ReadEnd {
    Eof,
    Cancelled,
    Failed(io::Error),
}

/// Kill the encoder and reap it
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Encoder already exited: {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap encoder: {}", e);
    }
}

/// `key=value` lines from `-progress pipe:1`, which are never failure text
fn is_progress_key(line: &str) -> bool {
    line.split_once('=')
        .map(|(key, _)| {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .unwrap_or(false)
}

/// Split a byte stream on `\n` or `\r` and forward non-empty lines.
///
/// The encoder rewrites its status line with bare carriage returns, so
/// newline-only splitting would hold progress back until exit. A read error
/// is forwarded after any pending partial line and ends the stream.
async fn forward_lines<R>(mut reader: R, tx: UnboundedSender<io::Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    let mut line = Vec::new();

    let flush = |line: &mut Vec<u8>| -> bool {
        let text = String::from_utf8_lossy(line).trim().to_string();
        line.clear();
        text.is_empty() || tx.send(Ok(text)).is_ok()
    };

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                if flush(&mut line) {
                    let _ = tx.send(Err(e));
                }
                return;
            }
        };
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !flush(&mut line) {
                    return;
                }
            } else {
                line.push(byte);
            }
        }
    }
    flush(&mut line);
}
