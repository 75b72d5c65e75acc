//! Job runner and batch queue tests against a scripted stand-in encoder
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use vidconv_cli::domain::model::{JobStatus, Settings, VideoMetadata};
use vidconv_cli::engine::runner::RunnerState;
use vidconv_cli::engine::{BatchCallbacks, BatchQueue, JobCallbacks, JobEvent, JobRunner};
use vidconv_cli::error::{ConvertError, ConvertResult, JobError};
use vidconv_cli::adapters::FfmpegEncodersAdapter;
use vidconv_cli::ports::{detect_capabilities, EncoderPort, ProbePort};

/// Behaviour depends on the input name: `*fail*` exits 3 with a message,
/// `*slow*` reports once and then hangs, `*silent*` reports once, closes
/// its output streams and then hangs, anything else reports twice and
/// succeeds. `-encoders` lists a fixed set; a test encode succeeds only
/// with `h264_nvenc`.
const FAKE_ENCODER: &str = r#"#!/bin/sh
input=""
last=""
codec=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) shift; input="$1" ;;
    -c:v) shift; codec="$1" ;;
  esac
  last="$1"
  shift
done

if [ "$last" = "-encoders" ]; then
  cat <<'LIST'
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder (codec hevc)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D flac                 FLAC (Free Lossless Audio Codec)
LIST
  exit 0
fi

case "$input" in
  nullsrc*)
    if [ "$codec" = "h264_nvenc" ]; then
      exit 0
    fi
    echo "Cannot load libnvidia-encode.so.1" >&2
    exit 1
    ;;
  *fail*)
    echo "Unknown encoder 'bogus'" >&2
    exit 3
    ;;
  *slow*)
    : > "$last"
    echo "frame=    1 fps=0.0 q=0.0 size=       0kB time=00:00:00.50 bitrate=   0.0kbits/s speed=1.00x"
    exec sleep 30
    ;;
  *silent*)
    : > "$last"
    echo "frame=    1 fps=0.0 q=0.0 size=       0kB time=00:00:00.50 bitrate=   0.0kbits/s speed=1.00x"
    exec >/dev/null 2>&1
    exec sleep 30
    ;;
esac

printf 'frame=   25 fps=25.0 q=28.0 size=     256kB time=00:00:05.00 bitrate= 419.4kbits/s speed=2.00x\r'
printf 'frame=   50 fps=25.0 q=28.0 size=     512kB time=00:00:10.00 bitrate= 419.4kbits/s speed=2.00x\n'
echo "progress=end"
: > "$last"
exit 0
"#;

const TIMEOUT: Duration = Duration::from_secs(10);

/// One script per test binary, written before any test spawns it
fn fake_encoder() -> &'static str {
    static ENCODER: OnceLock<(TempDir, String)> = OnceLock::new();
    let (_, path) = ENCODER.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake-ffmpeg");
        fs::write(&path, FAKE_ENCODER).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    });
    path
}

struct FixedProbe(f64);

#[async_trait]
impl ProbePort for FixedProbe {
    async fn probe(&self, _path: &Path) -> ConvertResult<VideoMetadata> {
        Ok(VideoMetadata {
            duration: self.0,
            ..Default::default()
        })
    }
}

async fn collect(mut handle: vidconv_cli::engine::JobHandle) -> Vec<JobEvent> {
    tokio::time::timeout(TIMEOUT, async move {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("encoder did not finish in time")
}

#[tokio::test]
async fn test_successful_conversion_reports_progress_then_completion() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("clip.mp4");

    let progress_seen = Arc::new(Mutex::new(Vec::new()));
    let completed: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let callbacks = {
        let progress_seen = progress_seen.clone();
        let completed = completed.clone();
        JobCallbacks::new()
            .on_progress(move |p| progress_seen.lock().unwrap().push(p.percent))
            .on_complete(move |path| *completed.lock().unwrap() = Some(path.to_path_buf()))
    };
    let runner = JobRunner::new(fake_encoder()).with_callbacks(callbacks);

    let handle = runner
        .convert("clip.ts", &output, &Settings::default(), 10.0)
        .unwrap();
    let events = collect(handle).await;

    assert_eq!(events.len(), 3);
    match &events[0] {
        JobEvent::Progress(p) => {
            assert_eq!(p.frame, Some(25));
            assert_eq!(p.fps, Some(25.0));
            assert_eq!(p.current_time, Some(5.0));
            assert_eq!(p.speed, Some(2.0));
            assert_eq!(p.size, Some(256 * 1024));
            assert_eq!(p.percent, Some(50.0));
        }
        other => panic!("expected progress, got {:?}", other),
    }
    match &events[1] {
        JobEvent::Progress(p) => assert_eq!(p.percent, Some(100.0)),
        other => panic!("expected progress, got {:?}", other),
    }
    assert_eq!(events[2], JobEvent::Completed(output.clone()));

    assert_eq!(runner.state(), RunnerState::Completed);
    assert_eq!(*progress_seen.lock().unwrap(), vec![Some(50.0), Some(100.0)]);
    assert_eq!(*completed.lock().unwrap(), Some(output.clone()));
    assert!(output.exists());
}

#[tokio::test]
async fn test_unknown_duration_leaves_percent_empty() {
    let tmp = TempDir::new().unwrap();
    let runner = JobRunner::new(fake_encoder());

    let handle = runner
        .convert("clip.ts", tmp.path().join("out.mp4"), &Settings::default(), 0.0)
        .unwrap();
    let events = collect(handle).await;

    let percents: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![None, None]);
    assert!(matches!(events.last(), Some(JobEvent::Completed(_))));
}

#[tokio::test]
async fn test_nonzero_exit_carries_code_and_last_message() {
    let tmp = TempDir::new().unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let callbacks = {
        let errors = errors.clone();
        JobCallbacks::new().on_error(move |e| errors.lock().unwrap().push(e.clone()))
    };
    let runner = JobRunner::new(fake_encoder()).with_callbacks(callbacks);

    let handle = runner
        .convert("will-fail.ts", tmp.path().join("out.mp4"), &Settings::default(), 10.0)
        .unwrap();
    let result = tokio::time::timeout(TIMEOUT, handle.wait()).await.unwrap();

    let expected = JobError::Exit {
        code: 3,
        detail: Some("Unknown encoder 'bogus'".to_string()),
    };
    assert_eq!(result, Err(expected.clone()));
    assert_eq!(runner.state(), RunnerState::Failed);
    assert_eq!(*errors.lock().unwrap(), vec![expected]);
}

#[tokio::test]
async fn test_cancel_kills_encoder_and_removes_partial_output() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("partial.mp4");
    let runner = JobRunner::new(fake_encoder());

    let mut handle = runner
        .convert("slow.ts", &output, &Settings::default(), 10.0)
        .unwrap();

    let first = tokio::time::timeout(TIMEOUT, handle.next_event())
        .await
        .unwrap();
    assert!(matches!(first, Some(JobEvent::Progress(_))));
    assert!(runner.is_running());

    // One conversion at a time
    assert!(matches!(
        runner.convert("other.ts", tmp.path().join("other.mp4"), &Settings::default(), 0.0),
        Err(ConvertError::RunnerBusy)
    ));

    assert!(runner.cancel());
    let rest = collect(handle).await;
    assert_eq!(rest.last(), Some(&JobEvent::Error(JobError::Cancelled)));
    assert_eq!(runner.state(), RunnerState::Cancelled);
    assert!(!output.exists());

    // The runner is reusable afterwards
    let handle = runner
        .convert("again.ts", tmp.path().join("again.mp4"), &Settings::default(), 10.0)
        .unwrap();
    assert!(tokio::time::timeout(TIMEOUT, handle.wait()).await.unwrap().is_ok());
}

#[tokio::test]
async fn test_cancel_stops_encoder_after_its_streams_close() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("silent.mp4");
    let runner = JobRunner::new(fake_encoder());

    let mut handle = runner
        .convert("silent.ts", &output, &Settings::default(), 10.0)
        .unwrap();
    let first = tokio::time::timeout(TIMEOUT, handle.next_event())
        .await
        .unwrap();
    assert!(matches!(first, Some(JobEvent::Progress(_))));

    // Let the encoder close stdout and stderr so only the exit wait remains
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(runner.is_running());

    let started = std::time::Instant::now();
    assert!(runner.cancel());
    let result = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("cancel did not stop the encoder");

    assert_eq!(result, Err(JobError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(runner.state(), RunnerState::Cancelled);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_encoder_detection_confirms_gpu_encoders() {
    let adapter = FfmpegEncodersAdapter::new(fake_encoder());
    assert_eq!(
        adapter.list_encoders().await.unwrap(),
        vec!["libx264", "h264_nvenc", "hevc_nvenc", "aac", "flac"]
    );
    assert!(adapter.test_encode("h264_nvenc").await);
    assert!(!adapter.test_encode("hevc_nvenc").await);

    let caps = detect_capabilities(&adapter, true).await;
    let video: Vec<_> = caps.video.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(video, vec!["h264_nvenc", "hevc_nvenc", "libx264"]);
    let audio: Vec<_> = caps.audio.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(audio, vec!["aac", "flac"]);
    assert_eq!(caps.hardware, vec!["h264_nvenc"]);
}

#[test]
fn test_convert_sync_success_and_failure() {
    let tmp = TempDir::new().unwrap();
    let runner = JobRunner::new(fake_encoder());

    let output = tmp.path().join("sync.mp4");
    let stderr = runner
        .convert_sync("clip.ts", &output, &Settings::stream_copy())
        .unwrap();
    assert!(stderr.is_empty());
    assert!(output.exists());
    assert_eq!(runner.state(), RunnerState::Completed);

    match runner.convert_sync("fail.ts", tmp.path().join("x.mp4"), &Settings::default()) {
        Err(ConvertError::EncoderFailed { code, stderr }) => {
            assert_eq!(code, 3);
            assert!(stderr.contains("Unknown encoder"));
        }
        other => panic!("expected encoder failure, got {:?}", other),
    }
    assert_eq!(runner.state(), RunnerState::Failed);
}

#[tokio::test]
async fn test_batch_continues_past_failed_item() {
    let tmp = TempDir::new().unwrap();
    let runner = Arc::new(JobRunner::new(fake_encoder()));

    let progress = Arc::new(Mutex::new(Vec::new()));
    let completed_with = Arc::new(Mutex::new(None));
    let item_updates = Arc::new(Mutex::new(Vec::new()));
    let callbacks = {
        let progress = progress.clone();
        let completed_with = completed_with.clone();
        let item_updates = item_updates.clone();
        BatchCallbacks::new()
            .on_progress(move |done, total| progress.lock().unwrap().push((done, total)))
            .on_complete(move |items| {
                let statuses: Vec<JobStatus> = items.iter().map(|j| j.status).collect();
                *completed_with.lock().unwrap() = Some(statuses);
            })
            .on_item_progress(move |index, _| item_updates.lock().unwrap().push(index))
    };
    let queue = BatchQueue::new(runner.clone(), Arc::new(FixedProbe(10.0))).with_callbacks(callbacks);

    for name in ["one", "two-fail", "three"] {
        queue
            .enqueue(
                format!("{}.ts", name),
                tmp.path().join(format!("{}.mp4", name)),
                Settings::default(),
            )
            .unwrap();
    }

    let join = queue.start().unwrap().unwrap();
    assert!(queue.is_running());
    assert!(matches!(queue.clear(), Err(ConvertError::BatchRunning)));

    let items = tokio::time::timeout(TIMEOUT, join).await.unwrap().unwrap();
    let statuses: Vec<JobStatus> = items.iter().map(|j| j.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Completed, JobStatus::Failed, JobStatus::Completed]
    );
    assert!(items.iter().all(|j| j.duration == 10.0));
    assert!(items[1]
        .error
        .as_deref()
        .unwrap()
        .contains("Encoder exited with code 3"));
    assert!(items[0].error.is_none());

    assert_eq!(*progress.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(*completed_with.lock().unwrap(), Some(statuses));
    assert_eq!(*item_updates.lock().unwrap(), vec![0, 0, 2, 2]);
    assert!(!queue.is_running());
    assert!(!runner.is_running());
}

#[tokio::test]
async fn test_batch_cancel_stops_queue_and_skips_completion() {
    let tmp = TempDir::new().unwrap();
    let runner = Arc::new(JobRunner::new(fake_encoder()));

    let completed = Arc::new(Mutex::new(false));
    let callbacks = {
        let completed = completed.clone();
        BatchCallbacks::new().on_complete(move |_| *completed.lock().unwrap() = true)
    };
    let queue = BatchQueue::new(runner.clone(), Arc::new(FixedProbe(0.0))).with_callbacks(callbacks);
    for name in ["slow-a", "slow-b", "slow-c"] {
        queue
            .enqueue(
                format!("{}.ts", name),
                tmp.path().join(format!("{}.mp4", name)),
                Settings::default(),
            )
            .unwrap();
    }

    let join = queue.start().unwrap().unwrap();
    tokio::time::timeout(TIMEOUT, async {
        while !runner.is_running() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    queue.cancel();
    let items = tokio::time::timeout(TIMEOUT, join).await.unwrap().unwrap();

    let statuses: Vec<JobStatus> = items.iter().map(|j| j.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Cancelled, JobStatus::Pending, JobStatus::Pending]
    );
    assert!(!tmp.path().join("slow-a.mp4").exists());
    assert!(!*completed.lock().unwrap());
    assert!(!queue.is_running());
}
