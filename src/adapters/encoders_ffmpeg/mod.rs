//! Encoder capability queries against the ffmpeg executable
//!
//! `ffmpeg -hide_banner -encoders` lists what the build was compiled with.
//! GPU encoders are often listed without a usable device, so they are
//! confirmed with a one-second synthetic encode to the null muxer.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ConvertError, ConvertResult};
use crate::ports::EncoderPort;

/// Default time allowed for one query or test encode
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Synthetic input used for test encodes
const TEST_SOURCE: &str = "nullsrc=s=256x256:d=1";

/// ffmpeg-based encoder capability adapter
#[derive(Debug, Clone)]
pub struct FfmpegEncodersAdapter {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegEncodersAdapter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: DEFAULT_DETECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EncoderPort for FfmpegEncodersAdapter {
    async fn list_encoders(&self) -> ConvertResult<Vec<String>> {
        debug!("Listing encoders with {}", self.ffmpeg_path);
        let child = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ConvertError::DetectionError {
                message: format!("encoder listing timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| ConvertError::DetectionError {
                message: format!("Failed to run '{}': {}", self.ffmpeg_path, e),
            })?;

        if !output.status.success() {
            return Err(ConvertError::DetectionError {
                message: format!("'{}' exited with {}", self.ffmpeg_path, output.status),
            });
        }
        Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn test_encode(&self, encoder: &str) -> bool {
        let child = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-f", "lavfi", "-i", TEST_SOURCE, "-c:v", encoder, "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(status)) => {
                debug!("Test encode with {}: {}", encoder, status);
                status.success()
            }
            Ok(Err(e)) => {
                debug!("Test encode with {} could not start: {}", encoder, e);
                false
            }
            Err(_) => {
                debug!("Test encode with {} timed out", encoder);
                false
            }
        }
    }
}

/// Encoder names from `-encoders` output.
///
/// Entries look like ` V....D libx264   description`: a six-character flag
/// column starting with the stream kind, then the name. Legend lines
/// (` V..... = Video`) and the header are skipped.
pub fn parse_encoder_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            let is_flag_column = flags.len() == 6
                && flags.starts_with(['V', 'A', 'S'])
                && flags.chars().all(|c| c == '.' || c.is_ascii_uppercase());
            (is_flag_column && name != "=").then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 VF.... libvpx-vp9           libvpx VP9 (codec vp9)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D pcm_s16le            PCM signed 16-bit little-endian
 S..... srt                  SubRip subtitle
";

    #[test]
    fn test_parse_encoder_listing() {
        assert_eq!(
            parse_encoder_list(LISTING),
            vec!["libx264", "h264_nvenc", "libvpx-vp9", "aac", "pcm_s16le", "srt"]
        );
    }

    #[test]
    fn test_parse_ignores_noise() {
        assert!(parse_encoder_list("").is_empty());
        assert!(parse_encoder_list("ffmpeg version 6.1\n  configuration: --enable-gpl").is_empty());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let adapter = FfmpegEncodersAdapter::new("/no/such/ffmpeg-binary");
        let err = adapter.list_encoders().await.unwrap_err();
        assert!(matches!(err, ConvertError::DetectionError { .. }));
        assert!(!adapter.test_encode("h264_nvenc").await);
    }
}
