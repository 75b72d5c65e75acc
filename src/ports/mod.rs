// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::model::{EncoderCapabilities, EncoderInfo, VideoMetadata};
use crate::domain::presets::{AUDIO_ENCODERS, HARDWARE_ENCODERS, VIDEO_ENCODERS};
use crate::error::ConvertResult;

/// Port for reading media metadata
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Probe a media file
    async fn probe(&self, path: &Path) -> ConvertResult<VideoMetadata>;
}

/// Probe `path`, treating any failure as unknown metadata.
///
/// Unknown metadata has a zero duration, so percent-complete and
/// estimates degrade instead of failing.
pub async fn probe_or_default(probe: &dyn ProbePort, path: &Path) -> VideoMetadata {
    match probe.probe(path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Probe failed for {}: {}", path.display(), e);
            VideoMetadata::default()
        }
    }
}

/// Port for asking the encoder what it can do
#[async_trait]
pub trait EncoderPort: Send + Sync {
    /// Names of every encoder the build reports
    async fn list_encoders(&self) -> ConvertResult<Vec<String>>;

    /// Whether a short synthetic encode with `encoder` succeeds
    async fn test_encode(&self, encoder: &str) -> bool;
}

/// Which known encoders are present, with GPU encoders confirmed by a
/// test encode when `verify_hardware` is set.
///
/// A failed query degrades to [`EncoderCapabilities::fallback`].
pub async fn detect_capabilities(
    encoders: &dyn EncoderPort,
    verify_hardware: bool,
) -> EncoderCapabilities {
    let listed = match encoders.list_encoders().await {
        Ok(listed) => listed,
        Err(e) => {
            warn!("Encoder detection failed, assuming defaults: {}", e);
            return EncoderCapabilities::fallback();
        }
    };
    let mut hardware = Vec::new();
    for name in HARDWARE_ENCODERS {
        if !listed.iter().any(|l| l == name) {
            continue;
        }
        if !verify_hardware || encoders.test_encode(name).await {
            hardware.push(name.to_string());
        } else {
            debug!("{} is listed but failed a test encode", name);
        }
    }

    EncoderCapabilities {
        video: known_encoders(&VIDEO_ENCODERS, &listed),
        audio: known_encoders(&AUDIO_ENCODERS, &listed),
        hardware,
    }
}

fn known_encoders(table: &[(&str, &str)], listed: &[String]) -> Vec<EncoderInfo> {
    table
        .iter()
        .filter(|(name, _)| listed.iter().any(|l| l == name))
        .map(|(name, label)| EncoderInfo::new(*name, *label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    struct FailingProbe;

    #[async_trait]
    impl ProbePort for FailingProbe {
        async fn probe(&self, path: &Path) -> ConvertResult<VideoMetadata> {
            Err(ConvertError::ProbeError {
                message: format!("cannot read {}", path.display()),
            })
        }
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

    /// Lists a fixed set; only `usable` passes a test encode
    struct ScriptedEncoders {
        listed: Option<Vec<&'static str>>,
        usable: &'static str,
    }

    #[async_trait]
    impl EncoderPort for ScriptedEncoders {
        async fn list_encoders(&self) -> ConvertResult<Vec<String>> {
            match &self.listed {
                Some(names) => Ok(names.iter().map(|n| n.to_string()).collect()),
                None => Err(ConvertError::DetectionError {
                    message: "encoder not found".to_string(),
                }),
            }
        }

        async fn test_encode(&self, encoder: &str) -> bool {
            encoder == self.usable
        }
    }

    #[tokio::test]
    async fn test_capabilities_keep_known_encoders_in_order() {
        let encoders = ScriptedEncoders {
            listed: Some(vec!["libx265", "aac", "hevc_nvenc", "libx264", "h264_nvenc", "dnxhd"]),
            usable: "h264_nvenc",
        };
        let caps = detect_capabilities(&encoders, true).await;

        let video: Vec<_> = caps.video.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(video, vec!["h264_nvenc", "hevc_nvenc", "libx264", "libx265"]);
        let audio: Vec<_> = caps.audio.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(audio, vec!["aac"]);
        assert_eq!(caps.hardware, vec!["h264_nvenc"]);
    }

    #[tokio::test]
    async fn test_capabilities_without_verification_trust_the_list() {
        let encoders = ScriptedEncoders {
            listed: Some(vec!["h264_nvenc", "hevc_nvenc"]),
            usable: "",
        };
        let caps = detect_capabilities(&encoders, false).await;
        assert_eq!(caps.hardware, vec!["h264_nvenc", "hevc_nvenc"]);
        assert!(detect_capabilities(&encoders, true).await.hardware.is_empty());
    }

    #[tokio::test]
    async fn test_capability_query_failure_falls_back() {
        let encoders = ScriptedEncoders {
            listed: None,
            usable: "h264_nvenc",
        };
        assert_eq!(
            detect_capabilities(&encoders, true).await,
            EncoderCapabilities::fallback()
        );
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_to_unknown() {
        let metadata = probe_or_default(&FailingProbe, Path::new("missing.ts")).await;
        assert_eq!(metadata, VideoMetadata::default());
        assert!(!metadata.has_duration());
    }

    #[tokio::test]
    async fn test_probe_success_passes_through() {
        let metadata = probe_or_default(&FixedProbe(12.5), Path::new("a.ts")).await;
        assert_eq!(metadata.duration, 12.5);
    }
}
