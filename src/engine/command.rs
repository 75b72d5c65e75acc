//! Encoder command-line construction
//!
//! [`build_command`] is a pure function: the same settings and paths always
//! produce the same argument list. Invalid values are passed through and
//! left for the encoder to reject.

use std::path::Path;

use crate::domain::model::{CodecChoice, Settings};

/// Software preset names and their NVENC equivalents
const NVENC_PRESETS: [(&str, &str); 9] = [
    ("ultrafast", "p1"),
    ("superfast", "p2"),
    ("veryfast", "p3"),
    ("faster", "p3"),
    ("fast", "p4"),
    ("medium", "p5"),
    ("slow", "p6"),
    ("slower", "p7"),
    ("veryslow", "p7"),
];

/// Largest factor a single `atempo` stage accepts
const ATEMPO_MAX: f64 = 2.0;

/// Map a generic preset name onto the NVENC vocabulary.
///
/// Names without a mapping (including `p1`..`p7` themselves) pass through.
pub fn hardware_preset(preset: &str) -> &str {
    NVENC_PRESETS
        .iter()
        .find(|(generic, _)| *generic == preset)
        .map(|(_, vendor)| *vendor)
        .unwrap_or(preset)
}

/// `atempo` chain for a playback speed.
///
/// One stage is enough up to 2.0; above that `atempo=2.0` stages are
/// chained until the remainder fits.
pub fn atempo_chain(speed: f64) -> String {
    let mut stages = Vec::new();
    let mut remaining = speed;
    while remaining > ATEMPO_MAX && remaining.is_finite() {
        stages.push(format!("atempo={:?}", ATEMPO_MAX));
        remaining /= ATEMPO_MAX;
    }
    stages.push(format!("atempo={:?}", remaining));
    stages.join(",")
}

/// Single `-vf` argument that later fragments are comma-joined into
struct VideoFilter {
    index: Option<usize>,
}

impl VideoFilter {
    fn push(&mut self, args: &mut Vec<String>, fragment: String) {
        match self.index {
            Some(i) => {
                args[i].push(',');
                args[i].push_str(&fragment);
            }
            None => {
                args.push("-vf".to_string());
                args.push(fragment);
                self.index = Some(args.len() - 1);
            }
        }
    }
}

fn eq_filter(settings: &Settings) -> Option<String> {
    let color = &settings.color;
    let parts: Vec<String> = [
        ("brightness", color.brightness),
        ("contrast", color.contrast),
        ("saturation", color.saturation),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{}={:?}", name, v)))
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("eq={}", parts.join(":")))
    }
}

/// Build the encoder argument list (without the executable itself).
///
/// Order: global flags, input, video, audio, video filters (scale, setpts,
/// eq merged into one `-vf`), frame rate, audio tempo, progress, output.
pub fn build_command(input: &Path, output: &Path, settings: &Settings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
    ];

    match &settings.video {
        CodecChoice::Disabled => args.push("-vn".into()),
        CodecChoice::StreamCopy => args.extend(["-c:v".into(), "copy".into()]),
        CodecChoice::Encode(codec) => {
            args.extend(["-c:v".into(), codec.clone()]);
            if let Some(kbps) = settings.video_bitrate {
                args.extend(["-b:v".into(), format!("{}k", kbps)]);
            }
            if let Some(preset) = &settings.preset {
                let preset = if settings.video.is_hardware() {
                    hardware_preset(preset)
                } else {
                    preset.as_str()
                };
                args.extend(["-preset".into(), preset.to_string()]);
            }
        }
    }

    match &settings.audio {
        CodecChoice::Disabled => args.push("-an".into()),
        CodecChoice::StreamCopy => args.extend(["-c:a".into(), "copy".into()]),
        CodecChoice::Encode(codec) => {
            args.extend(["-c:a".into(), codec.clone()]);
            if let Some(kbps) = settings.audio_bitrate {
                args.extend(["-b:a".into(), format!("{}k", kbps)]);
            }
        }
    }

    let encodes_video = settings.video.is_encode();
    let mut vf = VideoFilter { index: None };

    if encodes_video {
        if let Some(resolution) = settings.resolution {
            vf.push(&mut args, format!("scale={}", resolution));
        }
        if let Some(fps) = settings.fps {
            args.extend(["-r".into(), fps.to_string()]);
        }
    }

    if let Some(speed) = settings.speed.filter(|s| *s != 1.0 && s.is_finite()) {
        if encodes_video {
            vf.push(&mut args, format!("setpts={:?}*PTS", 1.0 / speed));
        }
        if settings.audio.is_encode() {
            args.extend(["-af".into(), atempo_chain(speed)]);
        }
    }

    if encodes_video {
        if let Some(eq) = eq_filter(settings) {
            vf.push(&mut args, eq);
        }
    }

    args.extend(["-progress".into(), "pipe:1".into()]);
    args.push(output.to_string_lossy().into_owned());
    args
}
