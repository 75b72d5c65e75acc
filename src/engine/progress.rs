//! Encoder progress line parsing
//!
//! Each field is pulled out by its own pattern so that partial or garbled
//! lines still yield whatever they contain. Works on both the classic
//! stderr status line (`frame=  120 fps= 30 ... time=00:00:04.00 ...`) and
//! the `-progress pipe:1` key/value stream (`out_time=...`, `total_size=...`).

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::model::ProgressSnapshot;
use crate::utils::time::parse_clock;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("progress patterns are static and valid"))
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"frame=\s*(\d+)")
}

fn fps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"fps=\s*(\d+(?:\.\d+)?)")
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"time=(\d+:\d+:\d+(?:\.\d*)?)")
}

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"speed=\s*(\d+(?:\.\d+)?)x")
}

fn size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"size=\s*(\d+)([A-Za-z]*)")
}

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Frames written, from `frame=<n>`
pub fn extract_frame(line: &str) -> Option<u64> {
    capture(frame_re(), line)?.parse().ok()
}

/// Encoder throughput, from `fps=<f>`
pub fn extract_fps(line: &str) -> Option<f64> {
    capture(fps_re(), line)?.parse().ok()
}

/// Output position in seconds, from `time=HH:MM:SS[.fff]`
pub fn extract_time(line: &str) -> Option<f64> {
    parse_clock(capture(time_re(), line)?).ok()
}

/// Speed relative to realtime, from `speed=<f>x`
pub fn extract_speed(line: &str) -> Option<f64> {
    capture(speed_re(), line)?.parse().ok()
}

/// Bytes written, from `size=<n><unit>`.
///
/// A bare number counts as bytes. Unknown units make the field absent.
pub fn extract_size(line: &str) -> Option<u64> {
    let caps = size_re().captures(line)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let multiplier: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" | "kib" => 1024,
        "mb" | "mib" => 1024 * 1024,
        "gb" | "gib" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

/// Completion percentage, clamped to [0, 100]; `None` without a duration
pub fn percent_complete(current_time: f64, total_duration: f64) -> Option<f64> {
    if total_duration > 0.0 && current_time.is_finite() {
        Some((current_time / total_duration * 100.0).clamp(0.0, 100.0))
    } else {
        None
    }
}

/// Decode one output line. Returns `None` only when no field matched.
pub fn parse_progress(line: &str, total_duration: f64) -> Option<ProgressSnapshot> {
    let current_time = extract_time(line);
    let snapshot = ProgressSnapshot {
        frame: extract_frame(line),
        fps: extract_fps(line),
        current_time,
        speed: extract_speed(line),
        size: extract_size(line),
        percent: current_time.and_then(|t| percent_complete(t, total_duration)),
    };

    if snapshot.is_empty() {
        None
    } else {
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_line() {
        let snapshot = parse_progress(
            "frame=  120 fps= 30 time=00:00:04.00 speed=1.0x size=  512kB",
            10.0,
        )
        .unwrap();

        assert_eq!(snapshot.frame, Some(120));
        assert_eq!(snapshot.fps, Some(30.0));
        assert_eq!(snapshot.current_time, Some(4.0));
        assert_eq!(snapshot.percent, Some(40.0));
        assert_eq!(snapshot.speed, Some(1.0));
        assert_eq!(snapshot.size, Some(524288));
    }

    #[test]
    fn test_parse_real_stderr_line() {
        let line = "frame= 2400 fps=118 q=28.0 size=   10240kB time=00:01:40.00 bitrate= 838.9kbits/s speed=4.92x";
        let snapshot = parse_progress(line, 200.0).unwrap();
        assert_eq!(snapshot.frame, Some(2400));
        assert_eq!(snapshot.fps, Some(118.0));
        assert_eq!(snapshot.size, Some(10240 * 1024));
        assert_eq!(snapshot.current_time, Some(100.0));
        assert_eq!(snapshot.percent, Some(50.0));
        assert_eq!(snapshot.speed, Some(4.92));
    }

    #[test]
    fn test_parse_progress_pipe_lines() {
        let time = parse_progress("out_time=00:00:05.500000", 11.0).unwrap();
        assert_eq!(time.current_time, Some(5.5));
        assert_eq!(time.percent, Some(50.0));

        let size = parse_progress("total_size=524288", 0.0).unwrap();
        assert_eq!(size.size, Some(524288));

        assert!(parse_progress("out_time_ms=5500000", 11.0).is_none());
        assert!(parse_progress("progress=continue", 11.0).is_none());
    }

    #[test]
    fn test_percent_requires_duration() {
        let snapshot = parse_progress("time=00:00:04.00", 0.0).unwrap();
        assert_eq!(snapshot.current_time, Some(4.0));
        assert_eq!(snapshot.percent, None);
    }

    #[test]
    fn test_percent_is_clamped() {
        let snapshot = parse_progress("time=00:00:12.00", 10.0).unwrap();
        assert_eq!(snapshot.percent, Some(100.0));
    }

    #[test]
    fn test_garbled_lines() {
        assert!(parse_progress("", 10.0).is_none());
        assert!(parse_progress("Stream mapping:", 10.0).is_none());
        assert!(parse_progress("speed=N/A fps=", 10.0).is_none());

        let partial = parse_progress("frame=  12 time=garbage", 10.0).unwrap();
        assert_eq!(partial.frame, Some(12));
        assert_eq!(partial.current_time, None);
    }

    #[test]
    fn test_size_units() {
        assert_eq!(extract_size("size=3b"), Some(3));
        assert_eq!(extract_size("size=2MB"), Some(2 * 1024 * 1024));
        assert_eq!(extract_size("size=1gb"), Some(1024 * 1024 * 1024));
        assert_eq!(extract_size("size=  256KiB"), Some(256 * 1024));
        assert_eq!(extract_size("size=N/A"), None);
        assert_eq!(extract_size("size=12furlongs"), None);
    }
}
