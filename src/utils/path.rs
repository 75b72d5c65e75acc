//! Output path helpers

use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};

/// Extensions accepted as video input
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "ts", "m2ts", "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "3gp",
];

/// `<output_dir>/<input stem><suffix><ext>`.
///
/// `ext` includes the leading dot, e.g. `.mp4`.
pub fn generate_output_path(input: &Path, output_dir: &Path, ext: &str, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}{}{}", stem, suffix, ext))
}

/// Whether the extension is a known video container
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Make sure `dir` exists and can be written to, creating it when missing
pub fn validate_output_dir(dir: &Path) -> ConvertResult<()> {
    if dir.as_os_str().is_empty() {
        return Err(ConvertError::ConfigError {
            message: "Output directory not specified".to_string(),
        });
    }

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Created output directory {}", dir.display());
        return Ok(());
    }

    let metadata = std::fs::metadata(dir)?;
    if !metadata.is_dir() {
        return Err(ConvertError::ConfigError {
            message: format!("'{}' is not a directory", dir.display()),
        });
    }
    if metadata.permissions().readonly() {
        return Err(ConvertError::ConfigError {
            message: format!("No write permission for '{}'", dir.display()),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_output_path() {
        let out = generate_output_path(
            Path::new("/videos/holiday.ts"),
            Path::new("/out"),
            ".mp4",
            "_converted",
        );
        assert_eq!(out, PathBuf::from("/out/holiday_converted.mp4"));
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("clip.MKV")));
        assert!(is_video_file(Path::new("a/b/c.m2ts")));
        assert!(!is_video_file(Path::new("song.mp3")));
        assert!(!is_video_file(Path::new("README")));
    }

    #[test]
    fn test_validate_output_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        validate_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_validate_output_dir_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(validate_output_dir(&file).is_err());
        assert!(validate_output_dir(Path::new("")).is_err());
    }
}
