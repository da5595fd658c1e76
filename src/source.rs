//! Input media validation, run before the first stage

use crate::error::{PressError, PressResult};
use std::path::{Path, PathBuf};

/// Extensions the extractor is expected to handle
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "webm", "avi", "mp3", "wav", "m4a", "flac", "ogg", "aac", "opus",
];

/// Check that `path` names a non-empty media file we can process.
///
/// Returns the canonical path on success.
pub fn validate_source(path: &Path) -> PressResult<PathBuf> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        PressError::InvalidInput(format!("Cannot read source {}: {}", path.display(), e))
    })?;

    if metadata.is_dir() {
        return Err(PressError::InvalidInput(format!(
            "Source is a directory: {}",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(PressError::InvalidInput(format!(
            "Source file is empty: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PressError::InvalidInput(format!(
            "Unsupported media type '{}' (expected one of: {})",
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    resolve(path)
}

fn resolve(path: &Path) -> PressResult<PathBuf> {
    path.canonicalize().map_err(|e| {
        PressError::InvalidInput(format!("Cannot resolve source {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_valid_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Talk.MP4");
        std::fs::write(&path, b"not really video").unwrap();

        let resolved = validate_source(&path).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved.file_name().unwrap(), "Talk.MP4");
    }

    #[test]
    fn test_missing_source() {
        let err = validate_source(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidationError);
    }

    #[test]
    fn test_directory_and_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_source(temp_dir.path()).is_err());

        let empty = temp_dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        let err = validate_source(&empty).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_unresolvable_path_is_input_error() {
        let err = resolve(Path::new("/definitely/not/here/talk.mp4")).unwrap_err();
        assert!(matches!(err, PressError::InvalidInput(_)));
        assert_eq!(err.kind(), ErrorKind::InputValidationError);
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let err = validate_source(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidationError);
        assert!(err.to_string().contains("txt"));
    }
}
