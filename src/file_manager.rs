//! # File Management Module
//!
//! Filesystem operations shared by every command.
//!
//! ## Responsibilities:
//! - Recursive discovery of video files in a directory tree
//! - Validation of the directory passed on the command line
//! - Removal of files, either to the recoverable trash or permanently
//! - Human-readable formatting of sizes and durations
//!
//! ## Supported containers:
//! - `mov`, `mkv`, `mp4` (matched case-sensitively)
//!
//! ## Example:
//! ```rust,ignore
//! FileManager::validate_directory(&dir)?;
//! for file in FileManager::find_media_files(&dir) {
//!     println!("{} ({})", file.display(), FileManager::format_size(FileManager::file_size(&file)?));
//! }
//! ```

use crate::error::NanoError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Container extensions considered during a directory walk
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mkv", "mp4"];

/// How an original is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMode {
    /// Move to the platform trash / recycling bin
    #[default]
    Trash,
    /// Unlink for good
    Permanent,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Ensure `directory` exists and is a directory
    pub fn validate_directory(directory: &Path) -> Result<(), NanoError> {
        if !directory.exists() {
            return Err(NanoError::DirectoryNotFound(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(NanoError::NotADirectory(directory.to_path_buf()));
        }
        Ok(())
    }

    /// Find all supported video files below `media_dir`, sorted by path
    pub fn find_media_files(media_dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(media_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| Self::is_video(path))
            .collect();

        files.sort();
        files
    }

    /// Check if a file has one of the supported container extensions
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    /// Size of a file in bytes
    pub fn file_size(path: &Path) -> Result<u64, NanoError> {
        Ok(std::fs::metadata(path)?.len())
    }

    /// Remove a file according to `mode`
    pub fn remove(path: &Path, mode: RemovalMode) -> Result<()> {
        match mode {
            RemovalMode::Trash => trash::delete(path)
                .map_err(|e| anyhow::anyhow!("Failed to move '{}' to trash: {}", path.display(), e)),
            RemovalMode::Permanent => std::fs::remove_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to delete '{}': {}", path.display(), e)),
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["bytes", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Human-readable signed size change, e.g. `1.50 GB saved`
    pub fn format_size_change(change: i64) -> String {
        let verdict = if change > 0 { "saved" } else { "increased" };
        format!("{} {}", Self::format_size(change.unsigned_abs()), verdict)
    }

    /// Minutes and seconds, e.g. `12m 5s`
    pub fn format_duration(seconds: f64) -> String {
        let seconds = seconds.max(0.0);
        let minutes = (seconds / 60.0).floor() as u64;
        let rest = (seconds % 60.0).floor() as u64;
        format!("{}m {}s", minutes, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_media_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("season 1");
        std::fs::create_dir(&nested).unwrap();

        for name in ["b.mp4", "a.mkv", "notes.txt", "upper.MP4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.mov"), b"x").unwrap();

        let files = FileManager::find_media_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.mkv", "b.mp4", "season 1/c.mov"]);
    }

    #[test]
    fn test_validate_directory() {
        let dir = TempDir::new().unwrap();
        assert!(FileManager::validate_directory(dir.path()).is_ok());

        let missing = dir.path().join("missing");
        assert!(matches!(
            FileManager::validate_directory(&missing),
            Err(NanoError::DirectoryNotFound(_))
        ));

        let file = dir.path().join("a.mp4");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileManager::validate_directory(&file),
            Err(NanoError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 bytes");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(2 * 1024 * 1024 * 1024), "2.00 GB");
        assert_eq!(FileManager::format_size_change(-1024), "1.00 KB increased");
        assert_eq!(FileManager::format_size_change(2048), "2.00 KB saved");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(FileManager::format_duration(0.0), "0m 0s");
        assert_eq!(FileManager::format_duration(125.9), "2m 5s");
        assert_eq!(FileManager::format_duration(3600.0), "60m 0s");
    }

    #[test]
    fn test_permanent_remove() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mp4");
        std::fs::write(&file, b"x").unwrap();

        FileManager::remove(&file, RemovalMode::Permanent).unwrap();
        assert!(!file.exists());
        assert!(FileManager::remove(&file, RemovalMode::Permanent).is_err());
    }
}
