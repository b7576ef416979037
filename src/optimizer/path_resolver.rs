//! # Path Resolution Module
//!
//! Every filename derivation of the marker convention lives here, so the
//! optimizer, purge and untag agree bit for bit:
//! - `<stem>.optimizing.<ext>` while an encode is running
//! - `<stem>.optimized.<ext>` once it finished

use std::path::{Path, PathBuf};

pub const IN_PROGRESS_MARKER: &str = "optimizing";
pub const DONE_MARKER: &str = "optimized";

/// Centralised output path derivation
pub struct PathResolver;

impl PathResolver {
    /// `dir/movie.mp4` -> `dir/movie.optimizing.mp4`
    pub fn in_progress_path(original: &Path) -> PathBuf {
        Self::with_marker(original, IN_PROGRESS_MARKER)
    }

    /// `dir/movie.mp4` -> `dir/movie.optimized.mp4`
    pub fn done_path(original: &Path) -> PathBuf {
        Self::with_marker(original, DONE_MARKER)
    }

    /// `dir/movie.optimizing.mp4` -> `dir/movie.optimized.mp4`
    pub fn finalized_path(in_progress: &Path) -> PathBuf {
        Self::done_path(&Self::strip_marker(in_progress, IN_PROGRESS_MARKER))
    }

    /// `dir/movie.optimized.mp4` -> `dir/movie.mp4`
    pub fn untagged_path(done: &Path) -> PathBuf {
        Self::strip_marker(done, DONE_MARKER)
    }

    /// Stem and extension of `path` as strings (extension without dot)
    pub fn split_name(path: &Path) -> (String, String) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (stem, extension)
    }

    fn with_marker(path: &Path, marker: &str) -> PathBuf {
        let (stem, extension) = Self::split_name(path);
        path.with_file_name(Self::join_name(&format!("{}.{}", stem, marker), &extension))
    }

    fn strip_marker(path: &Path, marker: &str) -> PathBuf {
        let (stem, extension) = Self::split_name(path);
        let suffix = format!(".{}", marker);
        let base = stem.strip_suffix(suffix.as_str()).unwrap_or(&stem);
        path.with_file_name(Self::join_name(base, &extension))
    }

    fn join_name(stem: &str, extension: &str) -> String {
        if extension.is_empty() {
            stem.to_string()
        } else {
            format!("{}.{}", stem, extension)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_paths() {
        let original = Path::new("/videos/Holiday 2019.mp4");
        assert_eq!(
            PathResolver::in_progress_path(original),
            PathBuf::from("/videos/Holiday 2019.optimizing.mp4")
        );
        assert_eq!(
            PathResolver::done_path(original),
            PathBuf::from("/videos/Holiday 2019.optimized.mp4")
        );
    }

    #[test]
    fn test_finalize_and_untag() {
        let in_progress = Path::new("/videos/clip.v2.optimizing.mkv");
        let done = PathResolver::finalized_path(in_progress);
        assert_eq!(done, PathBuf::from("/videos/clip.v2.optimized.mkv"));
        assert_eq!(PathResolver::untagged_path(&done), PathBuf::from("/videos/clip.v2.mkv"));
    }
}
