//! # File Classifier Module
//!
//! Classifies video files by the lifecycle marker embedded in their name and
//! derives Original ↔ Optimized pairs.
//!
//! ## Markers:
//! - `Unmarked`: an original (`movie.mp4`)
//! - `InProgress`: an encode that has not finished (`movie.optimizing.mp4`)
//! - `Done`: a finished encode (`movie.optimized.mp4`)
//!
//! The marker is read from the last dot-separated component of the stem, so a
//! name can never carry two markers at once. Pairs are never cached: every
//! query re-checks the filesystem.

use crate::file_manager::FileManager;
use crate::optimizer::path_resolver::{PathResolver, DONE_MARKER, IN_PROGRESS_MARKER};
use std::path::{Path, PathBuf};

/// Lifecycle marker of a video file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Unmarked,
    InProgress,
    Done,
}

impl Marker {
    /// Classify a file stem (name without the final extension)
    pub fn of_stem(stem: &str) -> Self {
        match stem.rsplit_once('.') {
            Some((base, marker)) if !base.is_empty() && marker == IN_PROGRESS_MARKER => {
                Self::InProgress
            }
            Some((base, marker)) if !base.is_empty() && marker == DONE_MARKER => Self::Done,
            _ => Self::Unmarked,
        }
    }
}

/// A video file observed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub stem: String,
    pub extension: String,
    pub marker: Marker,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (stem, extension) = PathResolver::split_name(&path);
        let marker = Self::classify(&path);
        Self {
            path,
            stem,
            extension,
            marker,
        }
    }

    /// Marker carried by the name at `path`
    pub fn classify(path: &Path) -> Marker {
        let (stem, _) = PathResolver::split_name(path);
        Marker::of_stem(&stem)
    }

    pub fn is_original(&self) -> bool {
        self.marker == Marker::Unmarked
    }

    /// Name of the file, for messages
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The existing optimized counterpart of an original, if any
    pub fn pair(&self) -> Option<PathBuf> {
        if !self.is_original() {
            return None;
        }
        let done = PathResolver::done_path(&self.path);
        done.is_file().then_some(done)
    }
}

/// Directory-level classification queries
pub struct FileClassifier;

impl FileClassifier {
    /// Every video file below `directory`, classified, sorted by path
    pub fn scan(directory: &Path) -> Vec<MediaFile> {
        FileManager::find_media_files(directory)
            .into_iter()
            .map(MediaFile::new)
            .collect()
    }

    /// Originals with an existing optimized version, as `(original, optimized)`
    pub fn pairs(files: &[MediaFile]) -> Vec<(PathBuf, PathBuf)> {
        files
            .iter()
            .filter_map(|file| file.pair().map(|done| (file.path.clone(), done)))
            .collect()
    }

    /// First unfinished encode artifact in `files`
    pub fn first_in_progress(files: &[MediaFile]) -> Option<&MediaFile> {
        files.iter().find(|file| file.marker == Marker::InProgress)
    }

    pub fn with_marker(files: &[MediaFile], marker: Marker) -> Vec<&MediaFile> {
        files.iter().filter(|file| file.marker == marker).collect()
    }
}
