//! # Lifecycle Module
//!
//! The marker state machine of a single video:
//!
//! ```text
//!  Unprocessed ──claim──▶ InProgress ──finalize──▶ Done ──untag──▶ (unmarked)
//!       ▲                     │
//!       └──────rollback───────┘
//! ```
//!
//! plus the eligibility policy that decides which originals enter a batch.
//! Partial output of a crashed run is never resumed: `claim` deletes it.

use crate::classifier::MediaFile;
use crate::error::NanoError;
use crate::optimizer::media_optimizer::{FailedFile, SkipReason, SkippedFile};
use crate::optimizer::path_resolver::PathResolver;
use crate::video_processor::{VideoBackend, VideoInfo};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lifecycle state of an original, derived from the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unprocessed,
    InProgress,
    Done,
}

/// An original selected for encoding
#[derive(Debug, Clone)]
pub struct EligibleFile {
    pub path: PathBuf,
    pub info: VideoInfo,
}

/// Outcome of the eligibility pass
#[derive(Debug, Default)]
pub struct Eligibility {
    /// Sorted by path, no duplicates
    pub eligible: Vec<EligibleFile>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

/// Marker transitions and eligibility policy
pub struct Lifecycle;

impl Lifecycle {
    /// Current state of an original
    pub fn state_of(original: &Path) -> LifecycleState {
        if PathResolver::done_path(original).is_file() {
            LifecycleState::Done
        } else if PathResolver::in_progress_path(original).exists() {
            LifecycleState::InProgress
        } else {
            LifecycleState::Unprocessed
        }
    }

    /// Unprocessed → InProgress: reserve the `.optimizing` output path,
    /// discarding whatever a previous attempt left there
    pub fn claim(original: &Path) -> Result<PathBuf, NanoError> {
        let output = PathResolver::in_progress_path(original);
        if output.exists() {
            std::fs::remove_file(&output)?;
            info!(
                "Deleted partially completed file '{}'.",
                output.file_name().unwrap_or_default().to_string_lossy()
            );
        }
        Ok(output)
    }

    /// InProgress → Done: atomic rename of a non-empty output
    pub fn finalize(in_progress: &Path) -> Result<PathBuf, NanoError> {
        let size = match std::fs::metadata(in_progress) {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };
        if size == 0 {
            return Err(NanoError::AdapterExecution {
                tool: "ffmpeg",
                file: in_progress.to_path_buf(),
                reason: "Optimized file not created".to_string(),
            });
        }

        let done = PathResolver::finalized_path(in_progress);
        std::fs::rename(in_progress, &done)?;
        Ok(done)
    }

    /// InProgress → Unprocessed: drop the attempted output, if any
    pub fn rollback(in_progress: &Path) {
        if in_progress.exists() {
            match std::fs::remove_file(in_progress) {
                Ok(()) => info!("Removed failed output '{}'.", in_progress.display()),
                Err(e) => warn!("Could not remove failed output '{}': {}", in_progress.display(), e),
            }
        }
    }

    /// Done → unmarked: strip the marker unless that would overwrite a file
    pub fn untag(done: &Path) -> Result<PathBuf, NanoError> {
        let target = PathResolver::untagged_path(done);
        if target.exists() {
            return Err(NanoError::NameCollision(target));
        }
        std::fs::rename(done, &target)?;
        Ok(target)
    }

    /// Eligibility rule for an original: not yet Done, and either forced or
    /// not already in the target codec
    pub fn check_eligible(file: &MediaFile, info: Option<&VideoInfo>, force: bool) -> Result<(), SkipReason> {
        debug_assert!(file.is_original(), "marked files never enter a batch");
        if Self::state_of(&file.path) == LifecycleState::Done {
            return Err(SkipReason::AlreadyOptimized);
        }
        if !force && info.map(VideoInfo::is_target_codec).unwrap_or(false) {
            return Err(SkipReason::AlreadyTargetCodec);
        }
        Ok(())
    }

    /// Probe `path` and report whether its video stream is already HEVC
    pub async fn is_target_codec_already<B: VideoBackend>(backend: &B, path: &Path) -> Result<bool, NanoError> {
        Ok(backend.probe(path).await?.is_target_codec())
    }

    /// Run the eligibility policy over a scan, probing each candidate once
    pub async fn select_eligible<B: VideoBackend>(
        backend: &B,
        files: &[MediaFile],
        force: bool,
    ) -> Eligibility {
        let mut result = Eligibility::default();

        let mut candidates: Vec<&MediaFile> = files.iter().filter(|f| f.is_original()).collect();
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        candidates.dedup_by(|a, b| a.path == b.path);

        for file in candidates {
            if Self::state_of(&file.path) == LifecycleState::InProgress {
                info!("'{}' has an unfinished encode. It will be restarted.", file.name());
            }
            if let Err(reason) = Self::check_eligible(file, None, force) {
                info!("'{}' has optimized version. Skipping.", file.name());
                result.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason,
                });
                continue;
            }

            let info = match backend.probe(&file.path).await {
                Ok(info) => info,
                Err(e) => {
                    warn!("Failed to probe '{}': {}", file.path.display(), e);
                    result.failed.push(FailedFile {
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match Self::check_eligible(file, Some(&info), force) {
                Ok(()) => result.eligible.push(EligibleFile {
                    path: file.path.clone(),
                    info,
                }),
                Err(reason) => {
                    info!("'{}' is already h.265 encoded. Skipping.", file.name());
                    result.skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason,
                    });
                }
            }
        }

        result
    }
}
