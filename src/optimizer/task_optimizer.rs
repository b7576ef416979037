//! # Task Optimizer Module
//!
//! Encodes a single original: claim, encode while streaming progress, validate,
//! finalize, then the optional post-actions. Every failure comes back as a
//! value so the batch can record it and move on.

use crate::config::OptimizeConfig;
use crate::error::NanoError;
use crate::file_manager::FileManager;
use crate::lifecycle::Lifecycle;
use crate::optimizer::progress_tracker::ProgressAggregator;
use crate::progress::Reporter;
use crate::video_processor::{EncodeRequest, VideoBackend};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a successful encode
#[derive(Debug, Clone, Serialize)]
pub struct EncodeResult {
    pub original: PathBuf,
    /// Final location of the encoded file (untagged if `untag_after` succeeded)
    pub output: PathBuf,
    pub original_size: u64,
    pub optimized_size: u64,
    pub encode_duration: Duration,
    /// Source duration in seconds
    pub source_duration: f64,
}

impl EncodeResult {
    /// Bytes saved; negative when the file grew
    pub fn disk_space_change(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }

    /// Seconds of video encoded per second of wall time
    pub fn speed_factor(&self) -> f64 {
        let elapsed = self.encode_duration.as_secs_f64();
        if elapsed > 0.0 {
            self.source_duration / elapsed
        } else {
            0.0
        }
    }
}

/// What happened to one file of the batch
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Encoded(EncodeResult),
    Failed(String),
}

/// Worker for single-file encodes
pub struct TaskOptimizer<'a, B: VideoBackend> {
    config: &'a OptimizeConfig,
    backend: &'a B,
}

impl<'a, B: VideoBackend> TaskOptimizer<'a, B> {
    pub fn new(config: &'a OptimizeConfig, backend: &'a B) -> Self {
        Self { config, backend }
    }

    /// Encode `original` and run post-actions
    pub async fn process<R: Reporter + ?Sized>(
        &self,
        original: &Path,
        source_duration: f64,
        progress: &mut ProgressAggregator,
        reporter: &mut R,
    ) -> Result<EncodeResult, NanoError> {
        let original_size = FileManager::file_size(original)?;
        let in_progress = Lifecycle::claim(original)?;
        let request = EncodeRequest::from_config(self.config, original, &in_progress);

        info!("Starting encoding for '{}'.", original.display());
        let start = Instant::now();

        let encoded = self
            .backend
            .encode(&request, &mut |line: &str| {
                debug!("{}", line.trim());
                if progress.consume_line(line).is_some() {
                    reporter.progress(progress.current_file_seconds(), progress.overall_seconds());
                }
            })
            .await;
        let encode_duration = start.elapsed();

        if let Err(e) = encoded {
            Lifecycle::rollback(&in_progress);
            return Err(e);
        }

        let done = match Lifecycle::finalize(&in_progress) {
            Ok(done) => done,
            Err(e) => {
                Lifecycle::rollback(&in_progress);
                return Err(e);
            }
        };
        let optimized_size = FileManager::file_size(&done)?;

        let mut result = EncodeResult {
            original: original.to_path_buf(),
            output: done,
            original_size,
            optimized_size,
            encode_duration,
            source_duration,
        };
        Self::log_report(&result);

        self.run_post_actions(&mut result);
        Ok(result)
    }

    /// Delete-after then untag-after; failures only warn
    fn run_post_actions(&self, result: &mut EncodeResult) {
        if self.config.delete_after {
            match FileManager::remove(&result.original, self.config.delete_mode) {
                Ok(()) => info!(
                    "Removed original '{}' ({:?}).",
                    result.original.display(),
                    self.config.delete_mode
                ),
                Err(e) => warn!("Could not delete original: {}", e),
            }
        }

        if self.config.untag_after {
            match Lifecycle::untag(&result.output) {
                Ok(untagged) => {
                    info!("Untagged '{}' → '{}'.", result.output.display(), untagged.display());
                    result.output = untagged;
                }
                Err(e) => warn!("Could not untag '{}': {}", result.output.display(), e),
            }
        }
    }

    fn log_report(result: &EncodeResult) {
        info!(
            "Finished encoding '{}'. Duration: {} ({:.2}x). Size: {} → {}. Disk space: {}.",
            result.original.display(),
            FileManager::format_duration(result.encode_duration.as_secs_f64()),
            result.speed_factor(),
            FileManager::format_size(result.original_size),
            FileManager::format_size(result.optimized_size),
            FileManager::format_size_change(result.disk_space_change()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_result_metrics() {
        let result = EncodeResult {
            original: PathBuf::from("A.mp4"),
            output: PathBuf::from("A.optimized.mp4"),
            original_size: 2_000,
            optimized_size: 500,
            encode_duration: Duration::from_secs(60),
            source_duration: 120.0,
        };
        assert_eq!(result.disk_space_change(), 1_500);
        assert_eq!(result.speed_factor(), 2.0);

        let grown = EncodeResult {
            optimized_size: 3_000,
            encode_duration: Duration::ZERO,
            ..result
        };
        assert_eq!(grown.disk_space_change(), -1_000);
        assert_eq!(grown.speed_factor(), 0.0);
    }
}
