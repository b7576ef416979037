//! # Batch Orchestrator
//!
//! Drives a whole optimize run: scan, eligibility, up-front duration probing,
//! then a strictly sequential encode loop feeding one `ProgressAggregator`.
//! A failed file is recorded and skipped; only the halt-on-increase policy
//! stops the loop early.

use crate::classifier::FileClassifier;
use crate::config::OptimizeConfig;
use crate::error::NanoError;
use crate::file_manager::FileManager;
use crate::lifecycle::Lifecycle;
use crate::optimizer::progress_tracker::ProgressAggregator;
use crate::optimizer::task_optimizer::{EncodeResult, FileOutcome, TaskOptimizer};
use crate::progress::Reporter;
use crate::video_processor::VideoBackend;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Why an original did not enter the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An `.optimized` sibling already exists
    AlreadyOptimized,
    /// The video stream is already HEVC (overridable with `--force`)
    AlreadyTargetCodec,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate result of an optimize run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub directory: PathBuf,
    pub elapsed: Duration,
    /// Sum of `disk_space_change` over `processed`
    pub disk_space_change: i64,
    /// In claim order
    pub processed: Vec<EncodeResult>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
    /// File whose growth stopped the batch
    pub halted_on: Option<PathBuf>,
}

impl BatchReport {
    fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            elapsed: Duration::ZERO,
            disk_space_change: 0,
            processed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            halted_on: None,
        }
    }

    fn record(&mut self, result: EncodeResult) {
        self.disk_space_change += result.disk_space_change();
        self.processed.push(result);
    }
}

/// Main optimize orchestrator
pub struct BatchOrchestrator<'a, B: VideoBackend, R: Reporter + ?Sized> {
    config: OptimizeConfig,
    backend: &'a B,
    reporter: &'a mut R,
}

impl<'a, B: VideoBackend, R: Reporter + ?Sized> BatchOrchestrator<'a, B, R> {
    pub fn new(config: OptimizeConfig, backend: &'a B, reporter: &'a mut R) -> Self {
        Self {
            config,
            backend,
            reporter,
        }
    }

    /// Run the batch. Errors are global precondition failures only.
    pub async fn run(&mut self) -> Result<BatchReport> {
        self.config.validate()?;
        let directory = self.config.directory.clone();
        FileManager::validate_directory(&directory)?;

        let start = Instant::now();
        let mut report = BatchReport::new(directory.clone());

        let files = FileClassifier::scan(&directory);
        if files.is_empty() {
            return Err(NanoError::EmptyDirectory(directory).into());
        }

        let eligibility = Lifecycle::select_eligible(self.backend, &files, self.config.force).await;
        report.skipped = eligibility.skipped;
        report.failed = eligibility.failed;
        let eligible = eligibility.eligible;

        info!(
            "Found {} original video files in '{}'.",
            eligible.len(),
            directory.display()
        );

        if eligible.is_empty() {
            info!("Found no original videos to optimize.");
            report.elapsed = start.elapsed();
            self.reporter.batch_finished(&report);
            return Ok(report);
        }

        info!("Starting processing for '{}'..", directory.display());
        let mut progress = ProgressAggregator::new(eligible.iter().map(|f| f.info.duration));
        self.reporter
            .batch_started(&directory, eligible.len(), progress.overall_total());

        let task = TaskOptimizer::new(&self.config, self.backend);

        for (index, file) in eligible.iter().enumerate() {
            let duration = file.info.duration;
            progress.begin_file(duration);
            self.reporter.file_started(&file.path, index, duration);

            let outcome = match task
                .process(&file.path, duration, &mut progress, &mut *self.reporter)
                .await
            {
                Ok(result) => FileOutcome::Encoded(result),
                Err(e) => {
                    error!("Failed to process '{}': {}", file.path.display(), e);
                    FileOutcome::Failed(e.to_string())
                }
            };

            progress.finish_file();
            self.reporter
                .progress(progress.current_file_seconds(), progress.overall_seconds());
            self.reporter.file_finished(&file.path, &outcome);

            match outcome {
                FileOutcome::Encoded(result) => {
                    let grew = result.disk_space_change() < 0;
                    report.record(result);

                    if self.config.halt_on_increase && grew {
                        warn!(
                            "Halting optimization as '{}' size increased.",
                            file.path.display()
                        );
                        report.halted_on = Some(file.path.clone());
                        break;
                    }
                }
                FileOutcome::Failed(error) => report.failed.push(FailedFile {
                    path: file.path.clone(),
                    error,
                }),
            }
        }

        report.elapsed = start.elapsed();
        info!(
            "Completed optimizing '{}'. Total duration: {}. Total disk space: {}.",
            directory.display(),
            FileManager::format_duration(report.elapsed.as_secs_f64()),
            FileManager::format_size_change(report.disk_space_change),
        );

        self.reporter.batch_finished(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_manager::RemovalMode;
    use crate::progress::NoopReporter;
    use crate::video_processor::{EncodeRequest, VideoInfo};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes a fixed-size output per input file name; `None` means the encode fails
    #[derive(Default)]
    struct ScriptedBackend {
        output_sizes: HashMap<String, Option<usize>>,
        codecs: HashMap<String, String>,
        encoded: RefCell<Vec<String>>,
        /// Delete each input once its output is written
        consume_inputs: bool,
    }

    impl ScriptedBackend {
        fn with_output(mut self, name: &str, size: Option<usize>) -> Self {
            self.output_sizes.insert(name.to_string(), size);
            self
        }

        fn with_codec(mut self, name: &str, codec: &str) -> Self {
            self.codecs.insert(name.to_string(), codec.to_string());
            self
        }

        fn name(path: &Path) -> String {
            path.file_name().unwrap().to_string_lossy().into_owned()
        }
    }

    impl VideoBackend for ScriptedBackend {
        async fn probe(&self, path: &Path) -> Result<VideoInfo, NanoError> {
            let codec = self
                .codecs
                .get(&Self::name(path))
                .cloned()
                .unwrap_or_else(|| "h264".to_string());
            Ok(VideoInfo {
                duration: 10.0,
                width: 1920,
                height: 1080,
                codec,
            })
        }

        async fn encode(
            &self,
            request: &EncodeRequest<'_>,
            on_line: &mut dyn FnMut(&str),
        ) -> Result<(), NanoError> {
            let name = Self::name(request.input);
            self.encoded.borrow_mut().push(name.clone());
            on_line("out_time_us=5000000");
            on_line("progress=continue");

            match self.output_sizes.get(&name).copied().unwrap_or(Some(1)) {
                Some(size) => {
                    std::fs::write(request.output, vec![0u8; size])?;
                    if self.consume_inputs {
                        std::fs::remove_file(request.input)?;
                    }
                    on_line("progress=end");
                    Ok(())
                }
                None => {
                    std::fs::write(request.output, b"partial")?;
                    Err(NanoError::AdapterExecution {
                        tool: "ffmpeg",
                        file: request.input.to_path_buf(),
                        reason: "exit status: 1".to_string(),
                    })
                }
            }
        }

        async fn compare(&self, _original: &Path, _optimized: &Path) -> Result<String, NanoError> {
            Ok(String::new())
        }
    }

    fn write(dir: &Path, name: &str, size: usize) {
        std::fs::write(dir.join(name), vec![1u8; size]).unwrap();
    }

    #[tokio::test]
    async fn test_only_unpaired_originals_are_encoded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 2_000);
        write(dir.path(), "B.mp4", 2_000);
        write(dir.path(), "B.optimized.mp4", 500);

        let backend = ScriptedBackend::default().with_output("A.mp4", Some(800));
        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(OptimizeConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(*backend.encoded.borrow(), vec!["A.mp4"]);
        assert!(dir.path().join("A.optimized.mp4").exists());
        assert!(dir.path().join("A.mp4").exists());
        assert!(!dir.path().join("A.optimizing.mp4").exists());
        assert_eq!(report.disk_space_change, 1_200);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::AlreadyOptimized);
    }

    #[tokio::test]
    async fn test_failure_is_rolled_back_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);
        write(dir.path(), "B.mp4", 1_000);

        let backend = ScriptedBackend::default()
            .with_output("A.mp4", None)
            .with_output("B.mp4", Some(100));
        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(OptimizeConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, dir.path().join("A.mp4"));
        assert!(!dir.path().join("A.optimizing.mp4").exists());
        assert!(!dir.path().join("A.optimized.mp4").exists());
        assert!(dir.path().join("B.optimized.mp4").exists());
        assert_eq!(report.disk_space_change, 900);
    }

    #[tokio::test]
    async fn test_empty_output_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);

        let backend = ScriptedBackend::default().with_output("A.mp4", Some(0));
        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(OptimizeConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.processed.is_empty());
        assert!(!dir.path().join("A.optimizing.mp4").exists());
    }

    #[tokio::test]
    async fn test_halt_on_increase_keeps_prefix_accounting() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);
        write(dir.path(), "B.mp4", 1_000);
        write(dir.path(), "C.mp4", 1_000);

        let backend = ScriptedBackend::default()
            .with_output("A.mp4", Some(400))
            .with_output("B.mp4", Some(1_500))
            .with_output("C.mp4", Some(100));
        let mut config = OptimizeConfig::new(dir.path());
        config.halt_on_increase = true;

        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(*backend.encoded.borrow(), vec!["A.mp4", "B.mp4"]);
        assert_eq!(report.halted_on, Some(dir.path().join("B.mp4")));
        assert!(dir.path().join("B.optimized.mp4").exists());
        assert!(!dir.path().join("C.optimized.mp4").exists());

        let sum: i64 = report.processed.iter().map(|r| r.disk_space_change()).sum();
        assert_eq!(report.disk_space_change, sum);
        assert_eq!(report.disk_space_change, 600 - 500);
    }

    #[tokio::test]
    async fn test_hevc_sources_need_force() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mkv", 1_000);

        let backend = ScriptedBackend::default().with_codec("A.mkv", "hevc");
        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(OptimizeConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap();
        assert!(report.processed.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::AlreadyTargetCodec);

        let mut config = OptimizeConfig::new(dir.path());
        config.force = true;
        let report = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();
        assert_eq!(report.processed.len(), 1);
    }

    #[tokio::test]
    async fn test_post_actions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);

        let backend = ScriptedBackend::default().with_output("A.mp4", Some(10));
        let mut config = OptimizeConfig::new(dir.path());
        config.untag_after = true;

        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        // The original still exists, so untagging collides and is skipped
        assert_eq!(report.processed[0].output, dir.path().join("A.optimized.mp4"));
        assert!(dir.path().join("A.optimized.mp4").exists());
    }

    #[tokio::test]
    async fn test_delete_then_untag_takes_original_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);

        let backend = ScriptedBackend::default().with_output("A.mp4", Some(300));
        let mut config = OptimizeConfig::new(dir.path());
        config.delete_after = true;
        config.delete_mode = RemovalMode::Permanent;
        config.untag_after = true;

        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        let original = dir.path().join("A.mp4");
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.processed[0].output, original);
        assert_eq!(std::fs::metadata(&original).unwrap().len(), 300);
        assert!(!dir.path().join("A.optimized.mp4").exists());
        assert_eq!(report.disk_space_change, 700);
    }

    #[tokio::test]
    async fn test_failed_delete_after_keeps_batch_going() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.mp4", 1_000);
        write(dir.path(), "B.mp4", 1_000);

        let mut backend = ScriptedBackend::default()
            .with_output("A.mp4", Some(200))
            .with_output("B.mp4", Some(200));
        backend.consume_inputs = true;
        let mut config = OptimizeConfig::new(dir.path());
        config.delete_after = true;
        config.delete_mode = RemovalMode::Permanent;

        let mut reporter = NoopReporter;
        let report = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(*backend.encoded.borrow(), vec!["A.mp4", "B.mp4"]);
        assert_eq!(report.processed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(dir.path().join("A.optimized.mp4").exists());
        assert!(dir.path().join("B.optimized.mp4").exists());
        assert_eq!(report.disk_space_change, 1_600);
    }

    #[tokio::test]
    async fn test_global_preconditions() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::default();
        let mut reporter = NoopReporter;

        let err = BatchOrchestrator::new(OptimizeConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<NanoError>(), Some(NanoError::EmptyDirectory(_))));

        let mut config = OptimizeConfig::new(dir.path());
        config.crf = 60;
        let err = BatchOrchestrator::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NanoError>(),
            Some(NanoError::InvalidConfiguration(_))
        ));
    }
}
