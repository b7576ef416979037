//! # Health Check Module
//!
//! Estimates the perceptual quality of finished encodes by running an SSIM
//! comparison over a random sample of original/optimized pairs.
//!
//! ## Per-pair flow:
//! 1. Size difference (always reported)
//! 2. Probe both files; differing resolutions cannot be compared
//! 3. `ffmpeg ... ssim` under a wall-clock timeout, raw report appended to
//!    the adapter log
//! 4. Last `All:<score>` of the report → `Grade` and `Severity`
//!
//! A failing pair becomes a `Failed` row; only "no pairs at all" and bad
//! configuration abort the check.

use crate::classifier::FileClassifier;
use crate::config::HealthConfig;
use crate::error::NanoError;
use crate::file_manager::FileManager;
use crate::progress::Reporter;
use crate::video_processor::VideoBackend;
use anyhow::Result;
use rand::Rng;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Scores at or above this are `Normal`
pub const HEALTHY_SCORE: f64 = 0.990;
/// Scores at or above this (and below `HEALTHY_SCORE`) are `Warning`
pub const WARNING_SCORE: f64 = 0.980;

/// Human-readable SSIM grade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Identical,
    Excellent,
    VeryGood,
    Good,
    Fair,
    Poor,
    Bad,
    VeryBad,
    Unusable,
    Broken,
    Garbage,
}

impl Grade {
    /// Descending thresholds, applied to the score rounded to 3 decimals
    const THRESHOLDS: [(f64, Grade); 10] = [
        (1.000, Grade::Identical),
        (0.990, Grade::Excellent),
        (0.970, Grade::VeryGood),
        (0.950, Grade::Good),
        (0.900, Grade::Fair),
        (0.850, Grade::Poor),
        (0.700, Grade::Bad),
        (0.500, Grade::VeryBad),
        (0.300, Grade::Unusable),
        (0.100, Grade::Broken),
    ];

    pub fn from_score(score: f64) -> Self {
        let rounded = round3(score);
        Self::THRESHOLDS
            .iter()
            .find(|(threshold, _)| rounded >= *threshold)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::Garbage)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Identical => "Identical",
            Grade::Excellent => "Excellent",
            Grade::VeryGood => "Very Good",
            Grade::Good => "Good",
            Grade::Fair => "Fair",
            Grade::Poor => "Poor",
            Grade::Bad => "Bad",
            Grade::VeryBad => "Very Bad",
            Grade::Unusable => "Unusable",
            Grade::Broken => "Broken",
            Grade::Garbage => "Garbage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// A file that did not shrink is always critical
    pub fn classify(score: f64, size_diff: i64) -> Self {
        let rounded = round3(score);
        if size_diff >= 0 {
            Severity::Critical
        } else if rounded >= HEALTHY_SCORE {
            Severity::Normal
        } else if rounded >= WARNING_SCORE {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }
}

/// What the comparison of one pair produced
#[derive(Debug, Clone, PartialEq)]
pub enum HealthOutcome {
    Scored { score: f64, grade: Grade },
    ResolutionMismatch,
    Failed(String),
}

/// One row of the health report
#[derive(Debug, Clone)]
pub struct HealthRow {
    pub original: PathBuf,
    pub optimized: PathBuf,
    /// `optimized - original` in bytes; negative means space saved
    pub size_diff: i64,
    pub outcome: HealthOutcome,
}

impl HealthRow {
    pub fn severity(&self) -> Severity {
        match &self.outcome {
            HealthOutcome::Scored { score, .. } => Severity::classify(*score, self.size_diff),
            HealthOutcome::ResolutionMismatch | HealthOutcome::Failed(_) => Severity::Critical,
        }
    }

    pub fn score_text(&self) -> String {
        match &self.outcome {
            HealthOutcome::Scored { score, .. } => format!("{:.3}", score),
            _ => "-".to_string(),
        }
    }

    pub fn grade_text(&self) -> &'static str {
        match &self.outcome {
            HealthOutcome::Scored { grade, .. } => grade.label(),
            HealthOutcome::ResolutionMismatch => "Varying resolutions, unable to compare",
            HealthOutcome::Failed(_) => "Analysis failed",
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Number of pairs drawn for a ratio: `floor(n * ratio)`, at least one
pub fn sample_size(pair_count: usize, ratio: f64) -> usize {
    ((pair_count as f64 * ratio).floor() as usize).max(1)
}

/// `All:<float>` matcher, compiled once per process
fn ssim_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"All:(\d+\.\d+)").ok()).as_ref()
}

/// Last `All:<float>` value of an SSIM report
pub fn parse_ssim(report: &str) -> Option<f64> {
    ssim_pattern()?
        .captures_iter(report)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Samples pairs and grades them
pub struct SamplingAnalyzer<'a, B: VideoBackend, R: Reporter + ?Sized> {
    config: HealthConfig,
    backend: &'a B,
    reporter: &'a mut R,
    adapter_log: Option<PathBuf>,
}

impl<'a, B: VideoBackend, R: Reporter + ?Sized> SamplingAnalyzer<'a, B, R> {
    pub fn new(config: HealthConfig, backend: &'a B, reporter: &'a mut R) -> Self {
        Self {
            config,
            backend,
            reporter,
            adapter_log: None,
        }
    }

    /// Append raw comparison reports to this file
    pub fn with_adapter_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.adapter_log = Some(path.into());
        self
    }

    pub async fn run(&mut self) -> Result<Vec<HealthRow>> {
        self.config.validate()?;
        let directory = self.config.directory.clone();
        FileManager::validate_directory(&directory)?;

        let pairs = FileClassifier::pairs(&FileClassifier::scan(&directory));
        if pairs.is_empty() {
            return Err(NanoError::NoPairsFound(directory).into());
        }

        let sample = self.select_sample(&pairs);
        info!(
            "Performing healthcheck for '{}' on {} of {} pair(s).",
            directory.display(),
            sample.len(),
            pairs.len()
        );
        self.reporter.health_started(&directory, sample.len());

        let mut rows = Vec::with_capacity(sample.len());
        for (original, optimized) in sample {
            let row = self.check_pair(original, optimized).await;
            self.reporter.pair_checked(&row);
            rows.push(row);
        }

        self.reporter.health_finished(&rows);
        Ok(rows)
    }

    /// Every pair in scan order, or a draw with replacement
    fn select_sample<'p>(&self, pairs: &'p [(PathBuf, PathBuf)]) -> Vec<&'p (PathBuf, PathBuf)> {
        if self.config.all {
            return pairs.iter().collect();
        }

        let size = sample_size(pairs.len(), self.config.sample_ratio);
        let mut rng = rand::thread_rng();
        (0..size)
            .map(|_| &pairs[rng.gen_range(0..pairs.len())])
            .collect()
    }

    async fn check_pair(&self, original: &Path, optimized: &Path) -> HealthRow {
        let size_diff = match (FileManager::file_size(original), FileManager::file_size(optimized)) {
            (Ok(o), Ok(n)) => n as i64 - o as i64,
            _ => 0,
        };

        let outcome = match self.compare(original, optimized).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Failed to compare '{}' with '{}': {}",
                    original.display(),
                    optimized.display(),
                    e
                );
                HealthOutcome::Failed(e.to_string())
            }
        };

        HealthRow {
            original: original.to_path_buf(),
            optimized: optimized.to_path_buf(),
            size_diff,
            outcome,
        }
    }

    async fn compare(&self, original: &Path, optimized: &Path) -> Result<HealthOutcome, NanoError> {
        let source = self.backend.probe(original).await?;
        let encoded = self.backend.probe(optimized).await?;
        if source.resolution() != encoded.resolution() {
            info!(
                "Skipping '{}': resolutions differ ({:?} vs {:?}).",
                original.display(),
                source.resolution(),
                encoded.resolution()
            );
            return Ok(HealthOutcome::ResolutionMismatch);
        }

        let timeout = self.config.comparison_timeout;
        let report = tokio::time::timeout(timeout, self.backend.compare(original, optimized))
            .await
            .map_err(|_| NanoError::AdapterTimeout {
                tool: "ffmpeg",
                file: original.to_path_buf(),
                seconds: timeout.as_secs(),
            })??;

        self.append_to_log(original, optimized, &report);

        let score = parse_ssim(&report).ok_or_else(|| NanoError::AdapterExecution {
            tool: "ffmpeg",
            file: original.to_path_buf(),
            reason: "no SSIM score in comparison output".to_string(),
        })?;
        Ok(HealthOutcome::Scored {
            score,
            grade: Grade::from_score(score),
        })
    }

    fn append_to_log(&self, original: &Path, optimized: &Path, report: &str) {
        let Some(path) = &self.adapter_log else {
            return;
        };

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                writeln!(file, "--- ssim '{}' vs '{}'", original.display(), optimized.display())?;
                file.write_all(report.as_bytes())?;
                writeln!(file)
            });
        if let Err(e) = written {
            warn!("Could not write to '{}': {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use crate::video_processor::{EncodeRequest, VideoInfo};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Reports a fixed score; files named `*wide*` probe at a different width
    struct SsimBackend {
        report: String,
        delay: Duration,
    }

    impl SsimBackend {
        fn scoring(score: &str) -> Self {
            Self {
                report: format!(
                    "[Parsed_ssim_0] SSIM Y:0.9 (10.0) All:0.5 (3.0)\n[Parsed_ssim_0] SSIM Y:0.99 All:{} (20.0)\n",
                    score
                ),
                delay: Duration::ZERO,
            }
        }
    }

    impl VideoBackend for SsimBackend {
        async fn probe(&self, path: &Path) -> Result<VideoInfo, NanoError> {
            let wide = path.to_string_lossy().contains("wide.optimized");
            Ok(VideoInfo {
                duration: 1.0,
                width: if wide { 1280 } else { 1920 },
                height: 1080,
                codec: "h264".to_string(),
            })
        }

        async fn encode(
            &self,
            _request: &EncodeRequest<'_>,
            _on_line: &mut dyn FnMut(&str),
        ) -> Result<(), NanoError> {
            Ok(())
        }

        async fn compare(&self, _original: &Path, _optimized: &Path) -> Result<String, NanoError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.report.clone())
        }
    }

    fn make_pair(dir: &Path, stem: &str, original: usize, optimized: usize) {
        std::fs::write(dir.join(format!("{}.mp4", stem)), vec![0u8; original]).unwrap();
        std::fs::write(dir.join(format!("{}.optimized.mp4", stem)), vec![0u8; optimized]).unwrap();
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(sample_size(40, 0.05), 2);
        assert_eq!(sample_size(10, 0.05), 1);
        assert_eq!(sample_size(1, 1.0), 1);
        assert_eq!(sample_size(7, 0.5), 3);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(1.0), Grade::Identical);
        assert_eq!(Grade::from_score(0.9996), Grade::Identical);
        assert_eq!(Grade::from_score(0.99), Grade::Excellent);
        assert_eq!(Grade::from_score(0.975), Grade::VeryGood);
        assert_eq!(Grade::from_score(0.95), Grade::Good);
        assert_eq!(Grade::from_score(0.91), Grade::Fair);
        assert_eq!(Grade::from_score(0.86), Grade::Poor);
        assert_eq!(Grade::from_score(0.7), Grade::Bad);
        assert_eq!(Grade::from_score(0.5), Grade::VeryBad);
        assert_eq!(Grade::from_score(0.3), Grade::Unusable);
        assert_eq!(Grade::from_score(0.1), Grade::Broken);
        assert_eq!(Grade::from_score(0.05), Grade::Garbage);
        assert_eq!(Grade::VeryBad.label(), "Very Bad");
    }

    #[test]
    fn test_severity() {
        assert_eq!(Severity::classify(0.995, -100), Severity::Normal);
        assert_eq!(Severity::classify(0.985, -100), Severity::Warning);
        assert_eq!(Severity::classify(0.95, -100), Severity::Critical);
        assert_eq!(Severity::classify(1.0, 0), Severity::Critical);
        assert_eq!(Severity::classify(1.0, 10), Severity::Critical);
    }

    #[test]
    fn test_parse_ssim_takes_last_match() {
        let report = "n:1 All:0.910000 (10.4)\nn:2 All:0.950000\nSSIM Y:0.99 All:0.987654 (19.1)";
        assert_eq!(parse_ssim(report), Some(0.987654));
        assert_eq!(parse_ssim("no score here"), None);
        assert_eq!(parse_ssim("All:inf"), None);
    }

    #[test]
    fn test_ssim_pattern_is_compiled_once() {
        let first = ssim_pattern().unwrap();
        let second = ssim_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn test_no_pairs_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.mp4"), b"x").unwrap();

        let backend = SsimBackend::scoring("0.99");
        let mut reporter = NoopReporter;
        let err = SamplingAnalyzer::new(HealthConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<NanoError>(), Some(NanoError::NoPairsFound(_))));
    }

    #[tokio::test]
    async fn test_all_checks_every_pair_once() {
        let dir = TempDir::new().unwrap();
        make_pair(dir.path(), "a", 1_000, 400);
        make_pair(dir.path(), "b", 1_000, 1_200);
        make_pair(dir.path(), "wide", 1_000, 400);
        let log = dir.path().join("ffmpeg.log");

        let mut config = HealthConfig::new(dir.path());
        config.all = true;
        let backend = SsimBackend::scoring("0.995000");
        let mut reporter = NoopReporter;
        let rows = SamplingAnalyzer::new(config, &backend, &mut reporter)
            .with_adapter_log(&log)
            .run()
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].original, dir.path().join("a.mp4"));
        assert_eq!(rows[0].size_diff, -600);
        assert_eq!(rows[0].severity(), Severity::Normal);
        assert_eq!(rows[0].grade_text(), "Excellent");

        // Grew, so critical regardless of score
        assert_eq!(rows[1].size_diff, 200);
        assert_eq!(rows[1].severity(), Severity::Critical);

        assert_eq!(rows[2].outcome, HealthOutcome::ResolutionMismatch);
        assert_eq!(rows[2].severity(), Severity::Critical);

        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged.matches("All:0.995000").count(), 2);
    }

    #[tokio::test]
    async fn test_sample_is_drawn_from_pairs() {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            make_pair(dir.path(), &format!("clip{:02}", i), 100, 50);
        }

        let backend = SsimBackend::scoring("0.99");
        let mut reporter = NoopReporter;
        let rows = SamplingAnalyzer::new(HealthConfig::new(dir.path()), &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in rows {
            assert!(row.original.exists());
            assert!(row.optimized.to_string_lossy().ends_with(".optimized.mp4"));
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_row() {
        let dir = TempDir::new().unwrap();
        make_pair(dir.path(), "a", 1_000, 400);

        let backend = SsimBackend {
            delay: Duration::from_secs(5),
            ..SsimBackend::scoring("0.99")
        };
        let mut config = HealthConfig::new(dir.path());
        config.all = true;
        config.comparison_timeout = Duration::from_millis(20);

        let mut reporter = NoopReporter;
        let rows = SamplingAnalyzer::new(config, &backend, &mut reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].outcome, HealthOutcome::Failed(_)));
        assert_eq!(rows[0].grade_text(), "Analysis failed");
        assert_eq!(rows[0].severity(), Severity::Critical);
    }
}
