//! # Progress Reporting Module
//!
//! The optimizer and the health check never print directly: they report
//! through a `Reporter` handed to them by the command.
//!
//! ## Implementations:
//! - `ConsoleReporter`: `indicatif` bars (overall + current file) and a
//!   colored summary
//! - `JsonReporter` (in `json_output`): one JSON event per line on stdout
//! - `NoopReporter`: swallows everything, used by tests
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [██████████████████>-------------------] 47% ETA 00:02:31 Optimizing '…/Movies/2019'
//!   Holiday.mp4 [███████████████>-----------------------] 38%
//! ```

use crate::file_manager::FileManager;
use crate::health::HealthRow;
use crate::optimizer::media_optimizer::{BatchReport, SkipReason};
use crate::optimizer::task_optimizer::FileOutcome;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Receives batch and health-check events
pub trait Reporter {
    fn batch_started(&mut self, _directory: &Path, _files: usize, _total_seconds: f64) {}

    fn file_started(&mut self, _file: &Path, _index: usize, _duration: f64) {}

    fn progress(&mut self, _current_file_seconds: f64, _overall_seconds: f64) {}

    fn file_finished(&mut self, _file: &Path, _outcome: &FileOutcome) {}

    fn batch_finished(&mut self, _report: &BatchReport) {}

    fn health_started(&mut self, _directory: &Path, _pairs: usize) {}

    fn pair_checked(&mut self, _row: &HealthRow) {}

    fn health_finished(&mut self, _rows: &[HealthRow]) {}
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn batch_started(&mut self, directory: &Path, files: usize, total_seconds: f64) {
        (**self).batch_started(directory, files, total_seconds)
    }

    fn file_started(&mut self, file: &Path, index: usize, duration: f64) {
        (**self).file_started(file, index, duration)
    }

    fn progress(&mut self, current_file_seconds: f64, overall_seconds: f64) {
        (**self).progress(current_file_seconds, overall_seconds)
    }

    fn file_finished(&mut self, file: &Path, outcome: &FileOutcome) {
        (**self).file_finished(file, outcome)
    }

    fn batch_finished(&mut self, report: &BatchReport) {
        (**self).batch_finished(report)
    }

    fn health_started(&mut self, directory: &Path, pairs: usize) {
        (**self).health_started(directory, pairs)
    }

    fn pair_checked(&mut self, row: &HealthRow) {
        (**self).pair_checked(row)
    }

    fn health_finished(&mut self, rows: &[HealthRow]) {
        (**self).health_finished(rows)
    }
}

/// Reporter that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Terminal reporter built on `indicatif`
pub struct ConsoleReporter {
    multi: MultiProgress,
    overall: Option<ProgressBar>,
    current: Option<ProgressBar>,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: None,
            current: None,
        }
    }

    fn overall_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% ETA {eta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn file_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:40.yellow/blue}] {percent}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn file_name(file: &Path) -> String {
        file.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }

    /// Last `depth` components of a path, for compact bar labels
    pub fn shorten_path(path: &Path, depth: usize) -> String {
        let components: Vec<_> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if components.len() <= depth {
            return path.display().to_string();
        }
        format!("…/{}", components[components.len() - depth..].join("/"))
    }

    fn print_summary(report: &BatchReport) {
        let already_hevc = report
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::AlreadyTargetCodec)
            .count();

        println!();
        if let Some(halted) = &report.halted_on {
            println!(
                "{} Halting optimization as '{}' size increased. Try increasing your CRF.",
                "!".yellow(),
                Self::file_name(halted)
            );
        }
        println!(
            "{} optimizing {}!",
            "All done".green(),
            report.directory.display().to_string().bold()
        );
        println!(
            "Total duration: {}",
            FileManager::format_duration(report.elapsed.as_secs_f64()).yellow()
        );

        let change = FileManager::format_size(report.disk_space_change.unsigned_abs());
        let verdict = if report.disk_space_change > 0 {
            "saved".green()
        } else {
            "increased".red()
        };
        println!("Total disk space: {} {}", change.yellow(), verdict);
        println!(
            "Optimized: {}  Skipped: {}  Failed: {}",
            report.processed.len(),
            report.skipped.len(),
            report.failed.len()
        );

        if already_hevc > 0 {
            println!(
                "Skipped {} video(s) already in h.265 format. Use --force to encode them anyway.",
                already_hevc.to_string().blue()
            );
        }
        for failure in &report.failed {
            println!("{} {}: {}", "✗".red(), Self::file_name(&failure.path), failure.error);
        }
        println!();
    }
}

impl Reporter for ConsoleReporter {
    fn batch_started(&mut self, directory: &Path, files: usize, total_seconds: f64) {
        let plural = if files == 1 { "" } else { "s" };
        println!("Found {} original video{}.", files.to_string().blue(), plural);

        let bar = self.multi.add(ProgressBar::new(total_seconds.ceil() as u64));
        bar.set_style(Self::overall_style());
        bar.set_message(format!("Optimizing '{}'", Self::shorten_path(directory, 3)));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.overall = Some(bar);
    }

    fn file_started(&mut self, file: &Path, _index: usize, duration: f64) {
        let bar = self.multi.add(ProgressBar::new(duration.ceil() as u64));
        bar.set_style(Self::file_style());
        bar.set_message(Self::file_name(file).yellow().to_string());
        self.current = Some(bar);
    }

    fn progress(&mut self, current_file_seconds: f64, overall_seconds: f64) {
        if let Some(bar) = &self.current {
            bar.set_position(current_file_seconds as u64);
        }
        if let Some(bar) = &self.overall {
            bar.set_position(overall_seconds as u64);
        }
    }

    fn file_finished(&mut self, file: &Path, outcome: &FileOutcome) {
        if let Some(bar) = self.current.take() {
            let name = Self::file_name(file);
            match outcome {
                FileOutcome::Encoded(result) => {
                    if let Some(len) = bar.length() {
                        bar.set_position(len);
                    }
                    bar.finish_with_message(format!(
                        "{} ({}, {:.2}x)",
                        name.green(),
                        FileManager::format_size_change(result.disk_space_change()),
                        result.speed_factor()
                    ));
                }
                FileOutcome::Failed(_) => {
                    bar.abandon_with_message(format!("{} (failed)", name.red()));
                }
            }
        }
    }

    fn batch_finished(&mut self, report: &BatchReport) {
        if let Some(bar) = self.overall.take() {
            bar.finish_with_message(report.directory.display().to_string().green().to_string());
        }
        Self::print_summary(report);
    }

    fn health_started(&mut self, directory: &Path, pairs: usize) {
        let bar = self.multi.add(ProgressBar::new(pairs as u64));
        bar.set_style(Self::counter_style());
        bar.set_message(format!("Performing healthcheck for {}..", Self::shorten_path(directory, 2).blue()));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.overall = Some(bar);
    }

    fn pair_checked(&mut self, _row: &HealthRow) {
        if let Some(bar) = &self.overall {
            bar.inc(1);
        }
    }

    fn health_finished(&mut self, _rows: &[HealthRow]) {
        if let Some(bar) = self.overall.take() {
            bar.finish_with_message(format!("{} performing healthcheck", "Finished".green()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_path() {
        let path = Path::new("/home/user/Videos/Family/2019");
        assert_eq!(ConsoleReporter::shorten_path(path, 3), "…/Videos/Family/2019");
        assert_eq!(ConsoleReporter::shorten_path(Path::new("a/b"), 3), "a/b");
    }

    #[test]
    fn test_noop_reporter_accepts_events() {
        let mut reporter = NoopReporter;
        reporter.batch_started(Path::new("/videos"), 2, 10.0);
        reporter.progress(1.0, 1.0);
        reporter.health_finished(&[]);
    }
}
