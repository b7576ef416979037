//! # JSON Output Module
//!
//! Machine-readable progress for `nen optimize --json`: one JSON object per
//! line on stdout, tagged by `type`.
//!
//! ## Message types:
//! - `start`: batch begins, with file count and total seconds of video
//! - `file_start`: an encode begins
//! - `progress`: per-file and overall position in seconds
//! - `file_complete`: an encode ended, successfully or not
//! - `complete`: final accounting of the batch
//! - `error`: a global failure, emitted by the command before exiting

use crate::optimizer::media_optimizer::BatchReport;
use crate::optimizer::task_optimizer::FileOutcome;
use crate::progress::Reporter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress is only emitted when a position moved by at least this much
const PROGRESS_STEP_SECONDS: f64 = 1.0;

/// JSON event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        directory: PathBuf,
        total_files: usize,
        total_seconds: f64,
    },

    FileStart {
        path: PathBuf,
        index: usize,
        duration: f64,
    },

    Progress {
        current_file_seconds: f64,
        overall_seconds: f64,
        overall_total: f64,
        percentage: f64,
    },

    FileComplete {
        path: PathBuf,
        original_size: Option<u64>,
        optimized_size: Option<u64>,
        disk_space_change: Option<i64>,
        error: Option<String>,
    },

    Complete {
        directory: PathBuf,
        files_optimized: usize,
        files_skipped: usize,
        errors: usize,
        disk_space_change: i64,
        duration_seconds: f64,
        halted_on: Option<PathBuf>,
    },

    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Emits the message as one line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn progress(current_file_seconds: f64, overall_seconds: f64, overall_total: f64) -> Self {
        let percentage = if overall_total > 0.0 {
            (overall_seconds / overall_total * 100.0).min(100.0)
        } else {
            0.0
        };

        Self::Progress {
            current_file_seconds,
            overall_seconds,
            overall_total,
            percentage,
        }
    }

    pub fn file_complete(path: &Path, outcome: &FileOutcome) -> Self {
        match outcome {
            FileOutcome::Encoded(result) => Self::FileComplete {
                path: path.to_path_buf(),
                original_size: Some(result.original_size),
                optimized_size: Some(result.optimized_size),
                disk_space_change: Some(result.disk_space_change()),
                error: None,
            },
            FileOutcome::Failed(error) => Self::FileComplete {
                path: path.to_path_buf(),
                original_size: None,
                optimized_size: None,
                disk_space_change: None,
                error: Some(error.clone()),
            },
        }
    }

    pub fn complete(report: &BatchReport) -> Self {
        Self::Complete {
            directory: report.directory.clone(),
            files_optimized: report.processed.len(),
            files_skipped: report.skipped.len(),
            errors: report.failed.len(),
            disk_space_change: report.disk_space_change,
            duration_seconds: report.elapsed.as_secs_f64(),
            halted_on: report.halted_on.clone(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// `Reporter` writing `JsonMessage` lines
#[derive(Debug, Default)]
pub struct JsonReporter {
    overall_total: f64,
    last_emitted: Option<(f64, f64)>,
    /// Collected instead of printed when set, for tests
    buffer: Option<Vec<JsonMessage>>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that keeps its messages in memory
    pub fn buffered() -> Self {
        Self {
            buffer: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[JsonMessage] {
        self.buffer.as_deref().unwrap_or_default()
    }

    fn send(&mut self, message: JsonMessage) {
        match &mut self.buffer {
            Some(buffer) => buffer.push(message),
            None => message.emit(),
        }
    }
}

impl Reporter for JsonReporter {
    fn batch_started(&mut self, directory: &Path, files: usize, total_seconds: f64) {
        self.overall_total = total_seconds;
        self.send(JsonMessage::Start {
            directory: directory.to_path_buf(),
            total_files: files,
            total_seconds,
        });
    }

    fn file_started(&mut self, file: &Path, index: usize, duration: f64) {
        self.send(JsonMessage::FileStart {
            path: file.to_path_buf(),
            index,
            duration,
        });
    }

    fn progress(&mut self, current_file_seconds: f64, overall_seconds: f64) {
        let moved = match self.last_emitted {
            Some((_, last_overall)) => overall_seconds - last_overall >= PROGRESS_STEP_SECONDS,
            None => true,
        };
        if moved {
            self.last_emitted = Some((current_file_seconds, overall_seconds));
            self.send(JsonMessage::progress(current_file_seconds, overall_seconds, self.overall_total));
        }
    }

    fn file_finished(&mut self, file: &Path, outcome: &FileOutcome) {
        self.send(JsonMessage::file_complete(file, outcome));
    }

    fn batch_finished(&mut self, report: &BatchReport) {
        self.send(JsonMessage::complete(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tags() {
        let json = serde_json::to_string(&JsonMessage::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"boom"}"#);

        let json = serde_json::to_value(JsonMessage::progress(1.0, 5.0, 10.0)).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percentage"], 50.0);

        let json = serde_json::to_value(JsonMessage::file_complete(
            Path::new("A.mp4"),
            &FileOutcome::Failed("exit status: 1".to_string()),
        ))
        .unwrap();
        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["error"], "exit status: 1");
    }

    #[test]
    fn test_progress_is_throttled() {
        let mut reporter = JsonReporter::buffered();
        reporter.batch_started(Path::new("/videos"), 1, 10.0);
        reporter.progress(0.2, 0.2);
        reporter.progress(0.5, 0.5);
        reporter.progress(1.3, 1.3);
        reporter.progress(1.4, 1.4);

        let progress: Vec<_> = reporter
            .messages()
            .iter()
            .filter(|m| matches!(m, JsonMessage::Progress { .. }))
            .collect();
        assert_eq!(progress.len(), 2);
        assert!(matches!(reporter.messages()[0], JsonMessage::Start { total_files: 1, .. }));
    }
}
