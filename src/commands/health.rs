//! `nen health`: SSIM spot-check of finished encodes, rendered as a table.

use super::Command;
use crate::config::HealthConfig;
use crate::file_manager::FileManager;
use crate::health::{HealthRow, SamplingAnalyzer, Severity};
use crate::progress::{ConsoleReporter, Reporter};
use crate::video_processor::VideoBackend;
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::path::{Path, PathBuf};

pub struct HealthCommand<'a, B: VideoBackend> {
    config: HealthConfig,
    backend: &'a B,
    reporter: Box<dyn Reporter + 'a>,
    adapter_log: Option<PathBuf>,
}

impl<'a, B: VideoBackend> HealthCommand<'a, B> {
    pub fn new(config: HealthConfig, backend: &'a B) -> Self {
        Self {
            config,
            backend,
            reporter: Box::new(ConsoleReporter::new()),
            adapter_log: None,
        }
    }

    /// Append raw comparison output to `path` and mention it under the table
    pub fn with_adapter_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.adapter_log = Some(path.into());
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter + 'a>) -> Self {
        self.reporter = reporter;
        self
    }

    fn color(severity: Severity) -> Color {
        match severity {
            Severity::Normal => Color::Green,
            Severity::Warning => Color::Yellow,
            Severity::Critical => Color::Red,
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }

    /// Original, Optimized, SSIM, Grade, Size diff; one color per row
    pub fn render(rows: &[HealthRow]) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Original", "Optimized", "SSIM", "Grade", "Size diff"]);

        for row in rows {
            let color = Self::color(row.severity());
            table.add_row(vec![
                Cell::new(Self::file_name(&row.original)).fg(color),
                Cell::new(Self::file_name(&row.optimized)).fg(color),
                Cell::new(row.score_text()).fg(color),
                Cell::new(row.grade_text()).fg(color),
                Cell::new(FileManager::format_size_change(-row.size_diff)).fg(color),
            ]);
        }
        table
    }
}

impl<'a, B: VideoBackend> Command for HealthCommand<'a, B> {
    type Output = Vec<HealthRow>;

    async fn execute(&mut self) -> Result<Vec<HealthRow>> {
        let mut analyzer = SamplingAnalyzer::new(self.config.clone(), self.backend, self.reporter.as_mut());
        if let Some(log) = &self.adapter_log {
            analyzer = analyzer.with_adapter_log(log);
        }
        let rows = analyzer.run().await?;

        println!("{}", Self::render(&rows));
        if let Some(log) = &self.adapter_log {
            println!("Comparison output logged to {}", log.display());
        }
        Ok(rows)
    }
}
