//! `nen optimize`: encode every eligible original below a directory.

use super::Command;
use crate::config::OptimizeConfig;
use crate::json_output::{JsonMessage, JsonReporter};
use crate::optimizer::media_optimizer::{BatchOrchestrator, BatchReport};
use crate::progress::{ConsoleReporter, Reporter};
use crate::video_processor::VideoBackend;
use anyhow::Result;

pub struct OptimizeCommand<'a, B: VideoBackend> {
    config: OptimizeConfig,
    backend: &'a B,
    reporter: Box<dyn Reporter + 'a>,
    json: bool,
}

impl<'a, B: VideoBackend> OptimizeCommand<'a, B> {
    /// Console output, or JSON lines when `json` is set
    pub fn new(config: OptimizeConfig, backend: &'a B, json: bool) -> Self {
        let reporter: Box<dyn Reporter + 'a> = if json {
            Box::new(JsonReporter::new())
        } else {
            Box::new(ConsoleReporter::new())
        };

        Self {
            config,
            backend,
            reporter,
            json,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter + 'a>) -> Self {
        self.reporter = reporter;
        self
    }
}

impl<'a, B: VideoBackend> Command for OptimizeCommand<'a, B> {
    type Output = BatchReport;

    async fn execute(&mut self) -> Result<BatchReport> {
        let result = BatchOrchestrator::new(self.config.clone(), self.backend, self.reporter.as_mut())
            .run()
            .await;

        if let Err(e) = &result {
            if self.json {
                JsonMessage::error(e.to_string()).emit();
            }
        }
        result
    }
}
