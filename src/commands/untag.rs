//! `nen untag`: strip the `.optimized` marker from finished encodes.
//!
//! Renames run on the blocking pool and stop at Ctrl-C.

use super::Command;
use crate::classifier::{FileClassifier, Marker};
use crate::config::UntagConfig;
use crate::error::NanoError;
use crate::guard::{Confirmer, DestructiveOperationGuard, DialoguerConfirmer, Interrupt};
use crate::lifecycle::Lifecycle;
use crate::optimizer::path_resolver::PathResolver;
use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UntagSummary {
    pub untagged: usize,
    pub total: usize,
}

pub struct UntagCommand<'a> {
    config: UntagConfig,
    confirmer: Box<dyn Confirmer + 'a>,
    interrupt: Interrupt,
}

impl<'a> UntagCommand<'a> {
    pub fn new(config: UntagConfig) -> Self {
        Self {
            config,
            confirmer: Box::new(DialoguerConfirmer),
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer + 'a>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn preview(done: &[PathBuf]) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Current", "Untagged"]);
        for path in done {
            table.add_row(vec![
                path.display().to_string(),
                PathResolver::untagged_path(path).display().to_string(),
            ]);
        }
        table
    }
}

impl<'a> Command for UntagCommand<'a> {
    type Output = UntagSummary;

    async fn execute(&mut self) -> Result<UntagSummary> {
        let directory = self.config.directory.clone();
        let walk = directory.clone();
        let files = tokio::task::spawn_blocking(move || DestructiveOperationGuard::scan(&walk)).await??;
        self.interrupt.check()?;

        let done: Vec<PathBuf> = FileClassifier::with_marker(&files, Marker::Done)
            .into_iter()
            .map(|file| file.path.clone())
            .collect();
        if done.is_empty() {
            return Err(NanoError::NothingToUntag(directory).into());
        }

        println!("{}", Self::preview(&done));
        println!(
            "{} Removing the '.optimized' tag from {} video file(s). Cannot be undone!",
            "Warning:".red().bold(),
            done.len()
        );
        DestructiveOperationGuard::confirm(self.confirmer.as_mut(), "Proceed with untagging?")?;

        let total = done.len();
        let interrupt = self.interrupt.clone();
        let (untagged, interrupted) = tokio::task::spawn_blocking(move || {
            DestructiveOperationGuard::apply_each(&done, &interrupt, |path| match Lifecycle::untag(path) {
                Ok(target) => {
                    info!("Untagged '{}' → '{}'.", path.display(), target.display());
                    true
                }
                Err(e) => {
                    error!("Could not untag '{}': {}", path.display(), e);
                    false
                }
            })
        })
        .await?;

        if interrupted {
            warn!("Untag interrupted after {} of {} file(s).", untagged, total);
            eprintln!(
                "{} Untagged {} of {} video file(s) before the interruption.",
                "!".yellow(),
                untagged,
                total
            );
            return Err(NanoError::UserCancelled.into());
        }

        println!("{} Untagged {} of {} video file(s).", "✓".green(), untagged, total);
        Ok(UntagSummary { untagged, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_preview_lists_both_names() {
        let table = UntagCommand::preview(&[PathBuf::from("clips/A.optimized.mp4")]).to_string();
        assert!(table.contains("Current"));
        assert!(table.contains("Untagged"));
        assert!(table.contains(&Path::new("clips").join("A.mp4").display().to_string()));
    }
}
