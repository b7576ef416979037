//! `nen purge`: remove originals that already have an optimized version.
//!
//! Refuses to run at all while any `.optimizing` file exists in the tree.
//! The walk and the removals run on the blocking pool and stop at Ctrl-C.

use super::Command;
use crate::classifier::FileClassifier;
use crate::config::PurgeConfig;
use crate::error::NanoError;
use crate::file_manager::{FileManager, RemovalMode};
use crate::guard::{AssumeYes, Confirmer, DestructiveOperationGuard, DialoguerConfirmer, Interrupt};
use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Counts reported at the end of a purge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeSummary {
    pub purged: usize,
    pub candidates: usize,
}

pub struct PurgeCommand<'a> {
    config: PurgeConfig,
    confirmer: Box<dyn Confirmer + 'a>,
    interrupt: Interrupt,
}

/// What to tell the user when an unfinished encode blocks the purge
pub fn remediation(unfinished: &Path, directory: &Path) -> String {
    format!(
        "Remove '{}' or finish it with 'nen optimize {}' before purging.",
        unfinished.display(),
        directory.display()
    )
}

impl<'a> PurgeCommand<'a> {
    /// Prompts interactively unless `skip_confirmation` is set
    pub fn new(config: PurgeConfig) -> Self {
        let confirmer: Box<dyn Confirmer + 'a> = if config.skip_confirmation {
            Box::new(AssumeYes)
        } else {
            Box::new(DialoguerConfirmer)
        };
        Self {
            config,
            confirmer,
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

    fn mode(&self) -> RemovalMode {
        if self.config.permanent {
            RemovalMode::Permanent
        } else {
            RemovalMode::Trash
        }
    }
}

impl<'a> Command for PurgeCommand<'a> {
    type Output = PurgeSummary;

    async fn execute(&mut self) -> Result<PurgeSummary> {
        let directory = self.config.directory.clone();
        let walk = directory.clone();
        let files = tokio::task::spawn_blocking(move || DestructiveOperationGuard::scan(&walk)).await??;
        self.interrupt.check()?;

        if let Err(e) = DestructiveOperationGuard::ensure_no_unfinished(&files) {
            if let NanoError::UnfinishedArtifactPresent(unfinished) = &e {
                eprintln!("{} {}", "!".yellow(), remediation(unfinished, &directory));
            }
            return Err(e.into());
        }

        let pairs = FileClassifier::pairs(&files);
        if pairs.is_empty() {
            println!("No original videos with an optimized version found. Nothing to purge.");
            return Ok(PurgeSummary::default());
        }

        println!("Original videos to purge:");
        for (original, optimized) in &pairs {
            println!("  {} → {}", original.display(), optimized.display().to_string().green());
        }

        let mode = self.mode();
        let action = match mode {
            RemovalMode::Trash => "send to trash",
            RemovalMode::Permanent => "permanently delete",
        };
        let prompt = format!("Are you sure you want to {} {} original video(s)?", action, pairs.len());
        if mode == RemovalMode::Permanent {
            println!("{}", "Permanent deletion cannot be undone!".red().bold());
        }
        DestructiveOperationGuard::confirm(self.confirmer.as_mut(), &prompt)?;

        let originals: Vec<PathBuf> = pairs.into_iter().map(|(original, _)| original).collect();
        let candidates = originals.len();
        let interrupt = self.interrupt.clone();
        let (purged, interrupted) = tokio::task::spawn_blocking(move || {
            DestructiveOperationGuard::apply_each(&originals, &interrupt, |original| {
                match FileManager::remove(original, mode) {
                    Ok(()) => {
                        info!("Purged original '{}' ({:?}).", original.display(), mode);
                        true
                    }
                    Err(e) => {
                        error!("Failed to purge '{}': {:#}", original.display(), e);
                        false
                    }
                }
            })
        })
        .await?;

        if interrupted {
            warn!("Purge interrupted after {} of {} original(s).", purged, candidates);
            eprintln!(
                "{} Purged {} of {} original video(s) before the interruption.",
                "!".yellow(),
                purged,
                candidates
            );
            return Err(NanoError::UserCancelled.into());
        }

        println!("{} Purged {} of {} original video(s).", "✓".green(), purged, candidates);
        Ok(PurgeSummary { purged, candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_offers_removal_and_rerun() {
        let text = remediation(Path::new("clips/X.optimizing.mp4"), Path::new("clips"));
        assert!(text.starts_with("Remove '"));
        assert!(text.contains(&Path::new("clips/X.optimizing.mp4").display().to_string()));
        assert!(text.contains("nen optimize clips"));
    }
}
