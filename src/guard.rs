//! # Destructive Operation Guard
//!
//! Shared gate in front of purge and untag: validate the tree, refuse to
//! touch it while an encode is unfinished, and ask before acting.
//!
//! `Interrupt` carries Ctrl-C into the per-file loops. The loops run on the
//! blocking pool so the signal listener keeps running, and the flag is
//! checked before every mutation.

use crate::classifier::{FileClassifier, MediaFile};
use crate::error::NanoError;
use crate::file_manager::FileManager;
use crate::optimizer::path_resolver::IN_PROGRESS_MARKER;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cancellation flag shared between the signal listener and the commands
#[derive(Debug, Clone)]
pub struct Interrupt {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    pub fn trigger(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once `trigger` has been called
    pub async fn triggered(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// `UserCancelled` once triggered
    pub fn check(&self) -> Result<(), NanoError> {
        if self.is_triggered() {
            Err(NanoError::UserCancelled)
        } else {
            Ok(())
        }
    }
}

/// Asks the user to approve a destructive action
pub trait Confirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool, NanoError>;
}

/// Interactive `[y/N]` prompt on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirmer;

impl Confirmer for DialoguerConfirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool, NanoError> {
        // A closed or non-interactive stdin counts as "no"
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| {
                warn!("Confirmation prompt failed: {}", e);
                NanoError::UserCancelled
            })
    }
}

/// Approves everything, for `--yes`
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> Result<bool, NanoError> {
        Ok(true)
    }
}

pub struct DestructiveOperationGuard;

impl DestructiveOperationGuard {
    /// Validate `directory` and scan it; a tree without videos is an error
    pub fn scan(directory: &Path) -> Result<Vec<MediaFile>, NanoError> {
        FileManager::validate_directory(directory)?;
        let files = FileClassifier::scan(directory);
        if files.is_empty() {
            return Err(NanoError::EmptyDirectory(directory.to_path_buf()));
        }
        Ok(files)
    }

    /// Fails on the first `.optimizing` file anywhere in the scan
    pub fn ensure_no_unfinished(files: &[MediaFile]) -> Result<(), NanoError> {
        match FileClassifier::first_in_progress(files) {
            Some(file) => {
                warn!(
                    "Found unfinished '{}' ({} marker).",
                    file.path.display(),
                    IN_PROGRESS_MARKER
                );
                Err(NanoError::UnfinishedArtifactPresent(file.path.clone()))
            }
            None => Ok(()),
        }
    }

    /// Run `action` on each item in order, checking `interrupt` before each one.
    /// Returns how many actions succeeded and whether the run was cut short.
    pub fn apply_each<T, F>(items: &[T], interrupt: &Interrupt, mut action: F) -> (usize, bool)
    where
        F: FnMut(&T) -> bool,
    {
        let mut succeeded = 0;
        for item in items {
            if interrupt.is_triggered() {
                return (succeeded, true);
            }
            if action(item) {
                succeeded += 1;
            }
        }
        (succeeded, false)
    }

    /// Declining maps to `UserCancelled`
    pub fn confirm<C: Confirmer + ?Sized>(confirmer: &mut C, prompt: &str) -> Result<(), NanoError> {
        if confirmer.confirm(prompt)? {
            Ok(())
        } else {
            info!("User declined '{}'.", prompt);
            Err(NanoError::UserCancelled)
        }
    }
}
