//! # Error Types Module
//!
//! Every failure the tool can report, grouped by how far it propagates.
//!
//! ## Global preconditions (abort the whole command, exit code 1):
//! - `DirectoryNotFound` / `NotADirectory` / `EmptyDirectory`
//! - `InvalidConfiguration`: quality factor or sample ratio out of range
//! - `UnfinishedArtifactPresent`: purge refused while an `.optimizing` file exists
//! - `NoPairsFound`: health check without any original/optimized pair
//! - `NothingToUntag`: untag without any `.optimized` file
//! - `MissingDependency`: ffmpeg / ffprobe not on PATH
//!
//! ## Per-file failures (logged, recorded, the batch keeps going):
//! - `AdapterExecution`: external process failed or produced no output
//! - `AdapterTimeout`: comparison exceeded its wall-clock budget
//! - `NameCollision`: untagged name already taken
//! - `Probe`: ffprobe output could not be interpreted
//!
//! `UserCancelled` is not a failure: the top level turns it into a clean exit.
//!
//! ## Example:
//! ```rust,ignore
//! if !directory.exists() {
//!     return Err(NanoError::DirectoryNotFound(directory.to_path_buf()).into());
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for nano_encoder operations
#[derive(thiserror::Error, Debug)]
pub enum NanoError {
    #[error("Directory {0} does not exist")]
    DirectoryNotFound(PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("No video files found in '{0}'")]
    EmptyDirectory(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{tool} failed for '{file}': {reason}")]
    AdapterExecution {
        tool: &'static str,
        file: PathBuf,
        reason: String,
    },

    #[error("{tool} timed out after {seconds}s for '{file}'")]
    AdapterTimeout {
        tool: &'static str,
        file: PathBuf,
        seconds: u64,
    },

    #[error("{0} already exists. Consider running the purge command")]
    NameCollision(PathBuf),

    #[error("Encountered unfinished video '{0}', unable to purge originals")]
    UnfinishedArtifactPresent(PathBuf),

    #[error("'{0}' doesn't have any original/optimized pairs to compare")]
    NoPairsFound(PathBuf),

    #[error("There are no optimized videos to untag in '{0}'")]
    NothingToUntag(PathBuf),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Probe error for '{file}': {reason}")]
    Probe { file: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns true if `err` wraps a [`NanoError::UserCancelled`].
pub fn is_user_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<NanoError>(), Some(NanoError::UserCancelled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_cancelled_survives_anyhow() {
        let err: anyhow::Error = NanoError::UserCancelled.into();
        assert!(is_user_cancelled(&err));

        let other: anyhow::Error = NanoError::NoPairsFound(PathBuf::from("/videos")).into();
        assert!(!is_user_cancelled(&other));
    }

    #[test]
    fn test_messages() {
        let err = NanoError::NameCollision(PathBuf::from("A.mp4"));
        assert_eq!(err.to_string(), "A.mp4 already exists. Consider running the purge command");
    }
}
