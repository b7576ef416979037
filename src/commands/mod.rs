//! # Commands Module
//!
//! One type per CLI subcommand. Each owns its configuration and collaborators
//! (backend, reporter, confirmer) and runs through `Command::execute`.

pub mod health;
pub mod optimize;
pub mod purge;
pub mod untag;

pub use health::HealthCommand;
pub use optimize::OptimizeCommand;
pub use purge::{PurgeCommand, PurgeSummary};
pub use untag::{UntagCommand, UntagSummary};

use anyhow::Result;

/// A runnable subcommand
#[allow(async_fn_in_trait)]
pub trait Command {
    /// What the command produced, for callers that want more than the console output
    type Output;

    async fn execute(&mut self) -> Result<Self::Output>;
}
