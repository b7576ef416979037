//! # NanoEncoder Library
//!
//! Batch re-encoding of video collections to HEVC with a filename-marker
//! lifecycle, plus the commands that clean up afterwards.
//!
//! ## Module layout:
//! - `config`: per-command configuration and validation
//! - `error`: `NanoError`
//! - `logger`: tracing setup and log file locations
//! - `file_manager`, `classifier`: discovery and marker classification
//! - `lifecycle`: claim / finalize / rollback / untag transitions
//! - `video_processor`, `platform`: the ffmpeg/ffprobe adapter
//! - `optimizer`: batch orchestration and progress aggregation
//! - `health`: SSIM sampling
//! - `guard`: confirmation and shared preconditions for destructive commands
//! - `progress`, `json_output`: reporters
//! - `commands`: one type per CLI subcommand
//!
//! ## Usage:
//! ```rust,no_run
//! use nano_encoder::commands::{Command, OptimizeCommand};
//! use nano_encoder::{FfmpegBackend, OptimizeConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let backend = FfmpegBackend::new();
//! let report = OptimizeCommand::new(OptimizeConfig::new("/videos"), &backend, false)
//!     .execute()
//!     .await?;
//! println!("{} files optimized", report.processed.len());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod commands;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod guard;
pub mod health;
pub mod json_output;
pub mod lifecycle;
pub mod logger;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod utils;
pub mod video_processor;

pub use config::{HealthConfig, OptimizeConfig, PurgeConfig, UntagConfig};
pub use error::NanoError;
pub use optimizer::{BatchOrchestrator, BatchReport};
pub use video_processor::{FfmpegBackend, VideoBackend};
