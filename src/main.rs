//! # NanoEncoder - Main Entry Point
//!
//! ## Responsibilities:
//! - Command line parsing with `clap`
//! - Logging setup (console + log file)
//! - Checking that ffmpeg/ffprobe are installed
//! - Dispatching to the subcommand; Ctrl-C cancels it through a shared `Interrupt`
//! - Mapping the outcome to an exit code (0 success or cancellation, 1 error)
//!
//! ## Usage:
//! ```bash
//! nen optimize ~/Videos --crf 26 --preset slow --halt-on-increase
//! nen health ~/Videos --sample-ratio 0.1
//! nen purge ~/Videos
//! nen untag ~/Videos
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use nano_encoder::commands::{Command, HealthCommand, OptimizeCommand, PurgeCommand, UntagCommand};
use nano_encoder::config::{
    Preset, Tune, CRF_MAX, CRF_MIN, DEFAULT_COMPARISON_TIMEOUT, DEFAULT_CRF, DEFAULT_SAMPLE_RATIO,
};
use nano_encoder::error::{is_user_cancelled, NanoError};
use nano_encoder::guard::Interrupt;
use nano_encoder::platform::PlatformCommands;
use nano_encoder::{logger, FfmpegBackend, HealthConfig, OptimizeConfig, PurgeConfig, UntagConfig};

#[derive(Parser)]
#[command(name = "nen", version)]
#[command(about = "Batch re-encode videos to HEVC and clean up afterwards")]
struct Cli {
    /// Debug logging on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode every original video below DIRECTORY to HEVC
    Optimize {
        directory: PathBuf,

        /// Constant rate factor (lower = better quality, larger files)
        #[arg(long, default_value_t = DEFAULT_CRF, value_parser = clap::value_parser!(u8).range(CRF_MIN as i64..=CRF_MAX as i64))]
        crf: u8,

        /// x265 preset
        #[arg(long, value_enum, default_value_t = Preset::Medium)]
        preset: Preset,

        /// Downscale to this height, keeping the aspect ratio
        #[arg(long, value_name = "HEIGHT")]
        downscale: Option<u32>,

        /// x265 tune
        #[arg(long, value_enum)]
        tune: Option<Tune>,

        /// Also encode videos that are already HEVC
        #[arg(long)]
        force: bool,

        /// Stop the batch when an encode comes out larger than its original
        #[arg(long)]
        halt_on_increase: bool,

        /// Send each original to the trash after a successful encode
        #[arg(long)]
        delete_after: bool,

        /// Remove the `.optimized` tag after a successful encode
        #[arg(long)]
        untag_after: bool,

        /// Print progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Remove originals that have an optimized version
    Purge {
        directory: PathBuf,

        /// Delete permanently instead of sending to trash
        #[arg(short, long)]
        permanent: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Compare a sample of optimized videos with their originals (SSIM)
    Health {
        directory: PathBuf,

        /// Fraction of pairs to check, in (0, 1]
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATIO)]
        sample_ratio: f64,

        /// Check every pair
        #[arg(long)]
        all: bool,

        /// Per-comparison time limit in seconds
        #[arg(long, value_name = "SECS", default_value_t = DEFAULT_COMPARISON_TIMEOUT.as_secs())]
        timeout: u64,
    },

    /// Strip the `.optimized` tag from finished videos
    Untag { directory: PathBuf },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Optimize { .. } => "optimize",
            Commands::Purge { .. } => "purge",
            Commands::Health { .. } => "health",
            Commands::Untag { .. } => "untag",
        }
    }

    fn needs_ffmpeg(&self) -> bool {
        matches!(self, Commands::Optimize { .. } | Commands::Health { .. })
    }
}

async fn run(command: Commands, adapter_log: PathBuf, interrupt: Interrupt) -> Result<()> {
    if command.needs_ffmpeg() {
        PlatformCommands::instance()
            .check_dependencies(&["ffmpeg", "ffprobe"])
            .await?;
    }

    let backend = FfmpegBackend::new();
    match command {
        Commands::Optimize {
            directory,
            crf,
            preset,
            downscale,
            tune,
            force,
            halt_on_increase,
            delete_after,
            untag_after,
            json,
        } => {
            let config = OptimizeConfig {
                crf,
                preset,
                downscale,
                tune,
                force,
                halt_on_increase,
                delete_after,
                untag_after,
                ..OptimizeConfig::new(directory)
            };
            let mut command = OptimizeCommand::new(config, &backend, json);
            // Dropping the encode future kills the running ffmpeg
            tokio::select! {
                result = command.execute() => { result?; }
                _ = interrupt.triggered() => return Err(NanoError::UserCancelled.into()),
            }
        }
        Commands::Purge {
            directory,
            permanent,
            yes,
        } => {
            let config = PurgeConfig {
                permanent,
                skip_confirmation: yes,
                ..PurgeConfig::new(directory)
            };
            PurgeCommand::new(config)
                .with_interrupt(interrupt)
                .execute()
                .await?;
        }
        Commands::Health {
            directory,
            sample_ratio,
            all,
            timeout,
        } => {
            let config = HealthConfig {
                sample_ratio,
                all,
                comparison_timeout: Duration::from_secs(timeout),
                ..HealthConfig::new(directory)
            };
            let mut command = HealthCommand::new(config, &backend).with_adapter_log(adapter_log);
            tokio::select! {
                result = command.execute() => { result?; }
                _ = interrupt.triggered() => return Err(NanoError::UserCancelled.into()),
            }
        }
        Commands::Untag { directory } => {
            UntagCommand::new(UntagConfig::new(&directory))
                .with_interrupt(interrupt)
                .execute()
                .await?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match logger::init(cli.verbose) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let name = cli.command.name();
    info!("Running '{}' (nen {}).", name, env!("CARGO_PKG_VERSION"));

    let interrupt = Interrupt::new();
    let listener = interrupt.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => listener.trigger(),
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
    // Let the listener install its handler before any work starts
    tokio::task::yield_now().await;

    let outcome = run(cli.command, logging.adapter_log(), interrupt.clone()).await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_user_cancelled(&e) && interrupt.is_triggered() => {
            warn!("'{}' interrupted by user.", name);
            eprintln!("\n{}", "Operation cancelled by user".yellow());
            ExitCode::SUCCESS
        }
        Err(e) if is_user_cancelled(&e) => {
            info!("'{}' cancelled by user.", name);
            println!("{}", "Operation cancelled".yellow());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("'{}' failed: {:#}", name, e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            eprintln!("Logs available at {}", logging.main_log().display());
            ExitCode::FAILURE
        }
    }
}
