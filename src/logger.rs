//! # Logging Module
//!
//! Sets up `tracing` with two outputs:
//! - stderr, WARN and above (DEBUG with `--verbose`), `RUST_LOG` overrides
//! - `NanoEncoder.log` in the log directory, INFO (DEBUG with `--verbose`)
//!
//! The health check also appends raw ffmpeg reports to `NanoEncoder_ffmpeg.log`
//! next to the main log.
//!
//! ## Log directory:
//! 1. `$NEN_LOG_DIR`
//! 2. macOS: `~/Library/Logs/NanoEncoder`
//! 3. Windows: `%LOCALAPPDATA%\NanoEncoder\logs`
//! 4. Others: `$XDG_DATA_HOME/NanoEncoder/logs` or `~/.local/share/NanoEncoder/logs`

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const APP_NAME: &str = "NanoEncoder";
pub const LOG_DIR_ENV: &str = "NEN_LOG_DIR";
pub const MAIN_LOG_FILE: &str = "NanoEncoder.log";
pub const ADAPTER_LOG_FILE: &str = "NanoEncoder_ffmpeg.log";

/// Keeps the file writer alive; drop it last to flush the log
pub struct Logging {
    directory: PathBuf,
    _guard: WorkerGuard,
}

impl Logging {
    pub fn main_log(&self) -> PathBuf {
        self.directory.join(MAIN_LOG_FILE)
    }

    pub fn adapter_log(&self) -> PathBuf {
        self.directory.join(ADAPTER_LOG_FILE)
    }
}

/// Log directory for this platform, honouring `$NEN_LOG_DIR`
pub fn log_dir() -> PathBuf {
    resolve_log_dir(std::env::var_os(LOG_DIR_ENV))
}

fn resolve_log_dir(override_dir: Option<OsString>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => platform_log_dir().unwrap_or_else(|| std::env::temp_dir().join(APP_NAME)),
    }
}

#[cfg(target_os = "macos")]
fn platform_log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library").join("Logs").join(APP_NAME))
}

#[cfg(windows)]
fn platform_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_NAME).join("logs"))
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_log_dir() -> Option<PathBuf> {
    // dirs::data_dir is $XDG_DATA_HOME, falling back to ~/.local/share
    dirs::data_dir().map(|dir| dir.join(APP_NAME).join("logs"))
}

/// Install the global subscriber
pub fn init(verbose: bool) -> Result<Logging> {
    let directory = log_dir();
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let file_appender = tracing_appender::rolling::never(&directory, MAIN_LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_level = if verbose { "debug" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));
    let file_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_level),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(Logging {
        directory,
        _guard: guard,
    })
}
