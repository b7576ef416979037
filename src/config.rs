//! # Configuration Management Module
//!
//! Value objects describing what each command should do.
//!
//! ## Configurations:
//! - `OptimizeConfig`: the batch job (directory, CRF, preset, tune, downscale, flags)
//! - `PurgeConfig`: trash vs permanent delete, confirmation skip
//! - `HealthConfig`: sample ratio, `all`, per-comparison timeout
//!
//! ## Validation:
//! - CRF must be within `CRF_MIN..=CRF_MAX` (0-51)
//! - Downscale height must be positive
//! - Sample ratio must be within `(0, 1]`
//! - Comparison timeout must be non-zero
//!
//! ## Example:
//! ```rust,ignore
//! let config = OptimizeConfig {
//!     crf: 24,
//!     preset: Preset::Slow,
//!     ..OptimizeConfig::new("/videos")
//! };
//! config.validate()?;
//! ```

use crate::error::NanoError;
use crate::file_manager::RemovalMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CRF_MIN: u8 = 0;
pub const CRF_MAX: u8 = 51;
pub const DEFAULT_CRF: u8 = 28;
pub const DEFAULT_SAMPLE_RATIO: f64 = 0.05;
pub const DEFAULT_COMPARISON_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// x265 speed/efficiency preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// x265 content tuning profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tune {
    Animation,
    Grain,
    Stillimage,
    Fastdecode,
    Zerolatency,
}

impl Tune {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::Grain => "grain",
            Self::Stillimage => "stillimage",
            Self::Fastdecode => "fastdecode",
            Self::Zerolatency => "zerolatency",
        }
    }
}

impl fmt::Display for Tune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of an optimize batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// Directory tree to optimize
    pub directory: PathBuf,
    /// Constant rate factor (0-51, lower = better quality, larger output)
    pub crf: u8,
    /// Compression/efficiency preset
    pub preset: Preset,
    /// Target height for downscaling, aspect ratio preserved
    pub downscale: Option<u32>,
    /// Content tuning profile
    pub tune: Option<Tune>,
    /// Re-encode files already in the target codec
    pub force: bool,
    /// Stop the batch after a file whose output grew
    pub halt_on_increase: bool,
    /// Remove the original once its optimized version exists
    pub delete_after: bool,
    /// How `delete_after` removes the original; the CLI always uses the trash
    pub delete_mode: RemovalMode,
    /// Strip the `.optimized` marker from freshly encoded files
    pub untag_after: bool,
}

impl OptimizeConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            crf: DEFAULT_CRF,
            preset: Preset::default(),
            downscale: None,
            tune: None,
            force: false,
            halt_on_increase: false,
            delete_after: false,
            delete_mode: RemovalMode::Trash,
            untag_after: false,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), NanoError> {
        validate_crf(self.crf)?;

        if self.downscale == Some(0) {
            return Err(NanoError::InvalidConfiguration(
                "Downscale height must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration of a purge run
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    pub directory: PathBuf,
    /// Delete instead of moving to the trash
    pub permanent: bool,
    /// Do not ask before deleting
    pub skip_confirmation: bool,
}

impl PurgeConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            permanent: false,
            skip_confirmation: false,
        }
    }
}

/// Configuration of a health check
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub directory: PathBuf,
    /// Share of pairs to check (ignored with `all`)
    pub sample_ratio: f64,
    /// Check every pair exactly once
    pub all: bool,
    /// Wall-clock budget of a single comparison
    pub comparison_timeout: Duration,
}

impl HealthConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            sample_ratio: DEFAULT_SAMPLE_RATIO,
            all: false,
            comparison_timeout: DEFAULT_COMPARISON_TIMEOUT,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), NanoError> {
        if !(self.sample_ratio > 0.0 && self.sample_ratio <= 1.0) {
            return Err(NanoError::InvalidConfiguration(format!(
                "Sample ratio must be greater than 0 and at most 1 (got {})",
                self.sample_ratio
            )));
        }

        if self.comparison_timeout.is_zero() {
            return Err(NanoError::InvalidConfiguration(
                "Comparison timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration of an untag run
#[derive(Debug, Clone)]
pub struct UntagConfig {
    pub directory: PathBuf,
}

impl UntagConfig {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
        }
    }
}

pub fn validate_crf(crf: u8) -> Result<(), NanoError> {
    if !(CRF_MIN..=CRF_MAX).contains(&crf) {
        return Err(NanoError::InvalidConfiguration(format!(
            "CRF must be between {} and {}",
            CRF_MIN, CRF_MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_config_validation() {
        let mut config = OptimizeConfig::new("/videos");
        assert!(config.validate().is_ok());

        config.crf = 52;
        assert!(matches!(
            config.validate(),
            Err(NanoError::InvalidConfiguration(_))
        ));

        config.crf = CRF_MAX;
        assert!(config.validate().is_ok());

        config.crf = CRF_MIN;
        config.downscale = Some(0);
        assert!(config.validate().is_err());

        config.downscale = Some(720);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_optimize_config_default() {
        let config = OptimizeConfig::new("/videos");
        assert_eq!(config.crf, 28);
        assert_eq!(config.preset, Preset::Medium);
        assert!(config.downscale.is_none());
        assert!(config.tune.is_none());
        assert!(!config.force);
        assert!(!config.halt_on_increase);
        assert!(!config.delete_after);
        assert!(!config.untag_after);
    }

    #[test]
    fn test_health_config_validation() {
        let mut config = HealthConfig::new("/videos");
        assert!(config.validate().is_ok());

        config.sample_ratio = 0.0;
        assert!(config.validate().is_err());

        config.sample_ratio = 1.5;
        assert!(config.validate().is_err());

        config.sample_ratio = 1.0;
        assert!(config.validate().is_ok());

        config.comparison_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preset_and_tune_names() {
        assert_eq!(Preset::Veryslow.to_string(), "veryslow");
        assert_eq!(Tune::Stillimage.to_string(), "stillimage");

        let json = serde_json::to_string(&Preset::Ultrafast).unwrap();
        assert_eq!(json, "\"ultrafast\"");
    }
}
