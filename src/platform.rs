//! # Platform-specific utilities
//!
//! Resolves the executable names of the external tools (ffmpeg, ffprobe) per
//! platform and checks that they can be found on PATH before a command runs.

use crate::error::NanoError;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        let which_command = if cfg!(windows) {
            commands.insert("ffmpeg", "ffmpeg.exe");
            commands.insert("ffprobe", "ffprobe.exe");
            "where"
        } else {
            commands.insert("ffmpeg", "ffmpeg");
            commands.insert("ffprobe", "ffprobe");
            "which"
        };

        Self {
            commands,
            which_command,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        let command_name = self.get_command(base_name);

        let result = tokio::process::Command::new(self.which_command)
            .arg(command_name)
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("'{} {}' could not run: {}", self.which_command, command_name, e);
                false
            }
        }
    }

    /// Fail with `MissingDependency` unless every tool is on PATH
    pub async fn check_dependencies(&self, tools: &[&str]) -> Result<(), NanoError> {
        for tool in tools {
            if !self.is_command_available(tool).await {
                return Err(NanoError::MissingDependency(format!(
                    "nano_encoder depends on {}, which is not installed on this system. \
                     Install from https://www.ffmpeg.org/download.html",
                    tool
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_commands() {
        let platform = PlatformCommands::instance();

        let ffmpeg = platform.get_command("ffmpeg");
        assert!(ffmpeg.starts_with("ffmpeg"));

        // Unknown tools pass through untouched
        assert_eq!(platform.get_command("x265"), "x265");
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let platform = PlatformCommands::instance();
        let result = platform
            .check_dependencies(&["definitely-not-a-real-tool-4f2a"])
            .await;
        assert!(matches!(result, Err(NanoError::MissingDependency(_))));
    }
}
