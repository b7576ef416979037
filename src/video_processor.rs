//! # Video Processing Module
//!
//! The boundary between nano_encoder and the external tools. Everything that
//! spawns a process lives behind the `VideoBackend` trait, so the optimizer and
//! the health check can be driven by a scripted backend in tests.
//!
//! ## Operations:
//! - `probe`: duration, resolution and video codec via `ffprobe` (JSON output)
//! - `encode`: HEVC re-encode via `ffmpeg`, streaming every output line to a
//!   callback while the process runs
//! - `compare`: SSIM comparison of two videos via ffmpeg's `ssim` filter,
//!   returning the raw report stream
//!
//! ## Encode pipeline:
//! - Video codec: libx265, `-tag:v hvc1` for QuickTime/Apple compatibility
//! - Quality: CRF + preset (+ optional tune)
//! - Filters: `format=yuv420p` and optionally `scale=-2:<height>`
//! - Audio and subtitles copied verbatim
//! - Progress reported on stdout (`-progress pipe:1`)
//!
//! ## Example:
//! ```rust,ignore
//! let backend = FfmpegBackend::new();
//! let info = backend.probe(&video_path).await?;
//! let request = EncodeRequest::from_config(&config, &video_path, &output_path);
//! backend.encode(&request, &mut |line| println!("{}", line)).await?;
//! ```

use crate::args;
use crate::config::{OptimizeConfig, Preset, Tune};
use crate::error::NanoError;
use crate::platform::PlatformCommands;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Codec names that count as "already HEVC"
pub const TARGET_CODEC_IDS: &[&str] = &["hevc", "h265", "h.265"];

/// Encoder handed to ffmpeg
pub const TARGET_ENCODER: &str = "libx265";

/// Video file information
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl VideoInfo {
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check if the video stream is already in the target codec
    pub fn is_target_codec(&self) -> bool {
        let codec = self.codec.to_lowercase();
        TARGET_CODEC_IDS.iter().any(|id| codec.contains(id))
    }
}

/// Parameters of one encode
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub crf: u8,
    pub preset: Preset,
    pub tune: Option<Tune>,
    pub downscale: Option<u32>,
}

impl<'a> EncodeRequest<'a> {
    pub fn from_config(config: &OptimizeConfig, input: &'a Path, output: &'a Path) -> Self {
        Self {
            input,
            output,
            crf: config.crf,
            preset: config.preset,
            tune: config.tune,
            downscale: config.downscale,
        }
    }

    /// Video filter chain
    pub fn video_filters(&self) -> String {
        let mut filters = vec!["format=yuv420p".to_string()];
        if let Some(height) = self.downscale {
            filters.push(format!("scale=-2:{}", height));
        }
        filters.join(",")
    }

    /// Full ffmpeg argument list
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = args!["-i", self.input.display()];
        args.extend(args![
            "-c:v", TARGET_ENCODER,
            "-crf", self.crf,
            "-preset", self.preset,
        ]);
        if let Some(tune) = self.tune {
            args.extend(args!["-tune", tune]);
        }
        args.extend(args![
            "-threads", 0,
            "-c:a", "copy",
            "-c:s", "copy",
            "-tag:v", "hvc1",
            "-vf", self.video_filters(),
            "-progress", "pipe:1",
            "-nostats",
            "-loglevel", "error",
            self.output.display(),
        ]);
        args
    }
}

/// External tools used by the optimizer and the health check
#[allow(async_fn_in_trait)]
pub trait VideoBackend {
    /// Read duration, resolution and codec of a video
    async fn probe(&self, path: &Path) -> Result<VideoInfo, NanoError>;

    /// Run an encode, passing every output line to `on_line`
    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), NanoError>;

    /// Compare two videos and return the comparison report stream
    async fn compare(&self, original: &Path, optimized: &Path) -> Result<String, NanoError>;
}

/// ffprobe JSON output, only the fields we read
#[derive(Debug, Deserialize)]
struct FFProbeData {
    #[serde(default)]
    streams: Vec<FFProbeStream>,
    format: Option<FFProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_probe_output(path: &Path, json: &str) -> Result<VideoInfo, NanoError> {
    let probe_error = |reason: String| NanoError::Probe {
        file: path.to_path_buf(),
        reason,
    };

    let data: FFProbeData =
        serde_json::from_str(json).map_err(|e| probe_error(format!("invalid ffprobe output: {}", e)))?;

    let duration = data
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| probe_error("no duration reported".to_string()))?;

    let video = data
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| probe_error("no video stream".to_string()))?;

    Ok(VideoInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        codec: video.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// `VideoBackend` backed by the ffmpeg/ffprobe executables
#[derive(Debug, Default, Clone)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl VideoBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, NanoError> {
        let ffprobe = PlatformCommands::instance().get_command("ffprobe");

        let output = Command::new(ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NanoError::AdapterExecution {
                tool: "ffprobe",
                file: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(NanoError::AdapterExecution {
                tool: "ffprobe",
                file: path.to_path_buf(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), NanoError> {
        let ffmpeg = PlatformCommands::instance().get_command("ffmpeg");
        let execution_error = |reason: String| NanoError::AdapterExecution {
            tool: "ffmpeg",
            file: request.input.to_path_buf(),
            reason,
        };

        debug!("{} {}", ffmpeg, request.ffmpeg_args().join(" "));

        let mut child = Command::new(ffmpeg)
            .args(request.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| execution_error(format!("failed to start: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| execution_error("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| execution_error("stderr not captured".to_string()))?;

        // Both pipes form one logical stream; drain them together so neither blocks
        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let (mut stdout_buf, mut stderr_buf) = (Vec::new(), Vec::new());
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut errors = Vec::new();

        while stdout_open || stderr_open {
            tokio::select! {
                line = next_lossy_line(&mut stdout, &mut stdout_buf), if stdout_open => match line {
                    Some(line) => on_line(&line),
                    None => stdout_open = false,
                },
                line = next_lossy_line(&mut stderr, &mut stderr_buf), if stderr_open => match line {
                    Some(line) => {
                        on_line(&line);
                        errors.push(line);
                    }
                    None => stderr_open = false,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| execution_error(e.to_string()))?;

        if !status.success() {
            return Err(execution_error(format!("{}: {}", status, errors.join(" | "))));
        }

        Ok(())
    }

    async fn compare(&self, original: &Path, optimized: &Path) -> Result<String, NanoError> {
        let ffmpeg = PlatformCommands::instance().get_command("ffmpeg");

        let output = Command::new(ffmpeg)
            .arg("-i")
            .arg(original)
            .arg("-i")
            .arg(optimized)
            .args(["-lavfi", "[0:v][1:v]ssim=stats_file=-", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NanoError::AdapterExecution {
                tool: "ffmpeg",
                file: optimized.to_path_buf(),
                reason: e.to_string(),
            })?;

        let report = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(NanoError::AdapterExecution {
                tool: "ffmpeg",
                file: optimized.to_path_buf(),
                reason: format!("{}: {}", output.status, report.trim()),
            });
        }

        Ok(report)
    }
}

/// Next line of `reader` with invalid UTF-8 replaced, so odd bytes never stop
/// a pipe from draining. `buf` keeps a partial line across cancelled reads.
/// `None` once the stream is exhausted or unreadable.
async fn next_lossy_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    match reader.read_until(b'\n', buf).await {
        Ok(0) | Err(_) if buf.is_empty() => None,
        _ => {
            let line = String::from_utf8_lossy(buf)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            buf.clear();
            Some(line)
        }
    }
}
