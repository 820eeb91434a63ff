//! FFmpeg/FFprobe command helpers and the ffmpeg-backed [`Sampler`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ToolError;
use crate::subprocess::run_tool;
use crate::tools::{SampleRequest, Sampler};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a local path or URL and return the parsed JSON output.
pub async fn probe_media(
    ffprobe: &Path,
    input: &OsStr,
    timeout: Duration,
) -> Result<FfprobeOutput, ToolError> {
    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(input);

    let output = run_tool("ffprobe", &mut cmd, timeout).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout).map_err(|e| ToolError::InvalidOutput {
        tool: "ffprobe".to_string(),
        reason: e.to_string(),
    })
}

/// Decode the single frame at `timestamp_secs` and return it as PNG bytes.
pub async fn grab_frame_png(
    ffmpeg: &Path,
    input: &OsStr,
    timestamp_secs: f64,
    timeout: Duration,
) -> Result<Vec<u8>, ToolError> {
    let mut cmd = Command::new(ffmpeg);
    cmd.args([
        "-nostdin",
        "-loglevel",
        "error",
        "-ss",
        &format!("{timestamp_secs:.3}"),
        "-i",
    ])
    .arg(input)
    .args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "-"]);

    let output = run_tool("ffmpeg", &mut cmd, timeout).await?;
    Ok(output.stdout)
}

/// Arguments for sampling `input` at a fixed rate into `request.output_pattern`.
pub fn sample_args(input: &Path, request: &SampleRequest) -> Vec<String> {
    let mut args = vec![
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        request.start_time.to_string(),
    ];
    if let Some(end) = request.end_time {
        args.push("-to".to_string());
        args.push(end.to_string());
    }
    args.extend([
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vf".to_string(),
        format!("fps=1/{}", request.interval_seconds),
    ]);
    if let Some(max) = request.max_frames {
        args.push("-frames:v".to_string());
        args.push(max.to_string());
    }
    args.extend([
        "-y".to_string(),
        request.output_pattern.to_string_lossy().into_owned(),
    ]);
    args
}

/// [`Sampler`] that runs `ffmpeg` with an `fps` filter.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    binary: PathBuf,
}

impl FfmpegSampler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Sampler for FfmpegSampler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn sample(
        &self,
        input: &Path,
        request: &SampleRequest,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(sample_args(input, request));
        run_tool(self.name(), &mut cmd, timeout).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the media duration in seconds, if ffprobe reported one.
pub fn parse_duration(probe: &FfprobeOutput) -> Option<f64> {
    let from_format = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok());
    let from_stream = || {
        first_video_stream(probe)
            .and_then(|s| s.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
    };
    from_format
        .or_else(from_stream)
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Find the first video stream's resolution.
pub fn parse_resolution(probe: &FfprobeOutput) -> Option<(u32, u32)> {
    let stream = first_video_stream(probe)?;
    let width = u32::try_from(stream.width?).ok()?;
    let height = u32::try_from(stream.height?).ok()?;
    (width > 0 && height > 0).then_some((width, height))
}
