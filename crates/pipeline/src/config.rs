use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget for each external process.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra time the pipeline waits beyond a tool's own timeout before giving
/// up on the step itself.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Pause between client-side samples.
pub const DEFAULT_INTER_SAMPLE_DELAY: Duration = Duration::from_millis(100);

/// Locations of the external binaries.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ytdlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdlp: PathBuf::from("yt-dlp"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tool_timeout: Duration,
    pub kill_grace: Duration,
    /// Parent directory for scratch areas; `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
            scratch_root: None,
        }
    }
}

impl PipelineConfig {
    /// Deadline for a whole fetch or sample step.
    pub fn step_deadline(&self) -> Duration {
        self.tool_timeout + self.kill_grace
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub inter_sample_delay: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            inter_sample_delay: DEFAULT_INTER_SAMPLE_DELAY,
        }
    }
}
