//! Strategy seams for the two external collaborators of the remote
//! pipeline: a [`Fetcher`] that materializes a remote video locally, and a
//! [`Sampler`] that turns a local video into numbered image files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ToolError;

/// File name prefix of sampled frames.
pub const FRAME_FILE_PREFIX: &str = "frame-";

/// File extension of sampled frames.
pub const FRAME_FILE_EXT: &str = "png";

/// printf-style output pattern handed to the sampler. Zero padding keeps
/// lexicographic order equal to chronological order.
pub const FRAME_PATTERN: &str = "frame-%05d.png";

/// Name of the fetched asset inside the scratch area.
pub const FETCHED_VIDEO_NAME: &str = "video.mp4";

/// Time window and spacing for one sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub interval_seconds: f64,
    /// Stop after writing this many frames.
    pub max_frames: Option<usize>,
    /// Full output path pattern, e.g. `<scratch>/frame-%05d.png`.
    pub output_pattern: PathBuf,
}

/// Produces a single playable local video from a remote locator.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Write the video to `output_path`, failing on non-zero exit or timeout.
    async fn fetch(
        &self,
        locator: &str,
        output_path: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError>;
}

/// Produces one numbered image file per sample point of a local video.
#[async_trait]
pub trait Sampler: Send + Sync {
    fn name(&self) -> &str;

    async fn sample(
        &self,
        input: &Path,
        request: &SampleRequest,
        timeout: Duration,
    ) -> Result<(), ToolError>;
}

/// Whether `name` looks like a file produced by the sampler.
pub fn is_frame_file(name: &str) -> bool {
    name.starts_with(FRAME_FILE_PREFIX)
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == FRAME_FILE_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_file_names() {
        assert!(is_frame_file("frame-00001.png"));
        assert!(!is_frame_file("frame-00001.jpg"));
        assert!(!is_frame_file("video.mp4"));
        assert!(!is_frame_file("thumb-00001.png"));
    }
}
