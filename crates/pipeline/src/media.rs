//! ffmpeg-backed [`MediaHandle`] for local files and direct media URLs.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use framegrab_core::source::CaptureSource;
use image::{ImageFormat, RgbaImage};

use crate::client::MediaHandle;
use crate::config::ToolPaths;
use crate::error::MediaError;
use crate::ffmpeg::{grab_frame_png, parse_duration, parse_resolution, probe_media};

/// Opens a [`MediaHandle`] for a non-remote capture source.
#[async_trait]
pub trait MediaOpener: Send + Sync {
    async fn open(&self, source: &CaptureSource) -> Result<Box<dyn MediaHandle>, MediaError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegMediaOpener {
    tools: ToolPaths,
    timeout: Duration,
}

impl FfmpegMediaOpener {
    /// `timeout` bounds each probe and each single-frame decode.
    pub fn new(tools: ToolPaths, timeout: Duration) -> Self {
        Self { tools, timeout }
    }
}

#[async_trait]
impl MediaOpener for FfmpegMediaOpener {
    async fn open(&self, source: &CaptureSource) -> Result<Box<dyn MediaHandle>, MediaError> {
        let input: OsString = match source {
            CaptureSource::LocalFile(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(MediaError::Open(format!(
                        "video file not found: {}",
                        path.display()
                    )));
                }
                path.as_os_str().to_owned()
            }
            CaptureSource::LocalUrl(url) => OsString::from(url),
            CaptureSource::RemoteEmbed(url) => {
                return Err(MediaError::Open(format!(
                    "{url} is hosted on a platform and must go through remote extraction"
                )))
            }
        };

        let probe = probe_media(&self.tools.ffprobe, &input, self.timeout).await?;
        let dimensions = parse_resolution(&probe).ok_or_else(|| {
            MediaError::Open("media has no decodable video stream".to_string())
        })?;
        let duration = parse_duration(&probe);

        tracing::debug!(
            kind = source.kind(),
            width = dimensions.0,
            height = dimensions.1,
            ?duration,
            "Opened media",
        );

        Ok(Box::new(FfmpegMediaHandle {
            ffmpeg: self.tools.ffmpeg.clone(),
            input,
            dimensions,
            duration,
            position: 0.0,
            timeout: self.timeout,
        }))
    }
}

/// Seeks by remembering the position; rasterizes by decoding the single
/// frame at that position with ffmpeg.
#[derive(Debug)]
pub struct FfmpegMediaHandle {
    ffmpeg: PathBuf,
    input: OsString,
    dimensions: (u32, u32),
    duration: Option<f64>,
    position: f64,
    timeout: Duration,
}

#[async_trait]
impl MediaHandle for FfmpegMediaHandle {
    fn native_dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    async fn seek(&mut self, timestamp: f64) -> Result<(), MediaError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(MediaError::Seek {
                timestamp,
                reason: "timestamp must be a non-negative number".to_string(),
            });
        }
        if let Some(duration) = self.duration {
            if timestamp > duration {
                return Err(MediaError::Seek {
                    timestamp,
                    reason: format!("past the end of the media ({duration}s)"),
                });
            }
        }
        self.position = timestamp;
        Ok(())
    }

    async fn rasterize(&mut self) -> Result<RgbaImage, MediaError> {
        let timestamp = self.position;
        let position = decode_position(timestamp, self.duration);
        let png = grab_frame_png(&self.ffmpeg, &self.input, position, self.timeout).await?;
        if png.is_empty() {
            return Err(MediaError::NoFrame { timestamp });
        }
        let frame = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|_| MediaError::NoFrame { timestamp })?;
        Ok(frame.to_rgba8())
    }
}

/// Keep the decoder just inside the stream.
///
/// Seeking to exactly `duration` is valid but ffmpeg emits nothing there, so
/// the last frame is read from one millisecond earlier.
fn decode_position(timestamp: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if timestamp >= duration => (duration - END_BACKOFF_SECONDS).max(0.0),
        _ => timestamp,
    }
}

const END_BACKOFF_SECONDS: f64 = 0.001;
