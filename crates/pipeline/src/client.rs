//! Sequential frame sampling over a seekable media handle.

use std::io::Cursor;

use async_trait::async_trait;
use framegrab_core::artifact::{ArtifactIds, FrameArtifact, ImageRef, MIME_PNG};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tokio_util::sync::CancellationToken;

use crate::config::SamplerConfig;
use crate::error::MediaError;
use crate::progress::{CaptureProgress, ProgressSink};

/// Id prefix for artifacts produced by client-side sampling.
const ARTIFACT_PREFIX: &str = "capture";

/// A seekable source of decoded frames.
///
/// Only one seek may be outstanding at a time; `&mut self` on
/// [`MediaHandle::seek`] enforces that.
#[async_trait]
pub trait MediaHandle: Send {
    /// Native pixel dimensions, `(0, 0)` when unknown.
    fn native_dimensions(&self) -> (u32, u32);

    /// Duration in seconds, if known.
    fn duration(&self) -> Option<f64>;

    /// Move to `timestamp` and resolve once the position is ready to draw.
    async fn seek(&mut self, timestamp: f64) -> Result<(), MediaError>;

    /// Draw the frame at the current position.
    async fn rasterize(&mut self) -> Result<RgbaImage, MediaError>;
}

#[derive(Debug, Clone, Default)]
pub struct ClientFrameSampler {
    config: SamplerConfig,
}

impl ClientFrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Capture one artifact per timestamp, in order.
    ///
    /// Timestamps whose seek or rasterization fails are skipped, so the
    /// result may be shorter than `timestamps`. Stops early once `cancel`
    /// fires.
    pub async fn sample(
        &self,
        media: &mut dyn MediaHandle,
        timestamps: &[f64],
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<FrameArtifact> {
        let ids = ArtifactIds::new(ARTIFACT_PREFIX);
        let total = timestamps.len();
        let mut artifacts = Vec::with_capacity(total);

        for (index, &timestamp) in timestamps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(captured = artifacts.len(), total, "Client sampling cancelled");
                break;
            }

            match self.capture_one(media, timestamp).await {
                Ok(image_ref) => {
                    artifacts.push(FrameArtifact::new(
                        ids.id_for(index, timestamp),
                        image_ref,
                        timestamp,
                    ));
                }
                Err(e) => tracing::debug!(timestamp, error = %e, "Skipping sample"),
            }

            progress.report(CaptureProgress::Percent(
                (index + 1) as f64 / total as f64 * 100.0,
            ));

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.config.inter_sample_delay) => {}
            }
        }

        artifacts
    }

    async fn capture_one(
        &self,
        media: &mut dyn MediaHandle,
        timestamp: f64,
    ) -> Result<ImageRef, MediaError> {
        media.seek(timestamp).await?;
        let frame = media.rasterize().await?;
        let frame = fit_to_native(frame, media.native_dimensions());
        encode_png(frame, timestamp)
    }
}

/// Scale `frame` to the media's native size when the two disagree.
fn fit_to_native(frame: RgbaImage, (width, height): (u32, u32)) -> RgbaImage {
    if width == 0 || height == 0 || frame.dimensions() == (width, height) {
        return frame;
    }
    imageops::resize(&frame, width, height, FilterType::Triangle)
}

fn encode_png(frame: RgbaImage, timestamp: f64) -> Result<ImageRef, MediaError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(frame)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| {
            tracing::warn!(timestamp, error = %e, "Failed to encode frame");
            MediaError::NoFrame { timestamp }
        })?;
    Ok(ImageRef::embed(MIME_PNG, buf.get_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_frames_are_scaled() {
        let frame = RgbaImage::new(4, 2);
        assert_eq!(fit_to_native(frame, (8, 4)).dimensions(), (8, 4));
    }

    #[test]
    fn unknown_native_size_keeps_frame() {
        let frame = RgbaImage::new(4, 2);
        assert_eq!(fit_to_native(frame, (0, 0)).dimensions(), (4, 2));
    }

    #[test]
    fn encoded_frames_are_png_data_uris() {
        let image_ref = encode_png(RgbaImage::new(2, 2), 0.0).unwrap();
        assert!(image_ref.as_data_uri().starts_with("data:image/png;base64,"));
    }
}
