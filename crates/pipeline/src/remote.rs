//! Remote extraction: fetch a hosted video, sample it with an external tool,
//! and collect the frames, all inside a throwaway scratch area.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use framegrab_core::artifact::{ArtifactIds, FrameArtifact, ImageRef, MIME_PNG};
use framegrab_core::entitlement::EntitlementResolver;
use framegrab_core::plan::SamplingPlan;

use crate::config::PipelineConfig;
use crate::error::{CaptureError, ToolError};
use crate::progress::{CaptureStage, ProgressSink};
use crate::scratch::ScratchArea;
use crate::tools::{
    is_frame_file, Fetcher, SampleRequest, Sampler, FETCHED_VIDEO_NAME, FRAME_PATTERN,
};

/// Id prefix for artifacts produced by this pipeline.
const ARTIFACT_PREFIX: &str = "frame";

pub struct RemoteExtractionPipeline {
    fetcher: Arc<dyn Fetcher>,
    sampler: Arc<dyn Sampler>,
    resolver: Arc<dyn EntitlementResolver>,
    config: PipelineConfig,
}

impl RemoteExtractionPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sampler: Arc<dyn Sampler>,
        resolver: Arc<dyn EntitlementResolver>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            sampler,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Frame ceiling for the tier `credential` resolves to.
    pub fn frame_ceiling(&self, credential: Option<&str>) -> usize {
        let entitlement = self.resolver.resolve(credential, Utc::now());
        self.resolver.limits(entitlement.tier).frame_ceiling
    }

    /// Produce the frames of `plan` from the video behind `locator`.
    ///
    /// The scratch area is removed before this returns, whatever the
    /// outcome. If the future is dropped mid-run, the scratch area is
    /// removed on drop and any running tool is killed.
    pub async fn extract(
        &self,
        locator: &str,
        plan: &SamplingPlan,
        credential: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<FrameArtifact>, CaptureError> {
        progress.stage(CaptureStage::Starting);

        let entitlement = self.resolver.resolve(credential, Utc::now());
        let ceiling = self.resolver.limits(entitlement.tier).frame_ceiling;

        let scratch = ScratchArea::create(self.config.scratch_root.as_deref()).map_err(|e| {
            tracing::error!(error = %e, "Failed to create scratch area");
            CaptureError::Internal(format!("Failed to create scratch area: {e}"))
        })?;

        tracing::info!(
            locator,
            tier = entitlement.tier.as_str(),
            ceiling,
            scratch = %scratch.path().display(),
            "Starting remote extraction",
        );

        let result = self.run(&scratch, locator, plan, ceiling, progress).await;

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Failed to remove scratch area");
        }

        match &result {
            Ok(artifacts) => {
                progress.stage(CaptureStage::Complete);
                tracing::info!(locator, frames = artifacts.len(), "Remote extraction complete");
            }
            Err(e) => tracing::info!(locator, kind = e.kind(), error = %e, "Remote extraction failed"),
        }
        result
    }

    async fn run(
        &self,
        scratch: &ScratchArea,
        locator: &str,
        plan: &SamplingPlan,
        ceiling: usize,
        progress: &ProgressSink,
    ) -> Result<Vec<FrameArtifact>, CaptureError> {
        // --- Fetch ---
        progress.stage(CaptureStage::Fetching);
        let video = scratch.join(FETCHED_VIDEO_NAME);
        self.bounded(self.fetcher.fetch(locator, &video, self.config.tool_timeout))
            .await
            .map_err(|e| CaptureError::FetchFailed(e.to_string()))?;
        ensure_non_empty(&video).await?;

        // --- Sample ---
        progress.stage(CaptureStage::Sampling);
        let request = SampleRequest {
            start_time: plan.start_time(),
            end_time: plan.end_time(),
            interval_seconds: plan.interval_seconds(),
            // One past the ceiling so over-production is still logged.
            max_frames: Some(ceiling.saturating_add(1)),
            output_pattern: scratch.join(FRAME_PATTERN),
        };
        self.bounded(self.sampler.sample(&video, &request, self.config.tool_timeout))
            .await
            .map_err(|e| CaptureError::SampleFailed(e.to_string()))?;

        // --- Collect ---
        progress.stage(CaptureStage::Collecting);
        let mut frames = list_frames(scratch.path()).await?;
        if frames.is_empty() {
            return Err(CaptureError::NoFrames);
        }
        if frames.len() > ceiling {
            tracing::warn!(
                produced = frames.len(),
                ceiling,
                "Frame count exceeds tier ceiling, keeping earliest frames",
            );
            frames.truncate(ceiling);
        }

        // --- Encode ---
        progress.stage(CaptureStage::Finalizing);
        let ids = ArtifactIds::new(ARTIFACT_PREFIX);
        let mut artifacts = Vec::with_capacity(frames.len());
        for (index, path) in frames.iter().enumerate() {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Failed to read frame");
                CaptureError::Internal(format!("Failed to read extracted frame: {e}"))
            })?;
            let timestamp = plan.timestamp_at(index);
            artifacts.push(FrameArtifact::new(
                ids.id_for(index, timestamp),
                ImageRef::embed(MIME_PNG, &bytes),
                timestamp,
            ));
        }
        Ok(artifacts)
    }

    /// Await a tool step, giving up once the tool timeout plus grace has
    /// passed even if the tool itself never returns.
    async fn bounded<F>(&self, step: F) -> Result<(), ToolError>
    where
        F: std::future::Future<Output = Result<(), ToolError>>,
    {
        let deadline = self.config.step_deadline();
        match tokio::time::timeout(deadline, step).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: "pipeline step".to_string(),
                elapsed_ms: duration_ms(deadline),
            }),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

async fn ensure_non_empty(video: &Path) -> Result<(), CaptureError> {
    match tokio::fs::metadata(video).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(CaptureError::FetchFailed(
            "Downloaded video file is empty".to_string(),
        )),
        Err(_) => Err(CaptureError::FetchFailed(
            "No video file was produced".to_string(),
        )),
    }
}

/// Sampled frame files in `dir`, sorted by name.
async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CaptureError::Internal(format!("Failed to list scratch area: {e}")))?;

    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CaptureError::Internal(format!("Failed to list scratch area: {e}")))?
    {
        if entry.file_name().to_str().is_some_and(is_frame_file) {
            frames.push(entry.path());
        }
    }
    frames.sort();
    Ok(frames)
}
