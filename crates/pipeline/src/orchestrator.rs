//! Capture policy: admission against the quota ledger, routing to the
//! remote or client path, and usage recording.

use std::sync::Arc;

use framegrab_core::artifact::FrameArtifact;
use framegrab_core::plan::SamplingPlan;
use framegrab_core::quota::{QuotaLedger, QuotaReservation};
use framegrab_core::source::CaptureSource;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::ClientFrameSampler;
use crate::error::{CaptureError, CaptureWarning};
use crate::media::MediaOpener;
use crate::progress::ProgressSink;
use crate::remote::RemoteExtractionPipeline;

/// How admission and recording are tied together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Check at admission, record after success. Another request may use
    /// up the allowance in between; the capture then succeeds with a
    /// [`CaptureWarning::UsageNotRecorded`].
    #[default]
    CheckThenRecord,
    /// Reserve the estimate at admission; commit the actual count after
    /// success or release it on failure.
    Reserve,
}

#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub source: CaptureSource,
    pub plan: SamplingPlan,
    /// Media duration when the caller already knows it.
    pub known_duration: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub artifacts: Vec<FrameArtifact>,
    pub warnings: Vec<CaptureWarning>,
    /// Remaining monthly images after recording; −1 when unlimited.
    pub remaining_images: i64,
}

enum Admission {
    Checked,
    Reserved(QuotaReservation),
}

pub struct CaptureOrchestrator {
    remote: RemoteExtractionPipeline,
    client: ClientFrameSampler,
    opener: Arc<dyn MediaOpener>,
    mode: AdmissionMode,
}

impl CaptureOrchestrator {
    pub fn new(
        remote: RemoteExtractionPipeline,
        client: ClientFrameSampler,
        opener: Arc<dyn MediaOpener>,
        mode: AdmissionMode,
    ) -> Self {
        Self {
            remote,
            client,
            opener,
            mode,
        }
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    /// Run one capture against `ledger`.
    ///
    /// Quota is checked before any process is spawned or media opened.
    pub async fn capture(
        &self,
        request: &CaptureRequest,
        ledger: &Arc<QuotaLedger>,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<CaptureOutcome, CaptureError> {
        let credential = ledger.entitlement().credential;
        let requested = self.estimate(request, &credential)?;

        let admission = match self.mode {
            AdmissionMode::CheckThenRecord => {
                if !ledger.can_admit(requested) {
                    return Err(quota_exceeded(ledger, requested));
                }
                Admission::Checked
            }
            AdmissionMode::Reserve => Admission::Reserved(ledger.reserve(requested)?),
        };

        tracing::info!(
            source = request.source.kind(),
            requested,
            mode = ?self.mode,
            "Capture admitted",
        );

        // On any error below, a reservation is released when `admission` drops.
        let artifacts = match &request.source {
            CaptureSource::RemoteEmbed(locator) => {
                let extract =
                    self.remote
                        .extract(locator, &request.plan, Some(&credential), progress);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(locator = %locator, "Remote capture cancelled");
                        return Err(CaptureError::Cancelled);
                    }
                    result = extract => result?,
                }
            }
            source => self.sample_locally(source, request, progress, cancel).await?,
        };

        let produced = artifacts.len() as u64;
        let recorded = match admission {
            Admission::Checked => ledger.record_usage(produced),
            Admission::Reserved(reservation) => reservation.commit(produced),
        };

        let mut warnings = Vec::new();
        if !recorded {
            tracing::warn!(produced, "Capture succeeded but usage could not be recorded");
            warnings.push(CaptureWarning::UsageNotRecorded { produced });
        }

        Ok(CaptureOutcome {
            artifacts,
            warnings,
            remaining_images: ledger.remaining_images(),
        })
    }

    /// Admission estimate: `ceil(end / interval)`.
    ///
    /// A bounded plan is also checked against the sample-point cap. A
    /// remote plan with no bound is estimated at the tier ceiling, the
    /// most it can return. Local captures need a bound up front.
    fn estimate(&self, request: &CaptureRequest, credential: &str) -> Result<u64, CaptureError> {
        let known = request.known_duration;
        if request.plan.effective_end(known).is_some() {
            request.plan.sample_count(known)?;
        }
        let estimate = request.plan.estimated_image_count(known);
        if request.source.is_remote() {
            let ceiling = self.remote.frame_ceiling(Some(credential)) as u64;
            return Ok(estimate.unwrap_or(ceiling));
        }
        estimate.ok_or_else(|| {
            CaptureError::Validation(
                "An end time or a known video duration is required".to_string(),
            )
        })
    }

    async fn sample_locally(
        &self,
        source: &CaptureSource,
        request: &CaptureRequest,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<FrameArtifact>, CaptureError> {
        let mut media = self
            .opener
            .open(source)
            .await
            .map_err(|e| CaptureError::SampleFailed(e.to_string()))?;

        let timestamps = request
            .plan
            .timestamps(request.known_duration.or(media.duration()))?;
        if timestamps.is_empty() {
            return Err(CaptureError::NoFrames);
        }

        let artifacts = self
            .client
            .sample(media.as_mut(), &timestamps, progress, cancel)
            .await;

        if artifacts.is_empty() {
            return Err(if cancel.is_cancelled() {
                CaptureError::Cancelled
            } else {
                CaptureError::NoFrames
            });
        }
        tracing::info!(
            captured = artifacts.len(),
            requested = timestamps.len(),
            "Client sampling complete",
        );
        Ok(artifacts)
    }
}

fn quota_exceeded(ledger: &QuotaLedger, requested: u64) -> CaptureError {
    CaptureError::QuotaExceeded {
        requested,
        remaining: ledger.remaining_images(),
    }
}
