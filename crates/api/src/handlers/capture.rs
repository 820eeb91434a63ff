//! Handler for `POST /api/v1/process-video`.
//!
//! The body is validated field by field before anything else runs, so a
//! malformed request never reaches the quota ledger or spawns a tool.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use framegrab_core::artifact::FrameArtifact;
use framegrab_core::ingress::ProcessVideoRequest;
use framegrab_core::source::{classify_source, CaptureSource, Platform};
use framegrab_pipeline::error::CaptureError;
use framegrab_pipeline::orchestrator::{CaptureOutcome, CaptureRequest};
use framegrab_pipeline::progress::ProgressSink;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientContext;
use crate::state::AppState;

/// Successful `process-video` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoResponse {
    pub success: bool,
    /// Embedded `data:image/png;base64,...` references in capture order.
    pub images: Vec<String>,
    pub frames: Vec<FrameInfo>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub usage_info: UsageInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub id: String,
    pub timestamp_seconds: f64,
    pub time_label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub images_generated: usize,
    /// `-1` when the entitlement is unlimited.
    pub remaining_images: i64,
}

impl From<CaptureOutcome> for ProcessVideoResponse {
    fn from(outcome: CaptureOutcome) -> Self {
        let count = outcome.artifacts.len();
        let frames = outcome.artifacts.iter().map(FrameInfo::from).collect();
        let images = outcome
            .artifacts
            .into_iter()
            .map(|a| a.into_image_ref().into_data_uri())
            .collect();

        Self {
            success: true,
            images,
            frames,
            message: format!("Successfully extracted {count} images"),
            warning: outcome.warnings.first().map(ToString::to_string),
            usage_info: UsageInfo {
                images_generated: count,
                remaining_images: outcome.remaining_images,
            },
        }
    }
}

impl From<&FrameArtifact> for FrameInfo {
    fn from(artifact: &FrameArtifact) -> Self {
        Self {
            id: artifact.id().to_string(),
            timestamp_seconds: artifact.timestamp_seconds(),
            time_label: artifact.time_label().to_string(),
        }
    }
}

/// POST /api/v1/process-video
///
/// Fetch a hosted video, sample frames on the plan's grid, and charge the
/// produced count to the caller's monthly allowance.
pub async fn process_video(
    State(state): State<AppState>,
    client: ClientContext,
    body: Bytes,
) -> AppResult<Json<ProcessVideoResponse>> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Request body must be valid JSON: {e}")))?;
    let request = ProcessVideoRequest::from_json(&value)?;

    if let Some(credential) = request.credential.as_deref() {
        if client.ledger.entitlement().credential != credential {
            let entitlement = client.ledger.set_credential(Some(credential));
            tracing::info!(client = %client.id, tier = entitlement.tier.as_str(), "Credential updated from request");
        }
    }

    // Only hosted videos are fetched server-side; direct media and files
    // are sampled by the caller's own player.
    let locator = match classify_source(&request.url)? {
        CaptureSource::RemoteEmbed(locator) => locator,
        CaptureSource::LocalFile(_) | CaptureSource::LocalUrl(_) => {
            let supported = Platform::ALL.map(Platform::display_name).join(", ");
            return Err(CaptureError::Validation(format!(
                "Unsupported video URL: '{}'. Supported platforms: {supported}",
                request.url.trim()
            ))
            .into());
        }
    };
    tracing::info!(client = %client.id, url = %locator, "Processing video");

    let capture = CaptureRequest {
        source: CaptureSource::RemoteEmbed(locator),
        plan: request.plan,
        known_duration: None,
    };

    let client_id = client.id.clone();
    let progress = ProgressSink::new(move |p| {
        tracing::debug!(client = %client_id, progress = ?p, "Capture progress");
    });

    // Cancelled if the connection goes away before the capture finishes.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state
        .orchestrator
        .capture(&capture, &client.ledger, &progress, &cancel)
        .await?;

    for warning in &outcome.warnings {
        tracing::warn!(client = %client.id, kind = warning.kind(), "{warning}");
    }
    tracing::info!(
        client = %client.id,
        frames = outcome.artifacts.len(),
        remaining = outcome.remaining_images,
        "Video processed",
    );

    Ok(Json(outcome.into()))
}
