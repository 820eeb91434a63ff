//! Frame artifacts: one sampled image plus where in the video it came from.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use uuid::Uuid;

use crate::plan::format_time_label;

/// MIME type for PNG frames.
pub const MIME_PNG: &str = "image/png";

/// A self-describing `data:<mime>;base64,...` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap encoded image bytes as an embedded data URI.
    pub fn embed(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.0
    }

    pub fn into_data_uri(self) -> String {
        self.0
    }
}

/// One sampled frame. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameArtifact {
    id: String,
    image_ref: ImageRef,
    timestamp_seconds: f64,
    time_label: String,
}

impl FrameArtifact {
    pub fn new(id: String, image_ref: ImageRef, timestamp_seconds: f64) -> Self {
        Self {
            id,
            image_ref,
            time_label: format_time_label(timestamp_seconds),
            timestamp_seconds,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image_ref(&self) -> &ImageRef {
        &self.image_ref
    }

    pub fn timestamp_seconds(&self) -> f64 {
        self.timestamp_seconds
    }

    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    pub fn into_image_ref(self) -> ImageRef {
        self.image_ref
    }
}

/// Issues artifact ids that are unique within (and across) extraction runs.
///
/// Ids combine a per-run UUID v7 with the sample index, so two frames at
/// the same timestamp produced in the same millisecond still differ.
#[derive(Debug, Clone)]
pub struct ArtifactIds {
    prefix: &'static str,
    run_id: Uuid,
}

impl ArtifactIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            run_id: Uuid::now_v7(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn id_for(&self, index: usize, timestamp_seconds: f64) -> String {
        let millis = (timestamp_seconds * 1000.0).round() as i64;
        format!("{}-{}-{index}-{millis}", self.prefix, self.run_id.simple())
    }
}
