//! Capture progress reporting.
//!
//! The remote path has no fine-grained signal from its tools, so it reports
//! discrete [`CaptureStage`]s. The client path knows exactly how many
//! samples remain and reports a percentage.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    Starting,
    Fetching,
    Sampling,
    Collecting,
    Finalizing,
    Complete,
}

impl CaptureStage {
    /// Nominal completion percentage for progress bars.
    pub fn nominal_percent(self) -> f64 {
        match self {
            Self::Starting => 0.0,
            Self::Fetching => 10.0,
            Self::Sampling => 30.0,
            Self::Collecting => 60.0,
            Self::Finalizing => 90.0,
            Self::Complete => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CaptureProgress {
    Stage(CaptureStage),
    Percent(f64),
}

impl CaptureProgress {
    pub fn percent(self) -> f64 {
        match self {
            Self::Stage(stage) => stage.nominal_percent(),
            Self::Percent(p) => p,
        }
    }
}

/// Optional progress callback.
#[derive(Clone, Default)]
pub struct ProgressSink(Option<Arc<dyn Fn(CaptureProgress) + Send + Sync>>);

impl ProgressSink {
    pub fn new(callback: impl Fn(CaptureProgress) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(callback)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn report(&self, progress: CaptureProgress) {
        if let Some(callback) = &self.0 {
            callback(progress);
        }
    }

    pub fn stage(&self, stage: CaptureStage) {
        self.report(CaptureProgress::Stage(stage));
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProgressSink")
            .field(&self.0.as_ref().map(|_| "callback"))
            .finish()
    }
}
