use framegrab_core::error::CoreError;

/// Failure of a single external process invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} binary not found or not executable: {source}")]
    NotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {elapsed_ms}ms")]
    Timeout { tool: String, elapsed_ms: u64 },

    #[error("{tool} failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} produced unusable output: {reason}")]
    InvalidOutput { tool: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a media handle operation on the client sampling path.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Seek to {timestamp}s failed: {reason}")]
    Seek { timestamp: f64, reason: String },

    #[error("No drawable frame at {timestamp}s")]
    NoFrame { timestamp: f64 },

    #[error("Could not open media: {0}")]
    Open(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Terminal failure of a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("{0}")]
    Validation(String),

    #[error("Monthly image limit reached: requested {requested}, remaining {remaining}")]
    QuotaExceeded { requested: u64, remaining: i64 },

    #[error("Failed to download video: {0}")]
    FetchFailed(String),

    #[error("Failed to extract frames: {0}")]
    SampleFailed(String),

    #[error("No frames could be extracted from the video")]
    NoFrames,

    #[error("Capture was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Stable taxonomy string for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation-error",
            Self::QuotaExceeded { .. } => "quota-exceeded",
            Self::FetchFailed(_) => "fetch-failed",
            Self::SampleFailed(_) => "sample-failed",
            Self::NoFrames => "no-frames",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal-error",
        }
    }
}

impl From<CoreError> for CaptureError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::QuotaExceeded {
                requested,
                remaining,
            } => Self::QuotaExceeded {
                requested,
                remaining,
            },
            CoreError::Persistence(msg) | CoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// Non-fatal condition reported alongside a successful capture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureWarning {
    #[error("{produced} images were produced but could not be recorded against the monthly limit")]
    UsageNotRecorded { produced: u64 },
}

impl CaptureWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UsageNotRecorded { .. } => "usage-not-recorded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(CaptureError::Validation("x".into()).kind(), "validation-error");
        assert_eq!(
            CaptureError::QuotaExceeded {
                requested: 5,
                remaining: 2
            }
            .kind(),
            "quota-exceeded"
        );
        assert_eq!(CaptureError::FetchFailed("x".into()).kind(), "fetch-failed");
        assert_eq!(CaptureError::SampleFailed("x".into()).kind(), "sample-failed");
        assert_eq!(CaptureError::NoFrames.kind(), "no-frames");
        assert_eq!(CaptureError::Internal("x".into()).kind(), "internal-error");
        assert_eq!(
            CaptureWarning::UsageNotRecorded { produced: 3 }.kind(),
            "usage-not-recorded"
        );
    }

    #[test]
    fn core_errors_map_onto_taxonomy() {
        let err: CaptureError = CoreError::QuotaExceeded {
            requested: 10,
            remaining: 1,
        }
        .into();
        assert_eq!(err.kind(), "quota-exceeded");

        let err: CaptureError = CoreError::Persistence("disk full".into()).into();
        assert_eq!(err.kind(), "internal-error");
    }
}
