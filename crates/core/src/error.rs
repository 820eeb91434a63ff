#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Monthly image quota exceeded: requested {requested}, remaining {remaining}")]
    QuotaExceeded { requested: u64, remaining: i64 },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
