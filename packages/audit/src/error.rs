//! Typed errors for the audit event pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("could not acquire the processor lock; another processor is running")]
    LockHeld,

    #[error("review backend error: {0}")]
    Reviewer(#[from] warden_reviewer::error::ReviewerError),

    #[error("escalation tier returned no parseable JSON: {0}")]
    UnparseableTierOutput(&'static str),
}
