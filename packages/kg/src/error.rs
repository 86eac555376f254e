use thiserror::Error;

/// Errors surfaced at the knowledge-graph crate boundary.
#[derive(Debug, Error)]
pub enum KgError {
    #[error("entity '{0}' not found")]
    NotFound(String),

    #[error("{tier}-tier entities require {requirement}")]
    TierDenied { tier: String, requirement: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
