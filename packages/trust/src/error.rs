use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("dismissal justification must be non-empty")]
    EmptyJustification,

    #[error("finding '{0}' already recorded")]
    DuplicateFinding(String),
}
