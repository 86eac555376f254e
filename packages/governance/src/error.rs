use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("decision '{0}' not found")]
    DecisionNotFound(String),

    #[error("governed task '{0}' not found")]
    GovernedTaskNotFound(String),

    #[error("evolution proposal '{0}' not found")]
    ProposalNotFound(String),
}
