//! Typed errors for the gateway: project registry, MCP client, job runner.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project id already registered: {0}")]
    DuplicateProject(String),

    #[error("project {0} is not started")]
    ProjectNotStarted(String),

    #[error("mcp transport error: {0}")]
    McpTransport(String),

    #[error("mcp call timed out")]
    McpTimeout,

    #[error("mcp server returned an error: {0}")]
    McpRemote(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::ProjectNotFound(_) | GatewayError::JobNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DuplicateProject(_) | GatewayError::ProjectNotStarted(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::McpTransport(_) | GatewayError::McpTimeout | GatewayError::McpRemote(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) | GatewayError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
