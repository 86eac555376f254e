//! Shared API-key auth: bearer header or `token` query param, checked
//! against a single gateway-wide key. Grounded in
//! `packages/gate/src/bin/server.rs::auth_middleware`, generalized from
//! per-request-scheme-sniffing to a single known token.

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub async fn require_api_key(State(state): State<AppState>, Query(query): Query<TokenQuery>, req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let bearer = req.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));

    let presented = bearer.map(str::to_string).or(query.token);
    match presented {
        Some(token) if token == state.api_key => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
