//! Task-governance surface: proxies to the project's governance MCP
//! server, exposing its governed-task and decision records as read
//! endpoints for the dashboard UI.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::started_project;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn tasks(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<SessionQuery>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let args = match query.session_id {
        Some(session_id) => serde_json::json!({"session_id": session_id}),
        None => serde_json::json!({}),
    };
    let result = project.governance_client.call_tool("list_governed_tasks", args).await?;
    Ok(Json(result))
}

pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project.governance_client.call_tool("get_governance_status", serde_json::json!({})).await?;
    Ok(Json(result))
}

pub async fn decisions(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<SessionQuery>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let args = match query.session_id {
        Some(session_id) => serde_json::json!({"session_id": session_id}),
        None => serde_json::json!({}),
    };
    let result = project.governance_client.call_tool("get_decisions", args).await?;
    Ok(Json(result))
}
