//! Trust/quality surface: proxies to the project's quality MCP server,
//! exposing its trust-gate and finding-dismissal contract.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::started_project;

#[derive(Debug, Deserialize)]
pub struct DismissRequest {
    pub finding_id: String,
    pub reason: String,
}

pub async fn findings(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project.quality_client.call_tool("get_unresolved_findings", serde_json::json!({})).await?;
    Ok(Json(result))
}

pub async fn dismiss(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<DismissRequest>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project
        .quality_client
        .call_tool("record_dismissal", serde_json::json!({"finding_id": req.finding_id, "reason": req.reason}))
        .await?;
    Ok(Json(result))
}

pub async fn gates(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project.quality_client.call_tool("check_all_gates", serde_json::json!({})).await?;
    Ok(Json(result))
}
