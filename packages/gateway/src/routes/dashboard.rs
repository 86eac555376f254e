//! Aggregate dashboard view: one round-trip for the UI's project overview
//! page. Filesystem-derived fields (project metadata, job list, config) are
//! always present; MCP-derived fields degrade individually to `null` on
//! failure rather than failing the whole request, since a single stalled
//! project MCP server should not take down the dashboard for every other
//! project.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::started_project;

pub async fn aggregate(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, GatewayError> {
    let registered = state.registry.get(&id).await?;
    let project = started_project(&state, &id).await?;

    let governance_status = project.governance_client.call_tool("get_governance_status", serde_json::json!({})).await.ok();
    let governed_tasks = project.governance_client.call_tool("list_governed_tasks", serde_json::json!({})).await.ok();
    let unresolved_findings = project.quality_client.call_tool("get_unresolved_findings", serde_json::json!({})).await.ok();

    let jobs = project.jobs.list().await.unwrap_or_default();
    let config = project.config.load().await;

    Ok(Json(serde_json::json!({
        "project": registered,
        "governance_status": governance_status,
        "governed_tasks": governed_tasks,
        "unresolved_findings": unresolved_findings,
        "jobs": jobs,
        "config": config,
        "ws_connections": project.ws_channel.connection_count().await,
    })))
}
