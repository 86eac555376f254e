use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::started_project;
use crate::ws::handle_socket;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub project: String,
}

/// Upgrades to a WebSocket scoped to one project, chosen via `?project=`
/// since the shared `/api/ws` route carries no path segment for it.
pub async fn upgrade(State(state): State<AppState>, Query(query): Query<WsQuery>, ws: WebSocketUpgrade) -> Result<Response, GatewayError> {
    let project = started_project(&state, &query.project).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, project.ws_channel.clone())))
}
