//! Per-project WebSocket connection registry and the 5-second poll loop
//! that diffs governance/job state and broadcasts only on change. Grounded
//! in WebSocket manager contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::{mpsc, RwLock};

use crate::mcp_client::McpClient;
use crate::models::{Job, JobStatus, ProjectSnapshot};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

type Sender = mpsc::UnboundedSender<Message>;

/// Tracks the live WebSocket connections for one project and the single
/// background poller that feeds them deltas.
#[derive(Default)]
pub struct ProjectChannel {
    connections: RwLock<HashMap<u64, Sender>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl ProjectChannel {
    pub async fn register(&self, tx: Sender) -> u64 {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.connections.write().await.insert(id, tx);
        id
    }

    pub async fn unregister(&self, id: u64) {
        self.connections.write().await.remove(&id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends to every connection, dropping (lazily, on the next poll tick)
    /// any whose receiver has gone away.
    pub async fn broadcast(&self, message: &str) {
        let mut dead = Vec::new();
        for (id, tx) in self.connections.read().await.iter() {
            if tx.send(Message::Text(message.to_string().into())).is_err() {
                dead.push(*id);
            }
        }
        if !dead.is_empty() {
            let mut guard = self.connections.write().await;
            for id in dead {
                guard.remove(&id);
            }
        }
    }
}

/// Runs the per-project poll loop for as long as there is at least one
/// connection. Exits the inner wait and re-checks once a minute when idle,
/// so a newly (re)connected client resumes delivery without restarting the
/// gateway.
pub async fn run_poll_loop(channel: Arc<ProjectChannel>, governance_client: Arc<McpClient>, jobs: Arc<crate::job_runner::JobRunner>) {
    let mut last = ProjectSnapshot::default();
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if channel.connection_count().await == 0 {
            continue;
        }

        let status = governance_client.call_tool("get_governance_status", serde_json::json!({})).await.ok();
        let tasks = governance_client.call_tool("list_governed_tasks", serde_json::json!({})).await.ok();
        let job_statuses: Vec<(String, JobStatus)> = jobs.list().await.unwrap_or_default().into_iter().map(|j: Job| (j.id, j.status)).collect();

        let snapshot = ProjectSnapshot { governance_status: status.clone(), governed_tasks: tasks.clone(), job_statuses: job_statuses.clone() };
        if snapshot == last {
            continue;
        }

        if snapshot.governance_status != last.governance_status {
            if let Some(status) = &status {
                if let Ok(body) = serde_json::to_string(&serde_json::json!({"type": "governance_status", "status": status})) {
                    channel.broadcast(&body).await;
                }
            }
        }
        if snapshot.governed_tasks != last.governed_tasks {
            if let Some(tasks) = &tasks {
                if let Ok(body) = serde_json::to_string(&serde_json::json!({"type": "governed_tasks", "tasks": tasks})) {
                    channel.broadcast(&body).await;
                }
            }
        }
        for (job_id, status) in &job_statuses {
            if !last.job_statuses.iter().any(|(id, s)| id == job_id && s == status) {
                if let Ok(body) = serde_json::to_string(&serde_json::json!({"type": "job_update", "job_id": job_id, "status": status})) {
                    channel.broadcast(&body).await;
                }
            }
        }

        last = snapshot;
    }
}

/// Drives one accepted `WebSocket` upgrade: registers with the channel,
/// forwards queued outgoing messages, and deregisters on send failure or
/// client disconnect.
pub async fn handle_socket(socket: WebSocket, channel: Arc<ProjectChannel>) {
    let (mut sink, mut stream) = futures_util::StreamExt::split(socket);
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = channel.register(tx).await;

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if futures_util::SinkExt::send(&mut sink, message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_)) = futures_util::StreamExt::next(&mut stream).await {
        // Inbound client messages are not part of the protocol; drain and ignore.
    }

    channel.unregister(id).await;
    forward.abort();
}
