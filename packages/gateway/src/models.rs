//! Project registry, job, and WebSocket message shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three ports carved out of a project's slot: KG, quality, governance MCP servers.
pub const PORTS_PER_SLOT: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Stopped,
    Starting,
    Running,
    Degraded,
    Error,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Stopped
    }
}

/// One registered project workspace. Persisted as a row in the registry
/// file; `slot` determines the base of the three MCP ports this project
/// owns (`mcp_base_port + 0/1/2` for KG/quality/governance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: String,
    pub slot: u16,
    pub mcp_base_port: u16,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn kg_port(&self) -> u16 {
        self.mcp_base_port
    }
    pub fn quality_port(&self) -> u16 {
        self.mcp_base_port + 1
    }
    pub fn governance_port(&self) -> u16 {
        self.mcp_base_port + 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub project_id: String,
    pub kind: String,
    pub prompt: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(project_id: impl Into<String>, kind: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            kind: kind.into(),
            prompt: prompt.into(),
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Snapshot the WebSocket poll loop diffs against before broadcasting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub governance_status: Option<serde_json::Value>,
    pub governed_tasks: Option<serde_json::Value>,
    pub job_statuses: Vec<(String, JobStatus)>,
}

/// A WebSocket broadcast delta, tagged with its project so a shared
/// connection manager can route it (though in practice connections are
/// already scoped to one project's channel).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    GovernanceStatus { project_id: String, status: serde_json::Value },
    GovernedTasks { project_id: String, tasks: serde_json::Value },
    JobUpdate { project_id: String, job_id: String, status: JobStatus },
}
