//! Project registry: a JSON file in the user's home directory listing every
//! registered project workspace, with slug-based ids and slot/port
//! assignment. Grounded in the MCP-server trio's per-project port
//! convention and a JSON-file persistence idiom
//! (`warden-taskfile`'s one-file-per-record approach, generalized here to
//! one file for the whole registry since it is small and rarely written).

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::GatewayError;
use crate::models::{Project, ProjectStatus, PORTS_PER_SLOT};

const DEFAULT_BASE_PORT: u16 = 8700;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    projects: Vec<Project>,
}

/// Slugifies a display name: lowercase, non-alphanumeric runs collapsed to
/// a single `-`, trimmed of leading/trailing `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

pub struct ProjectRegistry {
    path: PathBuf,
    projects: RwLock<Vec<Project>>,
}

impl ProjectRegistry {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let path = path.into();
        let projects = if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
            match tokio::fs::read_to_string(&path).await {
                Ok(body) => serde_json::from_str::<RegistryFile>(&body)?.projects,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        } else {
            Vec::new()
        };
        Ok(Self { path, projects: RwLock::new(projects) })
    }

    async fn persist(&self, projects: &[Project]) -> Result<(), GatewayError> {
        let body = serde_json::to_string_pretty(&RegistryFile { projects: projects.to_vec() })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Registers a new project, disambiguating the slug on conflict
    /// (`name`, `name-2`, `name-3`, ...) and assigning the next free slot.
    pub async fn register(&self, name: &str, path: &Path) -> Result<Project, GatewayError> {
        let mut guard = self.projects.write().await;
        let base_slug = slugify(name);
        let mut id = base_slug.clone();
        let mut suffix = 2;
        while guard.iter().any(|p| p.id == id) {
            id = format!("{base_slug}-{suffix}");
            suffix += 1;
        }

        let slot = guard.iter().map(|p| p.slot).max().map(|m| m + 1).unwrap_or(0);
        let project = Project {
            id,
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            slot,
            mcp_base_port: DEFAULT_BASE_PORT + slot * PORTS_PER_SLOT,
            status: ProjectStatus::Stopped,
            created_at: Utc::now(),
        };
        guard.push(project.clone());
        self.persist(&guard).await?;
        Ok(project)
    }

    pub async fn list(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Result<Project, GatewayError> {
        self.projects.read().await.iter().find(|p| p.id == id).cloned().ok_or_else(|| GatewayError::ProjectNotFound(id.to_string()))
    }

    pub async fn set_status(&self, id: &str, status: ProjectStatus) -> Result<(), GatewayError> {
        let mut guard = self.projects.write().await;
        let project = guard.iter_mut().find(|p| p.id == id).ok_or_else(|| GatewayError::ProjectNotFound(id.to_string()))?;
        project.status = status;
        let snapshot = guard.clone();
        drop(guard);
        self.persist(&snapshot).await
    }

    pub async fn remove(&self, id: &str) -> Result<(), GatewayError> {
        let mut guard = self.projects.write().await;
        let before = guard.len();
        guard.retain(|p| p.id != id);
        if guard.len() == before {
            return Err(GatewayError::ProjectNotFound(id.to_string()));
        }
        let snapshot = guard.clone();
        drop(guard);
        self.persist(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Checkout Service!!"), "checkout-service");
        assert_eq!(slugify("  leading  "), "leading");
    }

    #[tokio::test]
    async fn register_disambiguates_conflicting_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::open(dir.path().join("registry.json")).await.unwrap();
        let a = registry.register("Checkout", Path::new("/work/a")).await.unwrap();
        let b = registry.register("Checkout", Path::new("/work/b")).await.unwrap();
        assert_eq!(a.id, "checkout");
        assert_eq!(b.id, "checkout-2");
        assert_ne!(a.slot, b.slot);
        assert_eq!(b.mcp_base_port, a.mcp_base_port + PORTS_PER_SLOT);
    }

    #[tokio::test]
    async fn registry_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.json");
        {
            let registry = ProjectRegistry::open(&registry_path).await.unwrap();
            registry.register("Svc", Path::new("/work/svc")).await.unwrap();
        }
        let reopened = ProjectRegistry::open(&registry_path).await.unwrap();
        assert_eq!(reopened.list().await.len(), 1);
    }
}
