//! Atomic CRUD over one-file-per-task JSON records.

use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::error::TaskFileError;
use crate::lock::TaskLock;
use crate::models::{Task, TaskStatus};

pub struct TaskFileManager {
    dir: PathBuf,
}

impl TaskFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn task_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }

    pub async fn create_task(&self, task: &Task) -> Result<(), TaskFileError> {
        let _lock = TaskLock::acquire_exclusive(&self.dir, &task.id).await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_string_pretty(task)?;
        tokio::fs::write(self.task_path(&task.id), body).await?;
        Ok(())
    }

    pub async fn read_task(&self, task_id: &str) -> Result<Task, TaskFileError> {
        let _lock = TaskLock::acquire_shared(&self.dir, task_id).await?;
        let body = tokio::fs::read_to_string(self.task_path(task_id))
            .await
            .map_err(|_| TaskFileError::NotFound(task_id.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Load-mutate-save under an exclusive lock; always refreshes `updatedAt`.
    pub async fn update_task(
        &self,
        task_id: &str,
        mutate: impl FnOnce(&mut Task),
    ) -> Result<Task, TaskFileError> {
        let _lock = TaskLock::acquire_exclusive(&self.dir, task_id).await?;
        let body = tokio::fs::read_to_string(self.task_path(task_id))
            .await
            .map_err(|_| TaskFileError::NotFound(task_id.to_string()))?;
        let mut task: Task = serde_json::from_str(&body)?;
        mutate(&mut task);
        task.updated_at = Utc::now();
        let body = serde_json::to_string_pretty(&task)?;
        tokio::fs::write(self.task_path(task_id), body).await?;
        Ok(task)
    }

    pub async fn add_blocker(&self, task_id: &str, blocker_id: &str) -> Result<Task, TaskFileError> {
        self.update_task(task_id, |t| {
            if !t.blocked_by.iter().any(|b| b == blocker_id) {
                t.blocked_by.push(blocker_id.to_string());
            }
        })
        .await
    }

    pub async fn remove_blocker(&self, task_id: &str, blocker_id: &str) -> Result<Task, TaskFileError> {
        self.update_task(task_id, |t| {
            t.blocked_by.retain(|b| b != blocker_id);
        })
        .await
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<Task, TaskFileError> {
        self.update_task(task_id, |t| {
            t.status = TaskStatus::Completed;
        })
        .await
    }

    /// Best-effort listing: unparseable files are skipped rather than
    /// surfaced as an error.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, TaskFileError> {
        let mut tasks = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tasks),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(body) = tokio::fs::read_to_string(&path).await {
                if let Ok(task) = serde_json::from_str::<Task>(&body) {
                    tasks.push(task);
                }
            }
        }
        Ok(tasks)
    }

    /// `status=pending ∧ blockedBy=[] ∧ owner unset`.
    pub async fn get_pending_unblocked_tasks(&self) -> Result<Vec<Task>, TaskFileError> {
        let tasks = self.list_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| {
                t.status == TaskStatus::Pending && t.blocked_by.is_empty() && t.owner.is_none()
            })
            .collect())
    }

    /// Find a task by subject with an empty `blockedBy`, used by the
    /// intercept hook when the creation event didn't carry the new task's id.
    /// Prefers a task not already present in `already_governed`.
    pub async fn find_ungoverned_by_subject(
        &self,
        subject: &str,
        already_governed: &std::collections::HashSet<String>,
    ) -> Result<Option<Task>, TaskFileError> {
        let tasks = self.list_tasks().await?;
        let mut candidates: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.subject == subject && t.blocked_by.is_empty())
            .collect();
        candidates.sort_by(|a, b| {
            let a_governed = already_governed.contains(&a.id);
            let b_governed = already_governed.contains(&b.id);
            a_governed.cmp(&b_governed).then(a.created_at.cmp(&b.created_at))
        });
        Ok(candidates.into_iter().next())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (TaskFileManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (TaskFileManager::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn create_and_read_round_trips() {
        let (mgr, _dir) = manager();
        let task = Task::new("impl-1", "Add retries", "desc");
        mgr.create_task(&task).await.unwrap();
        let read = mgr.read_task("impl-1").await.unwrap();
        assert_eq!(read.subject, "Add retries");
    }

    #[tokio::test]
    async fn add_blocker_is_idempotent() {
        let (mgr, _dir) = manager();
        mgr.create_task(&Task::new("impl-1", "s", "d")).await.unwrap();
        mgr.add_blocker("impl-1", "review-1").await.unwrap();
        let task = mgr.add_blocker("impl-1", "review-1").await.unwrap();
        assert_eq!(task.blocked_by, vec!["review-1".to_string()]);
    }

    #[tokio::test]
    async fn remove_blocker_is_idempotent() {
        let (mgr, _dir) = manager();
        mgr.create_task(&Task::new("impl-1", "s", "d")).await.unwrap();
        mgr.add_blocker("impl-1", "review-1").await.unwrap();
        mgr.remove_blocker("impl-1", "review-1").await.unwrap();
        let task = mgr.remove_blocker("impl-1", "review-1").await.unwrap();
        assert!(task.blocked_by.is_empty());
    }

    #[tokio::test]
    async fn pending_unblocked_excludes_owned_and_blocked() {
        let (mgr, _dir) = manager();
        mgr.create_task(&Task::new("impl-1", "free", "d")).await.unwrap();

        let mut blocked = Task::new("impl-2", "blocked", "d");
        blocked.blocked_by.push("review-1".into());
        mgr.create_task(&blocked).await.unwrap();

        let mut owned = Task::new("impl-3", "owned", "d");
        owned.owner = Some("agent-a".into());
        mgr.create_task(&owned).await.unwrap();

        let pending = mgr.get_pending_unblocked_tasks().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "impl-1");
    }

    #[tokio::test]
    async fn list_tasks_skips_corrupt_files() {
        let (mgr, dir) = manager();
        mgr.create_task(&Task::new("impl-1", "s", "d")).await.unwrap();
        tokio::fs::write(dir.path().join("junk.json"), "not json").await.unwrap();

        let tasks = mgr.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
    }
}
