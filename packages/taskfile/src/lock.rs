//! Per-task-id advisory locking via sidecar `.{id}.lock` files.
//!
//! Uses `fs4`'s tokio-native lock extension so acquisition does not need a
//! blocking-pool hop.

use fs4::tokio::AsyncFileExt;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};

use crate::error::TaskFileError;

pub fn lock_path(dir: &Path, task_id: &str) -> PathBuf {
    dir.join(format!(".{task_id}.lock"))
}

/// An exclusive or shared hold on a task's sidecar lock file. Dropping it
/// releases the OS-level advisory lock.
pub struct TaskLock {
    _file: File,
}

impl TaskLock {
    pub async fn acquire_exclusive(dir: &Path, task_id: &str) -> Result<Self, TaskFileError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = lock_path(dir, task_id);
        let file = OpenOptions::new().create(true).write(true).open(&path).await?;
        file.lock_exclusive()
            .await
            .map_err(|_| TaskFileError::LockFailed(task_id.to_string()))?;
        Ok(Self { _file: file })
    }

    pub async fn acquire_shared(dir: &Path, task_id: &str) -> Result<Self, TaskFileError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = lock_path(dir, task_id);
        let file = OpenOptions::new().create(true).write(true).open(&path).await?;
        file.lock_shared()
            .await
            .map_err(|_| TaskFileError::LockFailed(task_id.to_string()))?;
        Ok(Self { _file: file })
    }
}
