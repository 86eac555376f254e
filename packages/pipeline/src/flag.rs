//! The per-session holistic-review flag file. While it exists, the caller's
//! tool-use gate hook rejects mutation tools for that session. Grounded in
//! `_holistic-settle-check.py`'s `_update_flag`/`_remove_flag`/`_create_or_update_flag_file`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_governance::ReviewFinding;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolisticFlag {
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub task_count: usize,
    #[serde(default)]
    pub guidance: String,
    #[serde(default)]
    pub findings: Vec<ReviewFinding>,
    #[serde(default)]
    pub strengths_summary: String,
    pub created_at: DateTime<Utc>,
}

fn flag_path(flag_dir: &Path, session_id: &str) -> PathBuf {
    flag_dir.join(format!(".holistic-review-pending-{session_id}"))
}

pub async fn create_or_refresh(flag_dir: &Path, session_id: &str, task_count: usize) -> std::io::Result<()> {
    tokio::fs::create_dir_all(flag_dir).await?;
    let flag = HolisticFlag {
        session_id: session_id.to_string(),
        status: "pending".to_string(),
        task_count,
        guidance: String::new(),
        findings: Vec::new(),
        strengths_summary: String::new(),
        created_at: Utc::now(),
    };
    let body = serde_json::to_string(&flag).expect("HolisticFlag always serializes");
    tokio::fs::write(flag_path(flag_dir, session_id), body).await
}

pub async fn update(
    flag_dir: &Path,
    session_id: &str,
    status: &str,
    guidance: &str,
    findings: Vec<ReviewFinding>,
    strengths_summary: &str,
) -> std::io::Result<()> {
    let flag = HolisticFlag {
        session_id: session_id.to_string(),
        status: status.to_string(),
        task_count: 0,
        guidance: guidance.to_string(),
        findings,
        strengths_summary: strengths_summary.to_string(),
        created_at: Utc::now(),
    };
    let body = serde_json::to_string(&flag).expect("HolisticFlag always serializes");
    tokio::fs::write(flag_path(flag_dir, session_id), body).await
}

/// Best-effort: a missing flag is not an error.
pub async fn remove(flag_dir: &Path, session_id: &str) -> std::io::Result<()> {
    match tokio::fs::remove_file(flag_path(flag_dir, session_id)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn read(flag_dir: &Path, session_id: &str) -> Option<HolisticFlag> {
    let body = tokio::fs::read_to_string(flag_path(flag_dir, session_id)).await.ok()?;
    serde_json::from_str(&body).ok()
}

pub async fn is_blocked(flag_dir: &Path, session_id: &str) -> bool {
    tokio::fs::try_exists(flag_path(flag_dir, session_id)).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_remove_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        create_or_refresh(dir.path(), "sess-1", 3).await.unwrap();
        assert!(is_blocked(dir.path(), "sess-1").await);

        let flag = read(dir.path(), "sess-1").await.unwrap();
        assert_eq!(flag.task_count, 3);
        assert_eq!(flag.status, "pending");

        remove(dir.path(), "sess-1").await.unwrap();
        assert!(!is_blocked(dir.path(), "sess-1").await);
    }

    #[tokio::test]
    async fn remove_missing_flag_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        remove(dir.path(), "nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn update_carries_status_and_guidance() {
        let dir = tempfile::tempdir().unwrap();
        create_or_refresh(dir.path(), "sess-1", 2).await.unwrap();
        update(dir.path(), "sess-1", "blocked", "fix the thing", Vec::new(), "").await.unwrap();

        let flag = read(dir.path(), "sess-1").await.unwrap();
        assert_eq!(flag.status, "blocked");
        assert_eq!(flag.guidance, "fix the thing");
    }
}
