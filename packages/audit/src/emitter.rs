//! Append-only event emission. Grounded in the emitter half of
//! `_audit-process.py`'s data contract.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::models::AuditEvent;

/// Appends one JSON line to `events_path`. Never surfaces failure to the
/// caller: a failed emit is logged and swallowed, matching the hook-safety
/// rule that audit emission must never block or fail the emitting hook.
pub async fn emit(
    events_path: &Path,
    event_type: &str,
    data: serde_json::Value,
    source: &str,
    session_id: Option<String>,
) {
    let event = AuditEvent::new(event_type, data, source, session_id);
    if let Err(e) = append(events_path, &event).await {
        tracing::warn!(error = %e, event_type, "audit emission failed");
    }
}

async fn append(events_path: &Path, event: &AuditEvent) -> std::io::Result<()> {
    if let Some(parent) = events_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(event)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(events_path).await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_appends_one_jsonl_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        emit(&path, "task.created", serde_json::json!({"task_id": "impl-1"}), "hook", Some("sess-1".into())).await;
        emit(&path, "task.created", serde_json::json!({"task_id": "impl-2"}), "hook", Some("sess-1".into())).await;

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, "task.created");
        assert_eq!(first.session_id.as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn emit_never_panics_when_parent_is_unwritable() {
        // Path under a file (not a directory) as parent; create_dir_all fails,
        // the emit call still returns (no propagated error to assert against).
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let path = blocker.join("events.jsonl");

        emit(&path, "x", serde_json::json!({}), "hook", None).await;
    }
}
