//! PostToolUse-style interception of task creation. Grounded in
//! `governance-task-intercept.py`.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;

use warden_governance::{GovernanceStore, GovernedTaskRecord, ReviewType, TaskReviewRecord, TaskReviewStatus, TaskStatus};
use warden_taskfile::{is_review_subject, Task, TaskFileManager};

use crate::error::PipelineError;
use crate::flag;

/// What the hook observed about a just-created task.
#[derive(Debug, Clone, Default)]
pub struct TaskCreationEvent {
    pub task_id: Option<String>,
    pub subject: String,
    pub description: String,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InterceptOutcome {
    pub review_task_id: String,
    pub impl_task_id: String,
    pub additional_context: String,
}

fn is_review(subject: &str, task_id: &str) -> bool {
    is_review_subject(subject) || task_id.starts_with("review-")
}

/// Pairs a just-created implementation task with a governance review task,
/// persists the governance records, and refreshes the session's holistic
/// review flag. Returns `None` when the event should be skipped (it's a
/// review task itself, or carries no usable task information).
pub async fn intercept(
    governance: &GovernanceStore,
    tasks: &TaskFileManager,
    flag_dir: &Path,
    event: TaskCreationEvent,
) -> Result<Option<InterceptOutcome>, PipelineError> {
    if event.subject.is_empty() && event.task_id.is_none() {
        return Ok(None);
    }
    if is_review(&event.subject, event.task_id.as_deref().unwrap_or("")) {
        return Ok(None);
    }

    let session_id = event.session_id.clone().unwrap_or_default();

    let mut impl_id = event.task_id.clone().unwrap_or_default();
    if impl_id.is_empty() {
        let already_governed: HashSet<String> = if session_id.is_empty() {
            HashSet::new()
        } else {
            governance
                .get_tasks_for_session(&session_id)
                .await?
                .into_iter()
                .map(|t| t.impl_task_id)
                .collect()
        };
        if let Some(found) = tasks.find_ungoverned_by_subject(&event.subject, &already_governed).await? {
            impl_id = found.id;
        }
    }

    let review_id = format!("review-{}", short_id());

    let mut review_task = Task::new(
        &review_id,
        format!("[GOVERNANCE] Review: {}", event.subject),
        format!(
            "Governance review required before execution.\n\nContext:\n{}",
            truncate(&event.description, 2000)
        ),
    );
    review_task.active_form = Some(format!("Reviewing {}", event.subject));
    if !impl_id.is_empty() {
        review_task.blocks.push(impl_id.clone());
    }
    review_task
        .governance_metadata
        .insert("review_type".to_string(), serde_json::json!("governance"));
    review_task
        .governance_metadata
        .insert("implementation_task_id".to_string(), serde_json::json!(impl_id));
    review_task
        .governance_metadata
        .insert("created_at".to_string(), serde_json::json!(Utc::now().to_rfc3339()));
    review_task
        .governance_metadata
        .insert("source".to_string(), serde_json::json!("PostToolUse-hook"));

    tasks.create_task(&review_task).await?;

    if !impl_id.is_empty() {
        tasks.add_blocker(&impl_id, &review_id).await?;
    }

    let governed_task = GovernedTaskRecord {
        impl_task_id: if impl_id.is_empty() { format!("unknown-{}", short_id()) } else { impl_id.clone() },
        subject: event.subject.clone(),
        description: truncate(&event.description, 2000),
        context: "Auto-intercepted via PostToolUse hook".to_string(),
        current_status: TaskStatus::PendingReview,
        session_id: session_id.clone(),
        created_at: Utc::now(),
    };
    governance.store_governed_task(&governed_task).await?;

    let task_review = TaskReviewRecord {
        id: uuid::Uuid::new_v4().to_string(),
        review_task_id: review_id.clone(),
        impl_task_id: governed_task.impl_task_id.clone(),
        review_type: ReviewType::Governance,
        status: TaskReviewStatus::Pending,
        verdict: None,
        findings: Vec::new(),
        guidance: String::new(),
        context: format!("Auto-created by PostToolUse hook for: {}", event.subject),
        created_at: Utc::now(),
    };
    governance.store_task_review(&task_review).await?;

    if !session_id.is_empty() {
        let task_count = governance.get_tasks_for_session(&session_id).await?.len();
        flag::create_or_refresh(flag_dir, &session_id, task_count).await?;
    }

    let holistic_msg = if session_id.is_empty() {
        String::new()
    } else {
        " A holistic review of all tasks in this session will run automatically before individual \
          reviews begin. Mutation tools (Write/Edit/Bash) are gated until the holistic review completes."
            .to_string()
    };

    let additional_context = format!(
        "GOVERNANCE: Task '{subject}' has been automatically paired with governance review {review_id}. \
         The task is held until review completes. This review will check alignment with vision and \
         architecture standards, and provide constructive feedback including what aspects of your task \
         design are sound.{holistic_msg} Use get_task_review_status('{impl_id}') to check status.",
        subject = event.subject,
        impl_id = governed_task.impl_task_id,
    );

    Ok(Some(InterceptOutcome {
        review_task_id: review_id,
        impl_task_id: governed_task.impl_task_id,
        additional_context,
    }))
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (GovernanceStore, TaskFileManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let governance = GovernanceStore::open(dir.path().join("governance.db")).await.unwrap();
        let tasks = TaskFileManager::new(dir.path().join("tasks"));
        (governance, tasks, dir)
    }

    #[tokio::test]
    async fn review_subjects_are_skipped() {
        let (governance, tasks, dir) = setup().await;
        let event = TaskCreationEvent {
            task_id: Some("impl-1".into()),
            subject: "[GOVERNANCE] Review: something".into(),
            ..Default::default()
        };
        let outcome = intercept(&governance, &tasks, dir.path(), event).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn intercept_pairs_review_with_implementation_task() {
        let (governance, tasks, dir) = setup().await;
        tasks.create_task(&Task::new("impl-1", "Add retries", "desc")).await.unwrap();

        let event = TaskCreationEvent {
            task_id: Some("impl-1".into()),
            subject: "Add retries".into(),
            description: "desc".into(),
            session_id: Some("sess-1".into()),
            transcript_path: None,
        };
        let outcome = intercept(&governance, &tasks, dir.path(), event).await.unwrap().unwrap();
        assert_eq!(outcome.impl_task_id, "impl-1");
        assert!(outcome.review_task_id.starts_with("review-"));

        let impl_task = tasks.read_task("impl-1").await.unwrap();
        assert_eq!(impl_task.blocked_by, vec![outcome.review_task_id.clone()]);

        let governed = governance.get_governed_task("impl-1").await.unwrap().unwrap();
        assert_eq!(governed.current_status, TaskStatus::PendingReview);

        assert!(flag::is_blocked(dir.path(), "sess-1").await);
    }

    #[tokio::test]
    async fn missing_task_id_is_discovered_by_subject() {
        let (governance, tasks, dir) = setup().await;
        tasks.create_task(&Task::new("impl-2", "Refactor cache", "desc")).await.unwrap();

        let event = TaskCreationEvent {
            task_id: None,
            subject: "Refactor cache".into(),
            description: "desc".into(),
            session_id: None,
            transcript_path: None,
        };
        let outcome = intercept(&governance, &tasks, dir.path(), event).await.unwrap().unwrap();
        assert_eq!(outcome.impl_task_id, "impl-2");
    }
}
