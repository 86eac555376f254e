//! The holistic settle-check: one spawned per task creation, only the
//! latest survivor actually runs the holistic review. Grounded in
//! `_holistic-settle-check.py` line for line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use warden_governance::{GovernanceStore, HolisticReviewRecord, Verdict};
use warden_kg::{KgStore, ProtectionTier};
use warden_reviewer::{GroupTask, ReviewerAdapter};
use warden_taskfile::TaskFileManager;

use crate::error::PipelineError;
use crate::flag;
use crate::transcript::extract_transcript_context;

/// Tasks created within this window of each other are treated as the same
/// batch; a settle-check whose timestamp is older than a newer task defers.
const SETTLE_TOLERANCE: chrono::Duration = chrono::Duration::milliseconds(500);

/// Below this many session tasks, the holistic review is skipped and
/// individual reviews start immediately.
pub const MIN_TASKS_FOR_REVIEW: usize = 2;

pub const DEFAULT_SETTLE_SECONDS: u64 = 3;

/// Sleeps `settle_seconds`, then either defers to a newer checker or runs
/// (or skips) the holistic review and kicks off individual reviews.
#[allow(clippy::too_many_arguments)]
pub async fn run_settle_check(
    governance: &GovernanceStore,
    kg: &KgStore,
    tasks: &TaskFileManager,
    reviewer: &ReviewerAdapter,
    flag_dir: &Path,
    session_id: &str,
    my_timestamp: DateTime<Utc>,
    transcript_path: Option<String>,
    settle_seconds: u64,
) -> Result<Vec<(String, String)>, PipelineError> {
    tokio::time::sleep(Duration::from_secs(settle_seconds)).await;

    let session_tasks = governance.get_tasks_for_session(session_id).await?;
    if session_tasks.is_empty() {
        return Ok(Vec::new());
    }

    let newest = session_tasks.iter().map(|t| t.created_at).max().unwrap();
    if newest > my_timestamp + SETTLE_TOLERANCE {
        tracing::debug!(session_id, "newer tasks exist; deferring settle-check");
        return Ok(Vec::new());
    }

    if let Some(existing) = governance.get_holistic_review_for_session(session_id).await? {
        if existing.verdict == Verdict::Approved {
            flag::remove(flag_dir, session_id).await?;
        }
        return Ok(Vec::new());
    }

    if session_tasks.len() < MIN_TASKS_FOR_REVIEW {
        tracing::info!(session_id, count = session_tasks.len(), "below minimum; skipping holistic review");
        flag::remove(flag_dir, session_id).await?;
        return Ok(review_runner_targets(governance, &session_tasks).await?);
    }

    if std::env::var("GOVERNANCE_MOCK_REVIEW").is_ok() {
        let record = HolisticReviewRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            task_ids: session_tasks.iter().map(|t| t.impl_task_id.clone()).collect(),
            task_subjects: session_tasks.iter().map(|t| t.subject.clone()).collect(),
            collective_intent: "Mock holistic review: auto-approved".to_string(),
            verdict: Verdict::Approved,
            findings: Vec::new(),
            guidance: "Mock review: auto-approved for E2E testing.".to_string(),
            standards_verified: vec!["mock".to_string()],
            created_at: Utc::now(),
        };
        governance.store_holistic_review(&record).await?;
        flag::remove(flag_dir, session_id).await?;
        return Ok(review_runner_targets(governance, &session_tasks).await?);
    }

    let transcript_excerpt = extract_transcript_context(transcript_path.as_deref()).await;
    let vision = kg.get_entities_by_tier(ProtectionTier::Vision).await;
    let architecture = kg.get_entities_by_tier(ProtectionTier::Architecture).await;

    let group_tasks: Vec<GroupTask> = session_tasks
        .iter()
        .map(|t| GroupTask { subject: t.subject.clone(), description: t.description.clone() })
        .collect();

    let verdict = reviewer.review_task_group(&group_tasks, &transcript_excerpt, &vision, &architecture).await;

    let record = HolisticReviewRecord {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        task_ids: session_tasks.iter().map(|t| t.impl_task_id.clone()).collect(),
        task_subjects: session_tasks.iter().map(|t| t.subject.clone()).collect(),
        collective_intent: verdict.guidance.chars().take(500).collect(),
        verdict: verdict.verdict,
        findings: verdict.findings.clone(),
        guidance: verdict.guidance.clone(),
        standards_verified: verdict.standards_verified.clone(),
        created_at: Utc::now(),
    };
    governance.store_holistic_review(&record).await?;
    tracing::info!(session_id, verdict = verdict.verdict.as_str(), "holistic review complete");

    match verdict.verdict {
        Verdict::Approved => {
            flag::remove(flag_dir, session_id).await?;
            Ok(review_runner_targets(governance, &session_tasks).await?)
        }
        Verdict::Blocked | Verdict::NeedsHumanReview => {
            let status = if verdict.verdict == Verdict::Blocked { "blocked" } else { "needs_human_review" };
            flag::update(
                flag_dir,
                session_id,
                status,
                &verdict.guidance,
                verdict.findings,
                verdict.strengths_summary.as_deref().unwrap_or(""),
            )
            .await?;
            Ok(Vec::new())
        }
    }
}

/// Resolves `(review_task_id, impl_task_id)` pairs for every task in the
/// session, ready to be handed to [`crate::review_runner::run_individual_review`].
async fn review_runner_targets(
    governance: &GovernanceStore,
    session_tasks: &[warden_governance::GovernedTaskRecord],
) -> Result<Vec<(String, String)>, PipelineError> {
    let mut pairs = Vec::new();
    for task in session_tasks {
        let reviews = governance.get_task_reviews(&task.impl_task_id).await?;
        if let Some(review) = reviews.first() {
            pairs.push((review.review_task_id.clone(), task.impl_task_id.clone()));
        }
    }
    Ok(pairs)
}

/// Spawns [`run_settle_check`] as a detached task, running the individual
/// review runners it surfaces afterward. Fire-and-forget: the caller does
/// not await this.
#[allow(clippy::too_many_arguments)]
pub fn spawn_settle_check(
    governance: Arc<GovernanceStore>,
    kg: Arc<KgStore>,
    tasks: Arc<TaskFileManager>,
    reviewer: Arc<ReviewerAdapter>,
    flag_dir: std::path::PathBuf,
    session_id: String,
    my_timestamp: DateTime<Utc>,
    transcript_path: Option<String>,
    settle_seconds: u64,
) {
    tokio::spawn(async move {
        match run_settle_check(
            &governance,
            &kg,
            &tasks,
            &reviewer,
            &flag_dir,
            &session_id,
            my_timestamp,
            transcript_path,
            settle_seconds,
        )
        .await
        {
            Ok(targets) => {
                for (review_task_id, impl_task_id) in targets {
                    let governance = governance.clone();
                    let tasks = tasks.clone();
                    let kg = kg.clone();
                    let reviewer = reviewer.clone();
                    tokio::spawn(async move {
                        if let Err(e) = crate::review_runner::run_individual_review(
                            &governance,
                            &tasks,
                            &kg,
                            &reviewer,
                            &review_task_id,
                            &impl_task_id,
                        )
                        .await
                        {
                            tracing::warn!(error = %e, review_task_id, impl_task_id, "individual review failed");
                        }
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, session_id = %session_id, "settle-check failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_governance::{GovernedTaskRecord, ReviewType, TaskReviewRecord, TaskReviewStatus, TaskStatus};

    async fn setup() -> (GovernanceStore, KgStore, TaskFileManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let governance = GovernanceStore::open(dir.path().join("governance.db")).await.unwrap();
        let kg = KgStore::open(dir.path().join("kg.jsonl")).await.unwrap();
        let tasks = TaskFileManager::new(dir.path().join("tasks"));
        (governance, kg, tasks, dir)
    }

    async fn seed_task(governance: &GovernanceStore, session_id: &str, impl_id: &str, subject: &str) {
        governance
            .store_governed_task(&GovernedTaskRecord {
                impl_task_id: impl_id.to_string(),
                subject: subject.to_string(),
                description: "desc".to_string(),
                context: "ctx".to_string(),
                current_status: TaskStatus::PendingReview,
                session_id: session_id.to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        governance
            .store_task_review(&TaskReviewRecord {
                id: uuid::Uuid::new_v4().to_string(),
                review_task_id: format!("review-{impl_id}"),
                impl_task_id: impl_id.to_string(),
                review_type: ReviewType::Governance,
                status: TaskReviewStatus::Pending,
                verdict: None,
                findings: Vec::new(),
                guidance: String::new(),
                context: "ctx".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_session_yields_no_targets() {
        let (governance, kg, tasks, dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();
        let targets = run_settle_check(
            &governance, &kg, &tasks, &reviewer, dir.path(), "sess-empty", Utc::now(), None, 0,
        )
        .await
        .unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn single_task_skips_holistic_review() {
        let (governance, kg, tasks, dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();
        seed_task(&governance, "sess-1", "impl-1", "Add retries").await;
        flag::create_or_refresh(dir.path(), "sess-1", 1).await.unwrap();

        let targets =
            run_settle_check(&governance, &kg, &tasks, &reviewer, dir.path(), "sess-1", Utc::now(), None, 0)
                .await
                .unwrap();

        assert_eq!(targets, vec![("review-impl-1".to_string(), "impl-1".to_string())]);
        assert!(governance.get_holistic_review_for_session("sess-1").await.unwrap().is_none());
        assert!(!flag::is_blocked(dir.path(), "sess-1").await);
    }

    #[tokio::test]
    async fn mock_mode_auto_approves_multi_task_session() {
        std::env::set_var("GOVERNANCE_MOCK_REVIEW", "1");
        let (governance, kg, tasks, dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();
        seed_task(&governance, "sess-2", "impl-1", "Add retries").await;
        seed_task(&governance, "sess-2", "impl-2", "Add timeouts").await;
        flag::create_or_refresh(dir.path(), "sess-2", 2).await.unwrap();

        let targets =
            run_settle_check(&governance, &kg, &tasks, &reviewer, dir.path(), "sess-2", Utc::now(), None, 0)
                .await
                .unwrap();

        assert_eq!(targets.len(), 2);
        let review = governance.get_holistic_review_for_session("sess-2").await.unwrap().unwrap();
        assert_eq!(review.verdict, Verdict::Approved);
        assert!(!flag::is_blocked(dir.path(), "sess-2").await);
        std::env::remove_var("GOVERNANCE_MOCK_REVIEW");
    }

    #[tokio::test]
    async fn stale_checker_defers_to_newer_tasks() {
        let (governance, kg, tasks, dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();
        seed_task(&governance, "sess-3", "impl-1", "Add retries").await;

        let stale_timestamp = Utc::now() - chrono::Duration::seconds(10);
        let targets = run_settle_check(
            &governance, &kg, &tasks, &reviewer, dir.path(), "sess-3", stale_timestamp, None, 0,
        )
        .await
        .unwrap();
        assert!(targets.is_empty());
    }
}
