//! The individual review runner: one per `(review_id, impl_id)` pair,
//! grounded in "Review runner" paragraph (the shell script
//! that originally drove this, `_run-governance-review.sh`, was not part of
//! the retrieved Python sources).

use warden_governance::{
    DecisionCategory, GovernanceStore, ReviewFinding, ReviewType, TaskStatus, Verdict,
};
use warden_kg::{KgStore, ProtectionTier};
use warden_reviewer::ReviewerAdapter;
use warden_taskfile::TaskFileManager;

use crate::error::PipelineError;

/// Reviews a single implementation task: finds its most recent decision (if
/// any), consults the reviewer (or auto-flags without consulting it, for
/// `deviation`/`scope_change` decisions), persists the verdict, and on
/// approval releases the task's blocker.
pub async fn run_individual_review(
    governance: &GovernanceStore,
    tasks: &TaskFileManager,
    kg: &KgStore,
    reviewer: &ReviewerAdapter,
    review_task_id: &str,
    impl_task_id: &str,
) -> Result<Verdict, PipelineError> {
    let vision = kg.get_entities_by_tier(ProtectionTier::Vision).await;
    let architecture = kg.get_entities_by_tier(ProtectionTier::Architecture).await;

    let decisions = governance.get_decisions_for_task(impl_task_id).await?;
    let latest_decision = decisions.last();

    let (decision_id, verdict) = match latest_decision {
        Some(decision) if decision.category.is_auto_flagged() => (
            Some(decision.id.clone()),
            warden_governance::ReviewVerdict {
                id: uuid::Uuid::new_v4().to_string(),
                decision_id: Some(decision.id.clone()),
                plan_id: None,
                verdict: Verdict::NeedsHumanReview,
                findings: Vec::new(),
                guidance: format!(
                    "Decision category '{}' always requires human review, regardless of reviewer verdict.",
                    decision.category.as_str()
                ),
                standards_verified: Vec::new(),
                strengths_summary: None,
                reviewer: "warden-pipeline".to_string(),
                created_at: chrono::Utc::now(),
            },
        ),
        Some(decision) => {
            let verdict = reviewer.review_decision(decision, &vision, &architecture).await;
            (Some(decision.id.clone()), verdict)
        }
        None => {
            let task = tasks.read_task(impl_task_id).await?;
            let verdict = reviewer
                .review_completion(impl_task_id, &task.description, &[], &[], &[], &vision)
                .await;
            (None, verdict)
        }
    };

    governance
        .store_review(
            decision_id.as_deref(),
            None,
            verdict.verdict,
            verdict.findings.clone(),
            &verdict.guidance,
            verdict.standards_verified.clone(),
            verdict.strengths_summary.clone(),
            &verdict.reviewer,
        )
        .await?;

    apply_verdict(governance, tasks, review_task_id, impl_task_id, &verdict).await?;

    Ok(verdict.verdict)
}

async fn apply_verdict(
    governance: &GovernanceStore,
    tasks: &TaskFileManager,
    review_task_id: &str,
    impl_task_id: &str,
    verdict: &warden_governance::ReviewVerdict,
) -> Result<(), PipelineError> {
    let task_reviews = governance.get_task_reviews(impl_task_id).await?;
    let record = task_reviews.iter().find(|r| r.review_task_id == review_task_id);

    let status = match verdict.verdict {
        Verdict::Approved => warden_governance::TaskReviewStatus::Approved,
        Verdict::Blocked => warden_governance::TaskReviewStatus::Blocked,
        Verdict::NeedsHumanReview => warden_governance::TaskReviewStatus::NeedsHumanReview,
    };

    if let Some(record) = record {
        governance
            .update_task_review(&record.id, status, Some(verdict.verdict), verdict.findings.clone(), &verdict.guidance)
            .await?;
    }

    let task_status = match verdict.verdict {
        Verdict::Approved => TaskStatus::Approved,
        Verdict::Blocked => TaskStatus::Blocked,
        Verdict::NeedsHumanReview => TaskStatus::NeedsHumanReview,
    };
    governance.update_governed_task_status(impl_task_id, task_status).await?;

    match verdict.verdict {
        Verdict::Approved => {
            tasks.remove_blocker(impl_task_id, review_task_id).await?;
        }
        Verdict::Blocked | Verdict::NeedsHumanReview => {
            let guidance = verdict.guidance.clone();
            tasks
                .update_task(impl_task_id, |t| {
                    t.description.push_str("\n\n[Governance feedback]: ");
                    t.description.push_str(&guidance);
                })
                .await?;
        }
    }

    Ok(())
}

/// True for categories the individual review auto-flags without consulting
/// the reviewer.
pub fn is_auto_flagged(category: DecisionCategory) -> bool {
    category.is_auto_flagged()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_governance::{AlternativeConsidered, Confidence};
    use warden_taskfile::Task;

    async fn setup() -> (GovernanceStore, TaskFileManager, KgStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let governance = GovernanceStore::open(dir.path().join("governance.db")).await.unwrap();
        let tasks = TaskFileManager::new(dir.path().join("tasks"));
        let kg = KgStore::open(dir.path().join("kg.jsonl")).await.unwrap();
        (governance, tasks, kg, dir)
    }

    #[tokio::test]
    async fn approved_verdict_releases_blocker() {
        let (governance, tasks, kg, _dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();

        tasks.create_task(&Task::new("impl-1", "Add retries", "desc")).await.unwrap();
        tasks.add_blocker("impl-1", "review-1").await.unwrap();

        let governed = warden_governance::GovernedTaskRecord {
            impl_task_id: "impl-1".into(),
            subject: "Add retries".into(),
            description: "desc".into(),
            context: "ctx".into(),
            current_status: TaskStatus::PendingReview,
            session_id: "sess-1".into(),
            created_at: chrono::Utc::now(),
        };
        governance.store_governed_task(&governed).await.unwrap();

        let task_review = warden_governance::TaskReviewRecord {
            id: uuid::Uuid::new_v4().to_string(),
            review_task_id: "review-1".into(),
            impl_task_id: "impl-1".into(),
            review_type: ReviewType::Governance,
            status: warden_governance::TaskReviewStatus::Pending,
            verdict: None,
            findings: Vec::new(),
            guidance: String::new(),
            context: "ctx".into(),
            created_at: chrono::Utc::now(),
        };
        governance.store_task_review(&task_review).await.unwrap();

        let verdict = run_individual_review(&governance, &tasks, &kg, &reviewer, "review-1", "impl-1")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Approved);

        let impl_task = tasks.read_task("impl-1").await.unwrap();
        assert!(impl_task.blocked_by.is_empty());

        let governed_after = governance.get_governed_task("impl-1").await.unwrap().unwrap();
        assert_eq!(governed_after.current_status, TaskStatus::Approved);
    }

    #[tokio::test]
    async fn deviation_decision_is_auto_flagged_without_consulting_reviewer() {
        let (governance, tasks, kg, _dir) = setup().await;
        let reviewer = ReviewerAdapter::mock();

        tasks.create_task(&Task::new("impl-1", "Switch ORMs", "desc")).await.unwrap();
        tasks.add_blocker("impl-1", "review-1").await.unwrap();

        let governed = warden_governance::GovernedTaskRecord {
            impl_task_id: "impl-1".into(),
            subject: "Switch ORMs".into(),
            description: "desc".into(),
            context: "ctx".into(),
            current_status: TaskStatus::PendingReview,
            session_id: "sess-1".into(),
            created_at: chrono::Utc::now(),
        };
        governance.store_governed_task(&governed).await.unwrap();

        let task_review = warden_governance::TaskReviewRecord {
            id: uuid::Uuid::new_v4().to_string(),
            review_task_id: "review-1".into(),
            impl_task_id: "impl-1".into(),
            review_type: ReviewType::Governance,
            status: warden_governance::TaskReviewStatus::Pending,
            verdict: None,
            findings: Vec::new(),
            guidance: String::new(),
            context: "ctx".into(),
            created_at: chrono::Utc::now(),
        };
        governance.store_task_review(&task_review).await.unwrap();

        governance
            .store_decision(
                "impl-1",
                "agent-a",
                DecisionCategory::Deviation,
                "switch ORM mid-flight",
                "detail",
                vec![],
                vec![AlternativeConsidered { option: "stay".into(), reason_rejected: "perf".into() }],
                Confidence::Medium,
            )
            .await
            .unwrap();

        let verdict = run_individual_review(&governance, &tasks, &kg, &reviewer, "review-1", "impl-1")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::NeedsHumanReview);

        let impl_task = tasks.read_task("impl-1").await.unwrap();
        assert!(impl_task.blocked_by.contains(&"review-1".to_string()));
    }
}
