//! Reviewer adapter: prompt construction, LLM invocation, and verdict
//! parsing for the five review call sites in 

pub mod backend;
pub mod error;
mod metadata_aware;
pub mod prompts;
pub mod verdict;

use std::sync::Arc;
use std::time::Duration;

pub use backend::{CliBackend, MockBackend, ReviewBackend};
pub use error::ReviewerError;
pub use prompts::GroupTask;

use warden_governance::{Decision, EvolutionProposal, ReviewVerdict};
use warden_kg::Entity;

const DECISION_TIMEOUT: Duration = Duration::from_secs(60);
const PLAN_TIMEOUT: Duration = Duration::from_secs(120);
const GROUP_TIMEOUT: Duration = Duration::from_secs(120);
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(90);
const EVOLUTION_TIMEOUT: Duration = Duration::from_secs(90);

const REVIEWER_NAME: &str = "warden-reviewer";

/// Orchestrates prompt construction, backend invocation, and verdict
/// parsing. Construct with [`ReviewerAdapter::mock`] for deterministic
/// testing or [`ReviewerAdapter::new`] with a real backend.
pub struct ReviewerAdapter {
    backend: Arc<dyn ReviewBackend>,
}

impl ReviewerAdapter {
    pub fn new(backend: Arc<dyn ReviewBackend>) -> Self {
        Self { backend }
    }

    /// When `GOVERNANCE_MOCK_REVIEW` is set in the environment, always builds
    /// a mock-backed adapter regardless of what backend the caller asked for
    /// — this is the env-flag short-circuit applied at the
    /// single call site every hook goes through to construct a reviewer.
    pub fn from_env(real: Arc<dyn ReviewBackend>) -> Self {
        if std::env::var("GOVERNANCE_MOCK_REVIEW").is_ok() {
            Self::mock()
        } else {
            Self::new(real)
        }
    }

    pub fn mock() -> Self {
        Self::new(Arc::new(MockBackend))
    }

    async fn invoke(
        &self,
        prompt: &str,
        timeout: Duration,
        decision_id: Option<String>,
        plan_id: Option<String>,
    ) -> ReviewVerdict {
        match self.backend.run(prompt, timeout).await {
            Ok(raw) => verdict::parse_verdict(&raw, REVIEWER_NAME, decision_id, plan_id),
            Err(e) => {
                tracing::warn!(error = %e, "reviewer backend failed");
                verdict::transport_failure_verdict(REVIEWER_NAME, decision_id, plan_id, &e)
            }
        }
    }

    pub async fn review_decision(
        &self,
        decision: &Decision,
        vision: &[Entity],
        architecture: &[Entity],
    ) -> ReviewVerdict {
        let prompt = prompts::decision_prompt(decision, vision, architecture);
        self.invoke(&prompt, DECISION_TIMEOUT, Some(decision.id.clone()), None).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn review_plan(
        &self,
        plan_id: &str,
        plan_summary: &str,
        plan_content: &str,
        decisions: &[Decision],
        reviews: &[ReviewVerdict],
        vision: &[Entity],
        architecture: &[Entity],
    ) -> ReviewVerdict {
        let prompt = prompts::plan_prompt(plan_summary, plan_content, decisions, reviews, vision, architecture);
        self.invoke(&prompt, PLAN_TIMEOUT, None, Some(plan_id.to_string())).await
    }

    pub async fn review_completion(
        &self,
        task_id: &str,
        summary_of_work: &str,
        files_changed: &[String],
        decisions: &[Decision],
        reviews: &[ReviewVerdict],
        vision: &[Entity],
    ) -> ReviewVerdict {
        let prompt = prompts::completion_prompt(summary_of_work, files_changed, decisions, reviews, vision);
        self.invoke(&prompt, COMPLETION_TIMEOUT, None, Some(task_id.to_string())).await
    }

    pub async fn review_task_group(
        &self,
        tasks: &[GroupTask],
        transcript_excerpt: &str,
        vision: &[Entity],
        architecture: &[Entity],
    ) -> ReviewVerdict {
        let prompt = prompts::group_review_prompt(tasks, transcript_excerpt, vision, architecture);
        self.invoke(&prompt, GROUP_TIMEOUT, None, None).await
    }

    pub async fn review_evolution_proposal(
        &self,
        proposal: &EvolutionProposal,
        entity_meta: Option<&Entity>,
        vision: &[Entity],
    ) -> ReviewVerdict {
        let prompt = prompts::evolution_proposal_prompt(proposal, entity_meta, vision);
        self.invoke(&prompt, EVOLUTION_TIMEOUT, None, Some(proposal.id.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_governance::{AlternativeConsidered, Confidence, DecisionCategory};

    fn decision() -> Decision {
        Decision {
            id: "dec-1".into(),
            task_id: "impl-1".into(),
            sequence: 1,
            agent: "agent-a".into(),
            category: DecisionCategory::PatternChoice,
            summary: "use repository pattern".into(),
            detail: "keeps persistence out of handlers".into(),
            components_affected: vec!["checkout".into()],
            alternatives_considered: vec![AlternativeConsidered {
                option: "active record".into(),
                reason_rejected: "couples persistence to domain model".into(),
            }],
            confidence: Confidence::High,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn mock_adapter_always_approves() {
        let adapter = ReviewerAdapter::mock();
        let verdict = adapter.review_decision(&decision(), &[], &[]).await;
        assert_eq!(verdict.verdict, warden_governance::Verdict::Approved);
        assert_eq!(verdict.decision_id.as_deref(), Some("dec-1"));
    }

    struct FailingBackend;

    #[async_trait::async_trait]
    impl ReviewBackend for FailingBackend {
        async fn run(&self, _prompt: &str, timeout: Duration) -> Result<String, ReviewerError> {
            Err(ReviewerError::Timeout(timeout))
        }
    }

    #[tokio::test]
    async fn transport_failure_maps_to_needs_human_review() {
        let adapter = ReviewerAdapter::new(Arc::new(FailingBackend));
        let verdict = adapter.review_decision(&decision(), &[], &[]).await;
        assert_eq!(verdict.verdict, warden_governance::Verdict::NeedsHumanReview);
        assert!(verdict.guidance.contains("timed out"));
    }

    struct GarbageBackend;

    #[async_trait::async_trait]
    impl ReviewBackend for GarbageBackend {
        async fn run(&self, _prompt: &str, _timeout: Duration) -> Result<String, ReviewerError> {
            Ok("I cannot comply with this request.".to_string())
        }
    }

    #[tokio::test]
    async fn unparseable_response_maps_to_needs_human_review() {
        let adapter = ReviewerAdapter::new(Arc::new(GarbageBackend));
        let verdict = adapter.review_decision(&decision(), &[], &[]).await;
        assert_eq!(verdict.verdict, warden_governance::Verdict::NeedsHumanReview);
        assert!(verdict.guidance.contains("Could not parse"));
    }

    #[test]
    fn extract_json_handles_fenced_block() {
        let text = "Here you go:\n```json\n{\"verdict\": \"approved\"}\n```\nThanks.";
        assert_eq!(verdict::extract_json(text).unwrap().trim(), "{\"verdict\": \"approved\"}");
    }

    #[test]
    fn extract_json_handles_bare_object() {
        let text = "prefix junk { \"verdict\": \"blocked\" } suffix junk";
        let extracted = verdict::extract_json(text).unwrap();
        assert!(extracted.starts_with('{') && extracted.ends_with('}'));
    }
}
