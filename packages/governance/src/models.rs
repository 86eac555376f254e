//! Row/model shapes for the governance store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    PatternChoice,
    ComponentDesign,
    ApiDesign,
    Deviation,
    ScopeChange,
    ArchitectureEvolution,
    ExperimentProposal,
    ExperimentResult,
}

impl DecisionCategory {
    /// Categories that are auto-flagged `needs_human_review` without consulting
    /// the reviewer.
    pub fn is_auto_flagged(&self) -> bool {
        matches!(self, DecisionCategory::Deviation | DecisionCategory::ScopeChange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCategory::PatternChoice => "pattern_choice",
            DecisionCategory::ComponentDesign => "component_design",
            DecisionCategory::ApiDesign => "api_design",
            DecisionCategory::Deviation => "deviation",
            DecisionCategory::ScopeChange => "scope_change",
            DecisionCategory::ArchitectureEvolution => "architecture_evolution",
            DecisionCategory::ExperimentProposal => "experiment_proposal",
            DecisionCategory::ExperimentResult => "experiment_result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeConsidered {
    pub option: String,
    pub reason_rejected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub task_id: String,
    pub sequence: i64,
    pub agent: String,
    pub category: DecisionCategory,
    pub summary: String,
    pub detail: String,
    pub components_affected: Vec<String>,
    pub alternatives_considered: Vec<AlternativeConsidered>,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Blocked,
    NeedsHumanReview,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::Blocked => "blocked",
            Verdict::NeedsHumanReview => "needs_human_review",
        }
    }

    /// Unknown verdict strings from a reviewer map to `needs_human_review`
    /// rather than failing the pipeline.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "approved" => Verdict::Approved,
            "blocked" => Verdict::Blocked,
            _ => Verdict::NeedsHumanReview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingTier {
    Vision,
    Architecture,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub tier: FindingTier,
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub id: String,
    pub decision_id: Option<String>,
    pub plan_id: Option<String>,
    pub verdict: Verdict,
    pub findings: Vec<ReviewFinding>,
    pub guidance: String,
    pub standards_verified: Vec<String>,
    pub strengths_summary: Option<String>,
    pub reviewer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    PendingReview,
    Approved,
    Blocked,
    NeedsHumanReview,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::PendingReview => "pending_review",
            TaskStatus::Approved => "approved",
            TaskStatus::Blocked => "blocked",
            TaskStatus::NeedsHumanReview => "needs_human_review",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernedTaskRecord {
    pub impl_task_id: String,
    pub subject: String,
    pub description: String,
    pub context: String,
    pub current_status: TaskStatus,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    Governance,
    Security,
    Architecture,
    CodeQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskReviewStatus {
    Pending,
    Approved,
    Blocked,
    NeedsHumanReview,
    Cancelled,
}

impl TaskReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskReviewStatus::Pending => "pending",
            TaskReviewStatus::Approved => "approved",
            TaskReviewStatus::Blocked => "blocked",
            TaskReviewStatus::NeedsHumanReview => "needs_human_review",
            TaskReviewStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReviewRecord {
    pub id: String,
    pub review_task_id: String,
    pub impl_task_id: String,
    pub review_type: ReviewType,
    pub status: TaskReviewStatus,
    pub verdict: Option<Verdict>,
    pub findings: Vec<ReviewFinding>,
    pub guidance: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolisticReviewRecord {
    pub id: String,
    pub session_id: String,
    pub task_ids: Vec<String>,
    /// Subjects of the reviewed tasks, carried alongside `task_ids` for
    /// display without a join back to the task-file manager.
    pub task_subjects: Vec<String>,
    pub collective_intent: String,
    pub verdict: Verdict,
    pub findings: Vec<ReviewFinding>,
    pub guidance: String,
    pub standards_verified: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Experimenting,
    Validated,
    NeedsMoreEvidence,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Experimenting => "experimenting",
            ProposalStatus::Validated => "validated",
            ProposalStatus::NeedsMoreEvidence => "needs_more_evidence",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    TestResults,
    Benchmark,
    Observation,
    Measurement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonToBaseline {
    pub baseline: f64,
    pub experiment: f64,
    pub improvement: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentEvidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub source: String,
    pub raw_output: String,
    pub summary: String,
    pub metrics: std::collections::HashMap<String, f64>,
    pub comparison_to_baseline: std::collections::HashMap<String, ComparisonToBaseline>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProposal {
    pub id: String,
    pub target_entity: String,
    pub original_intent: String,
    pub proposed_change: String,
    pub rationale: String,
    pub validation_criteria: Vec<String>,
    pub evidence: Vec<ExperimentEvidence>,
    pub status: ProposalStatus,
    pub worktree_branch: Option<String>,
    pub proposing_agent: String,
    pub review_verdict: Option<Verdict>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceStatus {
    pub total_decisions: i64,
    pub approved: i64,
    pub blocked: i64,
    pub needs_human_review: i64,
    pub pending: i64,
    pub recent_activity: Vec<Decision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGovernanceStats {
    pub total_governed_tasks: i64,
    pub approved: i64,
    pub blocked: i64,
    pub needs_human_review: i64,
    pub pending_review: i64,
    pub holistic_reviews: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionFilters {
    pub task_id: Option<String>,
    pub category: Option<DecisionCategory>,
    pub agent: Option<String>,
    pub limit: Option<i64>,
}
