//! SQLite-backed governance store. Safe to open against an empty file: all
//! tables are created on first use. Writes are serialized by sqlx's pool;
//! reads may run concurrently.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::error::GovernanceError;
use crate::models::*;

pub struct GovernanceStore {
    pool: SqlitePool,
}

fn json_col<T: serde::Serialize>(value: &T) -> Result<String, GovernanceError> {
    Ok(serde_json::to_string(value)?)
}

fn from_json_col<T: serde::de::DeserializeOwned + Default>(raw: Option<String>) -> T {
    raw.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn category_str(c: DecisionCategory) -> &'static str {
    c.as_str()
}

fn parse_category(s: &str) -> DecisionCategory {
    match s {
        "pattern_choice" => DecisionCategory::PatternChoice,
        "component_design" => DecisionCategory::ComponentDesign,
        "api_design" => DecisionCategory::ApiDesign,
        "deviation" => DecisionCategory::Deviation,
        "scope_change" => DecisionCategory::ScopeChange,
        "architecture_evolution" => DecisionCategory::ArchitectureEvolution,
        "experiment_proposal" => DecisionCategory::ExperimentProposal,
        _ => DecisionCategory::ExperimentResult,
    }
}

fn parse_confidence(s: &str) -> Confidence {
    match s {
        "high" => Confidence::High,
        "low" => Confidence::Low,
        _ => Confidence::Medium,
    }
}

fn parse_verdict(s: &str) -> Verdict {
    Verdict::parse_lenient(s)
}

fn parse_task_status(s: &str) -> TaskStatus {
    match s {
        "approved" => TaskStatus::Approved,
        "blocked" => TaskStatus::Blocked,
        "needs_human_review" => TaskStatus::NeedsHumanReview,
        _ => TaskStatus::PendingReview,
    }
}

fn parse_review_type(s: &str) -> ReviewType {
    match s {
        "security" => ReviewType::Security,
        "architecture" => ReviewType::Architecture,
        "code_quality" => ReviewType::CodeQuality,
        _ => ReviewType::Governance,
    }
}

fn review_type_str(t: ReviewType) -> &'static str {
    match t {
        ReviewType::Governance => "governance",
        ReviewType::Security => "security",
        ReviewType::Architecture => "architecture",
        ReviewType::CodeQuality => "code_quality",
    }
}

fn parse_task_review_status(s: &str) -> TaskReviewStatus {
    match s {
        "approved" => TaskReviewStatus::Approved,
        "blocked" => TaskReviewStatus::Blocked,
        "needs_human_review" => TaskReviewStatus::NeedsHumanReview,
        "cancelled" => TaskReviewStatus::Cancelled,
        _ => TaskReviewStatus::Pending,
    }
}

fn parse_proposal_status(s: &str) -> ProposalStatus {
    match s {
        "experimenting" => ProposalStatus::Experimenting,
        "validated" => ProposalStatus::Validated,
        "needs_more_evidence" => ProposalStatus::NeedsMoreEvidence,
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        _ => ProposalStatus::Proposed,
    }
}

impl GovernanceStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GovernanceError> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            path.as_ref().display()
        ))
        .unwrap_or_else(|_| SqliteConnectOptions::new().filename(path.as_ref()))
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), GovernanceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                agent TEXT NOT NULL,
                category TEXT NOT NULL,
                summary TEXT NOT NULL,
                detail TEXT NOT NULL,
                components_affected TEXT NOT NULL,
                alternatives_considered TEXT NOT NULL,
                confidence TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_task ON decisions(task_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                decision_id TEXT,
                plan_id TEXT,
                verdict TEXT NOT NULL,
                findings TEXT NOT NULL,
                guidance TEXT NOT NULL,
                standards_verified TEXT NOT NULL,
                strengths_summary TEXT,
                reviewer TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_decision ON reviews(decision_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS governed_tasks (
                impl_task_id TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                description TEXT NOT NULL,
                context TEXT NOT NULL,
                current_status TEXT NOT NULL,
                session_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_governed_tasks_session ON governed_tasks(session_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_reviews (
                id TEXT PRIMARY KEY,
                review_task_id TEXT NOT NULL,
                impl_task_id TEXT NOT NULL,
                review_type TEXT NOT NULL,
                status TEXT NOT NULL,
                verdict TEXT,
                findings TEXT NOT NULL,
                guidance TEXT NOT NULL,
                context TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_task_reviews_impl ON task_reviews(impl_task_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holistic_reviews (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL UNIQUE,
                task_ids TEXT NOT NULL,
                task_subjects TEXT NOT NULL,
                collective_intent TEXT NOT NULL,
                verdict TEXT NOT NULL,
                findings TEXT NOT NULL,
                guidance TEXT NOT NULL,
                standards_verified TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evolution_proposals (
                id TEXT PRIMARY KEY,
                target_entity TEXT NOT NULL,
                original_intent TEXT NOT NULL,
                proposed_change TEXT NOT NULL,
                rationale TEXT NOT NULL,
                validation_criteria TEXT NOT NULL,
                evidence TEXT NOT NULL,
                status TEXT NOT NULL,
                worktree_branch TEXT,
                proposing_agent TEXT NOT NULL,
                review_verdict TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_proposals_entity ON evolution_proposals(target_entity)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ---------------------------------------------------------------- decisions

    /// Assigns `id`, `sequence` (dense, per task_id, within this transaction),
    /// and `created_at`, then persists and returns the full record.
    pub async fn store_decision(
        &self,
        task_id: &str,
        agent: &str,
        category: DecisionCategory,
        summary: &str,
        detail: &str,
        components_affected: Vec<String>,
        alternatives_considered: Vec<AlternativeConsidered>,
        confidence: Confidence,
    ) -> Result<Decision, GovernanceError> {
        let mut tx = self.pool.begin().await?;

        let next_sequence: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM decisions WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        let decision = Decision {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            sequence: next_sequence,
            agent: agent.to_string(),
            category,
            summary: summary.to_string(),
            detail: detail.to_string(),
            components_affected,
            alternatives_considered,
            confidence,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO decisions
                (id, task_id, sequence, agent, category, summary, detail,
                 components_affected, alternatives_considered, confidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&decision.id)
        .bind(&decision.task_id)
        .bind(decision.sequence)
        .bind(&decision.agent)
        .bind(category_str(decision.category))
        .bind(&decision.summary)
        .bind(&decision.detail)
        .bind(json_col(&decision.components_affected)?)
        .bind(json_col(&decision.alternatives_considered)?)
        .bind(match decision.confidence {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
        .bind(decision.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(decision)
    }

    pub async fn get_decisions_for_task(&self, task_id: &str) -> Result<Vec<Decision>, GovernanceError> {
        let rows = sqlx::query("SELECT * FROM decisions WHERE task_id = ? ORDER BY sequence ASC")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_decision).collect()
    }

    pub async fn get_all_decisions(
        &self,
        filters: &DecisionFilters,
    ) -> Result<Vec<Decision>, GovernanceError> {
        let mut sql = String::from("SELECT * FROM decisions WHERE 1=1");
        if filters.task_id.is_some() {
            sql.push_str(" AND task_id = ?");
        }
        if filters.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if filters.agent.is_some() {
            sql.push_str(" AND agent = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filters.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(task_id) = &filters.task_id {
            query = query.bind(task_id);
        }
        if let Some(category) = filters.category {
            query = query.bind(category_str(category));
        }
        if let Some(agent) = &filters.agent {
            query = query.bind(agent);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_decision).collect()
    }

    // ------------------------------------------------------------------ reviews

    pub async fn store_review(
        &self,
        decision_id: Option<&str>,
        plan_id: Option<&str>,
        verdict: Verdict,
        findings: Vec<ReviewFinding>,
        guidance: &str,
        standards_verified: Vec<String>,
        strengths_summary: Option<String>,
        reviewer: &str,
    ) -> Result<ReviewVerdict, GovernanceError> {
        let record = ReviewVerdict {
            id: uuid::Uuid::new_v4().to_string(),
            decision_id: decision_id.map(str::to_string),
            plan_id: plan_id.map(str::to_string),
            verdict,
            findings,
            guidance: guidance.to_string(),
            standards_verified,
            strengths_summary,
            reviewer: reviewer.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO reviews
                (id, decision_id, plan_id, verdict, findings, guidance,
                 standards_verified, strengths_summary, reviewer, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.decision_id)
        .bind(&record.plan_id)
        .bind(record.verdict.as_str())
        .bind(json_col(&record.findings)?)
        .bind(&record.guidance)
        .bind(json_col(&record.standards_verified)?)
        .bind(&record.strengths_summary)
        .bind(&record.reviewer)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn get_reviews_for_task(&self, task_id: &str) -> Result<Vec<ReviewVerdict>, GovernanceError> {
        let rows = sqlx::query(
            r#"
            SELECT r.* FROM reviews r
            JOIN decisions d ON d.id = r.decision_id
            WHERE d.task_id = ?
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_review).collect()
    }

    pub async fn get_review_for_decision(
        &self,
        decision_id: &str,
    ) -> Result<Option<ReviewVerdict>, GovernanceError> {
        let row = sqlx::query(
            "SELECT * FROM reviews WHERE decision_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_review(&r)).transpose()
    }

    /// There exists a review with verdict=blocked attached to a decision of
    /// this task, with no later-recorded override decision for that same
    /// decision_id. No supersession cascade is applied.
    pub async fn has_unresolved_blocks(&self, task_id: &str) -> Result<bool, GovernanceError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reviews r
            JOIN decisions d ON d.id = r.decision_id
            WHERE d.task_id = ? AND r.verdict = 'blocked'
            "#,
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn has_plan_review(&self, plan_id: &str) -> Result<bool, GovernanceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    // ------------------------------------------------------------ governed tasks

    pub async fn store_governed_task(&self, record: &GovernedTaskRecord) -> Result<(), GovernanceError> {
        sqlx::query(
            r#"
            INSERT INTO governed_tasks
                (impl_task_id, subject, description, context, current_status, session_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.impl_task_id)
        .bind(&record.subject)
        .bind(&record.description)
        .bind(&record.context)
        .bind(record.current_status.as_str())
        .bind(&record.session_id)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_governed_task_status(
        &self,
        impl_task_id: &str,
        status: TaskStatus,
    ) -> Result<(), GovernanceError> {
        let result = sqlx::query("UPDATE governed_tasks SET current_status = ? WHERE impl_task_id = ?")
            .bind(status.as_str())
            .bind(impl_task_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GovernanceError::GovernedTaskNotFound(impl_task_id.to_string()));
        }
        Ok(())
    }

    pub async fn get_governed_task(
        &self,
        impl_task_id: &str,
    ) -> Result<Option<GovernedTaskRecord>, GovernanceError> {
        let row = sqlx::query("SELECT * FROM governed_tasks WHERE impl_task_id = ?")
            .bind(impl_task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_governed_task(&r)).transpose()
    }

    pub async fn get_tasks_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<GovernedTaskRecord>, GovernanceError> {
        let rows = sqlx::query("SELECT * FROM governed_tasks WHERE session_id = ? ORDER BY created_at ASC")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_governed_task).collect()
    }

    // --------------------------------------------------------------- task reviews

    pub async fn store_task_review(&self, record: &TaskReviewRecord) -> Result<(), GovernanceError> {
        sqlx::query(
            r#"
            INSERT INTO task_reviews
                (id, review_task_id, impl_task_id, review_type, status, verdict,
                 findings, guidance, context, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.review_task_id)
        .bind(&record.impl_task_id)
        .bind(review_type_str(record.review_type))
        .bind(record.status.as_str())
        .bind(record.verdict.map(|v| v.as_str().to_string()))
        .bind(json_col(&record.findings)?)
        .bind(&record.guidance)
        .bind(&record.context)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_task_review(
        &self,
        id: &str,
        status: TaskReviewStatus,
        verdict: Option<Verdict>,
        findings: Vec<ReviewFinding>,
        guidance: &str,
    ) -> Result<(), GovernanceError> {
        sqlx::query(
            "UPDATE task_reviews SET status = ?, verdict = ?, findings = ?, guidance = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(verdict.map(|v| v.as_str().to_string()))
        .bind(json_col(&findings)?)
        .bind(guidance)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_task_reviews(
        &self,
        impl_task_id: &str,
    ) -> Result<Vec<TaskReviewRecord>, GovernanceError> {
        let rows = sqlx::query("SELECT * FROM task_reviews WHERE impl_task_id = ? ORDER BY created_at ASC")
            .bind(impl_task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_task_review).collect()
    }

    // ------------------------------------------------------------- holistic review

    /// Single row per session: inserts on first call, updates in place on
    /// subsequent calls for the same session (verdict, findings, guidance).
    pub async fn store_holistic_review(&self, record: &HolisticReviewRecord) -> Result<(), GovernanceError> {
        sqlx::query(
            r#"
            INSERT INTO holistic_reviews
                (id, session_id, task_ids, task_subjects, collective_intent,
                 verdict, findings, guidance, standards_verified, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                task_ids = excluded.task_ids,
                task_subjects = excluded.task_subjects,
                collective_intent = excluded.collective_intent,
                verdict = excluded.verdict,
                findings = excluded.findings,
                guidance = excluded.guidance,
                standards_verified = excluded.standards_verified
            "#,
        )
        .bind(&record.id)
        .bind(&record.session_id)
        .bind(json_col(&record.task_ids)?)
        .bind(json_col(&record.task_subjects)?)
        .bind(&record.collective_intent)
        .bind(record.verdict.as_str())
        .bind(json_col(&record.findings)?)
        .bind(&record.guidance)
        .bind(json_col(&record.standards_verified)?)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_holistic_review_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<HolisticReviewRecord>, GovernanceError> {
        let row = sqlx::query("SELECT * FROM holistic_reviews WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_holistic_review(&r)).transpose()
    }

    // ---------------------------------------------------------- evolution proposals

    pub async fn store_evolution_proposal(
        &self,
        proposal: &EvolutionProposal,
    ) -> Result<(), GovernanceError> {
        sqlx::query(
            r#"
            INSERT INTO evolution_proposals
                (id, target_entity, original_intent, proposed_change, rationale,
                 validation_criteria, evidence, status, worktree_branch, proposing_agent,
                 review_verdict, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&proposal.id)
        .bind(&proposal.target_entity)
        .bind(&proposal.original_intent)
        .bind(&proposal.proposed_change)
        .bind(&proposal.rationale)
        .bind(json_col(&proposal.validation_criteria)?)
        .bind(json_col(&proposal.evidence)?)
        .bind(proposal.status.as_str())
        .bind(&proposal.worktree_branch)
        .bind(&proposal.proposing_agent)
        .bind(proposal.review_verdict.map(|v| v.as_str().to_string()))
        .bind(proposal.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_evolution_proposal(
        &self,
        id: &str,
        status: ProposalStatus,
        evidence: &[ExperimentEvidence],
        review_verdict: Option<Verdict>,
    ) -> Result<(), GovernanceError> {
        let result = sqlx::query(
            "UPDATE evolution_proposals SET status = ?, evidence = ?, review_verdict = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(json_col(&evidence.to_vec())?)
        .bind(review_verdict.map(|v| v.as_str().to_string()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GovernanceError::ProposalNotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn get_evolution_proposal(
        &self,
        id: &str,
    ) -> Result<Option<EvolutionProposal>, GovernanceError> {
        let row = sqlx::query("SELECT * FROM evolution_proposals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_proposal(&r)).transpose()
    }

    pub async fn get_evolution_proposals_for_entity(
        &self,
        target_entity: &str,
    ) -> Result<Vec<EvolutionProposal>, GovernanceError> {
        let rows = sqlx::query(
            "SELECT * FROM evolution_proposals WHERE target_entity = ? ORDER BY created_at ASC",
        )
        .bind(target_entity)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_proposal).collect()
    }

    pub async fn get_all_evolution_proposals(
        &self,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<EvolutionProposal>, GovernanceError> {
        let rows = if let Some(status) = status {
            sqlx::query("SELECT * FROM evolution_proposals WHERE status = ? ORDER BY created_at DESC")
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM evolution_proposals ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(row_to_proposal).collect()
    }

    pub async fn get_active_experiments(&self) -> Result<Vec<EvolutionProposal>, GovernanceError> {
        let rows = sqlx::query(
            "SELECT * FROM evolution_proposals WHERE status IN ('experimenting', 'needs_more_evidence') ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_proposal).collect()
    }

    // ----------------------------------------------------------------- aggregates

    pub async fn get_status(&self) -> Result<GovernanceStatus, GovernanceError> {
        let total_decisions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decisions")
            .fetch_one(&self.pool)
            .await?;

        let counts = sqlx::query(
            r#"
            SELECT r.verdict AS verdict, COUNT(*) AS n FROM reviews r
            JOIN (
                SELECT decision_id, MAX(created_at) AS latest
                FROM reviews
                WHERE decision_id IS NOT NULL
                GROUP BY decision_id
            ) last ON last.decision_id = r.decision_id AND last.latest = r.created_at
            GROUP BY r.verdict
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut approved = 0i64;
        let mut blocked = 0i64;
        let mut needs_human_review = 0i64;
        for row in &counts {
            let verdict: String = row.try_get("verdict")?;
            let n: i64 = row.try_get("n")?;
            match verdict.as_str() {
                "approved" => approved = n,
                "blocked" => blocked = n,
                _ => needs_human_review = n,
            }
        }

        let pending = total_decisions - (approved + blocked + needs_human_review);

        let recent_rows = sqlx::query("SELECT * FROM decisions ORDER BY created_at DESC LIMIT 10")
            .fetch_all(&self.pool)
            .await?;
        let recent_activity = recent_rows
            .iter()
            .map(row_to_decision)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GovernanceStatus {
            total_decisions,
            approved,
            blocked,
            needs_human_review,
            pending,
            recent_activity,
        })
    }

    pub async fn get_task_governance_stats(&self) -> Result<TaskGovernanceStats, GovernanceError> {
        let total_governed_tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM governed_tasks")
            .fetch_one(&self.pool)
            .await?;

        let mut stats = TaskGovernanceStats {
            total_governed_tasks,
            approved: 0,
            blocked: 0,
            needs_human_review: 0,
            pending_review: 0,
            holistic_reviews: 0,
        };

        let rows = sqlx::query("SELECT current_status AS status, COUNT(*) AS n FROM governed_tasks GROUP BY current_status")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            match status.as_str() {
                "approved" => stats.approved = n,
                "blocked" => stats.blocked = n,
                "needs_human_review" => stats.needs_human_review = n,
                _ => stats.pending_review = n,
            }
        }

        stats.holistic_reviews = sqlx::query_scalar("SELECT COUNT(*) FROM holistic_reviews")
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<Decision, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Decision {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        sequence: row.try_get("sequence")?,
        agent: row.try_get("agent")?,
        category: parse_category(&row.try_get::<String, _>("category")?),
        summary: row.try_get("summary")?,
        detail: row.try_get("detail")?,
        components_affected: from_json_col(row.try_get("components_affected")?),
        alternatives_considered: from_json_col(row.try_get("alternatives_considered")?),
        confidence: parse_confidence(&row.try_get::<String, _>("confidence")?),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_review(row: &sqlx::sqlite::SqliteRow) -> Result<ReviewVerdict, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(ReviewVerdict {
        id: row.try_get("id")?,
        decision_id: row.try_get("decision_id")?,
        plan_id: row.try_get("plan_id")?,
        verdict: parse_verdict(&row.try_get::<String, _>("verdict")?),
        findings: from_json_col(row.try_get("findings")?),
        guidance: row.try_get("guidance")?,
        standards_verified: from_json_col(row.try_get("standards_verified")?),
        strengths_summary: row.try_get("strengths_summary")?,
        reviewer: row.try_get("reviewer")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_governed_task(row: &sqlx::sqlite::SqliteRow) -> Result<GovernedTaskRecord, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(GovernedTaskRecord {
        impl_task_id: row.try_get("impl_task_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        context: row.try_get("context")?,
        current_status: parse_task_status(&row.try_get::<String, _>("current_status")?),
        session_id: row.try_get("session_id")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_task_review(row: &sqlx::sqlite::SqliteRow) -> Result<TaskReviewRecord, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    let verdict: Option<String> = row.try_get("verdict")?;
    Ok(TaskReviewRecord {
        id: row.try_get("id")?,
        review_task_id: row.try_get("review_task_id")?,
        impl_task_id: row.try_get("impl_task_id")?,
        review_type: parse_review_type(&row.try_get::<String, _>("review_type")?),
        status: parse_task_review_status(&row.try_get::<String, _>("status")?),
        verdict: verdict.as_deref().map(parse_verdict),
        findings: from_json_col(row.try_get("findings")?),
        guidance: row.try_get("guidance")?,
        context: row.try_get("context")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_holistic_review(row: &sqlx::sqlite::SqliteRow) -> Result<HolisticReviewRecord, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(HolisticReviewRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        task_ids: from_json_col(row.try_get("task_ids")?),
        task_subjects: from_json_col(row.try_get("task_subjects")?),
        collective_intent: row.try_get("collective_intent")?,
        verdict: parse_verdict(&row.try_get::<String, _>("verdict")?),
        findings: from_json_col(row.try_get("findings")?),
        guidance: row.try_get("guidance")?,
        standards_verified: from_json_col(row.try_get("standards_verified")?),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_proposal(row: &sqlx::sqlite::SqliteRow) -> Result<EvolutionProposal, GovernanceError> {
    let created_at: String = row.try_get("created_at")?;
    let review_verdict: Option<String> = row.try_get("review_verdict")?;
    Ok(EvolutionProposal {
        id: row.try_get("id")?,
        target_entity: row.try_get("target_entity")?,
        original_intent: row.try_get("original_intent")?,
        proposed_change: row.try_get("proposed_change")?,
        rationale: row.try_get("rationale")?,
        validation_criteria: from_json_col(row.try_get("validation_criteria")?),
        evidence: from_json_col(row.try_get("evidence")?),
        status: parse_proposal_status(&row.try_get::<String, _>("status")?),
        worktree_branch: row.try_get("worktree_branch")?,
        proposing_agent: row.try_get("proposing_agent")?,
        review_verdict: review_verdict.as_deref().map(parse_verdict),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (GovernanceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = GovernanceStore::open(dir.path().join("governance.db")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn decision_sequence_is_dense_per_task() {
        let (store, _dir) = store().await;
        let d1 = store
            .store_decision(
                "impl-1",
                "agent-a",
                DecisionCategory::PatternChoice,
                "use retry pattern",
                "detail",
                vec![],
                vec![],
                Confidence::High,
            )
            .await
            .unwrap();
        let d2 = store
            .store_decision(
                "impl-1",
                "agent-a",
                DecisionCategory::ApiDesign,
                "expose REST endpoint",
                "detail",
                vec![],
                vec![],
                Confidence::Medium,
            )
            .await
            .unwrap();
        assert_eq!(d1.sequence, 1);
        assert_eq!(d2.sequence, 2);

        let other_task = store
            .store_decision(
                "impl-2",
                "agent-b",
                DecisionCategory::PatternChoice,
                "x",
                "y",
                vec![],
                vec![],
                Confidence::Low,
            )
            .await
            .unwrap();
        assert_eq!(other_task.sequence, 1);
    }

    #[tokio::test]
    async fn unresolved_blocks_not_cleared_by_later_approval() {
        let (store, _dir) = store().await;
        let decision = store
            .store_decision(
                "impl-1",
                "agent-a",
                DecisionCategory::ComponentDesign,
                "s",
                "d",
                vec![],
                vec![],
                Confidence::High,
            )
            .await
            .unwrap();

        store
            .store_review(
                Some(&decision.id),
                None,
                Verdict::Blocked,
                vec![],
                "missing tests",
                vec![],
                None,
                "reviewer-1",
            )
            .await
            .unwrap();

        assert!(store.has_unresolved_blocks("impl-1").await.unwrap());

        store
            .store_review(
                Some(&decision.id),
                None,
                Verdict::Approved,
                vec![],
                "looks fine now",
                vec![],
                None,
                "reviewer-1",
            )
            .await
            .unwrap();

        assert!(store.has_unresolved_blocks("impl-1").await.unwrap());
    }

    #[tokio::test]
    async fn holistic_review_upserts_by_session() {
        let (store, _dir) = store().await;
        let record = HolisticReviewRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "session-1".into(),
            task_ids: vec!["impl-1".into()],
            task_subjects: vec!["Add retries".into()],
            collective_intent: "improve resilience".into(),
            verdict: Verdict::NeedsHumanReview,
            findings: vec![],
            guidance: "clarify scope".into(),
            standards_verified: vec![],
            created_at: Utc::now(),
        };
        store.store_holistic_review(&record).await.unwrap();

        let mut updated = record.clone();
        updated.verdict = Verdict::Approved;
        updated.guidance = "approved after clarification".into();
        store.store_holistic_review(&updated).await.unwrap();

        let fetched = store
            .get_holistic_review_for_session("session-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.verdict, Verdict::Approved);
        assert_eq!(fetched.id, record.id);
    }

    #[tokio::test]
    async fn task_governance_stats_aggregate() {
        let (store, _dir) = store().await;
        store
            .store_governed_task(&GovernedTaskRecord {
                impl_task_id: "impl-1".into(),
                subject: "Add retries".into(),
                description: "d".into(),
                context: "c".into(),
                current_status: TaskStatus::PendingReview,
                session_id: "session-1".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        store
            .update_governed_task_status("impl-1", TaskStatus::Approved)
            .await
            .unwrap();

        let stats = store.get_task_governance_stats().await.unwrap();
        assert_eq!(stats.total_governed_tasks, 1);
        assert_eq!(stats.approved, 1);
    }
}
