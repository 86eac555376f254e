//! SQLite-backed finding lifecycle and dismissal audit trail. Grounded in
//! `collab_quality/trust_engine.py`.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::TrustError;
use crate::models::{DismissalRecord, Finding, FindingStatus, Severity, TrustClassification, TrustDecision};

pub struct TrustEngine {
    pool: SqlitePool,
}

impl TrustEngine {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TrustError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(path.as_ref()))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
        let engine = Self { pool };
        engine.migrate().await?;
        Ok(engine)
    }

    async fn migrate(&self) -> Result<(), TrustError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS findings (
                id TEXT PRIMARY KEY,
                tool TEXT NOT NULL,
                severity TEXT NOT NULL,
                component TEXT,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                dismissed_by TEXT,
                dismissal_justification TEXT,
                dismissed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dismissal_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finding_id TEXT NOT NULL,
                dismissed_by TEXT NOT NULL,
                justification TEXT NOT NULL,
                dismissed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Default decision for any open finding is `BLOCK`; a dismissed finding
    /// tracks, quoting the dismisser.
    pub async fn get_trust_decision(&self, finding_id: &str) -> Result<TrustClassification, TrustError> {
        let row = sqlx::query("SELECT status, dismissed_by, dismissal_justification FROM findings WHERE id = ?")
            .bind(finding_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            let status: String = row.get("status");
            if status == "dismissed" {
                let dismissed_by: String = row.get("dismissed_by");
                let justification: String = row.get("dismissal_justification");
                return Ok(TrustClassification {
                    decision: TrustDecision::Track,
                    rationale: format!("Previously dismissed by {dismissed_by}: {justification}"),
                });
            }
        }

        Ok(TrustClassification {
            decision: TrustDecision::Block,
            rationale: "default: tool findings presumed legitimate".to_string(),
        })
    }

    /// Rejected as an idempotent no-op if `id` already exists.
    pub async fn record_finding(
        &self,
        id: &str,
        tool: &str,
        severity: Severity,
        component: Option<&str>,
        description: &str,
    ) -> Result<bool, TrustError> {
        let result = sqlx::query(
            "INSERT INTO findings (id, tool, severity, component, description, created_at, status) \
             VALUES (?, ?, ?, ?, ?, ?, 'open')",
        )
        .bind(id)
        .bind(tool)
        .bind(severity.as_str())
        .bind(component)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Justification must be non-empty/non-whitespace; every successful call
    /// appends exactly one row to `dismissal_history`.
    pub async fn record_dismissal(
        &self,
        finding_id: &str,
        justification: &str,
        dismissed_by: &str,
    ) -> Result<(), TrustError> {
        if justification.trim().is_empty() {
            return Err(TrustError::EmptyJustification);
        }

        let dismissed_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE findings SET status = 'dismissed', dismissed_by = ?, dismissal_justification = ?, dismissed_at = ? \
             WHERE id = ?",
        )
        .bind(dismissed_by)
        .bind(justification)
        .bind(dismissed_at.to_rfc3339())
        .bind(finding_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO dismissal_history (finding_id, dismissed_by, justification, dismissed_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(finding_id)
        .bind(dismissed_by)
        .bind(justification)
        .bind(dismissed_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_dismissal_history(&self, finding_id: &str) -> Result<Vec<DismissalRecord>, TrustError> {
        let rows = sqlx::query(
            "SELECT finding_id, dismissed_by, justification, dismissed_at FROM dismissal_history \
             WHERE finding_id = ? ORDER BY dismissed_at DESC",
        )
        .bind(finding_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DismissalRecord {
                finding_id: row.get("finding_id"),
                dismissed_by: row.get("dismissed_by"),
                justification: row.get("justification"),
                dismissed_at: row
                    .get::<String, _>("dismissed_at")
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    /// Open findings at or above `min_severity`.
    pub async fn get_unresolved_findings(&self, min_severity: Severity) -> Result<Vec<Finding>, TrustError> {
        let all = self.get_all_findings(Some(FindingStatus::Open)).await?;
        Ok(all.into_iter().filter(|f| f.severity >= min_severity).collect())
    }

    pub async fn get_all_findings(&self, status: Option<FindingStatus>) -> Result<Vec<Finding>, TrustError> {
        let rows = match status {
            Some(FindingStatus::Open) => {
                sqlx::query("SELECT * FROM findings WHERE status = 'open' ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(FindingStatus::Dismissed) => {
                sqlx::query("SELECT * FROM findings WHERE status = 'dismissed' ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM findings ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let status_str: String = row.get("status");
                Finding {
                    id: row.get("id"),
                    tool: row.get("tool"),
                    severity: Severity::parse(&row.get::<String, _>("severity")),
                    component: row.get("component"),
                    description: row.get("description"),
                    created_at: row
                        .get::<String, _>("created_at")
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                    status: if status_str == "dismissed" { FindingStatus::Dismissed } else { FindingStatus::Open },
                    dismissed_by: row.get("dismissed_by"),
                    dismissal_justification: row.get("dismissal_justification"),
                    dismissed_at: row
                        .get::<Option<String>, _>("dismissed_at")
                        .and_then(|s| s.parse().ok()),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine() -> (TrustEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrustEngine::open(dir.path().join("trust.db")).await.unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn default_decision_is_block() {
        let (engine, _dir) = engine().await;
        engine.record_finding("f1", "clippy", Severity::High, None, "unused import").await.unwrap();
        let decision = engine.get_trust_decision("f1").await.unwrap();
        assert_eq!(decision.decision, TrustDecision::Block);
    }

    #[tokio::test]
    async fn duplicate_finding_id_is_rejected() {
        let (engine, _dir) = engine().await;
        assert!(engine.record_finding("f1", "clippy", Severity::Low, None, "x").await.unwrap());
        assert!(!engine.record_finding("f1", "clippy", Severity::Low, None, "x").await.unwrap());
    }

    #[tokio::test]
    async fn empty_justification_is_rejected() {
        let (engine, _dir) = engine().await;
        engine.record_finding("f1", "clippy", Severity::High, None, "x").await.unwrap();
        let err = engine.record_dismissal("f1", "   ", "human").await.unwrap_err();
        assert!(matches!(err, TrustError::EmptyJustification));
    }

    #[tokio::test]
    async fn dismissal_switches_decision_to_track_and_appends_history() {
        let (engine, _dir) = engine().await;
        engine.record_finding("f1", "clippy", Severity::High, None, "x").await.unwrap();
        engine.record_dismissal("f1", "false positive in generated code", "alice").await.unwrap();

        let decision = engine.get_trust_decision("f1").await.unwrap();
        assert_eq!(decision.decision, TrustDecision::Track);
        assert!(decision.rationale.contains("alice"));

        let history = engine.get_dismissal_history("f1").await.unwrap();
        assert_eq!(history.len(), 1);

        engine.record_dismissal("f1", "confirmed again", "bob").await.unwrap();
        let history = engine.get_dismissal_history("f1").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn unresolved_findings_respects_severity_threshold() {
        let (engine, _dir) = engine().await;
        engine.record_finding("f1", "tool", Severity::Low, None, "x").await.unwrap();
        engine.record_finding("f2", "tool", Severity::Critical, None, "y").await.unwrap();

        let unresolved = engine.get_unresolved_findings(Severity::High).await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].id, "f2");
    }
}
