//! The `recommendations` table: anomaly-type keyed suggestions accumulated
//! from the detector and refined by each escalation tier. `RecommendationManager`
//! was referenced by `_audit-process.py`/`_audit-escalate.py` but its module
//! was not part of the retrieved sources; built from the call sites' usage
//! (`create_from_anomaly`,
//! `update_from_escalation`, `get_active`).

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::AuditError;
use crate::models::{Recommendation, RecommendationStatus};

pub struct RecommendationManager {
    pool: SqlitePool,
}

fn status_str(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::Active => "active",
        RecommendationStatus::Superseded => "superseded",
        RecommendationStatus::Dismissed => "dismissed",
    }
}

fn parse_status(s: &str) -> RecommendationStatus {
    match s {
        "superseded" => RecommendationStatus::Superseded,
        "dismissed" => RecommendationStatus::Dismissed,
        _ => RecommendationStatus::Active,
    }
}

impl RecommendationManager {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.as_ref().display()))
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(db_path.as_ref()))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    async fn migrate(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recommendations (
                id TEXT PRIMARY KEY,
                anomaly_type TEXT NOT NULL,
                suggestion TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                origin_tier TEXT NOT NULL DEFAULT 'detector',
                evidence_count INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_recommendations_type ON recommendations(anomaly_type)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Seeds a recommendation straight from a detector anomaly (no LLM
    /// involved yet). If an active recommendation already exists for this
    /// anomaly type, its evidence count is bumped instead of creating a
    /// duplicate row.
    pub async fn create_from_anomaly(&self, anomaly_type: &str, suggestion: &str) -> Result<(), AuditError> {
        let existing =
            sqlx::query("SELECT id FROM recommendations WHERE anomaly_type = ? AND status = 'active' ORDER BY updated_at DESC LIMIT 1")
                .bind(anomaly_type)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(row) = existing {
            let id: String = row.get("id");
            sqlx::query("UPDATE recommendations SET evidence_count = evidence_count + 1, updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;
        } else {
            let now = Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO recommendations (id, anomaly_type, suggestion, category, origin_tier, evidence_count, status, created_at, updated_at) \
                 VALUES (?, ?, ?, 'general', 'detector', 1, 'active', ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(anomaly_type)
            .bind(suggestion)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Refines (or creates) the active recommendation for `anomaly_type` with
    /// an escalation tier's suggestion. `tier` is recorded as `origin_tier`
    /// so later readers know whether Haiku, Sonnet, or Opus last touched it.
    pub async fn update_from_escalation(
        &self,
        anomaly_type: &str,
        suggestion: &str,
        category: &str,
        tier: &str,
    ) -> Result<(), AuditError> {
        let existing =
            sqlx::query("SELECT id FROM recommendations WHERE anomaly_type = ? AND status = 'active' ORDER BY updated_at DESC LIMIT 1")
                .bind(anomaly_type)
                .fetch_optional(&self.pool)
                .await?;

        let now = Utc::now().to_rfc3339();
        if let Some(row) = existing {
            let id: String = row.get("id");
            sqlx::query(
                "UPDATE recommendations SET suggestion = ?, category = ?, origin_tier = ?, \
                 evidence_count = evidence_count + 1, updated_at = ? WHERE id = ?",
            )
            .bind(suggestion)
            .bind(category)
            .bind(tier)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO recommendations (id, anomaly_type, suggestion, category, origin_tier, evidence_count, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, 1, 'active', ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(anomaly_type)
            .bind(suggestion)
            .bind(category)
            .bind(tier)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn get_active(&self) -> Result<Vec<Recommendation>, AuditError> {
        let rows = sqlx::query("SELECT * FROM recommendations WHERE status = 'active' ORDER BY evidence_count DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Recommendation {
                id: row.get("id"),
                anomaly_type: row.get("anomaly_type"),
                suggestion: row.get("suggestion"),
                category: row.get("category"),
                origin_tier: row.get("origin_tier"),
                evidence_count: row.get("evidence_count"),
                status: parse_status(&row.get::<String, _>("status")),
                created_at: row.get::<String, _>("created_at").parse().unwrap_or_else(|_| Utc::now()),
                updated_at: row.get::<String, _>("updated_at").parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> (RecommendationManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = RecommendationManager::open(dir.path().join("statistics.db")).await.unwrap();
        (manager, dir)
    }

    #[tokio::test]
    async fn repeated_anomaly_bumps_evidence_instead_of_duplicating() {
        let (mgr, _dir) = manager().await;
        mgr.create_from_anomaly("high_block_rate", "review the block rate threshold").await.unwrap();
        mgr.create_from_anomaly("high_block_rate", "review the block rate threshold").await.unwrap();

        let active = mgr.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].evidence_count, 2);
    }

    #[tokio::test]
    async fn escalation_tier_refines_existing_recommendation() {
        let (mgr, _dir) = manager().await;
        mgr.create_from_anomaly("high_block_rate", "initial suggestion").await.unwrap();
        mgr.update_from_escalation("high_block_rate", "raise threshold to 0.4", "setting_tune", "sonnet").await.unwrap();

        let active = mgr.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].origin_tier, "sonnet");
        assert_eq!(active[0].suggestion, "raise threshold to 0.4");
        assert_eq!(active[0].evidence_count, 2);
    }
}
