//! SQLite-backed rolling statistics accumulator. Grounded line-for-line in
//! `audit/stats.py`'s `StatsAccumulator`.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::AuditError;
use crate::models::{Anomaly, AnomalySeverity, BatchSummary};

/// Per-session summary row, as stored in `session_summaries`.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_event_ts: f64,
    pub last_event_ts: f64,
    pub total_events: i64,
    pub approval_count: i64,
    pub block_count: i64,
    pub gate_block_count: i64,
    pub gate_allow_count: i64,
    pub skip_count: i64,
    pub task_count: i64,
}

pub struct StatsAccumulator {
    pool: SqlitePool,
}

impl StatsAccumulator {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.as_ref().display()))
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(db_path.as_ref()))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
        let stats = Self { pool };
        stats.migrate().await?;
        Ok(stats)
    }

    async fn migrate(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_counts (
                bucket TEXT NOT NULL,
                event_type TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (bucket, event_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_summaries (
                session_id TEXT PRIMARY KEY,
                first_event_ts REAL,
                last_event_ts REAL,
                total_events INTEGER NOT NULL DEFAULT 0,
                approval_count INTEGER NOT NULL DEFAULT 0,
                block_count INTEGER NOT NULL DEFAULT 0,
                gate_block_count INTEGER NOT NULL DEFAULT 0,
                gate_allow_count INTEGER NOT NULL DEFAULT 0,
                skip_count INTEGER NOT NULL DEFAULT 0,
                task_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metric_windows (
                metric_name TEXT NOT NULL,
                window_start REAL NOT NULL,
                window_end REAL NOT NULL,
                value REAL NOT NULL,
                sample_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (metric_name, window_start)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS anomalies (
                id TEXT PRIMARY KEY,
                detected_at REAL NOT NULL,
                anomaly_type TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'warning',
                description TEXT NOT NULL,
                metric_values TEXT,
                context TEXT,
                escalated INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_counts_bucket ON event_counts(bucket)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_anomalies_type ON anomalies(anomaly_type)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_anomalies_detected ON anomalies(detected_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Batch-ingests events into hourly `event_counts` and per-session
    /// `session_summaries`, both via `ON CONFLICT ... DO UPDATE`. Per-session
    /// deltas commute under SUM/MIN/MAX, so batch partitioning never affects
    /// the eventual totals.
    pub async fn ingest_events(&self, events: &[crate::models::AuditEvent]) -> Result<BatchSummary, AuditError> {
        if events.is_empty() {
            return Ok(BatchSummary::default());
        }

        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut by_session: HashMap<String, Vec<&crate::models::AuditEvent>> = HashMap::new();

        for event in events {
            *by_type.entry(event.event_type.clone()).or_insert(0) += 1;
            if let Some(sid) = &event.session_id {
                if !sid.is_empty() {
                    by_session.entry(sid.clone()).or_default().push(event);
                }
            }
        }

        let bucket = Utc::now().format("%Y-%m-%dT%H").to_string();
        let mut tx = self.pool.begin().await?;

        for (event_type, count) in &by_type {
            sqlx::query(
                "INSERT INTO event_counts (bucket, event_type, count) VALUES (?, ?, ?) \
                 ON CONFLICT(bucket, event_type) DO UPDATE SET count = count + excluded.count",
            )
            .bind(&bucket)
            .bind(event_type)
            .bind(*count as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (sid, session_events) in &by_session {
            let timestamps: Vec<f64> = session_events.iter().map(|e| e.ts).collect();
            let min_ts = timestamps.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_ts = timestamps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            let approvals = session_events
                .iter()
                .filter(|e| e.data.get("verdict").and_then(|v| v.as_str()) == Some("approved") || e.data.get("allowed") == Some(&serde_json::Value::Bool(true)))
                .count() as i64;
            let blocks = session_events
                .iter()
                .filter(|e| {
                    e.data.get("verdict").and_then(|v| v.as_str()) == Some("blocked")
                        || e.data.get("status").and_then(|v| v.as_str()) == Some("blocked")
                })
                .count() as i64;
            let gate_blocks = session_events
                .iter()
                .filter(|e| e.event_type.ends_with("_attempted") && e.data.get("allowed") == Some(&serde_json::Value::Bool(false)))
                .count() as i64;
            let gate_allows = session_events
                .iter()
                .filter(|e| e.event_type.ends_with("_attempted") && e.data.get("allowed") == Some(&serde_json::Value::Bool(true)))
                .count() as i64;
            let skips = session_events.iter().filter(|e| e.event_type.contains("skipped")).count() as i64;
            let tasks = session_events.iter().filter(|e| e.event_type == "governance.task_pair_created").count() as i64;

            sqlx::query(
                "INSERT INTO session_summaries \
                 (session_id, first_event_ts, last_event_ts, total_events, approval_count, block_count, \
                  gate_block_count, gate_allow_count, skip_count, task_count) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(session_id) DO UPDATE SET \
                  first_event_ts = MIN(first_event_ts, excluded.first_event_ts), \
                  last_event_ts = MAX(last_event_ts, excluded.last_event_ts), \
                  total_events = total_events + excluded.total_events, \
                  approval_count = approval_count + excluded.approval_count, \
                  block_count = block_count + excluded.block_count, \
                  gate_block_count = gate_block_count + excluded.gate_block_count, \
                  gate_allow_count = gate_allow_count + excluded.gate_allow_count, \
                  skip_count = skip_count + excluded.skip_count, \
                  task_count = task_count + excluded.task_count",
            )
            .bind(sid)
            .bind(min_ts)
            .bind(max_ts)
            .bind(session_events.len() as i64)
            .bind(approvals)
            .bind(blocks)
            .bind(gate_blocks)
            .bind(gate_allows)
            .bind(skips)
            .bind(tasks)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(BatchSummary { total: events.len(), by_type, sessions_touched: by_session.into_keys().collect() })
    }

    /// Idempotent on `id` (`INSERT OR REPLACE`).
    pub async fn record_anomaly(&self, anomaly: &Anomaly) -> Result<(), AuditError> {
        let metric_values = if anomaly.metric_values.is_empty() { None } else { Some(serde_json::to_string(&anomaly.metric_values)?) };
        let context = if anomaly.context.is_null() { None } else { Some(anomaly.context.to_string()) };

        sqlx::query(
            "INSERT OR REPLACE INTO anomalies (id, detected_at, anomaly_type, severity, description, metric_values, context) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&anomaly.id)
        .bind(Utc::now().timestamp() as f64)
        .bind(&anomaly.anomaly_type)
        .bind(anomaly.severity.as_str())
        .bind(&anomaly.description)
        .bind(metric_values)
        .bind(context)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_recent_event_rate(&self, hours: i64) -> Result<HashMap<String, i64>, AuditError> {
        let cutoff_bucket = (Utc::now() - chrono::Duration::hours(hours)).format("%Y-%m-%dT%H").to_string();
        let rows = sqlx::query("SELECT event_type, SUM(count) as total FROM event_counts WHERE bucket >= ? GROUP BY event_type")
            .bind(cutoff_bucket)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.get("event_type"), r.get::<i64, _>("total"))).collect())
    }

    pub async fn get_baseline_rate(&self, metric_name: &str, window_hours: i64) -> Result<Option<f64>, AuditError> {
        let cutoff = (Utc::now() - chrono::Duration::hours(window_hours)).timestamp() as f64;
        let row = sqlx::query("SELECT AVG(value) as avg_val, COUNT(*) as cnt FROM metric_windows WHERE metric_name = ? AND window_start >= ?")
            .bind(metric_name)
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("cnt");
        if count > 0 {
            Ok(row.get::<Option<f64>, _>("avg_val"))
        } else {
            Ok(None)
        }
    }

    /// Hourly-window weighted-average merge: `(v1*n1 + v2*n2) / (n1+n2)`.
    pub async fn update_metric_window(&self, metric_name: &str, value: f64) -> Result<(), AuditError> {
        self.update_metric_window_with_samples(metric_name, value, 1).await
    }

    pub async fn update_metric_window_with_samples(&self, metric_name: &str, value: f64, sample_count: i64) -> Result<(), AuditError> {
        let now = Utc::now().timestamp() as f64;
        let window_start = now - (now % 3600.0);
        let window_end = window_start + 3600.0;

        sqlx::query(
            "INSERT INTO metric_windows (metric_name, window_start, window_end, value, sample_count) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(metric_name, window_start) DO UPDATE SET \
              value = (value * sample_count + excluded.value * excluded.sample_count) / (sample_count + excluded.sample_count), \
              sample_count = sample_count + excluded.sample_count",
        )
        .bind(metric_name)
        .bind(window_start)
        .bind(window_end)
        .bind(value)
        .bind(sample_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_session_summary(&self, session_id: &str) -> Result<Option<SessionSummary>, AuditError> {
        let row = sqlx::query("SELECT * FROM session_summaries WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| SessionSummary {
            session_id: row.get("session_id"),
            first_event_ts: row.get("first_event_ts"),
            last_event_ts: row.get("last_event_ts"),
            total_events: row.get("total_events"),
            approval_count: row.get("approval_count"),
            block_count: row.get("block_count"),
            gate_block_count: row.get("gate_block_count"),
            gate_allow_count: row.get("gate_allow_count"),
            skip_count: row.get("skip_count"),
            task_count: row.get("task_count"),
        }))
    }

    pub async fn get_recent_sessions(&self, limit: i64) -> Result<Vec<SessionSummary>, AuditError> {
        let rows = sqlx::query("SELECT * FROM session_summaries ORDER BY last_event_ts DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| SessionSummary {
                session_id: row.get("session_id"),
                first_event_ts: row.get("first_event_ts"),
                last_event_ts: row.get("last_event_ts"),
                total_events: row.get("total_events"),
                approval_count: row.get("approval_count"),
                block_count: row.get("block_count"),
                gate_block_count: row.get("gate_block_count"),
                gate_allow_count: row.get("gate_allow_count"),
                skip_count: row.get("skip_count"),
                task_count: row.get("task_count"),
            })
            .collect())
    }

    pub async fn get_recent_anomalies(&self, hours: i64) -> Result<Vec<Anomaly>, AuditError> {
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).timestamp() as f64;
        let rows = sqlx::query("SELECT * FROM anomalies WHERE detected_at >= ? ORDER BY detected_at DESC")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_anomaly).collect())
    }

    pub async fn get_unescalated_anomalies(&self) -> Result<Vec<Anomaly>, AuditError> {
        let rows = sqlx::query("SELECT * FROM anomalies WHERE escalated = 0 ORDER BY detected_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_anomaly).collect())
    }

    pub async fn mark_anomaly_escalated(&self, anomaly_id: &str) -> Result<(), AuditError> {
        sqlx::query("UPDATE anomalies SET escalated = 1 WHERE id = ?").bind(anomaly_id).execute(&self.pool).await?;
        Ok(())
    }

    /// Deletes rows older than `max_age_days` from all three time-bucketed
    /// tables; returns the total rows deleted.
    pub async fn prune_old_data(&self, max_age_days: i64) -> Result<u64, AuditError> {
        let cutoff_ts = (Utc::now() - chrono::Duration::days(max_age_days)).timestamp() as f64;
        let cutoff_bucket = (Utc::now() - chrono::Duration::days(max_age_days)).format("%Y-%m-%dT%H").to_string();

        let mut deleted = 0u64;
        deleted += sqlx::query("DELETE FROM event_counts WHERE bucket < ?").bind(&cutoff_bucket).execute(&self.pool).await?.rows_affected();
        deleted += sqlx::query("DELETE FROM metric_windows WHERE window_end < ?").bind(cutoff_ts).execute(&self.pool).await?.rows_affected();
        deleted += sqlx::query("DELETE FROM anomalies WHERE detected_at < ?").bind(cutoff_ts).execute(&self.pool).await?.rows_affected();

        Ok(deleted)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_anomaly(row: sqlx::sqlite::SqliteRow) -> Anomaly {
    let metric_values: Option<String> = row.get("metric_values");
    let context: Option<String> = row.get("context");
    Anomaly {
        id: row.get("id"),
        anomaly_type: row.get("anomaly_type"),
        severity: AnomalySeverity::parse(&row.get::<String, _>("severity")),
        description: row.get("description"),
        metric_values: metric_values.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default(),
        context: context.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEvent;

    async fn stats() -> (StatsAccumulator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatsAccumulator::open(dir.path().join("statistics.db")).await.unwrap();
        (stats, dir)
    }

    fn event(event_type: &str, data: serde_json::Value, session_id: &str) -> AuditEvent {
        AuditEvent::new(event_type, data, "hook", Some(session_id.to_string()))
    }

    #[tokio::test]
    async fn ingest_events_sums_type_counts_and_session_deltas() {
        let (stats, _dir) = stats().await;
        let events = vec![
            event("governance.task_pair_created", serde_json::json!({}), "sess-1"),
            event("review.completed", serde_json::json!({"verdict": "approved"}), "sess-1"),
            event("review.completed", serde_json::json!({"verdict": "blocked"}), "sess-1"),
        ];
        let summary = stats.ingest_events(&events).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_type["review.completed"], 2);

        let session = stats.get_session_summary("sess-1").await.unwrap().unwrap();
        assert_eq!(session.total_events, 3);
        assert_eq!(session.approval_count, 1);
        assert_eq!(session.block_count, 1);
        assert_eq!(session.task_count, 1);
    }

    #[tokio::test]
    async fn ingest_is_commutative_across_batch_partitions() {
        let (whole, _d1) = stats().await;
        let (split, _d2) = stats().await;

        let events = vec![
            event("tool.write_attempted", serde_json::json!({"allowed": true}), "sess-x"),
            event("tool.write_attempted", serde_json::json!({"allowed": false}), "sess-x"),
            event("review.skipped", serde_json::json!({}), "sess-x"),
        ];
        whole.ingest_events(&events).await.unwrap();

        split.ingest_events(&events[0..1]).await.unwrap();
        split.ingest_events(&events[1..3]).await.unwrap();

        let a = whole.get_session_summary("sess-x").await.unwrap().unwrap();
        let b = split.get_session_summary("sess-x").await.unwrap().unwrap();
        assert_eq!(a.total_events, b.total_events);
        assert_eq!(a.gate_allow_count, b.gate_allow_count);
        assert_eq!(a.gate_block_count, b.gate_block_count);
        assert_eq!(a.skip_count, b.skip_count);
    }

    #[tokio::test]
    async fn record_anomaly_is_idempotent_on_id() {
        let (stats, _dir) = stats().await;
        let anomaly = Anomaly {
            id: "a1".into(),
            anomaly_type: "high_block_rate".into(),
            severity: AnomalySeverity::Warning,
            description: "block rate spiked".into(),
            metric_values: HashMap::new(),
            context: serde_json::Value::Null,
        };
        stats.record_anomaly(&anomaly).await.unwrap();
        stats.record_anomaly(&anomaly).await.unwrap();

        let recent = stats.get_recent_anomalies(24).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn metric_window_merges_with_weighted_average() {
        let (stats, _dir) = stats().await;
        stats.update_metric_window("events_per_hour", 10.0).await.unwrap();
        stats.update_metric_window("events_per_hour", 20.0).await.unwrap();

        let baseline = stats.get_baseline_rate("events_per_hour", 24).await.unwrap();
        assert_eq!(baseline, Some(15.0));
    }

    #[tokio::test]
    async fn prune_old_data_removes_stale_anomalies() {
        let (stats, _dir) = stats().await;
        sqlx::query("INSERT INTO anomalies (id, detected_at, anomaly_type, severity, description) VALUES (?, ?, ?, ?, ?)")
            .bind("old")
            .bind(0.0)
            .bind("t")
            .bind("info")
            .bind("d")
            .execute(stats.pool())
            .await
            .unwrap();

        let deleted = stats.prune_old_data(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(stats.get_recent_anomalies(24 * 365 * 10).await.unwrap().is_empty());
    }
}
