//! Threshold-based anomaly detection: no LLM calls, just the batch summary
//! and whatever rolling stats are already in the accumulator. Grounded in
//! Threshold-based detection (the concrete `audit/anomaly.py` module
//! was not part of the retrieved sources; the checks below are built from
//! the named thresholds `_audit-process.py` passes through and the
//! `recent_stats`/`event_window` shapes the escalation prompts consume).

use std::collections::HashMap;

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::models::{Anomaly, AnomalySeverity, BatchSummary};
use crate::stats::StatsAccumulator;

pub struct AnomalyDetector {
    thresholds: HashMap<String, f64>,
}

impl AnomalyDetector {
    pub fn new(thresholds: HashMap<String, f64>) -> Self {
        Self { thresholds }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.thresholds.clone())
    }

    fn threshold(&self, name: &str, default: f64) -> f64 {
        self.thresholds.get(name).copied().unwrap_or(default)
    }

    /// Checks the just-ingested batch (and the sessions it touched) against
    /// configured thresholds. Returns no anomalies for an empty batch.
    pub async fn check(&self, summary: &BatchSummary, stats: &StatsAccumulator) -> Result<Vec<Anomaly>, AuditError> {
        if summary.total == 0 {
            return Ok(Vec::new());
        }

        let mut anomalies = Vec::new();

        if let Some(anomaly) = self.check_event_rate_spike(summary, stats).await? {
            anomalies.push(anomaly);
        }
        if let Some(anomaly) = self.check_skip_rate(summary) {
            anomalies.push(anomaly);
        }
        anomalies.extend(self.check_session_rates(summary, stats).await?);

        Ok(anomalies)
    }

    async fn check_event_rate_spike(&self, summary: &BatchSummary, stats: &StatsAccumulator) -> Result<Option<Anomaly>, AuditError> {
        let spike_ratio = self.threshold("events_per_hour_spike_ratio", 3.0);
        let Some(baseline) = stats.get_baseline_rate("events_per_hour", 24).await? else {
            return Ok(None);
        };
        if baseline <= 0.0 {
            return Ok(None);
        }

        let current = summary.total as f64;
        if current > baseline * spike_ratio {
            let mut metric_values = HashMap::new();
            metric_values.insert("current".to_string(), current);
            metric_values.insert("baseline".to_string(), baseline);
            metric_values.insert("ratio".to_string(), current / baseline);

            return Ok(Some(Anomaly {
                id: uuid::Uuid::new_v4().to_string(),
                anomaly_type: "event_rate_spike".to_string(),
                severity: if current > baseline * spike_ratio * 2.0 { AnomalySeverity::Critical } else { AnomalySeverity::Warning },
                description: format!("event rate {current} is {:.1}x the 24h baseline of {baseline}", current / baseline),
                metric_values,
                context: serde_json::Value::Null,
            }));
        }

        Ok(None)
    }

    fn check_skip_rate(&self, summary: &BatchSummary) -> Option<Anomaly> {
        let threshold = self.threshold("skip_rate", 0.3);
        let skipped: usize = summary.by_type.iter().filter(|(k, _)| k.contains("skipped")).map(|(_, v)| v).sum();
        if skipped == 0 {
            return None;
        }
        let rate = skipped as f64 / summary.total as f64;
        if rate > threshold {
            let mut metric_values = HashMap::new();
            metric_values.insert("skip_rate".to_string(), rate);
            metric_values.insert("skipped".to_string(), skipped as f64);
            metric_values.insert("total".to_string(), summary.total as f64);

            Some(Anomaly {
                id: uuid::Uuid::new_v4().to_string(),
                anomaly_type: "high_skip_rate".to_string(),
                severity: AnomalySeverity::Info,
                description: format!("{:.0}% of this batch's events were skips", rate * 100.0),
                metric_values,
                context: serde_json::Value::Null,
            })
        } else {
            None
        }
    }

    async fn check_session_rates(&self, summary: &BatchSummary, stats: &StatsAccumulator) -> Result<Vec<Anomaly>, AuditError> {
        let governance_threshold = self.threshold("governance_block_rate", 0.5);
        let gate_threshold = self.threshold("gate_block_rate", 0.5);
        let mut anomalies = Vec::new();

        for session_id in &summary.sessions_touched {
            let Some(session) = stats.get_session_summary(session_id).await? else { continue };

            let decisions = session.approval_count + session.block_count;
            if decisions >= 2 {
                let rate = session.block_count as f64 / decisions as f64;
                if rate > governance_threshold {
                    let mut metric_values = HashMap::new();
                    metric_values.insert("block_rate".to_string(), rate);
                    metric_values.insert("blocks".to_string(), session.block_count as f64);
                    metric_values.insert("approvals".to_string(), session.approval_count as f64);

                    anomalies.push(Anomaly {
                        id: uuid::Uuid::new_v4().to_string(),
                        anomaly_type: "governance_block_rate".to_string(),
                        severity: if rate > 0.8 { AnomalySeverity::Critical } else { AnomalySeverity::Warning },
                        description: format!("session {session_id} has a {:.0}% governance block rate", rate * 100.0),
                        metric_values,
                        context: serde_json::json!({"session_id": session_id}),
                    });
                }
            }

            let gate_attempts = session.gate_allow_count + session.gate_block_count;
            if gate_attempts >= 2 {
                let rate = session.gate_block_count as f64 / gate_attempts as f64;
                if rate > gate_threshold {
                    let mut metric_values = HashMap::new();
                    metric_values.insert("gate_block_rate".to_string(), rate);
                    metric_values.insert("gate_blocks".to_string(), session.gate_block_count as f64);
                    metric_values.insert("gate_allows".to_string(), session.gate_allow_count as f64);

                    anomalies.push(Anomaly {
                        id: uuid::Uuid::new_v4().to_string(),
                        anomaly_type: "gate_block_rate".to_string(),
                        severity: if rate > 0.8 { AnomalySeverity::Critical } else { AnomalySeverity::Warning },
                        description: format!("session {session_id} has a {:.0}% quality gate block rate", rate * 100.0),
                        metric_values,
                        context: serde_json::json!({"session_id": session_id}),
                    });
                }
            }
        }

        Ok(anomalies)
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

    #[tokio::test]
    async fn empty_batch_yields_no_anomalies() {
        let (stats, _dir) = stats().await;
        let detector = AnomalyDetector::new(HashMap::new());
        let summary = BatchSummary::default();
        assert!(detector.check(&summary, &stats).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_with_mostly_blocks_trips_governance_threshold() {
        let (stats, _dir) = stats().await;
        let events = vec![
            AuditEvent::new("review.completed", serde_json::json!({"verdict": "blocked"}), "hook", Some("sess-1".into())),
            AuditEvent::new("review.completed", serde_json::json!({"verdict": "blocked"}), "hook", Some("sess-1".into())),
            AuditEvent::new("review.completed", serde_json::json!({"verdict": "blocked"}), "hook", Some("sess-1".into())),
            AuditEvent::new("review.completed", serde_json::json!({"verdict": "approved"}), "hook", Some("sess-1".into())),
        ];
        let summary = stats.ingest_events(&events).await.unwrap();

        let detector = AnomalyDetector::new(HashMap::new());
        let anomalies = detector.check(&summary, &stats).await.unwrap();
        assert!(anomalies.iter().any(|a| a.anomaly_type == "governance_block_rate"));
    }

    #[tokio::test]
    async fn mostly_skipped_batch_trips_skip_rate() {
        let (stats, _dir) = stats().await;
        let events = vec![
            AuditEvent::new("context.skipped", serde_json::json!({}), "hook", None),
            AuditEvent::new("context.skipped", serde_json::json!({}), "hook", None),
            AuditEvent::new("task.created", serde_json::json!({}), "hook", None),
        ];
        let summary = stats.ingest_events(&events).await.unwrap();

        let detector = AnomalyDetector::new(HashMap::new());
        let anomalies = detector.check(&summary, &stats).await.unwrap();
        assert!(anomalies.iter().any(|a| a.anomaly_type == "high_skip_rate"));
    }
}
