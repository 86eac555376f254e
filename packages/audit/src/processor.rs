//! Checkpointed batch processor: the single consumer of `events.jsonl`.
//! Grounded line-for-line in `_audit-process.py`'s `main()`.

use std::path::{Path, PathBuf};

use fs4::tokio::AsyncFileExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::anomaly::AnomalyDetector;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::models::{AuditEvent, Checkpoint};
use crate::recommendations::RecommendationManager;
use crate::stats::StatsAccumulator;

/// Rotate `events.jsonl` once it crosses this size, per `_audit-process.py`'s
/// `MAX_EVENTS_SIZE`.
const MAX_EVENTS_SIZE: u64 = 10 * 1024 * 1024;

/// Prune stats roughly every 100 processing runs.
const PRUNE_EVERY_N_EVENTS: u64 = 100;

const PRUNE_MAX_AGE_DAYS: i64 = 30;

/// Holds the exclusive advisory lock on `.processor-lock` for its lifetime.
/// Dropping it releases the lock, letting the next invocation proceed.
pub struct ProcessorLock {
    _file: File,
}

impl ProcessorLock {
    pub async fn acquire(audit_dir: &Path) -> Result<Self, AuditError> {
        tokio::fs::create_dir_all(audit_dir).await?;
        let path = audit_dir.join(".processor-lock");
        let file = OpenOptions::new().create(true).write(true).open(&path).await?;
        file.try_lock_exclusive().map_err(|_| AuditError::LockHeld)?;
        Ok(Self { _file: file })
    }
}

/// One run of the processor: read new events since the last checkpoint,
/// ingest them into statistics, run anomaly detection, seed recommendations,
/// decide whether to escalate, rotate the log if it has grown too large,
/// and persist the advanced checkpoint. Returns the anomalies that warrant
/// escalation (severity >= warning) so the caller can hand them to the
/// escalation chain.
pub struct ProcessorRun {
    pub summary: crate::models::BatchSummary,
    pub anomalies: Vec<crate::models::Anomaly>,
    pub escalatable: Vec<crate::models::Anomaly>,
}

pub struct Processor {
    events_path: PathBuf,
    checkpoint_path: PathBuf,
    stats: StatsAccumulator,
    recommendations: RecommendationManager,
    detector: AnomalyDetector,
    run_count: u64,
}

impl Processor {
    pub async fn open(audit_dir: &Path, config: &AuditConfig) -> Result<Self, AuditError> {
        let stats = StatsAccumulator::open(audit_dir.join("statistics.db")).await?;
        let recommendations = RecommendationManager::open(audit_dir.join("statistics.db")).await?;
        Ok(Self {
            events_path: audit_dir.join("events.jsonl"),
            checkpoint_path: audit_dir.join(".checkpoint.json"),
            stats,
            recommendations,
            detector: AnomalyDetector::from_config(config),
            run_count: 0,
        })
    }

    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    pub fn recommendations(&self) -> &RecommendationManager {
        &self.recommendations
    }

    async fn load_checkpoint(&self) -> Checkpoint {
        match tokio::fs::read_to_string(&self.checkpoint_path).await {
            Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
            Err(_) => Checkpoint::default(),
        }
    }

    /// Atomic write via sibling temp file + rename, same idiom as the
    /// knowledge-graph store's compaction.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), AuditError> {
        let tmp_path = self.checkpoint_path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(checkpoint)?;
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &self.checkpoint_path).await?;
        Ok(())
    }

    /// Reads events appended since `byte_offset`. If the file has shrunk
    /// below the checkpointed offset (rotation happened underneath us),
    /// resets to the start. Skips any line that fails to parse as JSON.
    async fn read_new_events(&self, byte_offset: u64) -> Result<(Vec<AuditEvent>, u64), AuditError> {
        let Ok(mut file) = File::open(&self.events_path).await else {
            return Ok((Vec::new(), byte_offset));
        };
        let file_len = file.metadata().await?.len();

        let start = if byte_offset > file_len { 0 } else { byte_offset };
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = String::new();
        file.read_to_string(&mut buf).await?;

        let mut events = Vec::new();
        for line in buf.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(error = %e, "skipping corrupt audit event line"),
            }
        }

        Ok((events, file_len))
    }

    /// Compresses `events.jsonl` to a timestamped `.jsonl.gz` sibling and
    /// truncates the original, if it has crossed `MAX_EVENTS_SIZE`.
    async fn rotate_events_if_needed(&self) -> Result<(), AuditError> {
        let Ok(metadata) = tokio::fs::metadata(&self.events_path).await else {
            return Ok(());
        };
        if metadata.len() < MAX_EVENTS_SIZE {
            return Ok(());
        }

        let events_path = self.events_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            use flate2::write::GzEncoder;
            use flate2::Compression;

            let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string();
            let archive_path = events_path.with_extension(format!("{timestamp}.jsonl.gz"));

            let input = std::fs::File::open(&events_path)?;
            let mut reader = std::io::BufReader::new(input);
            let output = std::fs::File::create(&archive_path)?;
            let mut encoder = GzEncoder::new(output, Compression::default());
            std::io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?;

            std::fs::OpenOptions::new().write(true).truncate(true).open(&events_path)?;
            Ok(())
        })
        .await
        .map_err(|e| AuditError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    /// Runs one processing pass. Acquires the processor lock for the
    /// duration of the call; returns `AuditError::LockHeld` if another
    /// processor instance already holds it.
    pub async fn run(&mut self, audit_dir: &Path) -> Result<ProcessorRun, AuditError> {
        let _lock = ProcessorLock::acquire(audit_dir).await?;

        let checkpoint = self.load_checkpoint().await;
        let (events, new_offset) = self.read_new_events(checkpoint.byte_offset).await?;

        if events.is_empty() {
            return Ok(ProcessorRun { summary: crate::models::BatchSummary::default(), anomalies: Vec::new(), escalatable: Vec::new() });
        }

        let summary = self.stats.ingest_events(&events).await?;
        self.stats.update_metric_window_with_samples("events_per_hour", summary.total as f64, 1).await?;

        let anomalies = self.detector.check(&summary, &self.stats).await?;
        let mut escalatable = Vec::new();
        for anomaly in &anomalies {
            self.stats.record_anomaly(anomaly).await?;
            self.recommendations.create_from_anomaly(&anomaly.anomaly_type, &anomaly.description).await?;
            if anomaly.severity.is_escalatable() {
                escalatable.push(anomaly.clone());
            }
        }

        let last_ts = events.last().map(|e| e.ts).unwrap_or(checkpoint.last_processed_ts);
        let new_event_count = checkpoint.event_count + events.len() as u64;

        self.run_count += 1;
        if new_event_count % PRUNE_EVERY_N_EVENTS < events.len() as u64 {
            let deleted = self.stats.prune_old_data(PRUNE_MAX_AGE_DAYS).await?;
            tracing::info!(deleted, "pruned stale audit statistics");
        }

        self.rotate_events_if_needed().await?;

        let offset_after_rotation = if tokio::fs::metadata(&self.events_path).await.map(|m| m.len()).unwrap_or(0) < new_offset {
            0
        } else {
            new_offset
        };

        self.save_checkpoint(&Checkpoint { byte_offset: offset_after_rotation, event_count: new_event_count, last_processed_ts: last_ts })
            .await?;

        Ok(ProcessorRun { summary, anomalies, escalatable })
    }
}

/// Writes the anomalies a processing run flagged for escalation to
/// `.pending-anomalies.json`, for the escalation chain to pick up.
/// Grounded in `_audit-process.py`'s `_spawn_escalation`.
pub async fn write_pending_anomalies(audit_dir: &Path, anomalies: &[crate::models::Anomaly]) -> Result<(), AuditError> {
    let path = audit_dir.join(".pending-anomalies.json");
    let body = serde_json::to_string_pretty(anomalies)?;
    tokio::fs::write(&path, body).await?;
    Ok(())
}

/// Reads and then removes `.pending-anomalies.json`. Grounded in
/// `_audit-escalate.py`'s `_load_anomalies` + unconditional `_cleanup`.
pub async fn take_pending_anomalies(audit_dir: &Path) -> Result<Vec<crate::models::Anomaly>, AuditError> {
    let path = audit_dir.join(".pending-anomalies.json");
    let result = match tokio::fs::read_to_string(&path).await {
        Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    let _ = tokio::fs::remove_file(&path).await;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEvent;

    async fn write_events(dir: &Path, events: &[AuditEvent]) {
        let mut body = String::new();
        for e in events {
            body.push_str(&serde_json::to_string(e).unwrap());
            body.push('\n');
        }
        tokio::fs::write(dir.join("events.jsonl"), body).await.unwrap();
    }

    #[tokio::test]
    async fn run_ingests_new_events_and_advances_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![
            AuditEvent::new("task.created", serde_json::json!({}), "hook", Some("s1".into())),
            AuditEvent::new("review.completed", serde_json::json!({"verdict": "approved"}), "hook", Some("s1".into())),
        ];
        write_events(dir.path(), &events).await;

        let config = AuditConfig::default();
        let mut processor = Processor::open(dir.path(), &config).await.unwrap();
        let run = processor.run(dir.path()).await.unwrap();
        assert_eq!(run.summary.total, 2);

        let checkpoint_body = tokio::fs::read_to_string(dir.path().join(".checkpoint.json")).await.unwrap();
        let checkpoint: Checkpoint = serde_json::from_str(&checkpoint_body).unwrap();
        assert_eq!(checkpoint.event_count, 2);
    }

    #[tokio::test]
    async fn second_run_with_no_new_events_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![AuditEvent::new("task.created", serde_json::json!({}), "hook", None)];
        write_events(dir.path(), &events).await;

        let config = AuditConfig::default();
        let mut processor = Processor::open(dir.path(), &config).await.unwrap();
        processor.run(dir.path()).await.unwrap();
        let second = processor.run(dir.path()).await.unwrap();
        assert_eq!(second.summary.total, 0);
    }

    #[tokio::test]
    async fn pending_anomalies_round_trip_and_clean_up() {
        let dir = tempfile::tempdir().unwrap();
        let anomalies = vec![crate::models::Anomaly {
            id: "a1".into(),
            anomaly_type: "high_skip_rate".into(),
            severity: crate::models::AnomalySeverity::Warning,
            description: "d".into(),
            metric_values: Default::default(),
            context: serde_json::Value::Null,
        }];
        write_pending_anomalies(dir.path(), &anomalies).await.unwrap();
        let loaded = take_pending_anomalies(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!dir.path().join(".pending-anomalies.json").exists());
    }
}
