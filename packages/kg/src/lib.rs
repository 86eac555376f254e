//! Tier-protected knowledge graph store.
//!
//! Entities and relations live in memory, backed by an append-only JSONL log
//! with periodic compaction. See [`tier`] for the write/delete permission
//! algorithm and [`metadata`] for the structured-observation sub-language.

pub mod error;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod storage;
pub mod tier;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

pub use error::KgError;
pub use models::{CallerRole, Entity, EntityType, ProtectionTier, Relation};

use storage::JsonlStorage;

/// Number of successful primitive writes before an unconditional compaction sweep.
const DEFAULT_COMPACT_THRESHOLD: usize = 1000;

/// The knowledge graph store: in-memory entity/relation maps backed by a
/// JSONL append log, with tier-based write/delete protection.
pub struct KgStore {
    entities: Arc<RwLock<HashMap<String, Entity>>>,
    relations: Arc<RwLock<Vec<Relation>>>,
    storage: JsonlStorage,
    writes_since_compact: AtomicUsize,
    compact_threshold: usize,
}

impl KgStore {
    /// Open (or create) a store backed by the JSONL file at `path`, loading
    /// any existing entities and relations into memory.
    pub async fn open(path: impl Into<std::path::PathBuf>) -> Result<Self, KgError> {
        let storage = JsonlStorage::new(path);
        let (entities, relations) = storage.load()?;
        tracing::debug!(
            entity_count = entities.len(),
            relation_count = relations.len(),
            "knowledge graph loaded"
        );
        Ok(Self {
            entities: Arc::new(RwLock::new(entities)),
            relations: Arc::new(RwLock::new(relations)),
            storage,
            writes_since_compact: AtomicUsize::new(0),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        })
    }

    pub fn with_compact_threshold(mut self, threshold: usize) -> Self {
        self.compact_threshold = threshold;
        self
    }

    /// Create new entities. Entities that already exist (by name) are
    /// overwritten. Returns the number created.
    pub async fn create_entities(&self, entities: Vec<Entity>) -> Result<usize, KgError> {
        let mut guard = self.entities.write().await;
        for entity in &entities {
            self.storage.append_entity(entity)?;
            guard.insert(entity.name.clone(), entity.clone());
        }
        drop(guard);
        self.note_writes(entities.len()).await?;
        Ok(entities.len())
    }

    /// Create new relations (dangling endpoints are permitted). Returns the
    /// number created.
    pub async fn create_relations(&self, relations: Vec<Relation>) -> Result<usize, KgError> {
        let mut guard = self.relations.write().await;
        for relation in &relations {
            self.storage.append_relation(relation)?;
            guard.push(relation.clone());
        }
        drop(guard);
        self.note_writes(relations.len()).await?;
        Ok(relations.len())
    }

    /// Append `observations` to an existing entity, subject to tier
    /// protection. Triggers a full compaction on success (an existing entity
    /// changed shape).
    pub async fn add_observations(
        &self,
        name: &str,
        observations: Vec<String>,
        caller_role: CallerRole,
        change_approved: bool,
    ) -> Result<usize, KgError> {
        let mut guard = self.entities.write().await;
        let entity = guard
            .get_mut(name)
            .ok_or_else(|| KgError::NotFound(name.to_string()))?;

        match tier::check_write(entity, caller_role, change_approved) {
            tier::TierDecision::Allowed => {}
            tier::TierDecision::Denied { reason } => {
                return Err(KgError::TierDenied {
                    tier: tier::get_entity_tier(entity)
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_else(|| "quality".to_string()),
                    requirement: reason,
                });
            }
        }

        let added = observations.len();
        entity.observations.extend(observations);
        let entities_snapshot: Vec<Entity> = guard.values().cloned().collect();
        let relations_snapshot = self.relations.read().await.clone();
        drop(guard);
        self.compact(&entities_snapshot, &relations_snapshot)?;
        Ok(added)
    }

    /// Remove any observation in `observations` that matches exactly,
    /// subject to tier protection. Triggers a full compaction on success.
    pub async fn delete_observations(
        &self,
        name: &str,
        observations: &[String],
        caller_role: CallerRole,
        change_approved: bool,
    ) -> Result<usize, KgError> {
        let mut guard = self.entities.write().await;
        let entity = guard
            .get_mut(name)
            .ok_or_else(|| KgError::NotFound(name.to_string()))?;

        match tier::check_write(entity, caller_role, change_approved) {
            tier::TierDecision::Allowed => {}
            tier::TierDecision::Denied { reason } => {
                return Err(KgError::TierDenied {
                    tier: tier::get_entity_tier(entity)
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_else(|| "quality".to_string()),
                    requirement: reason,
                });
            }
        }

        let before = entity.observations.len();
        entity.observations.retain(|o| !observations.contains(o));
        let removed = before - entity.observations.len();

        let entities_snapshot: Vec<Entity> = guard.values().cloned().collect();
        let relations_snapshot = self.relations.read().await.clone();
        drop(guard);
        self.compact(&entities_snapshot, &relations_snapshot)?;
        Ok(removed)
    }

    /// Delete an entity entirely, subject to tier protection. Also drops any
    /// relations that reference it. Triggers a full compaction.
    pub async fn delete_entity(&self, name: &str, caller_role: CallerRole) -> Result<usize, KgError> {
        let mut guard = self.entities.write().await;
        let entity = guard
            .get(name)
            .ok_or_else(|| KgError::NotFound(name.to_string()))?;

        match tier::check_delete(entity, caller_role) {
            tier::TierDecision::Allowed => {}
            tier::TierDecision::Denied { reason } => {
                return Err(KgError::TierDenied {
                    tier: tier::get_entity_tier(entity)
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_else(|| "quality".to_string()),
                    requirement: reason,
                });
            }
        }

        guard.remove(name);
        let entities_snapshot: Vec<Entity> = guard.values().cloned().collect();
        drop(guard);

        let mut relations_guard = self.relations.write().await;
        relations_guard.retain(|r| r.from != name && r.to != name);
        let relations_snapshot = relations_guard.clone();
        drop(relations_guard);

        self.compact(&entities_snapshot, &relations_snapshot)?;
        Ok(1)
    }

    /// Delete relations matching `(from, to, relation_type)` exactly.
    /// Returns the number removed.
    pub async fn delete_relations(&self, relations: &[Relation]) -> Result<usize, KgError> {
        let mut guard = self.relations.write().await;
        let before = guard.len();
        guard.retain(|r| !relations.iter().any(|target| target == r));
        let removed = before - guard.len();

        if removed > 0 {
            let relations_snapshot = guard.clone();
            drop(guard);
            let entities_snapshot: Vec<Entity> = self.entities.read().await.values().cloned().collect();
            self.compact(&entities_snapshot, &relations_snapshot)?;
        }
        Ok(removed)
    }

    pub async fn get_entity(&self, name: &str) -> Option<Entity> {
        self.entities.read().await.get(name).cloned()
    }

    /// Case-insensitive substring search over entity name and observations.
    pub async fn search_nodes(&self, query: &str) -> Vec<Entity> {
        let needle = query.to_lowercase();
        self.entities
            .read()
            .await
            .values()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.observations
                        .iter()
                        .any(|o| o.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    pub async fn get_entities_by_tier(&self, wanted: ProtectionTier) -> Vec<Entity> {
        self.entities
            .read()
            .await
            .values()
            .filter(|e| tier::get_entity_tier(e).unwrap_or(ProtectionTier::Quality) == wanted)
            .cloned()
            .collect()
    }

    /// Ingest every `*.md` file in `folder` (excluding README.md) as entities,
    /// deleting any prior entity of the same name first. Returns the list of
    /// created entity names and a per-file error list.
    pub async fn ingest_folder(
        &self,
        folder: impl AsRef<std::path::Path>,
    ) -> Result<ingest::IngestReport, KgError> {
        let parsed = ingest::scan_folder(folder.as_ref());
        let mut created = Vec::new();
        let mut errors = parsed.errors;

        for doc in parsed.documents {
            let name = doc.name.clone();
            if self.entities.read().await.contains_key(&name) {
                // Re-ingestion: human role always clears tier protection.
                if let Err(e) = self.delete_entity(&name, CallerRole::Human).await {
                    errors.push(format!("{name}: failed to replace existing entity: {e}"));
                    continue;
                }
            }
            let entity = doc.into_entity();
            match self.create_entities(vec![entity]).await {
                Ok(_) => created.push(name),
                Err(e) => errors.push(format!("{name}: failed to create entity: {e}")),
            }
        }

        Ok(ingest::IngestReport { created, errors })
    }

    async fn note_writes(&self, count: usize) -> Result<(), KgError> {
        let prior = self.writes_since_compact.fetch_add(count, Ordering::SeqCst);
        if prior + count >= self.compact_threshold {
            self.writes_since_compact.store(0, Ordering::SeqCst);
            let entities_snapshot: Vec<Entity> = self.entities.read().await.values().cloned().collect();
            let relations_snapshot = self.relations.read().await.clone();
            self.compact(&entities_snapshot, &relations_snapshot)?;
        }
        Ok(())
    }

    fn compact(&self, entities: &[Entity], relations: &[Relation]) -> Result<(), KgError> {
        let entity_refs: Vec<&Entity> = entities.iter().collect();
        let relation_refs: Vec<&Relation> = relations.iter().collect();
        match self.storage.compact(&entity_refs, &relation_refs) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "compaction failed; in-memory state remains authoritative");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (KgStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = KgStore::open(dir.path().join("kg.jsonl")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (store, _dir) = store().await;
        let e = Entity::new("svc", EntityType::Component).with_observations(vec!["note".into()]);
        store.create_entities(vec![e]).await.unwrap();
        let got = store.get_entity("svc").await.unwrap();
        assert_eq!(got.observations, vec!["note".to_string()]);
    }

    #[tokio::test]
    async fn missing_entity_on_add_observations_is_not_found() {
        let (store, _dir) = store().await;
        let err = store
            .add_observations("ghost", vec!["x".into()], CallerRole::Agent, false)
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::NotFound(_)));
    }

    #[tokio::test]
    async fn vision_tier_blocks_agent_add_observations() {
        let (store, _dir) = store().await;
        let e = Entity::new("v1", EntityType::VisionStandard)
            .with_observations(vec!["protection_tier: vision".into()]);
        store.create_entities(vec![e]).await.unwrap();

        let err = store
            .add_observations("v1", vec!["x".into()], CallerRole::Agent, false)
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::TierDenied { .. }));
    }

    #[tokio::test]
    async fn architecture_tier_allows_with_change_approved() {
        let (store, _dir) = store().await;
        let e = Entity::new("a1", EntityType::Pattern)
            .with_observations(vec!["protection_tier: architecture".into()]);
        store.create_entities(vec![e]).await.unwrap();

        let added = store
            .add_observations("a1", vec!["extra".into()], CallerRole::Agent, true)
            .await
            .unwrap();
        assert_eq!(added, 1);
        let got = store.get_entity("a1").await.unwrap();
        assert!(got.observations.contains(&"extra".to_string()));
    }

    #[tokio::test]
    async fn quality_tier_entities_are_filterable() {
        let (store, _dir) = store().await;
        let q = Entity::new("q1", EntityType::Pattern)
            .with_observations(vec!["protection_tier: quality".into()]);
        let v = Entity::new("v1", EntityType::VisionStandard)
            .with_observations(vec!["protection_tier: vision".into()]);
        store.create_entities(vec![q, v]).await.unwrap();

        let quality = store.get_entities_by_tier(ProtectionTier::Quality).await;
        assert_eq!(quality.len(), 1);
        assert_eq!(quality[0].name, "q1");
    }

    #[tokio::test]
    async fn search_nodes_matches_name_and_observations() {
        let (store, _dir) = store().await;
        let e = Entity::new("checkout-service", EntityType::Component)
            .with_observations(vec!["handles payment capture".into()]);
        store.create_entities(vec![e]).await.unwrap();

        assert_eq!(store.search_nodes("checkout").await.len(), 1);
        assert_eq!(store.search_nodes("PAYMENT").await.len(), 1);
        assert_eq!(store.search_nodes("nonexistent").await.len(), 0);
    }

    #[tokio::test]
    async fn agent_cannot_delete_architecture_entity() {
        let (store, _dir) = store().await;
        let e = Entity::new("a1", EntityType::Pattern)
            .with_observations(vec!["protection_tier: architecture".into()]);
        store.create_entities(vec![e]).await.unwrap();

        let err = store.delete_entity("a1", CallerRole::Agent).await.unwrap_err();
        assert!(matches!(err, KgError::TierDenied { .. }));
    }

    #[tokio::test]
    async fn deleting_entity_drops_its_relations() {
        let (store, _dir) = store().await;
        let a = Entity::new("a", EntityType::Component);
        let b = Entity::new("b", EntityType::Component);
        store.create_entities(vec![a, b]).await.unwrap();
        store
            .create_relations(vec![Relation {
                from: "a".into(),
                to: "b".into(),
                relation_type: "depends_on".into(),
            }])
            .await
            .unwrap();

        store.delete_entity("a", CallerRole::Human).await.unwrap();
        let remaining = store.relations.read().await.clone();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn reopen_after_close_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kg.jsonl");
        {
            let store = KgStore::open(&path).await.unwrap();
            let e = Entity::new("svc", EntityType::Component);
            store.create_entities(vec![e]).await.unwrap();
        }
        let reopened = KgStore::open(&path).await.unwrap();
        assert!(reopened.get_entity("svc").await.is_some());
    }
}
