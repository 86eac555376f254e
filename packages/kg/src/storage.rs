//! Append-only JSONL persistence with periodic compaction.
//!
//! Append on every successful primitive; compact (full rewrite) after every
//! `compact_threshold` writes or when a mutating operation changes an existing
//! entity. Compaction snapshots the in-memory maps to a sibling temp file,
//! then renames it into place.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::KgError;
use crate::models::{Entity, KgRecord, Relation};

pub struct JsonlStorage {
    path: PathBuf,
}

impl JsonlStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all entities and relations from disk. Corrupt lines are skipped
    /// silently. A missing file loads as empty.
    pub fn load(&self) -> Result<(HashMap<String, Entity>, Vec<Relation>), KgError> {
        let mut entities = HashMap::new();
        let mut relations = Vec::new();

        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((entities, relations)),
            Err(e) => return Err(e.into()),
        };

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => continue,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: KgRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(_) => continue,
            };
            match record {
                KgRecord::Entity {
                    name,
                    entity_type,
                    observations,
                } => {
                    entities.insert(
                        name.clone(),
                        Entity {
                            name,
                            entity_type,
                            observations,
                        },
                    );
                }
                KgRecord::Relation {
                    from,
                    to,
                    relation_type,
                } => {
                    relations.push(Relation {
                        from,
                        to,
                        relation_type,
                    });
                }
            }
        }

        Ok((entities, relations))
    }

    pub fn append_entity(&self, entity: &Entity) -> Result<(), KgError> {
        self.append_record(&KgRecord::from(entity))
    }

    pub fn append_relation(&self, relation: &Relation) -> Result<(), KgError> {
        self.append_record(&KgRecord::from(relation))
    }

    fn append_record(&self, record: &KgRecord) -> Result<(), KgError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Rewrite the file from an in-memory snapshot: entities in insertion
    /// order, then relations. Written to a sibling temp file then renamed.
    pub fn compact(&self, entities: &[&Entity], relations: &[&Relation]) -> Result<(), KgError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_sibling(&self.path);
        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            for e in entities {
                let line = serde_json::to_string(&KgRecord::from(*e))?;
                writeln!(tmp, "{line}")?;
            }
            for r in relations {
                let line = serde_json::to_string(&KgRecord::from(*r))?;
                writeln!(tmp, "{line}")?;
            }
            tmp.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = tmp
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "kg".to_string());
    tmp.set_file_name(format!("{file_name}.tmp"));
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    #[test]
    fn append_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonlStorage::new(dir.path().join("kg.jsonl"));

        let e = Entity::new("svc", EntityType::Component).with_observations(vec!["note".into()]);
        storage.append_entity(&e).unwrap();

        let r = Relation {
            from: "svc".into(),
            to: "db".into(),
            relation_type: "depends_on".into(),
        };
        storage.append_relation(&r).unwrap();

        let (entities, relations) = storage.load().unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(relations.len(), 1);
        assert_eq!(entities["svc"].observations, vec!["note".to_string()]);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kg.jsonl");
        std::fs::write(&path, "not json\n\n{\"type\":\"entity\",\"name\":\"x\",\"entityType\":\"component\",\"observations\":[]}\n").unwrap();
        let storage = JsonlStorage::new(path);
        let (entities, _) = storage.load().unwrap();
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn compact_then_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonlStorage::new(dir.path().join("kg.jsonl"));
        let e1 = Entity::new("a", EntityType::Component);
        let e2 = Entity::new("b", EntityType::Component);
        storage.compact(&[&e1, &e2], &[]).unwrap();
        let (entities, relations) = storage.load().unwrap();
        assert_eq!(entities.len(), 2);
        assert!(relations.is_empty());
    }
}
