use serde::{Deserialize, Serialize};

/// Closed set of entity kinds. Vision entities must be `VisionStandard`;
/// architecture entities must be one of `ArchitecturalStandard`, `Pattern`,
/// `Component`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Component,
    VisionStandard,
    ArchitecturalStandard,
    Pattern,
    Problem,
    SolutionPattern,
    GovernanceDecision,
}

/// Protection level attached to a KG entity via its `protection_tier:` observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionTier {
    Vision,
    Architecture,
    Quality,
}

impl ProtectionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionTier::Vision => "vision",
            ProtectionTier::Architecture => "architecture",
            ProtectionTier::Quality => "quality",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "vision" => Some(ProtectionTier::Vision),
            "architecture" => Some(ProtectionTier::Architecture),
            "quality" => Some(ProtectionTier::Quality),
            _ => None,
        }
    }
}

/// Who is performing a mutation. Humans bypass tier protection entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Human,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            observations: Vec::new(),
        }
    }

    pub fn with_observations(mut self, observations: Vec<String>) -> Self {
        self.observations = observations;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    #[serde(rename = "relationType")]
    pub relation_type: String,
}

/// The on-disk JSONL record shape: one of these per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KgRecord {
    Entity {
        name: String,
        #[serde(rename = "entityType")]
        entity_type: EntityType,
        observations: Vec<String>,
    },
    Relation {
        from: String,
        to: String,
        #[serde(rename = "relationType")]
        relation_type: String,
    },
}

impl From<&Entity> for KgRecord {
    fn from(e: &Entity) -> Self {
        KgRecord::Entity {
            name: e.name.clone(),
            entity_type: e.entity_type,
            observations: e.observations.clone(),
        }
    }
}

impl From<&Relation> for KgRecord {
    fn from(r: &Relation) -> Self {
        KgRecord::Relation {
            from: r.from.clone(),
            to: r.to.clone(),
            relation_type: r.relation_type.clone(),
        }
    }
}
