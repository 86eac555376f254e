//! Intent-aware formatting of architecture entities for review prompts.
//!
//! Entities carrying the structured metadata prefixes (`intent:`,
//! `outcome_metric:`, `vision_alignment:`) render their intent, metrics, and
//! alignments explicitly; legacy entities with none of that metadata fall
//! back to a bullet of their first few raw observations.

use warden_kg::metadata;
use warden_kg::Entity;

pub fn format_architecture_intent_aware(architecture: &[Entity]) -> String {
    if architecture.is_empty() {
        return "(no architecture entities found in KG)".to_string();
    }
    architecture
        .iter()
        .map(format_one)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_one(entity: &Entity) -> String {
    let completeness = metadata::metadata_completeness(&entity.observations);
    if completeness == metadata::Completeness::None {
        let obs = entity
            .observations
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        return format!("- **{}** ({:?}): {}", entity.name, entity.entity_type, obs);
    }

    let intent = metadata::parse_intent(&entity.observations).unwrap_or_else(|| "(none)".to_string());
    let metrics = metadata::parse_outcome_metrics(&entity.observations);
    let alignments = metadata::parse_vision_alignments(&entity.observations);

    let metrics_text = if metrics.is_empty() {
        "(none)".to_string()
    } else {
        metrics
            .iter()
            .map(|m| format!("{} ({}, baseline: {})", m.name, m.criteria, m.baseline))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let alignments_text = if alignments.is_empty() {
        "(none)".to_string()
    } else {
        alignments
            .iter()
            .map(|a| format!("{} — {}", a.entity, a.explanation))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "- **{}** ({:?})\n    - intent: {intent}\n    - metrics: {metrics_text}\n    - vision alignment: {alignments_text}\n    - completeness: {}",
        entity.name,
        entity.entity_type,
        completeness.as_str(),
    )
}
