//! Structured accessors over the observation-string metadata prefixes.
//!
//! Observations are free-form strings; these prefixes carry structured intent
//! metadata without promoting them to entity fields (see DESIGN.md §9 on the
//! dynamic-observation-schema choice).

use serde::{Deserialize, Serialize};

const INTENT_PREFIX: &str = "intent:";
const OUTCOME_METRIC_PREFIX: &str = "outcome_metric:";
const VISION_ALIGNMENT_PREFIX: &str = "vision_alignment:";
const COMPLETENESS_PREFIX: &str = "metadata_completeness:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMetric {
    pub name: String,
    pub criteria: String,
    pub baseline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionAlignment {
    pub entity: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Full,
    Partial,
    None,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Full => "full",
            Completeness::Partial => "partial",
            Completeness::None => "none",
        }
    }
}

pub fn parse_intent(observations: &[String]) -> Option<String> {
    observations
        .iter()
        .find_map(|o| o.strip_prefix(INTENT_PREFIX).map(|s| s.trim().to_string()))
}

pub fn parse_outcome_metrics(observations: &[String]) -> Vec<OutcomeMetric> {
    observations
        .iter()
        .filter_map(|o| o.strip_prefix(OUTCOME_METRIC_PREFIX))
        .map(|body| {
            let mut parts = body.splitn(3, '|').map(|s| s.trim().to_string());
            let name = parts.next().unwrap_or_default();
            let criteria = parts.next().unwrap_or_default();
            let baseline = parts.next().filter(|s| !s.is_empty());
            OutcomeMetric {
                name,
                criteria,
                baseline: baseline.unwrap_or_else(|| "not measured".to_string()),
            }
        })
        .collect()
}

pub fn parse_vision_alignments(observations: &[String]) -> Vec<VisionAlignment> {
    observations
        .iter()
        .filter_map(|o| o.strip_prefix(VISION_ALIGNMENT_PREFIX))
        .map(|body| {
            let mut parts = body.splitn(2, '|').map(|s| s.trim().to_string());
            VisionAlignment {
                entity: parts.next().unwrap_or_default(),
                explanation: parts.next().unwrap_or_default(),
            }
        })
        .collect()
}

/// Completeness is derived fresh from intent/alignment presence rather than
/// trusted from a stored `metadata_completeness:` observation, so it cannot
/// drift out of sync after a partial edit.
pub fn metadata_completeness(observations: &[String]) -> Completeness {
    let has_intent = parse_intent(observations).is_some();
    let has_alignment = !parse_vision_alignments(observations).is_empty();
    match (has_intent, has_alignment) {
        (true, true) => Completeness::Full,
        (true, false) | (false, true) => Completeness::Partial,
        (false, false) => Completeness::None,
    }
}

/// Read any stored `metadata_completeness:` observation verbatim (used when
/// re-displaying a previously-persisted value rather than recomputing it).
pub fn read_stored_completeness(observations: &[String]) -> Option<Completeness> {
    observations.iter().find_map(|o| {
        o.strip_prefix(COMPLETENESS_PREFIX).and_then(|v| match v.trim() {
            "full" => Some(Completeness::Full),
            "partial" => Some(Completeness::Partial),
            "none" => Some(Completeness::None),
            _ => None,
        })
    })
}

pub fn build_intent_observations(
    intent: Option<&str>,
    metrics: &[OutcomeMetric],
    alignments: &[VisionAlignment],
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(text) = intent {
        out.push(format!("{INTENT_PREFIX}{text}"));
    }
    for m in metrics {
        out.push(format!(
            "{OUTCOME_METRIC_PREFIX}{}|{}|{}",
            m.name, m.criteria, m.baseline
        ));
    }
    for a in alignments {
        out.push(format!(
            "{VISION_ALIGNMENT_PREFIX}{}|{}",
            a.entity, a.explanation
        ));
    }
    let completeness = {
        let has_intent = intent.is_some();
        let has_alignment = !alignments.is_empty();
        match (has_intent, has_alignment) {
            (true, true) => Completeness::Full,
            (true, false) | (false, true) => Completeness::Partial,
            (false, false) => Completeness::None,
        }
    };
    out.push(format!("{COMPLETENESS_PREFIX}{}", completeness.as_str()));
    out
}

/// Remove all known metadata-prefixed observations, leaving free-text notes
/// untouched. Used before re-writing an entity's metadata observations.
pub fn strip_metadata_observations(observations: &[String]) -> Vec<String> {
    observations
        .iter()
        .filter(|o| {
            !(o.starts_with(INTENT_PREFIX)
                || o.starts_with(OUTCOME_METRIC_PREFIX)
                || o.starts_with(VISION_ALIGNMENT_PREFIX)
                || o.starts_with(COMPLETENESS_PREFIX))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_full_completeness() {
        let metrics = vec![OutcomeMetric {
            name: "latency".into(),
            criteria: "p99 < 200ms".into(),
            baseline: "350ms".into(),
        }];
        let alignments = vec![VisionAlignment {
            entity: "vision:reliability".into(),
            explanation: "reduces tail latency".into(),
        }];
        let obs = build_intent_observations(Some("speed up checkout"), &metrics, &alignments);

        assert_eq!(parse_intent(&obs).as_deref(), Some("speed up checkout"));
        assert_eq!(parse_outcome_metrics(&obs), metrics);
        assert_eq!(parse_vision_alignments(&obs), alignments);
        assert_eq!(metadata_completeness(&obs), Completeness::Full);
    }

    #[test]
    fn outcome_metric_defaults_baseline() {
        let obs = vec!["outcome_metric:throughput|req/s > 100".to_string()];
        let metrics = parse_outcome_metrics(&obs);
        assert_eq!(metrics[0].baseline, "not measured");
    }

    #[test]
    fn completeness_partial_when_only_intent() {
        let obs = vec!["intent:do the thing".to_string()];
        assert_eq!(metadata_completeness(&obs), Completeness::Partial);
    }

    #[test]
    fn completeness_none_when_neither() {
        let obs = vec!["just a note".to_string()];
        assert_eq!(metadata_completeness(&obs), Completeness::None);
    }

    #[test]
    fn strip_removes_only_metadata_prefixes() {
        let obs = vec![
            "intent:x".to_string(),
            "free text note".to_string(),
            "metadata_completeness:partial".to_string(),
        ];
        let stripped = strip_metadata_observations(&obs);
        assert_eq!(stripped, vec!["free text note".to_string()]);
    }
}
