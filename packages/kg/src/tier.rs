//! Tier-protection algorithm: who may mutate which entities.

use crate::models::{CallerRole, Entity, ProtectionTier};

const TIER_PREFIX: &str = "protection_tier: ";

/// An entity's tier is the value of the first `protection_tier: ` observation
/// in insertion order. Later observations with the same prefix are ignored.
/// An entity with no parseable tier observation is untiered (quality-equivalent).
pub fn get_entity_tier(entity: &Entity) -> Option<ProtectionTier> {
    for obs in &entity.observations {
        if let Some(value) = obs.strip_prefix(TIER_PREFIX) {
            return ProtectionTier::parse(value);
        }
    }
    None
}

/// Result of a tier check: either the mutation is allowed, or it is denied
/// with a human-readable reason naming the blocking tier.
pub enum TierDecision {
    Allowed,
    Denied { reason: String },
}

/// Write permission: human bypasses all tiers; quality is always agent-writable;
/// architecture requires `change_approved`; vision is never agent-writable;
/// untiered entities are treated as quality.
pub fn check_write(
    entity: &Entity,
    caller_role: CallerRole,
    change_approved: bool,
) -> TierDecision {
    if caller_role == CallerRole::Human {
        return TierDecision::Allowed;
    }

    match get_entity_tier(entity) {
        None | Some(ProtectionTier::Quality) => TierDecision::Allowed,
        Some(ProtectionTier::Architecture) => {
            if change_approved {
                TierDecision::Allowed
            } else {
                TierDecision::Denied {
                    reason: format!(
                        "Architecture-tier entity '{}' requires change_approved=true for agent writes",
                        entity.name
                    ),
                }
            }
        }
        Some(ProtectionTier::Vision) => TierDecision::Denied {
            reason: format!(
                "Vision-tier entity '{}' is human-owned and cannot be modified by an agent",
                entity.name
            ),
        },
    }
}

/// Delete permission: human may delete anything; agents may only delete
/// quality-tier (or untiered) entities.
pub fn check_delete(entity: &Entity, caller_role: CallerRole) -> TierDecision {
    if caller_role == CallerRole::Human {
        return TierDecision::Allowed;
    }

    match get_entity_tier(entity) {
        None | Some(ProtectionTier::Quality) => TierDecision::Allowed,
        Some(tier) => TierDecision::Denied {
            reason: format!(
                "{}-tier entity '{}' cannot be deleted by an agent",
                tier.as_str(),
                entity.name
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    fn tiered(tier: &str) -> Entity {
        Entity::new("e1", EntityType::Pattern)
            .with_observations(vec![format!("protection_tier: {tier}"), "note".into()])
    }

    #[test]
    fn untiered_defaults_to_quality() {
        let e = Entity::new("e1", EntityType::Pattern);
        assert!(get_entity_tier(&e).is_none());
        assert!(matches!(
            check_write(&e, CallerRole::Agent, false),
            TierDecision::Allowed
        ));
    }

    #[test]
    fn vision_blocks_agent() {
        let e = tiered("vision");
        assert!(matches!(
            check_write(&e, CallerRole::Agent, false),
            TierDecision::Denied { .. }
        ));
    }

    #[test]
    fn architecture_requires_approval() {
        let e = tiered("architecture");
        assert!(matches!(
            check_write(&e, CallerRole::Agent, false),
            TierDecision::Denied { .. }
        ));
        assert!(matches!(
            check_write(&e, CallerRole::Agent, true),
            TierDecision::Allowed
        ));
    }

    #[test]
    fn human_bypasses_everything() {
        let e = tiered("vision");
        assert!(matches!(
            check_write(&e, CallerRole::Human, false),
            TierDecision::Allowed
        ));
        assert!(matches!(
            check_delete(&e, CallerRole::Human),
            TierDecision::Allowed
        ));
    }

    #[test]
    fn first_tier_observation_wins() {
        let mut e = tiered("quality");
        e.observations.insert(0, "protection_tier: vision".into());
        assert_eq!(get_entity_tier(&e), Some(ProtectionTier::Vision));
    }

    #[test]
    fn unparseable_first_tier_observation_is_untiered() {
        let e = Entity::new("e1", EntityType::Pattern).with_observations(vec![
            "protection_tier: typo".into(),
            "protection_tier: vision".into(),
        ]);
        assert_eq!(get_entity_tier(&e), None);
        assert!(matches!(
            check_write(&e, CallerRole::Agent, false),
            TierDecision::Allowed
        ));
    }

    #[test]
    fn agent_cannot_delete_architecture() {
        let e = tiered("architecture");
        assert!(matches!(
            check_delete(&e, CallerRole::Agent),
            TierDecision::Denied { .. }
        ));
    }
}
