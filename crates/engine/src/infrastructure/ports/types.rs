//! Data carried across the effect sink boundary.

use std::fmt;

use openpf2_domain::{CharacterId, EffectId, GameplayTag, TagContainer, WeightGroup};
use uuid::Uuid;

use crate::entities::AttributeModifier;

/// A concrete, ready-to-apply instance of an effect definition.
#[derive(Debug, Clone)]
pub struct EffectSpec {
    /// Definition this spec was made from.
    pub effect_id: EffectId,
    pub name: String,
    /// Character whose coordinator applied the effect.
    pub source: CharacterId,
    pub level: u8,
    pub weight_group: WeightGroup,
    /// Tags describing the effect itself; always includes the weight-group tag.
    pub asset_tags: TagContainer,
    /// Tags the target owns while the effect is active.
    pub granted_tags: TagContainer,
    pub modifiers: Vec<AttributeModifier>,
}

/// Selects active effects for removal.
///
/// Every set field must match; an empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectQuery {
    pub source: Option<CharacterId>,
    pub asset_tag: Option<GameplayTag>,
}

impl EffectQuery {
    pub fn from_source(source: CharacterId) -> Self {
        Self {
            source: Some(source),
            asset_tag: None,
        }
    }

    pub fn with_asset_tag(mut self, tag: GameplayTag) -> Self {
        self.asset_tag = Some(tag);
        self
    }

    pub fn matches(&self, source: CharacterId, asset_tags: &TagContainer) -> bool {
        self.source.map_or(true, |wanted| wanted == source)
            && self
                .asset_tag
                .as_ref()
                .map_or(true, |tag| asset_tags.has_tag(tag.as_str()))
    }
}

/// Identifies one applied effect inside a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(Uuid);

impl EffectHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openpf2_domain::StandardWeightGroup;

    #[test]
    fn test_query_matches_source_and_tag() {
        let owner = CharacterId::new();
        let stranger = CharacterId::new();
        let group = StandardWeightGroup::AbilityBoosts.weight_group();
        let tags: TagContainer = [group.tag()].into_iter().collect();

        let by_source = EffectQuery::from_source(owner);
        assert!(by_source.matches(owner, &tags));
        assert!(!by_source.matches(stranger, &tags));

        let by_group = EffectQuery::from_source(owner).with_asset_tag(group.tag());
        assert!(by_group.matches(owner, &tags));
        assert!(!by_group.matches(owner, &TagContainer::new()));

        assert!(EffectQuery::default().matches(stranger, &TagContainer::new()));
    }
}
