//! Weight groups - ordering buckets for passive gameplay effects.
//!
//! Groups are evaluated in lexical order of their names, so base stats
//! (`00_...`) are applied before anything that derives from them (`30_...`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::GameplayTag;

/// A named, lexically ordered bucket of passive effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeightGroup(GameplayTag);

impl WeightGroup {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        // The group name doubles as the tag stamped on every effect in the group.
        GameplayTag::new(name)
            .map(Self)
            .map_err(|e| DomainError::validation(format!("Invalid weight group: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The tag used to find every active effect belonging to this group.
    pub fn tag(&self) -> GameplayTag {
        self.0.clone()
    }

    /// True if this group sorts strictly after `other`.
    pub fn is_after(&self, other: &WeightGroup) -> bool {
        self > other
    }
}

impl fmt::Display for WeightGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WeightGroup {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeightGroup::new(s)
    }
}

impl TryFrom<String> for WeightGroup {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WeightGroup::new(value)
    }
}

impl From<WeightGroup> for String {
    fn from(group: WeightGroup) -> Self {
        group.0.into()
    }
}

/// The weight groups every OpenPF2 character knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StandardWeightGroup {
    /// Effects that initialize base stats.
    InitializeBaseStats,
    /// Designer effects that run right after base stats.
    PostInitializeBaseStats,
    /// Effects generated from other values on the character.
    ManagedEffects,
    /// Default group for designer passive effects; applied before ability boosts.
    PreAbilityBoosts,
    /// Ability boosts selected by the player or a game designer.
    AbilityBoosts,
    /// Designer effects that must run before the final stats pass.
    PreFinalizeStats,
    /// Effects that depend heavily on the results of earlier groups.
    FinalizeStats,
}

impl StandardWeightGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitializeBaseStats => "GameplayEffect.WeightGroup.00_InitializeBaseStats",
            Self::PostInitializeBaseStats => {
                "GameplayEffect.WeightGroup.05_PostInitializeBaseStats"
            }
            Self::ManagedEffects => "GameplayEffect.WeightGroup.10_ManagedEffects",
            Self::PreAbilityBoosts => "GameplayEffect.WeightGroup.15_PreAbilityBoosts",
            Self::AbilityBoosts => "GameplayEffect.WeightGroup.20_AbilityBoosts",
            Self::PreFinalizeStats => "GameplayEffect.WeightGroup.25_PreFinalizeStats",
            Self::FinalizeStats => "GameplayEffect.WeightGroup.30_FinalizeStats",
        }
    }

    pub fn all() -> [StandardWeightGroup; 7] {
        [
            Self::InitializeBaseStats,
            Self::PostInitializeBaseStats,
            Self::ManagedEffects,
            Self::PreAbilityBoosts,
            Self::AbilityBoosts,
            Self::PreFinalizeStats,
            Self::FinalizeStats,
        ]
    }

    pub fn weight_group(&self) -> WeightGroup {
        WeightGroup(GameplayTag::from_static(self.as_str()))
    }
}

impl From<StandardWeightGroup> for WeightGroup {
    fn from(group: StandardWeightGroup) -> Self {
        group.weight_group()
    }
}

impl fmt::Display for StandardWeightGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_group_lexical_order() {
        let base = WeightGroup::new("10_Base").expect("valid group");
        let derived = WeightGroup::new("20_Derived").expect("valid group");
        let equipment = WeightGroup::new("30_Equipment").expect("valid group");

        let mut groups = vec![equipment.clone(), base.clone(), derived.clone()];
        groups.sort();

        assert_eq!(groups, vec![base.clone(), derived.clone(), equipment.clone()]);
        assert!(equipment.is_after(&derived));
        assert!(!base.is_after(&base));
    }

    #[test]
    fn test_standard_groups_sort_in_declaration_order() {
        let as_groups: Vec<WeightGroup> = StandardWeightGroup::all()
            .iter()
            .map(StandardWeightGroup::weight_group)
            .collect();

        let mut sorted = as_groups.clone();
        sorted.sort();

        assert_eq!(as_groups, sorted);
    }

    #[test]
    fn test_weight_group_tag_matches_name() {
        let group: WeightGroup = StandardWeightGroup::AbilityBoosts.into();
        assert_eq!(group.tag().as_str(), group.as_str());
        assert!(group.tag().matches("GameplayEffect.WeightGroup"));
    }

    #[test]
    fn test_weight_group_rejects_invalid_names() {
        assert!(WeightGroup::new("").is_err());
        assert!(WeightGroup::new("10 Base").is_err());
    }
}
