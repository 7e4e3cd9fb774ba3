//! Character attributes that passive effects modify.

use std::fmt;

use openpf2_domain::{AbilityScoreType, Pf2eSavingThrow, Pf2eSkill};
use serde::{Deserialize, Serialize};

/// A numeric stat tracked for every character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    AbilityScore(AbilityScoreType),
    AbilityModifier(AbilityScoreType),
    HitPoints,
    MaxHitPoints,
    ArmorClass,
    ClassDc,
    Perception,
    SavingThrow(Pf2eSavingThrow),
    Skill(Pf2eSkill),
}

impl Attribute {
    /// Attributes whose current value is clamped to `[0, max]` by the store.
    pub fn clamp_ceiling(&self) -> Option<Attribute> {
        match self {
            Attribute::HitPoints => Some(Attribute::MaxHitPoints),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::AbilityScore(ability) => write!(f, "Ab{}", ability),
            Attribute::AbilityModifier(ability) => write!(f, "Ab{}Modifier", ability),
            Attribute::HitPoints => write!(f, "HitPoints"),
            Attribute::MaxHitPoints => write!(f, "MaxHitPoints"),
            Attribute::ArmorClass => write!(f, "ArmorClass"),
            Attribute::ClassDc => write!(f, "ClassDifficultyClass"),
            Attribute::Perception => write!(f, "PerceptionModifier"),
            Attribute::SavingThrow(save) => write!(f, "St{}Modifier", save.as_str()),
            Attribute::Skill(skill) => write!(f, "Sk{}Modifier", skill.as_str()),
        }
    }
}
