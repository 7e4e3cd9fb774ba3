//! Pathfinder 2nd Edition rules used by passive stat effects.
//!
//! PF2e proficiency is level-dependent: an untrained character adds nothing, while
//! every trained rank adds the character's level plus a rank bonus. A character's
//! rank in a stat is carried as gameplay tags (`Skill.Stealth`, `Skill.Stealth.Expert`),
//! so every calculation here reads ranks from a [`TagContainer`].
//!
//! Source: Pathfinder 2E Core Rulebook, page 444, "Step 1: Roll D20 and Identify The
//! Modifiers, Bonuses, and Penalties That Apply".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::TagContainer;

/// The six PF2e ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityScoreType {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl AbilityScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strength => "Strength",
            Self::Dexterity => "Dexterity",
            Self::Constitution => "Constitution",
            Self::Intelligence => "Intelligence",
            Self::Wisdom => "Wisdom",
            Self::Charisma => "Charisma",
        }
    }

    pub fn all() -> [AbilityScoreType; 6] {
        [
            Self::Strength,
            Self::Dexterity,
            Self::Constitution,
            Self::Intelligence,
            Self::Wisdom,
            Self::Charisma,
        ]
    }

    /// Tag marking this ability as a character's key ability (e.g. `KeyAbility.Intelligence`).
    pub fn key_ability_tag(&self) -> String {
        format!("KeyAbility.{}", self.as_str())
    }
}

impl fmt::Display for AbilityScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AbilityScoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strength" | "str" => Ok(Self::Strength),
            "dexterity" | "dex" => Ok(Self::Dexterity),
            "constitution" | "con" => Ok(Self::Constitution),
            "intelligence" | "int" => Ok(Self::Intelligence),
            "wisdom" | "wis" => Ok(Self::Wisdom),
            "charisma" | "cha" => Ok(Self::Charisma),
            _ => Err(DomainError::parse(format!("Unknown ability score: {}", s))),
        }
    }
}

/// Ability modifier for a score.
///
/// Source: Pathfinder 2E Core Rulebook, page 20, Table 1-1: Ability Modifiers.
pub fn ability_modifier(score: i32) -> i32 {
    score.div_euclid(2) - 5
}

/// How much a single ability boost raises a score.
///
/// "Boosting an ability score increases it by 1 if it's already 18 or above, or by 2 if
/// it starts out below 18." (Core Rulebook, page 68, "Ability Boosts")
pub fn ability_boost_amount(score: i32) -> i32 {
    if score < 18 {
        2
    } else {
        1
    }
}

/// Pathfinder 2e proficiency ranks (TEML).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pf2eProficiencyRank {
    /// Not trained in the stat
    Untrained,
    /// Basic training (+2 + level)
    Trained,
    /// Advanced training (+4 + level)
    Expert,
    /// Mastery (+6 + level)
    Master,
    /// Ultimate mastery (+8 + level)
    Legendary,
}

impl Pf2eProficiencyRank {
    /// Ranks that carry a tag suffix, most specific first. Lookup order matters: a
    /// character tagged both `.Expert` and `.Trained` is an expert.
    pub const BY_SPECIFICITY: [Pf2eProficiencyRank; 4] = [
        Pf2eProficiencyRank::Legendary,
        Pf2eProficiencyRank::Master,
        Pf2eProficiencyRank::Expert,
        Pf2eProficiencyRank::Trained,
    ];

    /// Get the rank bonus (before adding level).
    pub fn rank_bonus(&self) -> i32 {
        match self {
            Pf2eProficiencyRank::Untrained => 0,
            Pf2eProficiencyRank::Trained => 2,
            Pf2eProficiencyRank::Expert => 4,
            Pf2eProficiencyRank::Master => 6,
            Pf2eProficiencyRank::Legendary => 8,
        }
    }

    /// Calculate full proficiency bonus including level.
    pub fn proficiency_bonus(&self, level: u8) -> i32 {
        match self {
            Pf2eProficiencyRank::Untrained => 0, // Untrained doesn't add level
            _ => self.rank_bonus() + level as i32,
        }
    }

    /// Tag suffix for this rank (e.g. `Expert` in `Skill.Stealth.Expert`).
    pub fn tag_suffix(&self) -> &'static str {
        match self {
            Pf2eProficiencyRank::Untrained => "Untrained",
            Pf2eProficiencyRank::Trained => "Trained",
            Pf2eProficiencyRank::Expert => "Expert",
            Pf2eProficiencyRank::Master => "Master",
            Pf2eProficiencyRank::Legendary => "Legendary",
        }
    }
}

/// Determine a character's rank in the stat identified by `tag_prefix`.
///
/// Returns `None` when the character does not carry the prefix tag at all; in that case
/// none of the rank tags are inspected. Returns `Some(Untrained)` when the prefix is
/// present but no rank suffix matches.
pub fn proficiency_rank(tag_prefix: &str, tags: &TagContainer) -> Option<Pf2eProficiencyRank> {
    if !tags.has_tag(tag_prefix) {
        return None;
    }

    let rank = Pf2eProficiencyRank::BY_SPECIFICITY
        .into_iter()
        .find(|rank| tags.has_tag(&format!("{}.{}", tag_prefix, rank.tag_suffix())))
        .unwrap_or(Pf2eProficiencyRank::Untrained);

    Some(rank)
}

/// Proficiency bonus for the stat identified by `tag_prefix` (e.g. `Skill.Stealth`).
pub fn proficiency_bonus(tag_prefix: &str, level: u8, tags: &TagContainer) -> i32 {
    proficiency_rank(tag_prefix, tags)
        .map(|rank| rank.proficiency_bonus(level))
        .unwrap_or(0)
}

/// PF2e skills (Lore is per-subject and handled through custom tag prefixes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pf2eSkill {
    Acrobatics,
    Arcana,
    Athletics,
    Crafting,
    Deception,
    Diplomacy,
    Intimidation,
    Medicine,
    Nature,
    Occultism,
    Performance,
    Religion,
    Society,
    Stealth,
    Survival,
    Thievery,
}

impl Pf2eSkill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acrobatics => "Acrobatics",
            Self::Arcana => "Arcana",
            Self::Athletics => "Athletics",
            Self::Crafting => "Crafting",
            Self::Deception => "Deception",
            Self::Diplomacy => "Diplomacy",
            Self::Intimidation => "Intimidation",
            Self::Medicine => "Medicine",
            Self::Nature => "Nature",
            Self::Occultism => "Occultism",
            Self::Performance => "Performance",
            Self::Religion => "Religion",
            Self::Society => "Society",
            Self::Stealth => "Stealth",
            Self::Survival => "Survival",
            Self::Thievery => "Thievery",
        }
    }

    pub fn all() -> [Pf2eSkill; 16] {
        [
            Self::Acrobatics,
            Self::Arcana,
            Self::Athletics,
            Self::Crafting,
            Self::Deception,
            Self::Diplomacy,
            Self::Intimidation,
            Self::Medicine,
            Self::Nature,
            Self::Occultism,
            Self::Performance,
            Self::Religion,
            Self::Society,
            Self::Stealth,
            Self::Survival,
            Self::Thievery,
        ]
    }

    /// The ability score whose modifier feeds this skill.
    pub fn key_ability(&self) -> AbilityScoreType {
        match self {
            Self::Acrobatics | Self::Stealth | Self::Thievery => AbilityScoreType::Dexterity,
            Self::Arcana | Self::Crafting | Self::Occultism | Self::Society => {
                AbilityScoreType::Intelligence
            }
            Self::Athletics => AbilityScoreType::Strength,
            Self::Deception | Self::Diplomacy | Self::Intimidation | Self::Performance => {
                AbilityScoreType::Charisma
            }
            Self::Medicine | Self::Nature | Self::Religion | Self::Survival => {
                AbilityScoreType::Wisdom
            }
        }
    }

    pub fn tag_prefix(&self) -> String {
        format!("Skill.{}", self.as_str())
    }
}

/// PF2e saving throws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pf2eSavingThrow {
    Fortitude,
    Reflex,
    Will,
}

impl Pf2eSavingThrow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fortitude => "Fortitude",
            Self::Reflex => "Reflex",
            Self::Will => "Will",
        }
    }

    pub fn key_ability(&self) -> AbilityScoreType {
        match self {
            Self::Fortitude => AbilityScoreType::Constitution,
            Self::Reflex => AbilityScoreType::Dexterity,
            Self::Will => AbilityScoreType::Wisdom,
        }
    }

    pub fn tag_prefix(&self) -> String {
        format!("SavingThrow.{}", self.as_str())
    }
}

/// Tag prefix for Perception proficiency.
pub const PERCEPTION_TAG_PREFIX: &str = "Perception";

/// Tag prefix for class DC proficiency.
pub const CLASS_DC_TAG_PREFIX: &str = "ClassDc";

/// Category of armor a character is wearing, read from `Armor.Equipped.*` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmorType {
    Unarmored,
    Light,
    Medium,
    Heavy,
}

impl ArmorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unarmored => "Unarmored",
            Self::Light => "Light",
            Self::Medium => "Medium",
            Self::Heavy => "Heavy",
        }
    }

    /// Heaviest equipped armor wins; no `Armor.Equipped` tag means unarmored.
    pub fn from_tags(tags: &TagContainer) -> Self {
        if !tags.has_tag("Armor.Equipped") {
            return Self::Unarmored;
        }

        [Self::Heavy, Self::Medium, Self::Light]
            .into_iter()
            .find(|armor| tags.has_tag(&format!("Armor.Equipped.{}", armor.as_str())))
            .unwrap_or(Self::Unarmored)
    }

    /// Proficiency tag prefix for this armor category (e.g. `Armor.Category.Light`).
    pub fn proficiency_prefix(&self) -> String {
        format!("Armor.Category.{}", self.as_str())
    }
}

/// Skill, saving throw or Perception modifier: ability modifier + proficiency.
///
/// Source: Pathfinder 2E Core Rulebook, page 28, "Skills".
pub fn stat_modifier(ability_modifier: i32, tag_prefix: &str, level: u8, tags: &TagContainer) -> i32 {
    ability_modifier + proficiency_bonus(tag_prefix, level, tags)
}

/// Armor Class = 10 + Dexterity modifier + proficiency in the equipped armor category.
///
/// Source: Pathfinder 2E Core Rulebook, page 274, "Armor Class".
pub fn armor_class(dexterity_modifier: i32, level: u8, tags: &TagContainer) -> i32 {
    let armor = ArmorType::from_tags(tags);

    10 + dexterity_modifier + proficiency_bonus(&armor.proficiency_prefix(), level, tags)
}

/// The character's key ability, from the first matching `KeyAbility.*` tag.
pub fn key_ability(tags: &TagContainer) -> Option<AbilityScoreType> {
    AbilityScoreType::all()
        .into_iter()
        .find(|ability| tags.has_tag(&ability.key_ability_tag()))
}

/// Class DC = 10 + class DC proficiency + key ability modifier.
///
/// `modifier_of` supplies the current modifier for the key ability; a character with
/// no key ability adds nothing. Source: Pathfinder 2E Core Rulebook, page 29, "Class DC".
pub fn class_dc(level: u8, tags: &TagContainer, modifier_of: impl Fn(AbilityScoreType) -> i32) -> i32 {
    let key_modifier = key_ability(tags).map(modifier_of).unwrap_or(0);

    10 + proficiency_bonus(CLASS_DC_TAG_PREFIX, level, tags) + key_modifier
}
