//! Game system rules.
//!
//! OpenPF2 implements a single system, Pathfinder 2nd Edition (`pf2e`). The rules
//! here are pure functions over tags and numbers; effect application lives in the engine.

mod pf2e;

// Pathfinder 2e exports
pub use pf2e::{
    ability_boost_amount, ability_modifier, armor_class, class_dc, key_ability,
    proficiency_bonus, proficiency_rank, stat_modifier, AbilityScoreType, ArmorType,
    Pf2eProficiencyRank, Pf2eSavingThrow, Pf2eSkill, CLASS_DC_TAG_PREFIX, PERCEPTION_TAG_PREFIX,
};
