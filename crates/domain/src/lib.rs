//! OpenPF2 domain layer: identifiers, value objects and Pathfinder 2e rules.
//!
//! Everything here is pure and synchronous. Effect application, initiative ordering
//! and encounter flow live in `openpf2-engine`, which depends on this crate.

pub mod aggregates;
pub mod error;
pub mod game_systems;
pub mod ids;
pub mod value_objects;

pub use aggregates::{CharacterCommand, CommandExecuteResult, CommandQueue, QueuePosition};

pub use error::DomainError;

// Re-export Pathfinder 2e rules
pub use game_systems::{
    ability_boost_amount, ability_modifier, armor_class, class_dc, key_ability,
    proficiency_bonus, proficiency_rank, stat_modifier, AbilityScoreType, ArmorType,
    Pf2eProficiencyRank, Pf2eSavingThrow, Pf2eSkill, CLASS_DC_TAG_PREFIX, PERCEPTION_TAG_PREFIX,
};

// Re-export ID types
pub use ids::{CharacterId, CommandId, EffectId, EncounterId};

pub use value_objects::{
    GameplayTag, InitiativeScore, StandardWeightGroup, TagContainer, WeightGroup,
};
