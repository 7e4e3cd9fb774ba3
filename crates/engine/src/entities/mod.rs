//! Entity modules - Rule-engine building blocks.
//!
//! Each module owns one piece of per-character or per-encounter state.
//! They depend on infrastructure ports and provide the building blocks for use cases.

pub mod attributes;
pub mod calculations;
pub mod effects;
pub mod initiative_queue;
pub mod passive_effects;

pub use attributes::Attribute;
pub use calculations::{
    ability_boost_effect, base_ability_scores_effect, derived_stat_effects,
    AbilityBoostCalculation, AbilityModifierCalculation, ArmorClassCalculation,
    ClassDcCalculation, ProficiencyCalculation,
};
pub use effects::{
    AttributeModifier, EffectDefinition, Magnitude, MagnitudeCalculation, MagnitudeContext,
    ModifierOp,
};
pub use initiative_queue::{
    InitiativeEntry, InitiativeError, InitiativeQueue, InitiativeSnapshot, DEFAULT_RESCALE_FACTOR,
};
pub use passive_effects::{
    EffectError, PassiveEffectCoordinator, PassiveEffectsSnapshot, WeightGroupSnapshot,
    DYNAMIC_TAGS_EFFECT_NAME,
};
