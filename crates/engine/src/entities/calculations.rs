//! Magnitude calculations for PF2e derived stats.
//!
//! Each calculation reads the target's tags, level and current attribute values at
//! application time, so it must live in a weight group that runs after the values it
//! depends on.

use std::sync::Arc;

use openpf2_domain::{
    ability_boost_amount, ability_modifier, armor_class, class_dc, stat_modifier, AbilityScoreType,
    Pf2eSavingThrow, Pf2eSkill, StandardWeightGroup, CLASS_DC_TAG_PREFIX, PERCEPTION_TAG_PREFIX,
};

use super::attributes::Attribute;
use super::effects::{
    AttributeModifier, EffectDefinition, MagnitudeCalculation, MagnitudeContext, ModifierOp,
};

fn current_score(context: &MagnitudeContext<'_>, ability: AbilityScoreType) -> i32 {
    context.attribute(Attribute::AbilityScore(ability)).floor() as i32
}

fn current_modifier(context: &MagnitudeContext<'_>, ability: AbilityScoreType) -> i32 {
    context.attribute(Attribute::AbilityModifier(ability)).floor() as i32
}

/// Modifier derived from an ability score.
#[derive(Debug, Clone, Copy)]
pub struct AbilityModifierCalculation {
    pub ability: AbilityScoreType,
}

impl MagnitudeCalculation for AbilityModifierCalculation {
    fn name(&self) -> String {
        format!("{}Modifier", self.ability)
    }

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32 {
        ability_modifier(current_score(context, self.ability)) as f32
    }
}

/// Size of a single ability boost given the current score.
#[derive(Debug, Clone, Copy)]
pub struct AbilityBoostCalculation {
    pub ability: AbilityScoreType,
}

impl MagnitudeCalculation for AbilityBoostCalculation {
    fn name(&self) -> String {
        format!("{}Boost", self.ability)
    }

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32 {
        ability_boost_amount(current_score(context, self.ability)) as f32
    }
}

/// Ability modifier plus TEML proficiency for a tag-identified stat.
#[derive(Debug, Clone)]
pub struct ProficiencyCalculation {
    pub tag_prefix: String,
    pub ability: AbilityScoreType,
}

impl ProficiencyCalculation {
    pub fn skill(skill: Pf2eSkill) -> Self {
        Self {
            tag_prefix: skill.tag_prefix(),
            ability: skill.key_ability(),
        }
    }

    pub fn saving_throw(save: Pf2eSavingThrow) -> Self {
        Self {
            tag_prefix: save.tag_prefix(),
            ability: save.key_ability(),
        }
    }

    pub fn perception() -> Self {
        Self {
            tag_prefix: PERCEPTION_TAG_PREFIX.to_string(),
            ability: AbilityScoreType::Wisdom,
        }
    }
}

impl MagnitudeCalculation for ProficiencyCalculation {
    fn name(&self) -> String {
        format!("{}Modifier", self.tag_prefix)
    }

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32 {
        stat_modifier(
            current_modifier(context, self.ability),
            &self.tag_prefix,
            context.level(),
            context.tags(),
        ) as f32
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArmorClassCalculation;

impl MagnitudeCalculation for ArmorClassCalculation {
    fn name(&self) -> String {
        "ArmorClass".to_string()
    }

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32 {
        let dexterity = current_modifier(context, AbilityScoreType::Dexterity);

        armor_class(dexterity, context.level(), context.tags()) as f32
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassDcCalculation;

impl MagnitudeCalculation for ClassDcCalculation {
    fn name(&self) -> String {
        CLASS_DC_TAG_PREFIX.to_string()
    }

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32 {
        class_dc(context.level(), context.tags(), |ability| {
            current_modifier(context, ability)
        }) as f32
    }
}

/// Effect raising one ability score by a single boost.
pub fn ability_boost_effect(ability: AbilityScoreType) -> EffectDefinition {
    EffectDefinition::new(format!("Boost{}", ability))
        .with_modifier(AttributeModifier::calculated(
            Attribute::AbilityScore(ability),
            ModifierOp::Add,
            Arc::new(AbilityBoostCalculation { ability }),
        ))
        .with_weight_group(StandardWeightGroup::AbilityBoosts)
}

/// Effect that sets every ability score to a fixed base value.
pub fn base_ability_scores_effect(scores: &[(AbilityScoreType, i32)]) -> EffectDefinition {
    scores.iter().fold(
        EffectDefinition::new("BaseAbilityScores")
            .with_weight_group(StandardWeightGroup::InitializeBaseStats),
        |effect, (ability, score)| {
            effect.with_modifier(AttributeModifier::override_with(
                Attribute::AbilityScore(*ability),
                *score as f32,
            ))
        },
    )
}

/// Effects computing derived stats: ability modifiers first, then everything built on them.
pub fn derived_stat_effects() -> Vec<EffectDefinition> {
    let modifiers = AbilityScoreType::all().into_iter().fold(
        EffectDefinition::new("AbilityModifiers")
            .with_weight_group(StandardWeightGroup::PreFinalizeStats),
        |effect, ability| {
            effect.with_modifier(AttributeModifier::calculated(
                Attribute::AbilityModifier(ability),
                ModifierOp::Override,
                Arc::new(AbilityModifierCalculation { ability }),
            ))
        },
    );

    let mut stats = EffectDefinition::new("DerivedStats")
        .with_weight_group(StandardWeightGroup::FinalizeStats)
        .with_modifier(AttributeModifier::calculated(
            Attribute::ArmorClass,
            ModifierOp::Override,
            Arc::new(ArmorClassCalculation),
        ))
        .with_modifier(AttributeModifier::calculated(
            Attribute::ClassDc,
            ModifierOp::Override,
            Arc::new(ClassDcCalculation),
        ))
        .with_modifier(AttributeModifier::calculated(
            Attribute::Perception,
            ModifierOp::Override,
            Arc::new(ProficiencyCalculation::perception()),
        ));

    for save in [
        Pf2eSavingThrow::Fortitude,
        Pf2eSavingThrow::Reflex,
        Pf2eSavingThrow::Will,
    ] {
        stats = stats.with_modifier(AttributeModifier::calculated(
            Attribute::SavingThrow(save),
            ModifierOp::Override,
            Arc::new(ProficiencyCalculation::saving_throw(save)),
        ));
    }

    for skill in Pf2eSkill::all() {
        stats = stats.with_modifier(AttributeModifier::calculated(
            Attribute::Skill(skill),
            ModifierOp::Override,
            Arc::new(ProficiencyCalculation::skill(skill)),
        ));
    }

    vec![modifiers, stats]
}
