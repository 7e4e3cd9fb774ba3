//! In-memory ability system: applies effect specs and aggregates attribute values.
//!
//! Calculated magnitudes are resolved once, when the effect is applied, against the
//! target's state at that moment. Current values fold every active modifier over the
//! base value in application order, which is why passive effects are applied in weight
//! order.

use std::collections::HashMap;

use dashmap::DashMap;
use openpf2_domain::{CharacterId, TagContainer, WeightGroup};
use serde::Serialize;

use crate::entities::{Attribute, MagnitudeContext, ModifierOp};
use crate::infrastructure::ports::{
    AttributeStore, EffectHandle, EffectQuery, EffectSink, EffectSinkError, EffectSpec,
};

#[derive(Debug, Clone, Copy)]
struct ResolvedModifier {
    attribute: Attribute,
    op: ModifierOp,
    magnitude: f32,
}

#[derive(Debug, Clone)]
struct ActiveEffect {
    handle: EffectHandle,
    name: String,
    source: CharacterId,
    weight_group: WeightGroup,
    asset_tags: TagContainer,
    granted_tags: TagContainer,
    modifiers: Vec<ResolvedModifier>,
}

/// Read-only view of one applied effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveEffectSummary {
    pub name: String,
    pub weight_group: WeightGroup,
    pub granted_tags: TagContainer,
}

#[derive(Debug, Default)]
struct CharacterEffects {
    base: HashMap<Attribute, f32>,
    active: Vec<ActiveEffect>,
}

impl CharacterEffects {
    fn current(&self, attribute: Attribute) -> f32 {
        let base = self.base.get(&attribute).copied().unwrap_or(0.0);

        let value = self
            .active
            .iter()
            .flat_map(|effect| effect.modifiers.iter())
            .filter(|modifier| modifier.attribute == attribute)
            .fold(base, |value, modifier| modifier.op.apply(value, modifier.magnitude));

        match attribute.clamp_ceiling() {
            Some(ceiling) => value.clamp(0.0, self.current(ceiling).max(0.0)),
            None => value,
        }
    }

    fn owned_tags(&self) -> TagContainer {
        let mut tags = TagContainer::new();
        for effect in &self.active {
            tags.append(&effect.granted_tags);
        }
        tags
    }
}

/// Ability system backed by a concurrent map keyed by character.
#[derive(Debug, Default)]
pub struct InMemoryAbilitySystem {
    characters: DashMap<CharacterId, CharacterEffects>,
    /// Effect names the sink refuses to apply, with the reason reported.
    rejections: DashMap<String, String>,
}

impl InMemoryAbilitySystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every future application of effects with this name.
    pub fn reject_effects_named(&self, name: impl Into<String>, reason: impl Into<String>) {
        self.rejections.insert(name.into(), reason.into());
    }

    pub fn allow_effects_named(&self, name: &str) {
        self.rejections.remove(name);
    }

    /// Active effects on `target`, in application order.
    pub fn active_effects(&self, target: CharacterId) -> Vec<ActiveEffectSummary> {
        self.characters
            .get(&target)
            .map(|state| {
                state
                    .active
                    .iter()
                    .map(|effect| ActiveEffectSummary {
                        name: effect.name.clone(),
                        weight_group: effect.weight_group.clone(),
                        granted_tags: effect.granted_tags.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a single applied effect. Returns false if the handle is not active.
    pub fn remove_effect(&self, target: CharacterId, handle: EffectHandle) -> bool {
        let Some(mut state) = self.characters.get_mut(&target) else {
            return false;
        };

        let before = state.active.len();
        state.active.retain(|effect| effect.handle != handle);
        state.active.len() != before
    }

    pub fn active_effect_count(&self, target: CharacterId) -> usize {
        self.characters
            .get(&target)
            .map(|state| state.active.len())
            .unwrap_or(0)
    }
}

impl EffectSink for InMemoryAbilitySystem {
    fn apply(&self, target: CharacterId, spec: &EffectSpec) -> Result<EffectHandle, EffectSinkError> {
        if let Some(reason) = self.rejections.get(&spec.name) {
            return Err(EffectSinkError::rejected(&spec.name, reason.value()));
        }

        let mut state = self.characters.entry(target).or_default();

        let modifiers = {
            let snapshot: &CharacterEffects = &state;
            let mut tags = snapshot.owned_tags();
            tags.append(&spec.granted_tags);

            let lookup = |attribute: Attribute| snapshot.current(attribute);
            let context = MagnitudeContext::new(spec.level, &tags, &lookup);

            spec.modifiers
                .iter()
                .map(|modifier| ResolvedModifier {
                    attribute: modifier.attribute,
                    op: modifier.op,
                    magnitude: modifier.magnitude.resolve(&context),
                })
                .collect::<Vec<_>>()
        };

        let handle = EffectHandle::new();

        tracing::trace!(
            target_id = %target,
            effect = %spec.name,
            weight_group = %spec.weight_group,
            modifiers = modifiers.len(),
            "Applied effect"
        );

        state.active.push(ActiveEffect {
            handle,
            name: spec.name.clone(),
            source: spec.source,
            weight_group: spec.weight_group.clone(),
            asset_tags: spec.asset_tags.clone(),
            granted_tags: spec.granted_tags.clone(),
            modifiers,
        });

        Ok(handle)
    }

    fn remove_matching(&self, target: CharacterId, query: &EffectQuery) -> Result<usize, EffectSinkError> {
        let Some(mut state) = self.characters.get_mut(&target) else {
            return Ok(0);
        };

        let before = state.active.len();
        state
            .active
            .retain(|effect| !query.matches(effect.source, &effect.asset_tags));
        let removed = before - state.active.len();

        tracing::trace!(target_id = %target, removed, "Removed matching effects");

        Ok(removed)
    }
}

impl AttributeStore for InMemoryAbilitySystem {
    fn get(&self, target: CharacterId, attribute: Attribute) -> f32 {
        self.characters
            .get(&target)
            .map(|state| state.current(attribute))
            .unwrap_or(0.0)
    }

    fn set_base(&self, target: CharacterId, attribute: Attribute, value: f32) {
        self.characters
            .entry(target)
            .or_default()
            .base
            .insert(attribute, value);
    }

    fn owned_tags(&self, target: CharacterId) -> TagContainer {
        self.characters
            .get(&target)
            .map(|state| state.owned_tags())
            .unwrap_or_default()
    }
}
