//! Passive effect coordinator - keeps a character's passive effects applied in weight order.
//!
//! Effects are registered into weight groups. Groups are activated in lexical order, and
//! any change to a group re-applies every active group after it, so derived stats are
//! always recomputed from up-to-date inputs. Earlier groups are never touched.
//!
//! Dynamic tags (alignment, bonus languages, extra skill training) ride along as a
//! synthetic effect in the base-stats group, so they go through the same lifecycle as
//! every other effect.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use openpf2_domain::{
    AbilityScoreType, CharacterId, EffectId, GameplayTag, StandardWeightGroup, TagContainer,
    WeightGroup,
};
use serde::{Deserialize, Serialize};

use super::calculations::ability_boost_effect;
use super::effects::EffectDefinition;
use crate::infrastructure::ports::{EffectQuery, EffectSink, EffectSinkError, EffectSpec};

/// Name of the synthetic effect that grants dynamic tags.
pub const DYNAMIC_TAGS_EFFECT_NAME: &str = "DynamicTags";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    #[error("Effect sink failed for weight group {group}: {source}")]
    SinkFailure {
        group: WeightGroup,
        source: EffectSinkError,
    },

    #[error("Effect sink failed while removing all passive effects: {source}")]
    RemoveAllFailed { source: EffectSinkError },
}

/// One weight group as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightGroupSnapshot {
    pub weight_group: WeightGroup,
    pub active: bool,
    /// Effect names in application order.
    pub effects: Vec<String>,
}

/// Read-only view of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveEffectsSnapshot {
    pub character_id: CharacterId,
    pub level: u8,
    pub groups: Vec<WeightGroupSnapshot>,
    pub dynamic_tags: TagContainer,
}

type EffectList = Arc<[(WeightGroup, Arc<EffectDefinition>)]>;

pub struct PassiveEffectCoordinator {
    owner: CharacterId,
    sink: Arc<dyn EffectSink>,
    level: u8,
    effects: BTreeMap<WeightGroup, Vec<Arc<EffectDefinition>>>,
    activated_groups: BTreeSet<WeightGroup>,
    dynamic_tags: TagContainer,
    dynamic_tags_effect_id: EffectId,
    cached_effects: Option<EffectList>,
}

impl PassiveEffectCoordinator {
    pub fn new(owner: CharacterId, sink: Arc<dyn EffectSink>) -> Self {
        Self {
            owner,
            sink,
            level: 1,
            effects: BTreeMap::new(),
            activated_groups: BTreeSet::new(),
            dynamic_tags: TagContainer::new(),
            dynamic_tags_effect_id: EffectId::new(),
            cached_effects: None,
        }
    }

    /// Start at a different character level (no effects are active yet).
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn owner(&self) -> CharacterId {
        self.owner
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Add an effect to a weight group, re-applying any active groups after it.
    pub fn add_effect(
        &mut self,
        weight_group: impl Into<WeightGroup>,
        effect: impl Into<Arc<EffectDefinition>>,
    ) -> Result<(), EffectError> {
        let group = weight_group.into();
        let effect = effect.into();

        // A brand-new group joins the others if anything is already active.
        if !self.effects.contains_key(&group) && self.is_active() {
            tracing::debug!(
                character = %self.owner,
                weight_group = %group,
                "Activating new weight group alongside active groups"
            );
            self.activated_groups.insert(group.clone());
        }

        self.reapply_subsequent_groups(&group, |this| {
            this.effects
                .entry(group.clone())
                .or_default()
                .push(effect.clone());
            this.invalidate_cache();

            tracing::debug!(
                character = %this.owner,
                weight_group = %group,
                effect = %effect.name(),
                "Added passive effect"
            );

            if !this.activated_groups.contains(&group) {
                return Ok(());
            }

            let spec = this.spec_for(&group, &effect);
            if let Err(source) = this.sink.apply(this.owner, &spec) {
                // Keep the registry in step with what the sink actually holds.
                if let Some(group_effects) = this.effects.get_mut(&group) {
                    group_effects.pop();
                    if group_effects.is_empty() {
                        this.effects.remove(&group);
                        this.activated_groups.remove(&group);
                    }
                }
                this.invalidate_cache();

                tracing::error!(
                    character = %this.owner,
                    weight_group = %group,
                    effect = %effect.name(),
                    error = %source,
                    "Failed to apply new passive effect"
                );
                return Err(EffectError::SinkFailure {
                    group: group.clone(),
                    source,
                });
            }

            Ok(())
        })
    }

    /// Add an effect to its own weight group, or `15_PreAbilityBoosts` if it has none.
    pub fn add_effect_with_default_weight(
        &mut self,
        effect: impl Into<Arc<EffectDefinition>>,
    ) -> Result<(), EffectError> {
        let effect = effect.into();
        let group = effect
            .weight_group()
            .cloned()
            .unwrap_or_else(|| StandardWeightGroup::PreAbilityBoosts.weight_group());

        self.add_effect(group, effect)
    }

    /// Replace the whole registry.
    pub fn set_all_effects<I>(&mut self, effects: I) -> Result<(), EffectError>
    where
        I: IntoIterator<Item = (WeightGroup, Arc<EffectDefinition>)>,
    {
        let mut registry: BTreeMap<WeightGroup, Vec<Arc<EffectDefinition>>> = BTreeMap::new();
        for (group, effect) in effects {
            registry.entry(group).or_default().push(effect);
        }

        self.reapply_all(|this| {
            tracing::debug!(
                character = %this.owner,
                groups = registry.len(),
                "Replacing all passive effects"
            );
            this.effects = registry;
            this.invalidate_cache();
            Ok(())
        })
    }

    /// Deactivate every group and empty the registry.
    pub fn remove_all_effects(&mut self) -> Result<(), EffectError> {
        self.deactivate_all()?;
        self.effects.clear();
        self.invalidate_cache();

        tracing::debug!(character = %self.owner, "Removed all passive effects");
        Ok(())
    }

    /// Boost one ability score by adding its boost effect to `20_AbilityBoosts`
    /// (or the boost effect's own group).
    pub fn apply_ability_boost(&mut self, ability: AbilityScoreType) -> Result<(), EffectError> {
        let boost = ability_boost_effect(ability);
        let group = boost
            .weight_group()
            .cloned()
            .unwrap_or_else(|| StandardWeightGroup::AbilityBoosts.weight_group());

        tracing::debug!(
            character = %self.owner,
            %ability,
            weight_group = %group,
            "Applying ability boost"
        );

        self.add_effect(group, boost)
    }

    /// Change the level stamped on effect specs; re-applies everything that was active.
    pub fn set_character_level(&mut self, level: u8) -> Result<(), EffectError> {
        if level == self.level {
            return Ok(());
        }

        self.reapply_all(|this| {
            tracing::debug!(character = %this.owner, from = this.level, to = level, "Changing level");
            this.level = level;
            Ok(())
        })
    }

    // =========================================================================
    // Dynamic Tags
    // =========================================================================

    pub fn dynamic_tags(&self) -> &TagContainer {
        &self.dynamic_tags
    }

    pub fn add_dynamic_tag(&mut self, tag: GameplayTag) -> Result<(), EffectError> {
        self.change_dynamic_tags("Adding dynamic tag", |tags| {
            tags.add(tag);
        })
    }

    pub fn append_dynamic_tags(&mut self, tags: &TagContainer) -> Result<(), EffectError> {
        self.change_dynamic_tags("Appending dynamic tags", |current| current.append(tags))
    }

    pub fn set_dynamic_tags(&mut self, tags: TagContainer) -> Result<(), EffectError> {
        self.change_dynamic_tags("Setting dynamic tags", |current| *current = tags)
    }

    pub fn remove_dynamic_tag(&mut self, tag: &GameplayTag) -> Result<(), EffectError> {
        self.change_dynamic_tags("Removing dynamic tag", |tags| {
            tags.remove(tag);
        })
    }

    pub fn remove_dynamic_tags(&mut self, tags: &TagContainer) -> Result<(), EffectError> {
        self.change_dynamic_tags("Removing dynamic tags", |current| current.remove_all(tags))
    }

    pub fn remove_all_dynamic_tags(&mut self) -> Result<(), EffectError> {
        self.change_dynamic_tags("Removing all dynamic tags", TagContainer::clear)
    }

    fn change_dynamic_tags<F>(&mut self, action: &'static str, change: F) -> Result<(), EffectError>
    where
        F: FnOnce(&mut TagContainer),
    {
        self.reapply_all(|this| {
            change(&mut this.dynamic_tags);
            this.invalidate_cache();

            tracing::debug!(
                character = %this.owner,
                tags = %this.dynamic_tags,
                "{}",
                action
            );
            Ok(())
        })
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Activate every inactive group, in ascending weight order.
    ///
    /// A group the sink rejects stays inactive; the groups after it are still activated
    /// and the first failure is returned.
    pub fn activate_all(&mut self) -> Result<(), EffectError> {
        let groups = self.inactive_groups();
        self.activate_each(groups)
    }

    /// Remove every effect this coordinator applied.
    pub fn deactivate_all(&mut self) -> Result<(), EffectError> {
        let removed = self
            .sink
            .remove_matching(self.owner, &EffectQuery::from_source(self.owner))
            .map_err(|source| EffectError::RemoveAllFailed { source })?;

        self.activated_groups.clear();

        tracing::debug!(character = %self.owner, removed, "Deactivated all weight groups");
        Ok(())
    }

    /// Apply every effect in `group`. Returns `Ok(false)` if it was already active.
    ///
    /// If the sink rejects an effect, whatever was applied for the group is removed
    /// again and the group stays inactive.
    pub fn activate_group(&mut self, group: &WeightGroup) -> Result<bool, EffectError> {
        if self.activated_groups.contains(group) {
            return Ok(false);
        }

        let effects = self.merged_effects();

        for (_, effect) in effects.iter().filter(|(g, _)| g == group) {
            let spec = self.spec_for(group, effect);

            if let Err(source) = self.sink.apply(self.owner, &spec) {
                tracing::error!(
                    character = %self.owner,
                    weight_group = %group,
                    effect = %effect.name(),
                    error = %source,
                    "Failed to activate weight group; rolling back"
                );

                if let Err(rollback) = self.sink.remove_matching(self.owner, &self.group_query(group)) {
                    tracing::warn!(
                        character = %self.owner,
                        weight_group = %group,
                        error = %rollback,
                        "Rollback of partially activated weight group failed"
                    );
                }

                return Err(EffectError::SinkFailure {
                    group: group.clone(),
                    source,
                });
            }
        }

        self.activated_groups.insert(group.clone());

        tracing::debug!(character = %self.owner, weight_group = %group, "Activated weight group");
        Ok(true)
    }

    /// Remove every effect in `group`. Returns `Ok(false)` if it was not active.
    ///
    /// The flag reports the change in activation bookkeeping, not whether the sink
    /// actually removed any effects.
    pub fn deactivate_group(&mut self, group: &WeightGroup) -> Result<bool, EffectError> {
        if !self.activated_groups.contains(group) {
            return Ok(false);
        }

        let removed = self
            .sink
            .remove_matching(self.owner, &self.group_query(group))
            .map_err(|source| EffectError::SinkFailure {
                group: group.clone(),
                source,
            })?;

        self.activated_groups.remove(group);

        tracing::debug!(
            character = %self.owner,
            weight_group = %group,
            removed,
            "Deactivated weight group"
        );
        Ok(true)
    }

    /// Activate every inactive group that sorts after `start`; returns the groups activated.
    pub fn activate_groups_after(
        &mut self,
        start: &WeightGroup,
    ) -> Result<BTreeSet<WeightGroup>, EffectError> {
        let mut activated = BTreeSet::new();

        for group in self.inactive_groups() {
            if group.is_after(start) && self.activate_group(&group)? {
                activated.insert(group);
            }
        }

        Ok(activated)
    }

    /// Deactivate every active group that sorts after `start`; returns the groups deactivated.
    pub fn deactivate_groups_after(
        &mut self,
        start: &WeightGroup,
    ) -> Result<BTreeSet<WeightGroup>, EffectError> {
        let (deactivated, outcome) = self.deactivate_each_after(start);
        outcome.map(|()| deactivated)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn activated_groups(&self) -> &BTreeSet<WeightGroup> {
        &self.activated_groups
    }

    /// True if at least one weight group is active.
    pub fn is_active(&self) -> bool {
        !self.activated_groups.is_empty()
    }

    /// The merged effect list, in application order.
    pub fn effects_to_apply(&mut self) -> Vec<(WeightGroup, Arc<EffectDefinition>)> {
        self.merged_effects().to_vec()
    }

    pub fn snapshot(&self) -> PassiveEffectsSnapshot {
        let mut groups: BTreeMap<WeightGroup, Vec<String>> = BTreeMap::new();

        for (group, effect) in self.build_effects_to_apply().iter() {
            groups
                .entry(group.clone())
                .or_default()
                .push(effect.name().to_string());
        }
        for group in &self.activated_groups {
            groups.entry(group.clone()).or_default();
        }

        PassiveEffectsSnapshot {
            character_id: self.owner,
            level: self.level,
            groups: groups
                .into_iter()
                .map(|(weight_group, effects)| WeightGroupSnapshot {
                    active: self.activated_groups.contains(&weight_group),
                    weight_group,
                    effects,
                })
                .collect(),
            dynamic_tags: self.dynamic_tags.clone(),
        }
    }

    // =========================================================================
    // Reapply Windows
    // =========================================================================

    /// Run `mutation` with every active group after `group` temporarily removed, then
    /// re-activate exactly those groups.
    ///
    /// Nothing is re-applied when `group` itself is inactive; later groups cannot depend
    /// on it.
    fn reapply_subsequent_groups<F>(&mut self, group: &WeightGroup, mutation: F) -> Result<(), EffectError>
    where
        F: FnOnce(&mut Self) -> Result<(), EffectError>,
    {
        if !self.activated_groups.contains(group) {
            return mutation(self);
        }

        let (deactivated, outcome) = self.deactivate_each_after(group);
        if let Err(error) = outcome {
            // The mutation is skipped; put back what was already taken off.
            if let Err(restore) = self.activate_each(deactivated) {
                tracing::warn!(
                    character = %self.owner,
                    weight_group = %group,
                    error = %restore,
                    "Could not restore weight groups after a failed deactivation"
                );
            }
            return Err(error);
        }

        let outcome = mutation(self);
        let restored = self.activate_each(deactivated);

        outcome.and(restored)
    }

    /// Run `mutation` with every group removed, then activate the whole registry again.
    ///
    /// A coordinator with nothing active stays inactive.
    fn reapply_all<F>(&mut self, mutation: F) -> Result<(), EffectError>
    where
        F: FnOnce(&mut Self) -> Result<(), EffectError>,
    {
        let was_active = self.is_active();

        if was_active {
            self.deactivate_all()?;
        }

        let outcome = mutation(self);
        let restored = if was_active { self.activate_all() } else { Ok(()) };

        outcome.and(restored)
    }

    /// Activate each group in turn, carrying on past failures; returns the first one.
    fn activate_each(&mut self, groups: impl IntoIterator<Item = WeightGroup>) -> Result<(), EffectError> {
        let mut first_error = None;

        for group in groups {
            if let Err(error) = self.activate_group(&group) {
                first_error.get_or_insert(error);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Deactivate active groups after `start` until one fails. Always returns the groups
    /// that were turned off, so a caller can restore them.
    fn deactivate_each_after(
        &mut self,
        start: &WeightGroup,
    ) -> (BTreeSet<WeightGroup>, Result<(), EffectError>) {
        let candidates: Vec<WeightGroup> = self
            .activated_groups
            .iter()
            .filter(|group| group.is_after(start))
            .cloned()
            .collect();

        let mut deactivated = BTreeSet::new();
        for group in candidates {
            match self.deactivate_group(&group) {
                Ok(true) => {
                    deactivated.insert(group);
                }
                Ok(false) => {}
                Err(error) => return (deactivated, Err(error)),
            }
        }

        (deactivated, Ok(()))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn inactive_groups(&mut self) -> BTreeSet<WeightGroup> {
        let effects = self.merged_effects();

        effects
            .iter()
            .map(|(group, _)| group)
            .filter(|group| !self.activated_groups.contains(*group))
            .cloned()
            .collect()
    }

    fn group_query(&self, group: &WeightGroup) -> EffectQuery {
        EffectQuery::from_source(self.owner).with_asset_tag(group.tag())
    }

    fn spec_for(&self, group: &WeightGroup, effect: &EffectDefinition) -> EffectSpec {
        let asset_tags: TagContainer = [group.tag()].into_iter().collect();

        EffectSpec {
            effect_id: effect.id(),
            name: effect.name().to_string(),
            source: self.owner,
            level: self.level,
            weight_group: group.clone(),
            asset_tags,
            granted_tags: effect.granted_tags().clone(),
            modifiers: effect.modifiers().to_vec(),
        }
    }

    fn invalidate_cache(&mut self) {
        self.cached_effects = None;
    }

    fn merged_effects(&mut self) -> EffectList {
        if let Some(cached) = &self.cached_effects {
            return cached.clone();
        }

        let built = self.build_effects_to_apply();
        self.cached_effects = Some(built.clone());
        built
    }

    fn build_effects_to_apply(&self) -> EffectList {
        let mut effects: Vec<(WeightGroup, Arc<EffectDefinition>)> = self
            .effects
            .iter()
            .flat_map(|(group, list)| list.iter().map(move |effect| (group.clone(), effect.clone())))
            .collect();

        let dynamic_tags = EffectDefinition::new(DYNAMIC_TAGS_EFFECT_NAME)
            .with_id(self.dynamic_tags_effect_id)
            .with_granted_tags(self.dynamic_tags.clone());
        effects.push((
            StandardWeightGroup::InitializeBaseStats.weight_group(),
            Arc::new(dynamic_tags),
        ));

        // Stable, so effects keep insertion order within a group.
        effects.sort_by(|a, b| a.0.cmp(&b.0));

        effects.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use mockall::predicate::eq;
    use mockall::Sequence;

    use crate::entities::{Attribute, AttributeModifier};
    use crate::infrastructure::ports::{EffectHandle, MockEffectSink};

    const GROUP_PREFIX: &str = "GameplayEffect.WeightGroup.";

    fn group(name: &str) -> WeightGroup {
        WeightGroup::new(format!("{}{}", GROUP_PREFIX, name)).expect("valid group")
    }

    fn effect(name: &str) -> Arc<EffectDefinition> {
        Arc::new(EffectDefinition::new(name))
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SinkCall {
        Apply(String),
        Remove(Option<String>),
    }

    /// Sink that records every call in order.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<SinkCall>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<SinkCall> {
            self.calls
                .lock()
                .map(|mut calls| std::mem::take(&mut *calls))
                .unwrap_or_default()
        }
    }

    impl EffectSink for RecordingSink {
        fn apply(&self, _target: CharacterId, spec: &EffectSpec) -> Result<EffectHandle, EffectSinkError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(SinkCall::Apply(spec.name.clone()));
            }
            Ok(EffectHandle::new())
        }

        fn remove_matching(&self, _target: CharacterId, query: &EffectQuery) -> Result<usize, EffectSinkError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(SinkCall::Remove(
                    query.asset_tag.as_ref().map(|tag| tag.as_str().to_string()),
                ));
            }
            Ok(0)
        }
    }

    fn apply(name: &str) -> SinkCall {
        SinkCall::Apply(name.to_string())
    }

    fn remove(group_name: &str) -> SinkCall {
        SinkCall::Remove(Some(format!("{}{}", GROUP_PREFIX, group_name)))
    }

    fn recording_coordinator() -> (Arc<RecordingSink>, PassiveEffectCoordinator) {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = PassiveEffectCoordinator::new(CharacterId::new(), sink.clone());
        (sink, coordinator)
    }

    #[test]
    fn test_adding_to_early_group_reapplies_later_groups_in_order() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Base"), effect("E1")).expect("added");
        coordinator.add_effect(group("20_Derived"), effect("E2")).expect("added");
        coordinator.add_effect(group("30_Equipment"), effect("E3")).expect("added");
        coordinator.activate_all().expect("activated");
        sink.take();

        coordinator.add_effect(group("10_Base"), effect("E4")).expect("added");

        assert_eq!(
            sink.take(),
            vec![
                remove("20_Derived"),
                remove("30_Equipment"),
                apply("E4"),
                apply("E2"),
                apply("E3"),
            ]
        );
    }

    #[test]
    fn test_add_effect_keeps_activated_groups_closed() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Base"), effect("E1")).expect("added");
        coordinator.add_effect(group("20_Derived"), effect("E2")).expect("added");
        coordinator.activate_all().expect("activated");
        coordinator.deactivate_group(&group("20_Derived")).expect("deactivated");

        let before = coordinator.activated_groups().clone();
        coordinator.add_effect(group("10_Base"), effect("E3")).expect("added");
        coordinator.add_effect(group("20_Derived"), effect("E4")).expect("added");

        assert_eq!(coordinator.activated_groups(), &before);
    }

    #[test]
    fn test_add_to_inactive_group_applies_nothing() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Base"), effect("E1")).expect("added");

        assert!(sink.take().is_empty());
        assert!(!coordinator.is_active());
    }

    #[test]
    fn test_first_effect_of_new_group_joins_active_groups() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Base"), effect("E1")).expect("added");
        coordinator.activate_all().expect("activated");
        sink.take();

        coordinator.add_effect(group("40_Late"), effect("E5")).expect("added");

        assert!(coordinator.activated_groups().contains(&group("40_Late")));
        assert_eq!(sink.take(), vec![apply("E5")]);
    }

    #[test]
    fn test_activation_is_idempotent() {
        let (sink, mut coordinator) = recording_coordinator();
        let base = group("10_Base");
        coordinator.add_effect(base.clone(), effect("E1")).expect("added");

        assert_eq!(coordinator.activate_group(&base), Ok(true));
        assert_eq!(coordinator.activate_group(&base), Ok(false));
        assert_eq!(coordinator.deactivate_group(&base), Ok(true));
        assert_eq!(coordinator.deactivate_group(&base), Ok(false));
        assert_eq!(
            sink.take(),
            vec![apply("E1"), remove("10_Base")]
        );
    }

    #[test]
    fn test_activate_all_runs_in_weight_order_with_dynamic_tags_first_group() {
        let (sink, mut coordinator) = recording_coordinator();
        let base_stats = StandardWeightGroup::InitializeBaseStats.weight_group();
        coordinator.add_effect(group("30_Late"), effect("Late")).expect("added");
        coordinator.add_effect(base_stats, effect("Base")).expect("added");
        coordinator.add_effect(group("20_Middle"), effect("Middle")).expect("added");

        coordinator.activate_all().expect("activated");

        assert_eq!(
            sink.take(),
            vec![
                apply("Base"),
                apply(DYNAMIC_TAGS_EFFECT_NAME),
                apply("Middle"),
                apply("Late"),
            ]
        );
    }

    #[test]
    fn test_merged_list_is_stable_and_includes_dynamic_tags() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("20_B"), effect("First")).expect("added");
        coordinator.add_effect(group("10_A"), effect("Second")).expect("added");
        coordinator.add_effect(group("20_B"), effect("Third")).expect("added");

        let names: Vec<String> = coordinator
            .effects_to_apply()
            .iter()
            .map(|(_, effect)| effect.name().to_string())
            .collect();

        assert_eq!(names, vec![DYNAMIC_TAGS_EFFECT_NAME, "Second", "First", "Third"]);
    }

    #[test]
    fn test_groups_after_only_touch_later_groups() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.add_effect(group("20_B"), effect("B")).expect("added");
        coordinator.add_effect(group("30_C"), effect("C")).expect("added");
        coordinator.activate_all().expect("activated");

        let deactivated = coordinator.deactivate_groups_after(&group("10_A")).expect("ok");
        assert_eq!(
            deactivated,
            [group("20_B"), group("30_C")].into_iter().collect()
        );
        assert!(coordinator.activated_groups().contains(&group("10_A")));

        let activated = coordinator.activate_groups_after(&group("20_B")).expect("ok");
        assert_eq!(activated, [group("30_C")].into_iter().collect());
        assert!(!coordinator.activated_groups().contains(&group("20_B")));
    }

    #[test]
    fn test_set_all_effects_activates_the_replacement_registry() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Old"), effect("Old")).expect("added");
        coordinator.activate_all().expect("activated");
        sink.take();

        coordinator
            .set_all_effects(vec![(group("20_New"), effect("New"))])
            .expect("replaced");

        let expected: BTreeSet<WeightGroup> = [
            StandardWeightGroup::InitializeBaseStats.weight_group(),
            group("20_New"),
        ]
        .into_iter()
        .collect();
        assert_eq!(coordinator.activated_groups(), &expected);
        assert_eq!(
            sink.take(),
            vec![
                SinkCall::Remove(None),
                apply(DYNAMIC_TAGS_EFFECT_NAME),
                apply("New"),
            ]
        );
    }

    #[test]
    fn test_set_all_effects_on_inactive_coordinator_applies_nothing() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_Old"), effect("Old")).expect("added");

        coordinator
            .set_all_effects(vec![(group("20_New"), effect("New"))])
            .expect("replaced");

        assert!(!coordinator.is_active());
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_dynamic_tag_changes_reapply_everything() {
        let (sink, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.activate_all().expect("activated");
        sink.take();

        let lawful = GameplayTag::new("Alignment.Lawful").expect("valid tag");
        coordinator.add_dynamic_tag(lawful.clone()).expect("added");

        assert!(coordinator.dynamic_tags().has_tag("Alignment.Lawful"));
        assert_eq!(
            sink.take(),
            vec![
                SinkCall::Remove(None),
                apply(DYNAMIC_TAGS_EFFECT_NAME),
                apply("A"),
            ]
        );

        coordinator.remove_dynamic_tag(&lawful).expect("removed");
        assert!(coordinator.dynamic_tags().is_empty());
    }

    #[test]
    fn test_dynamic_tag_operations_without_active_groups() {
        let (sink, mut coordinator) = recording_coordinator();
        let languages =
            TagContainer::from_names(["Language.Elven", "Language.Sylvan"]).expect("valid tags");

        coordinator.append_dynamic_tags(&languages).expect("appended");
        coordinator
            .add_dynamic_tag(GameplayTag::new("Skill.Arcana.Trained").expect("valid"))
            .expect("added");
        assert_eq!(coordinator.dynamic_tags().len(), 3);

        coordinator.remove_dynamic_tags(&languages).expect("removed");
        assert_eq!(coordinator.dynamic_tags().len(), 1);

        coordinator.set_dynamic_tags(languages.clone()).expect("set");
        assert_eq!(coordinator.dynamic_tags(), &languages);

        coordinator.remove_all_dynamic_tags().expect("cleared");
        assert!(coordinator.dynamic_tags().is_empty());
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_remove_all_effects_clears_registry() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.activate_all().expect("activated");

        coordinator.remove_all_effects().expect("removed");

        assert!(!coordinator.is_active());
        assert_eq!(coordinator.effects_to_apply().len(), 1);
    }

    #[test]
    fn test_default_weight_and_ability_boost_groups() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator
            .add_effect_with_default_weight(EffectDefinition::new("Designer"))
            .expect("added");
        coordinator
            .apply_ability_boost(AbilityScoreType::Dexterity)
            .expect("boosted");

        let snapshot = coordinator.snapshot();
        let groups: Vec<&str> = snapshot
            .groups
            .iter()
            .map(|g| g.weight_group.as_str())
            .collect();

        assert_eq!(
            groups,
            vec![
                StandardWeightGroup::InitializeBaseStats.as_str(),
                StandardWeightGroup::PreAbilityBoosts.as_str(),
                StandardWeightGroup::AbilityBoosts.as_str(),
            ]
        );
        assert_eq!(snapshot.groups[2].effects, vec!["BoostDexterity"]);
    }

    #[test]
    fn test_level_change_is_stamped_on_specs() {
        let mut mock = MockEffectSink::new();
        mock.expect_apply()
            .withf(|_, spec| spec.level == 4)
            .times(2)
            .returning(|_, _| Ok(EffectHandle::new()));

        let mut coordinator = PassiveEffectCoordinator::new(CharacterId::new(), Arc::new(mock));
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.set_character_level(4).expect("inactive, nothing re-applied");
        coordinator.activate_all().expect("applied at level 4");

        assert_eq!(coordinator.level(), 4);
    }

    #[test]
    fn test_group_activation_applies_in_insertion_order() {
        let owner = CharacterId::new();
        let base = group("10_Base");
        let mut seq = Sequence::new();
        let mut mock = MockEffectSink::new();

        mock.expect_apply()
            .withf(|_, spec| spec.name == "First")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_apply()
            .withf(|_, spec| spec.name == "Second")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_remove_matching()
            .with(
                eq(owner),
                eq(EffectQuery::from_source(owner).with_asset_tag(base.tag())),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(2));

        let mut coordinator = PassiveEffectCoordinator::new(owner, Arc::new(mock));
        coordinator.add_effect(base.clone(), effect("First")).expect("added");
        coordinator.add_effect(base.clone(), effect("Second")).expect("added");

        assert_eq!(coordinator.activate_group(&base), Ok(true));
        assert_eq!(coordinator.deactivate_group(&base), Ok(true));
    }

    #[test]
    fn test_sink_failure_rolls_back_group_activation() {
        let owner = CharacterId::new();
        let base = group("10_Base");
        let mut mock = MockEffectSink::new();

        mock.expect_apply()
            .withf(|_, spec| spec.name == "Good")
            .times(1)
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_apply()
            .withf(|_, spec| spec.name == "Bad")
            .times(1)
            .returning(|_, spec| Err(EffectSinkError::rejected(&spec.name, "immune")));
        mock.expect_remove_matching()
            .with(
                eq(owner),
                eq(EffectQuery::from_source(owner).with_asset_tag(base.tag())),
            )
            .times(1)
            .returning(|_, _| Ok(1));

        let mut coordinator = PassiveEffectCoordinator::new(owner, Arc::new(mock));
        coordinator.add_effect(base.clone(), effect("Good")).expect("added");
        coordinator.add_effect(base.clone(), effect("Bad")).expect("added");

        let result = coordinator.activate_group(&base);

        assert_eq!(
            result,
            Err(EffectError::SinkFailure {
                group: base.clone(),
                source: EffectSinkError::rejected("Bad", "immune"),
            })
        );
        assert!(!coordinator.activated_groups().contains(&base));
    }

    #[test]
    fn test_rejected_new_effect_is_not_registered() {
        let owner = CharacterId::new();
        let mut mock = MockEffectSink::new();
        mock.expect_apply()
            .withf(|_, spec| spec.name == "Bad")
            .returning(|_, spec| Err(EffectSinkError::rejected(&spec.name, "immune")));
        mock.expect_apply()
            .withf(|_, spec| spec.name != "Bad")
            .returning(|_, _| Ok(EffectHandle::new()));

        let mut coordinator = PassiveEffectCoordinator::new(owner, Arc::new(mock));
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.activate_all().expect("activated");

        let result = coordinator.add_effect(group("10_A"), effect("Bad"));

        assert!(matches!(result, Err(EffectError::SinkFailure { .. })));
        let names: Vec<String> = coordinator
            .effects_to_apply()
            .iter()
            .map(|(_, effect)| effect.name().to_string())
            .collect();
        assert!(!names.contains(&"Bad".to_string()));
    }

    #[test]
    fn test_rejected_middle_group_does_not_strand_later_groups() {
        let owner = CharacterId::new();
        let mut mock = MockEffectSink::new();
        let mut b_applications = 0;
        mock.expect_apply()
            .withf(|_, spec| spec.name == "B")
            .times(2)
            .returning(move |_, spec| {
                b_applications += 1;
                if b_applications > 1 {
                    Err(EffectSinkError::rejected(&spec.name, "warded"))
                } else {
                    Ok(EffectHandle::new())
                }
            });
        mock.expect_apply()
            .withf(|_, spec| spec.name == "C")
            .times(2)
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_apply()
            .withf(|_, spec| spec.name != "B" && spec.name != "C")
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_remove_matching().returning(|_, _| Ok(1));

        let mut coordinator = PassiveEffectCoordinator::new(owner, Arc::new(mock));
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.add_effect(group("20_B"), effect("B")).expect("added");
        coordinator.add_effect(group("30_C"), effect("C")).expect("added");
        coordinator.activate_all().expect("activated");

        let result = coordinator.add_effect(group("10_A"), effect("A2"));

        assert_eq!(
            result,
            Err(EffectError::SinkFailure {
                group: group("20_B"),
                source: EffectSinkError::rejected("B", "warded"),
            })
        );
        assert!(coordinator.activated_groups().contains(&group("10_A")));
        assert!(coordinator.activated_groups().contains(&group("30_C")));
        assert!(!coordinator.activated_groups().contains(&group("20_B")));
        assert!(coordinator
            .effects_to_apply()
            .iter()
            .any(|(_, effect)| effect.name() == "A2"));
    }

    #[test]
    fn test_failed_deactivation_restores_groups_already_removed() {
        let owner = CharacterId::new();
        let c_tag = group("30_C").tag();
        let mut mock = MockEffectSink::new();
        mock.expect_apply()
            .withf(|_, spec| spec.name == "B")
            .times(2)
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_apply()
            .withf(|_, spec| spec.name != "B")
            .returning(|_, _| Ok(EffectHandle::new()));
        mock.expect_remove_matching()
            .withf(move |_, query| query.asset_tag.as_ref() == Some(&c_tag))
            .times(1)
            .returning(|_, _| Err(EffectSinkError::removal_failed("store offline")));
        let c_tag = group("30_C").tag();
        mock.expect_remove_matching()
            .withf(move |_, query| query.asset_tag.as_ref() != Some(&c_tag))
            .returning(|_, _| Ok(1));

        let mut coordinator = PassiveEffectCoordinator::new(owner, Arc::new(mock));
        coordinator.add_effect(group("10_A"), effect("A")).expect("added");
        coordinator.add_effect(group("20_B"), effect("B")).expect("added");
        coordinator.add_effect(group("30_C"), effect("C")).expect("added");
        coordinator.activate_all().expect("activated");
        let before = coordinator.activated_groups().clone();

        let result = coordinator.add_effect(group("10_A"), effect("A2"));

        assert_eq!(
            result,
            Err(EffectError::SinkFailure {
                group: group("30_C"),
                source: EffectSinkError::removal_failed("store offline"),
            })
        );
        assert_eq!(coordinator.activated_groups(), &before);
        assert!(!coordinator
            .effects_to_apply()
            .iter()
            .any(|(_, effect)| effect.name() == "A2"));
    }

    #[test]
    fn test_snapshot_reports_activation_and_serializes() {
        let (_, mut coordinator) = recording_coordinator();
        coordinator
            .add_effect(
                group("10_A"),
                EffectDefinition::new("Toughness")
                    .with_modifier(AttributeModifier::add(Attribute::MaxHitPoints, 3.0)),
            )
            .expect("added");
        coordinator.activate_group(&group("10_A")).expect("activated");

        let snapshot = coordinator.snapshot();
        let a = snapshot
            .groups
            .iter()
            .find(|g| g.weight_group == group("10_A"))
            .expect("group present");
        assert!(a.active);
        assert_eq!(a.effects, vec!["Toughness"]);

        let json = serde_json::to_string(&snapshot).expect("serializable");
        let restored: PassiveEffectsSnapshot = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(restored, snapshot);
    }
}
