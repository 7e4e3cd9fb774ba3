//! Scripted encounter scenarios.
//!
//! A scenario lists combatants with their rolled initiative, stats and the commands
//! they will take. Running it builds every character's passive effects, plays a fixed
//! number of rounds and reports the resulting turn order and derived stats.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use openpf2_domain::{
    AbilityScoreType, CharacterCommand, CharacterId, CommandExecuteResult, CommandId, DomainError,
    Pf2eSavingThrow, Pf2eSkill, QueuePosition, TagContainer,
};
use serde::{Deserialize, Serialize};

use super::{Encounter, EncounterError, EncounterSnapshot};
use crate::entities::{
    base_ability_scores_effect, derived_stat_effects, Attribute, EffectError,
    PassiveEffectCoordinator, PassiveEffectsSnapshot,
};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::memory::{InMemoryAbilitySystem, InMemoryRoster};
use crate::infrastructure::ports::{AttributeStore, ClockPort, CombatantRoster};

const BASE_ABILITY_SCORE: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid character tags: {0}")]
    Tags(#[from] DomainError),

    #[error(transparent)]
    Encounter(#[from] EncounterError),

    #[error(transparent)]
    Effects(#[from] EffectError),
}

// =============================================================================
// Scripted Commands
// =============================================================================

/// A command with a fixed outcome, for scenarios and tests.
pub struct ScriptedCommand {
    id: CommandId,
    character: CharacterId,
    label: String,
    result: CommandExecuteResult,
    position: QueuePosition,
    executions: AtomicUsize,
}

impl ScriptedCommand {
    pub fn new(character: CharacterId, label: impl Into<String>, result: CommandExecuteResult) -> Self {
        Self {
            id: CommandId::new(),
            character,
            label: label.into(),
            result,
            position: QueuePosition::EndOfQueue,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn with_position(mut self, position: QueuePosition) -> Self {
        self.position = position;
        self
    }

    /// How many times the command has been executed.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl CharacterCommand for ScriptedCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn character_id(&self) -> CharacterId {
        self.character
    }

    fn queue_position(&self) -> QueuePosition {
        self.position
    }

    fn execute(&self) -> CommandExecuteResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.result
    }

    fn id_for_logs(&self) -> String {
        self.label.clone()
    }
}

// =============================================================================
// Scenario
// =============================================================================

fn default_alive() -> bool {
    true
}

fn default_rounds() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCombatant {
    pub name: String,
    pub initiative: i32,
    #[serde(default)]
    pub player_controlled: bool,
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// Falls back to the configured default level.
    #[serde(default)]
    pub level: Option<u8>,
    /// Missing abilities start at 10.
    #[serde(default)]
    pub ability_scores: BTreeMap<AbilityScoreType, i32>,
    #[serde(default)]
    pub boosts: Vec<AbilityScoreType>,
    /// Dynamic tags: proficiencies, armor, key ability.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Labels of commands queued before the encounter starts; each always activates.
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    pub combatants: Vec<ScenarioCombatant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterReport {
    pub name: String,
    pub character_id: CharacterId,
    pub passive_effects: PassiveEffectsSnapshot,
    pub stats: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub encounter: EncounterSnapshot,
    pub characters: Vec<CharacterReport>,
}

impl ScenarioReport {
    pub fn character(&self, name: &str) -> Option<&CharacterReport> {
        self.characters.iter().find(|character| character.name == name)
    }
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// A small skirmish between two adventurers and two goblins.
    pub fn builtin() -> Self {
        let scores = |entries: &[(AbilityScoreType, i32)]| -> BTreeMap<AbilityScoreType, i32> {
            entries.iter().copied().collect()
        };
        let strings =
            |entries: &[&str]| -> Vec<String> { entries.iter().map(|s| s.to_string()).collect() };

        Self {
            rounds: default_rounds(),
            combatants: vec![
                ScenarioCombatant {
                    name: "Valeros".to_string(),
                    initiative: 18,
                    player_controlled: true,
                    alive: true,
                    level: Some(1),
                    ability_scores: scores(&[
                        (AbilityScoreType::Strength, 16),
                        (AbilityScoreType::Dexterity, 14),
                        (AbilityScoreType::Constitution, 14),
                        (AbilityScoreType::Wisdom, 12),
                    ]),
                    boosts: vec![AbilityScoreType::Strength],
                    tags: strings(&[
                        "KeyAbility.Strength",
                        "ClassDc.Trained",
                        "Skill.Athletics.Trained",
                        "SavingThrow.Fortitude.Expert",
                        "Perception.Expert",
                        "Armor.Category.Unarmored.Trained",
                    ]),
                    commands: strings(&["Strike", "Stride", "RaiseShield"]),
                },
                ScenarioCombatant {
                    name: "Merisiel".to_string(),
                    initiative: 22,
                    player_controlled: true,
                    alive: true,
                    level: Some(5),
                    ability_scores: scores(&[
                        (AbilityScoreType::Dexterity, 18),
                        (AbilityScoreType::Charisma, 12),
                    ]),
                    boosts: Vec::new(),
                    tags: strings(&[
                        "KeyAbility.Dexterity",
                        "Skill.Stealth.Expert",
                        "SavingThrow.Reflex.Expert",
                        "Armor.Equipped.Light",
                        "Armor.Category.Light.Trained",
                    ]),
                    commands: strings(&["Hide", "Sneak"]),
                },
                ScenarioCombatant {
                    name: "Goblin Warrior".to_string(),
                    initiative: 18,
                    player_controlled: false,
                    alive: true,
                    level: None,
                    ability_scores: scores(&[(AbilityScoreType::Dexterity, 16)]),
                    boosts: Vec::new(),
                    tags: strings(&["Skill.Acrobatics.Trained"]),
                    commands: strings(&["Strike"]),
                },
                ScenarioCombatant {
                    name: "Goblin Archer".to_string(),
                    initiative: 9,
                    player_controlled: false,
                    alive: true,
                    level: None,
                    ability_scores: BTreeMap::new(),
                    boosts: Vec::new(),
                    tags: Vec::new(),
                    commands: Vec::new(),
                },
            ],
        }
    }

    /// Build every combatant, play the configured number of rounds and report the outcome.
    pub fn run(
        &self,
        config: &EngineConfig,
        clock: Arc<dyn ClockPort>,
    ) -> Result<ScenarioReport, ScenarioError> {
        let roster = Arc::new(InMemoryRoster::new());
        let abilities = Arc::new(InMemoryAbilitySystem::new());
        let mut encounter = Encounter::new(roster.clone(), clock)
            .with_rescale_factor(config.initiative_rescale_factor);

        let mut characters = Vec::with_capacity(self.combatants.len());

        for combatant in &self.combatants {
            let id = roster.register(combatant.name.as_str(), combatant.player_controlled);
            roster.set_alive(id, combatant.alive);

            let level = combatant.level.unwrap_or(config.default_character_level);
            let coordinator = build_passive_effects(id, level, combatant, abilities.clone())?;

            encounter.add_combatant(id, combatant.initiative)?;
            for label in &combatant.commands {
                let command = ScriptedCommand::new(id, label.as_str(), CommandExecuteResult::Activated);
                encounter.queue_command(id, Arc::new(command));
            }

            characters.push((combatant.name.clone(), id, coordinator));
        }

        tracing::info!(
            encounter_id = %encounter.id(),
            combatants = characters.len(),
            rounds = self.rounds,
            "Running encounter scenario"
        );

        for _ in 0..self.rounds {
            if !encounter.has_playable_characters() {
                break;
            }

            let living = encounter
                .initiative()
                .sequence()
                .iter()
                .filter(|character| roster.is_alive(**character))
                .count();

            for _ in 0..living {
                let Some(active) = encounter.start_next_turn() else {
                    break;
                };
                encounter.execute_next_command(active);
            }
        }
        encounter.end_turn();

        let characters = characters
            .into_iter()
            .map(|(name, id, coordinator)| CharacterReport {
                name,
                character_id: id,
                passive_effects: coordinator.snapshot(),
                stats: stat_sheet(abilities.as_ref(), id),
            })
            .collect();

        Ok(ScenarioReport {
            encounter: encounter.snapshot(),
            characters,
        })
    }
}

fn build_passive_effects(
    id: CharacterId,
    level: u8,
    combatant: &ScenarioCombatant,
    abilities: Arc<InMemoryAbilitySystem>,
) -> Result<PassiveEffectCoordinator, ScenarioError> {
    let mut coordinator = PassiveEffectCoordinator::new(id, abilities).with_level(level);

    let scores: Vec<(AbilityScoreType, i32)> = AbilityScoreType::all()
        .into_iter()
        .map(|ability| {
            let score = combatant
                .ability_scores
                .get(&ability)
                .copied()
                .unwrap_or(BASE_ABILITY_SCORE);
            (ability, score)
        })
        .collect();

    coordinator.add_effect_with_default_weight(base_ability_scores_effect(&scores))?;
    for effect in derived_stat_effects() {
        coordinator.add_effect_with_default_weight(effect)?;
    }

    coordinator.set_dynamic_tags(TagContainer::from_names(combatant.tags.iter().cloned())?)?;
    coordinator.activate_all()?;

    for ability in &combatant.boosts {
        coordinator.apply_ability_boost(*ability)?;
    }

    Ok(coordinator)
}

fn stat_sheet(store: &dyn AttributeStore, id: CharacterId) -> BTreeMap<String, f32> {
    let mut attributes = vec![
        Attribute::ArmorClass,
        Attribute::ClassDc,
        Attribute::Perception,
    ];
    for ability in AbilityScoreType::all() {
        attributes.push(Attribute::AbilityScore(ability));
        attributes.push(Attribute::AbilityModifier(ability));
    }
    for save in [
        Pf2eSavingThrow::Fortitude,
        Pf2eSavingThrow::Reflex,
        Pf2eSavingThrow::Will,
    ] {
        attributes.push(Attribute::SavingThrow(save));
    }
    attributes.extend(Pf2eSkill::all().into_iter().map(Attribute::Skill));

    attributes
        .into_iter()
        .map(|attribute| (attribute.to_string(), store.get(id, attribute)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<dyn ClockPort> {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 20, 0, 0)
            .single()
            .expect("valid date");
        Arc::new(FixedClock(now))
    }

    fn stat(report: &ScenarioReport, name: &str, attribute: Attribute) -> f32 {
        report
            .character(name)
            .and_then(|character| character.stats.get(&attribute.to_string()).copied())
            .expect("stat present")
    }

    #[test]
    fn test_builtin_scenario_turn_order() {
        let report = Scenario::builtin()
            .run(&EngineConfig::default(), clock())
            .expect("scenario runs");

        let order: Vec<CharacterId> = report
            .encounter
            .initiative
            .entries
            .iter()
            .map(|entry| entry.character_id)
            .collect();
        let id_of = |name: &str| report.character(name).map(|c| c.character_id).expect("present");

        assert_eq!(
            order,
            vec![
                id_of("Merisiel"),
                id_of("Goblin Warrior"),
                id_of("Valeros"),
                id_of("Goblin Archer"),
            ]
        );
        assert_eq!(report.encounter.round, 3);
        assert_eq!(report.encounter.turns.len(), 12);
        assert!(report.encounter.turns.iter().all(|turn| turn.ended_at.is_some()));
    }

    #[test]
    fn test_builtin_scenario_derived_stats() {
        let report = Scenario::builtin()
            .run(&EngineConfig::default(), clock())
            .expect("scenario runs");

        // 16 + 2 (boost) = 18 -> +4; trained at level 1: 4 + 1 + 2
        assert_eq!(stat(&report, "Valeros", Attribute::AbilityScore(AbilityScoreType::Strength)), 18.0);
        assert_eq!(stat(&report, "Valeros", Attribute::Skill(Pf2eSkill::Athletics)), 7.0);
        // 10 + 1 (level) + 2 (Trained) + 4 (Str)
        assert_eq!(stat(&report, "Valeros", Attribute::ClassDc), 17.0);

        // Dex 18 -> +4; expert at level 5: 4 + 5 + 4
        assert_eq!(stat(&report, "Merisiel", Attribute::Skill(Pf2eSkill::Stealth)), 13.0);
        // 10 + 4 (Dex) + 5 (level) + 2 (Trained light armor)
        assert_eq!(stat(&report, "Merisiel", Attribute::ArmorClass), 21.0);

        // Untrained: ability modifier only
        assert_eq!(stat(&report, "Goblin Archer", Attribute::Skill(Pf2eSkill::Stealth)), 0.0);
    }

    #[test]
    fn test_dead_combatants_do_not_act() {
        let json = r#"{
            "rounds": 2,
            "combatants": [
                { "name": "Kyra", "initiative": 15, "player_controlled": true },
                { "name": "Skeleton", "initiative": 12, "alive": false }
            ]
        }"#;
        let scenario = Scenario::from_json(json).expect("valid scenario");

        let report = scenario
            .run(&EngineConfig::default(), clock())
            .expect("scenario runs");

        let kyra = report.character("Kyra").map(|c| c.character_id).expect("present");
        assert_eq!(report.encounter.turns.len(), 2);
        assert!(report.encounter.turns.iter().all(|turn| turn.character_id == kyra));
        assert_eq!(report.encounter.round, 2);
    }

    #[test]
    fn test_invalid_initiative_fails_the_scenario() {
        let json = r#"{ "combatants": [ { "name": "Broken", "initiative": 0 } ] }"#;
        let scenario = Scenario::from_json(json).expect("valid json");
        assert_eq!(scenario.rounds, 3);

        let result = scenario.run(&EngineConfig::default(), clock());

        assert!(matches!(result, Err(ScenarioError::Encounter(_))));
    }

    #[test]
    fn test_scripted_command_counts_executions() {
        let command = ScriptedCommand::new(CharacterId::new(), "Strike", CommandExecuteResult::Activated)
            .with_position(QueuePosition::BeginningOfQueue);

        assert_eq!(command.execute(), CommandExecuteResult::Activated);
        assert_eq!(command.execute(), CommandExecuteResult::Activated);
        assert_eq!(command.executions(), 2);
        assert_eq!(command.queue_position(), QueuePosition::BeginningOfQueue);
        assert_eq!(command.id_for_logs(), "Strike");
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            Scenario::from_json("{ \"rounds\": 1 }"),
            Err(ScenarioError::Parse(_))
        ));
    }
}
