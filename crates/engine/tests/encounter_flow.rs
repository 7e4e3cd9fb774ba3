//! Encounter flow: turns, rounds and commands wired through the public API.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use openpf2_domain::{CharacterCommand, CommandExecuteResult, QueuePosition};
use openpf2_engine::infrastructure::clock::FixedClock;
use openpf2_engine::infrastructure::config::EngineConfig;
use openpf2_engine::infrastructure::memory::InMemoryRoster;
use openpf2_engine::use_cases::encounter::{Encounter, Scenario, ScriptedCommand};

fn encounter(roster: &Arc<InMemoryRoster>) -> Encounter {
    let now = Utc
        .with_ymd_and_hms(2024, 3, 9, 18, 30, 0)
        .single()
        .expect("valid date");
    Encounter::new(roster.clone(), Arc::new(FixedClock(now)))
}

#[test]
fn test_combatant_joining_mid_round_acts_in_score_order() {
    let roster = Arc::new(InMemoryRoster::new());
    let amiri = roster.register("Amiri", true);
    let ezren = roster.register("Ezren", true);
    let ogre = roster.register("Ogre", false);
    let mut encounter = encounter(&roster);
    encounter.add_combatant(amiri, 20).expect("valid");
    encounter.add_combatant(ezren, 5).expect("valid");

    assert_eq!(encounter.start_next_turn(), Some(amiri));

    // Joins between the two, after the current turn.
    encounter.add_combatant(ogre, 12).expect("valid");

    assert_eq!(encounter.start_next_turn(), Some(ogre));
    assert_eq!(encounter.start_next_turn(), Some(ezren));
    assert_eq!(encounter.round(), 1);
    assert_eq!(encounter.start_next_turn(), Some(amiri));
    assert_eq!(encounter.round(), 2);
}

#[test]
fn test_delaying_below_another_combatant() {
    let roster = Arc::new(InMemoryRoster::new());
    let kyra = roster.register("Kyra", true);
    let seelah = roster.register("Seelah", true);
    let mut encounter = encounter(&roster).with_rescale_factor(100);
    encounter.add_combatant(kyra, 15).expect("valid");
    encounter.add_combatant(seelah, 14).expect("valid");

    // 14 is taken, 13 is free.
    let delayed = encounter
        .move_initiative_lower_than(kyra, seelah)
        .expect("no overflow")
        .expect("seelah has initiative");

    assert_eq!(delayed.value(), 13);
    assert_eq!(encounter.initiative().sequence(), &[seelah, kyra]);
}

#[test]
fn test_commands_run_during_turns() {
    let roster = Arc::new(InMemoryRoster::new());
    let lem = roster.register("Lem", true);
    let mut encounter = encounter(&roster);
    encounter.add_combatant(lem, 11).expect("valid");

    let perform = Arc::new(ScriptedCommand::new(lem, "Perform", CommandExecuteResult::Activated));
    let counter = Arc::new(
        ScriptedCommand::new(lem, "Counterspell", CommandExecuteResult::Blocked)
            .with_position(QueuePosition::BeginningOfQueue),
    );
    assert!(encounter.queue_command(lem, perform.clone()));

    let active = encounter.start_next_turn().expect("lem acts");
    assert_eq!(encounter.execute_next_command(active), CommandExecuteResult::Activated);
    assert_eq!(perform.executions(), 1);
    assert!(!encounter.has_next_command(lem));

    assert!(encounter.queue_command(lem, counter.clone()));
    assert_eq!(encounter.execute_next_command(lem), CommandExecuteResult::Blocked);
    assert_eq!(
        encounter.peek_next_command(lem).map(|command| command.id()),
        Some(counter.id())
    );

    encounter.remove_all_combatants();
    assert!(!encounter.has_next_command(lem));
    assert!(encounter.initiative().is_empty());
    assert_eq!(encounter.active_character(), None);
}

#[test]
fn test_scenario_file_format() {
    let json = r#"{
        "rounds": 1,
        "combatants": [
            {
                "name": "Harsk",
                "initiative": 14,
                "player_controlled": true,
                "level": 3,
                "ability_scores": { "Wisdom": 16 },
                "tags": ["Perception.Expert"],
                "commands": ["Seek"]
            },
            { "name": "Wolf", "initiative": 14 }
        ]
    }"#;

    let report = Scenario::from_json(json)
        .expect("valid scenario")
        .run(&EngineConfig::default(), Arc::new(FixedClock(Utc::now())))
        .expect("scenario runs");

    let harsk = report.character("Harsk").expect("present");
    // Wis 16 -> +3; expert at level 3: 3 + 3 + 4
    assert_eq!(harsk.stats.get("PerceptionModifier").copied(), Some(10.0));
    assert_eq!(harsk.passive_effects.level, 3);

    let wolf = report.character("Wolf").expect("present");
    assert_eq!(report.encounter.turns.len(), 2);
    assert_eq!(report.encounter.turns[0].character_id, wolf.character_id);
}
