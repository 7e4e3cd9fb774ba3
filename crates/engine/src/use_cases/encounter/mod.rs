//! Encounter use cases.
//!
//! Handles the turn-based flow of a single encounter:
//! - Adding and removing combatants, and moving them around in initiative
//! - Starting and ending turns, counting rounds
//! - Queueing and executing the commands each character lines up for its turn

mod scenario;

pub use scenario::{
    CharacterReport, Scenario, ScenarioCombatant, ScenarioError, ScenarioReport, ScriptedCommand,
};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use openpf2_domain::{
    CharacterCommand, CharacterId, CommandExecuteResult, CommandQueue, EncounterId,
    InitiativeScore,
};
use serde::{Deserialize, Serialize};

use crate::entities::{InitiativeError, InitiativeQueue, InitiativeSnapshot};
use crate::infrastructure::ports::{ClockPort, CombatantRoster};

#[derive(Debug, thiserror::Error)]
pub enum EncounterError {
    #[error("Initiative error: {0}")]
    Initiative(#[from] InitiativeError),
}

/// One turn taken during the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub round: u32,
    pub character_id: CharacterId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Read-only view of an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSnapshot {
    pub id: EncounterId,
    pub round: u32,
    pub active_character: Option<CharacterId>,
    pub initiative: InitiativeSnapshot,
    pub turns: Vec<TurnRecord>,
}

/// Turn order, turn flow and command queues for one encounter.
pub struct Encounter {
    id: EncounterId,
    roster: Arc<dyn CombatantRoster>,
    clock: Arc<dyn ClockPort>,
    initiative: InitiativeQueue,
    command_queues: HashMap<CharacterId, CommandQueue>,
    command_queue_limit: Option<usize>,
    active_character: Option<CharacterId>,
    round: u32,
    turn_log: Vec<TurnRecord>,
}

impl Encounter {
    pub fn new(roster: Arc<dyn CombatantRoster>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            id: EncounterId::new(),
            initiative: InitiativeQueue::new(roster.clone()),
            roster,
            clock,
            command_queues: HashMap::new(),
            command_queue_limit: None,
            active_character: None,
            round: 0,
            turn_log: Vec::new(),
        }
    }

    /// Use a different initiative rescale multiplier.
    pub fn with_rescale_factor(mut self, factor: i32) -> Self {
        self.initiative = self.initiative.with_rescale_factor(factor);
        self
    }

    /// Cap every character's command queue at `limit` commands.
    pub fn with_command_queue_limit(mut self, limit: usize) -> Self {
        self.command_queue_limit = Some(limit);
        self
    }

    pub fn id(&self) -> EncounterId {
        self.id
    }

    pub fn initiative(&self) -> &InitiativeQueue {
        &self.initiative
    }

    // =========================================================================
    // Combatants
    // =========================================================================

    /// Add a combatant with a rolled initiative (or change the score of one already in).
    pub fn add_combatant(&mut self, character: CharacterId, score: i32) -> Result<(), EncounterError> {
        self.initiative.set_initiative(character, score)?;

        tracing::debug!(
            encounter_id = %self.id,
            character = %self.roster.id_for_logs(character),
            score,
            "Combatant joined encounter"
        );
        Ok(())
    }

    /// Remove a combatant, ending its turn and dropping its queued commands.
    ///
    /// Returns false if the combatant was not part of the encounter.
    pub fn remove_combatant(&mut self, character: CharacterId) -> bool {
        if self.active_character == Some(character) {
            self.end_turn();
        }

        self.command_queues.remove(&character);
        let removed = self.initiative.clear_initiative(character);

        if removed {
            tracing::debug!(
                encounter_id = %self.id,
                character = %self.roster.id_for_logs(character),
                "Combatant left encounter"
            );
        }

        removed
    }

    pub fn remove_all_combatants(&mut self) {
        self.end_turn();
        self.command_queues.clear();
        self.initiative.clear_all();

        tracing::debug!(encounter_id = %self.id, "Removed all combatants");
    }

    /// Move `affected` just above `other` in initiative.
    ///
    /// Returns the new score, or `None` if `other` has no initiative.
    pub fn move_initiative_higher_than(
        &mut self,
        affected: CharacterId,
        other: CharacterId,
    ) -> Result<Option<InitiativeScore>, EncounterError> {
        let Some(target) = self.initiative_of_other(affected, other) else {
            return Ok(None);
        };

        Ok(Some(self.initiative.insert_at_or_above(affected, target.value())?))
    }

    /// Move `affected` just below `other` in initiative.
    ///
    /// Returns the new score, or `None` if `other` has no initiative.
    pub fn move_initiative_lower_than(
        &mut self,
        affected: CharacterId,
        other: CharacterId,
    ) -> Result<Option<InitiativeScore>, EncounterError> {
        let Some(target) = self.initiative_of_other(affected, other) else {
            return Ok(None);
        };

        Ok(Some(self.initiative.insert_at_or_below(affected, target.value())?))
    }

    fn initiative_of_other(&self, affected: CharacterId, other: CharacterId) -> Option<InitiativeScore> {
        let score = self.initiative.initiative_of(other);

        if score.is_none() {
            tracing::warn!(
                encounter_id = %self.id,
                affected = %self.roster.id_for_logs(affected),
                other = %self.roster.id_for_logs(other),
                "Cannot move initiative relative to a combatant without initiative"
            );
        }

        score
    }

    /// True if any combatant in initiative is still alive.
    pub fn has_playable_characters(&self) -> bool {
        self.initiative
            .sequence()
            .iter()
            .any(|character| self.roster.is_alive(*character))
    }

    // =========================================================================
    // Turn Flow
    // =========================================================================

    /// End the current turn (if any) and start the next living combatant's turn.
    ///
    /// The round counter advances every time the turn order passes its first
    /// combatant. Returns `None` if nobody can act.
    pub fn start_next_turn(&mut self) -> Option<CharacterId> {
        self.end_turn();

        let first = self.initiative.sequence().first().copied();

        for _ in 0..self.initiative.len() {
            let candidate = self.initiative.next()?;

            if Some(candidate) == first {
                self.round += 1;
                tracing::debug!(encounter_id = %self.id, round = self.round, "Round started");
            }

            if !self.roster.is_alive(candidate) {
                tracing::trace!(
                    encounter_id = %self.id,
                    character = %self.roster.id_for_logs(candidate),
                    "Skipping turn of defeated combatant"
                );
                continue;
            }

            self.active_character = Some(candidate);
            self.turn_log.push(TurnRecord {
                round: self.round,
                character_id: candidate,
                started_at: self.clock.now(),
                ended_at: None,
            });

            tracing::debug!(
                encounter_id = %self.id,
                character = %self.roster.id_for_logs(candidate),
                round = self.round,
                "Turn started"
            );
            return Some(candidate);
        }

        tracing::debug!(encounter_id = %self.id, "No combatant can take a turn");
        None
    }

    /// End the active character's turn. Returns the character whose turn ended.
    pub fn end_turn(&mut self) -> Option<CharacterId> {
        let character = self.active_character.take()?;
        let now = self.clock.now();

        if let Some(record) = self
            .turn_log
            .iter_mut()
            .rev()
            .find(|record| record.character_id == character && record.ended_at.is_none())
        {
            record.ended_at = Some(now);
        }

        tracing::debug!(
            encounter_id = %self.id,
            character = %self.roster.id_for_logs(character),
            "Turn ended"
        );
        Some(character)
    }

    pub fn active_character(&self) -> Option<CharacterId> {
        self.active_character
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn_log(&self) -> &[TurnRecord] {
        &self.turn_log
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Queue a command for `character`, honouring the command's queue position.
    ///
    /// Returns false if the command was already queued or did not fit.
    pub fn queue_command(&mut self, character: CharacterId, command: Arc<dyn CharacterCommand>) -> bool {
        let label = command.id_for_logs();
        let position = command.queue_position();
        let limit = self.command_queue_limit;

        let queued = self
            .command_queues
            .entry(character)
            .or_insert_with(|| match limit {
                Some(limit) => CommandQueue::with_size_limit(limit),
                None => CommandQueue::new(),
            })
            .enqueue_with_preference(command);

        if queued {
            tracing::debug!(
                encounter_id = %self.id,
                character = %self.roster.id_for_logs(character),
                command = %label,
                %position,
                "Command queued"
            );
        } else {
            tracing::warn!(
                encounter_id = %self.id,
                character = %self.roster.id_for_logs(character),
                command = %label,
                "Command was not queued"
            );
        }

        queued
    }

    pub fn peek_next_command(&self, character: CharacterId) -> Option<Arc<dyn CharacterCommand>> {
        self.command_queues.get(&character)?.peek_next()
    }

    pub fn pop_next_command(&mut self, character: CharacterId) -> Option<Arc<dyn CharacterCommand>> {
        self.command_queues.get_mut(&character)?.pop_next()
    }

    pub fn has_next_command(&self, character: CharacterId) -> bool {
        self.command_queues
            .get(&character)
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Execute the character's next command. Blocked commands stay queued.
    pub fn execute_next_command(&mut self, character: CharacterId) -> CommandExecuteResult {
        let Some(queue) = self.command_queues.get_mut(&character) else {
            return CommandExecuteResult::None;
        };

        let label = queue.peek_next().map(|command| command.id_for_logs());
        let result = queue.pop_and_execute_next();

        if let Some(label) = label {
            tracing::debug!(
                encounter_id = %self.id,
                character = %self.roster.id_for_logs(character),
                command = %label,
                ?result,
                "Executed command"
            );
        }

        result
    }

    pub fn cancel_commands_for(&mut self, character: CharacterId) {
        if let Some(queue) = self.command_queues.get_mut(&character) {
            queue.clear();
        }
    }

    pub fn cancel_all_commands(&mut self) {
        for queue in self.command_queues.values_mut() {
            queue.clear();
        }

        tracing::debug!(encounter_id = %self.id, "Cancelled all queued commands");
    }

    pub fn snapshot(&self) -> EncounterSnapshot {
        EncounterSnapshot {
            id: self.id,
            round: self.round,
            active_character: self.active_character,
            initiative: self.initiative.snapshot(),
            turns: self.turn_log.clone(),
        }
    }
}
