//! Initiative queue - turn order for the combatants in an encounter.
//!
//! Scores live in an unsorted `score -> combatants` multimap. Every mutation derives a
//! fresh ordered sequence from it:
//!
//! 1. Higher scores act first.
//! 2. On a tie, NPCs act before player characters (Core Rulebook, page 13,
//!    "Step 1: Roll Initiative").
//! 3. Remaining ties fall back to creation order, oldest first.
//!
//! A cursor remembers the last combatant handed out by [`InitiativeQueue::next`], so
//! reordering or removing combatants mid-round never skips or repeats a turn.

use std::collections::HashMap;
use std::sync::Arc;

use openpf2_domain::{CharacterId, InitiativeScore};
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::CombatantRoster;

/// Multiplier used to free a slot between two adjacent scores.
pub const DEFAULT_RESCALE_FACTOR: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitiativeError {
    #[error("Invalid initiative score: {0} (must be greater than 0)")]
    InvalidScore(i32),

    #[error("Rescaling initiative by {factor} overflows (highest score is {highest})")]
    ScoreOverflow { factor: i32, highest: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Above,
    Below,
}

impl Placement {
    fn offset(self) -> i32 {
        match self {
            Placement::Above => 1,
            Placement::Below => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    /// Position of `last_returned` in the current sequence; `None` means "before start".
    index: Option<usize>,
    last_returned: Option<CharacterId>,
}

/// A combatant and its score, as exposed to snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub character_id: CharacterId,
    pub score: InitiativeScore,
}

/// Read-only view of the queue in turn order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeSnapshot {
    pub entries: Vec<InitiativeEntry>,
    /// The combatant most recently returned by `next()`.
    pub current: Option<CharacterId>,
}

pub struct InitiativeQueue {
    roster: Arc<dyn CombatantRoster>,
    rescale_factor: i32,
    characters_by_score: HashMap<InitiativeScore, Vec<CharacterId>>,
    sequence: Vec<CharacterId>,
    cursor: Cursor,
}

impl InitiativeQueue {
    pub fn new(roster: Arc<dyn CombatantRoster>) -> Self {
        Self {
            roster,
            rescale_factor: DEFAULT_RESCALE_FACTOR,
            characters_by_score: HashMap::new(),
            sequence: Vec::new(),
            cursor: Cursor::default(),
        }
    }

    /// Use a different rescale multiplier. Values below 2 cannot free a slot and are raised to 2.
    pub fn with_rescale_factor(mut self, factor: i32) -> Self {
        self.rescale_factor = factor.max(2);
        self
    }

    pub fn rescale_factor(&self) -> i32 {
        self.rescale_factor
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Set (or change) a combatant's score.
    pub fn set_initiative(&mut self, character: CharacterId, score: i32) -> Result<(), InitiativeError> {
        let score = self.validate(character, score)?;

        if self.initiative_of(character) == Some(score) {
            tracing::trace!(
                character = %self.roster.id_for_logs(character),
                %score,
                "Initiative unchanged"
            );
            return Ok(());
        }

        self.assign(character, score);
        Ok(())
    }

    /// Place a combatant at `target`, or just above whoever already holds it.
    ///
    /// Returns the score the combatant ended up with.
    pub fn insert_at_or_above(
        &mut self,
        character: CharacterId,
        target: i32,
    ) -> Result<InitiativeScore, InitiativeError> {
        self.insert_relative(character, target, Placement::Above)
    }

    /// Place a combatant at `target`, or just below whoever already holds it.
    ///
    /// Returns the score the combatant ended up with.
    pub fn insert_at_or_below(
        &mut self,
        character: CharacterId,
        target: i32,
    ) -> Result<InitiativeScore, InitiativeError> {
        self.insert_relative(character, target, Placement::Below)
    }

    /// Remove a combatant from the queue. Returns false if it had no initiative.
    pub fn clear_initiative(&mut self, character: CharacterId) -> bool {
        match self.remove_entry(character) {
            Some(score) => {
                self.rebuild();
                tracing::debug!(
                    character = %self.roster.id_for_logs(character),
                    %score,
                    "Cleared initiative"
                );
                true
            }
            None => {
                tracing::trace!(
                    character = %self.roster.id_for_logs(character),
                    "No initiative to clear"
                );
                false
            }
        }
    }

    pub fn clear_all(&mut self) {
        self.characters_by_score.clear();
        self.sequence.clear();
        self.cursor = Cursor::default();

        tracing::debug!("Cleared initiative for all combatants");
    }

    /// Hand out the next combatant in turn order, wrapping around after the last one.
    pub fn next(&mut self) -> Option<CharacterId> {
        if self.sequence.is_empty() {
            self.cursor = Cursor::default();
            return None;
        }

        let index = match self.cursor.index {
            Some(current) if current + 1 < self.sequence.len() => current + 1,
            _ => 0,
        };
        let character = *self.sequence.get(index)?;

        self.cursor = Cursor {
            index: Some(index),
            last_returned: Some(character),
        };

        Some(character)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Combatants in turn order.
    pub fn sequence(&self) -> &[CharacterId] {
        &self.sequence
    }

    pub fn initiative_of(&self, character: CharacterId) -> Option<InitiativeScore> {
        self.characters_by_score
            .iter()
            .find(|(_, characters)| characters.contains(&character))
            .map(|(score, _)| *score)
    }

    pub fn has_initiative(&self, character: CharacterId) -> bool {
        self.initiative_of(character).is_some()
    }

    /// The combatant most recently returned by [`next`](Self::next).
    pub fn current(&self) -> Option<CharacterId> {
        self.cursor.last_returned
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn snapshot(&self) -> InitiativeSnapshot {
        let scores: HashMap<CharacterId, InitiativeScore> = self
            .characters_by_score
            .iter()
            .flat_map(|(score, characters)| characters.iter().map(|c| (*c, *score)))
            .collect();

        let entries = self
            .sequence
            .iter()
            .filter_map(|character| {
                scores.get(character).map(|score| InitiativeEntry {
                    character_id: *character,
                    score: *score,
                })
            })
            .collect();

        InitiativeSnapshot {
            entries,
            current: self.cursor.last_returned,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate(&self, character: CharacterId, score: i32) -> Result<InitiativeScore, InitiativeError> {
        InitiativeScore::new(score).map_err(|_| {
            tracing::error!(
                character = %self.roster.id_for_logs(character),
                score,
                "Initiative must be greater than 0; ignoring request"
            );
            InitiativeError::InvalidScore(score)
        })
    }

    fn insert_relative(
        &mut self,
        character: CharacterId,
        target: i32,
        placement: Placement,
    ) -> Result<InitiativeScore, InitiativeError> {
        let target = self.validate(character, target)?;

        if self.initiative_of(character) == Some(target) {
            tracing::trace!(
                character = %self.roster.id_for_logs(character),
                %target,
                "Combatant already holds the requested initiative"
            );
            return Ok(target);
        }

        if !self.is_score_taken(target) {
            self.assign(character, target);
            return Ok(target);
        }

        // The neighbouring slot counts as taken even when the moving combatant holds it.
        let neighbour = target
            .offset_by(placement.offset())
            .filter(|score| !self.is_score_taken(*score));

        let resolved = match neighbour {
            Some(score) => score,
            None => {
                let resolved = target
                    .scaled_by(self.rescale_factor)
                    .and_then(|score| score.offset_by(placement.offset()))
                    .ok_or_else(|| self.overflow_error())?;

                self.rescale_all()?;
                resolved
            }
        };

        self.assign(character, resolved);
        Ok(resolved)
    }

    fn is_score_taken(&self, score: InitiativeScore) -> bool {
        self.characters_by_score
            .get(&score)
            .is_some_and(|characters| !characters.is_empty())
    }

    fn assign(&mut self, character: CharacterId, score: InitiativeScore) {
        self.remove_entry(character);
        self.characters_by_score
            .entry(score)
            .or_default()
            .push(character);
        self.rebuild();

        tracing::debug!(
            character = %self.roster.id_for_logs(character),
            %score,
            "Set initiative"
        );
    }

    /// Multiply every score by the rescale factor; all-or-nothing.
    fn rescale_all(&mut self) -> Result<(), InitiativeError> {
        let mut rescaled = HashMap::with_capacity(self.characters_by_score.len());

        for (score, characters) in &self.characters_by_score {
            let scaled = score
                .scaled_by(self.rescale_factor)
                .ok_or_else(|| self.overflow_error())?;
            rescaled.insert(scaled, characters.clone());
        }

        self.characters_by_score = rescaled;

        tracing::debug!(
            factor = self.rescale_factor,
            combatants = self.sequence.len(),
            "Rescaled initiative to free a slot"
        );

        Ok(())
    }

    fn overflow_error(&self) -> InitiativeError {
        let highest = self
            .characters_by_score
            .keys()
            .map(|score| score.value())
            .max()
            .unwrap_or(0);

        tracing::error!(
            factor = self.rescale_factor,
            highest,
            "Initiative rescale would overflow; ignoring request"
        );

        InitiativeError::ScoreOverflow {
            factor: self.rescale_factor,
            highest,
        }
    }

    /// Remove a combatant's entry without rebuilding, rewinding the cursor first if needed.
    fn remove_entry(&mut self, character: CharacterId) -> Option<InitiativeScore> {
        let score = self.initiative_of(character)?;

        if self.cursor.last_returned == Some(character) {
            self.rewind_cursor_before(character);
        }

        if let Some(characters) = self.characters_by_score.get_mut(&score) {
            characters.retain(|c| *c != character);
            if characters.is_empty() {
                self.characters_by_score.remove(&score);
            }
        }

        Some(score)
    }

    /// Point the cursor at the combatant before `character`, so the next call to `next()`
    /// returns whoever followed it.
    fn rewind_cursor_before(&mut self, character: CharacterId) {
        let previous = self
            .sequence
            .iter()
            .position(|c| *c == character)
            .and_then(|position| match position {
                0 => self.sequence.last(),
                _ => self.sequence.get(position - 1),
            })
            .copied()
            .filter(|previous| *previous != character);

        match previous {
            Some(previous) => self.cursor.last_returned = Some(previous),
            None => self.cursor = Cursor::default(),
        }
    }

    fn rebuild(&mut self) {
        let roster = &self.roster;

        let mut groups: Vec<(InitiativeScore, Vec<CharacterId>)> = self
            .characters_by_score
            .iter()
            .map(|(score, characters)| (*score, characters.clone()))
            .collect();

        groups.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, characters) in &mut groups {
            characters.sort_by_key(|character| {
                (
                    roster.is_player_controlled(*character),
                    roster.creation_order(*character).unwrap_or(u64::MAX),
                )
            });
        }

        self.sequence = groups
            .into_iter()
            .flat_map(|(_, characters)| characters)
            .collect();

        let index = self
            .cursor
            .last_returned
            .and_then(|last| self.sequence.iter().position(|c| *c == last));

        self.cursor = match index {
            Some(index) => Cursor {
                index: Some(index),
                last_returned: self.cursor.last_returned,
            },
            None => Cursor::default(),
        };
    }
}
