//! In-memory combatant roster.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use openpf2_domain::CharacterId;
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::CombatantRoster;

/// What the roster knows about one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub creation_order: u64,
    pub player_controlled: bool,
    pub alive: bool,
}

/// Roster backed by a concurrent map; creation order is assigned on registration.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    entries: DashMap<CharacterId, RosterEntry>,
    next_order: AtomicU64,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, living combatant.
    pub fn register(&self, name: impl Into<String>, player_controlled: bool) -> CharacterId {
        let id = CharacterId::new();
        self.register_with_id(id, name, player_controlled);
        id
    }

    /// Register (or re-register) a combatant under a known id.
    ///
    /// Re-registering keeps the original creation order.
    pub fn register_with_id(&self, id: CharacterId, name: impl Into<String>, player_controlled: bool) {
        let name = name.into();

        self.entries
            .entry(id)
            .and_modify(|entry| {
                entry.name = name.clone();
                entry.player_controlled = player_controlled;
            })
            .or_insert_with(|| RosterEntry {
                name,
                creation_order: self.next_order.fetch_add(1, Ordering::SeqCst),
                player_controlled,
                alive: true,
            });
    }

    /// Returns false if the combatant is unknown.
    pub fn set_alive(&self, id: CharacterId, alive: bool) -> bool {
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.alive = alive;
                true
            }
            None => false,
        }
    }

    pub fn entry(&self, id: CharacterId) -> Option<RosterEntry> {
        self.entries.get(&id).map(|entry| entry.clone())
    }

    pub fn name_of(&self, id: CharacterId) -> Option<String> {
        self.entries.get(&id).map(|entry| entry.name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CombatantRoster for InMemoryRoster {
    fn creation_order(&self, id: CharacterId) -> Option<u64> {
        self.entries.get(&id).map(|entry| entry.creation_order)
    }

    fn is_player_controlled(&self, id: CharacterId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.player_controlled)
    }

    fn is_alive(&self, id: CharacterId) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.alive)
    }

    fn id_for_logs(&self, id: CharacterId) -> String {
        self.entries
            .get(&id)
            .map(|entry| format!("{} ({})", entry.name, id))
            .unwrap_or_else(|| id.to_string())
    }
}
