//! In-memory adapters for the engine's ports.

mod ability_system;
mod roster;

pub use ability_system::{ActiveEffectSummary, InMemoryAbilitySystem};
pub use roster::{InMemoryRoster, RosterEntry};
