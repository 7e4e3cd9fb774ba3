//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Combatant facts (creation order, control, alive state)
//! - The ability system that applies effects and aggregates attributes
//! - Clock (for testing)

mod combat;
mod effects;
mod error;
mod testing;
pub mod types;

// =============================================================================
// Encounter Ports
// =============================================================================
pub use combat::CombatantRoster;

// =============================================================================
// Ability System Ports
// =============================================================================
pub use effects::{AttributeStore, EffectSink};
pub use types::{EffectHandle, EffectQuery, EffectSpec};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use combat::MockCombatantRoster;

#[cfg(test)]
pub use effects::{MockAttributeStore, MockEffectSink};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::EffectSinkError;
