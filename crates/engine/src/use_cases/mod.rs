//! Use cases - Rule-flow orchestration.
//!
//! Use cases orchestrate across entity modules to run an encounter.

pub mod encounter;

pub use encounter::{Encounter, EncounterError, EncounterSnapshot, Scenario, TurnRecord};
