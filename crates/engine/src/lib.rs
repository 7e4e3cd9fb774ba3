//! OpenPF2 Engine library.
//!
//! This crate contains the rule-engine side of OpenPF2: turn order, passive effects
//! and encounter flow.
//!
//! ## Structure
//!
//! - `entities/` - Initiative queue, passive effect coordinator, effect definitions
//! - `use_cases/` - Encounter flow orchestration across entities
//! - `infrastructure/` - Port traits, in-memory adapters, configuration

pub mod entities;
pub mod infrastructure;
pub mod use_cases;
