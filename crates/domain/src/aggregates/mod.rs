//! Aggregate roots - domain objects that own their related data
//!
//! Each aggregate:
//! - Has a unique identity or is owned by one that does
//! - Owns all its constituent parts (enforced by Rust ownership)
//! - Exposes behavior through methods, not public fields

pub mod command_queue;

pub use command_queue::{CharacterCommand, CommandExecuteResult, CommandQueue, QueuePosition};
