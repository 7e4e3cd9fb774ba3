//! Initiative score value object.
//!
//! From the Pathfinder 2E Core Rulebook, page 13, "Initiative": the higher the result of
//! the roll, the earlier a creature gets to act. Scores are strictly positive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A validated, strictly positive initiative score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct InitiativeScore(i32);

impl InitiativeScore {
    pub fn new(value: i32) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::invalid_initiative(value));
        }

        Ok(Self(value))
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Shift by `offset`, or `None` if the result would not be a valid score.
    pub fn offset_by(self, offset: i32) -> Option<Self> {
        self.0
            .checked_add(offset)
            .and_then(|value| Self::new(value).ok())
    }

    /// Multiply by `factor`, or `None` on overflow.
    pub fn scaled_by(self, factor: i32) -> Option<Self> {
        self.0
            .checked_mul(factor)
            .and_then(|value| Self::new(value).ok())
    }
}

impl fmt::Display for InitiativeScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for InitiativeScore {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InitiativeScore> for i32 {
    fn from(score: InitiativeScore) -> Self {
        score.0
    }
}
