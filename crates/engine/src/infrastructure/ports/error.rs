//! Error types for port operations.

use openpf2_domain::CharacterId;

/// Failures reported by an effect sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectSinkError {
    /// The sink has no record of the target character.
    #[error("Unknown effect target: {0}")]
    UnknownTarget(CharacterId),

    /// The sink refused to apply an effect.
    #[error("Effect '{effect}' was rejected: {reason}")]
    Rejected { effect: String, reason: String },

    /// Removing effects failed part-way.
    #[error("Effect removal failed: {0}")]
    RemovalFailed(String),
}

impl EffectSinkError {
    pub fn rejected(effect: impl ToString, reason: impl ToString) -> Self {
        Self::Rejected {
            effect: effect.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn removal_failed(message: impl ToString) -> Self {
        Self::RemovalFailed(message.to_string())
    }
}
