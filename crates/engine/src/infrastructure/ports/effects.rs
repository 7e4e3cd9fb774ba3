//! Ports to the ability system that owns applied effects and attribute values.

use openpf2_domain::{CharacterId, TagContainer};

use super::error::EffectSinkError;
use super::types::{EffectHandle, EffectQuery, EffectSpec};
use crate::entities::Attribute;

// =============================================================================
// Effect Application
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait EffectSink: Send + Sync {
    fn apply(&self, target: CharacterId, spec: &EffectSpec) -> Result<EffectHandle, EffectSinkError>;

    /// Remove every active effect on `target` matching `query`; returns how many were removed.
    fn remove_matching(&self, target: CharacterId, query: &EffectQuery) -> Result<usize, EffectSinkError>;
}

// =============================================================================
// Attribute Access
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait AttributeStore: Send + Sync {
    /// Current value: base plus every active modifier, clamped where the attribute requires it.
    fn get(&self, target: CharacterId, attribute: Attribute) -> f32;

    fn set_base(&self, target: CharacterId, attribute: Attribute, value: f32);

    /// Tags granted to `target` by its active effects.
    fn owned_tags(&self, target: CharacterId) -> TagContainer;
}
