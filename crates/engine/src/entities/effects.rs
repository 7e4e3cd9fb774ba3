//! Passive effect definitions.
//!
//! An [`EffectDefinition`] is the reusable template (what an effect grants and which
//! attributes it modifies). The coordinator turns it into an
//! [`EffectSpec`](crate::infrastructure::ports::EffectSpec) each time its weight group is
//! activated, stamping the owner, level and weight-group tag.

use std::fmt;
use std::sync::Arc;

use openpf2_domain::{EffectId, TagContainer, WeightGroup};
use serde::{Deserialize, Serialize};

use super::attributes::Attribute;

/// How a modifier combines with the attribute's running value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierOp {
    Add,
    Multiply,
    Override,
}

impl ModifierOp {
    pub fn apply(self, current: f32, magnitude: f32) -> f32 {
        match self {
            ModifierOp::Add => current + magnitude,
            ModifierOp::Multiply => current * magnitude,
            ModifierOp::Override => magnitude,
        }
    }
}

/// Values a calculated magnitude can read while an effect is being applied.
pub struct MagnitudeContext<'a> {
    level: u8,
    tags: &'a TagContainer,
    lookup: &'a dyn Fn(Attribute) -> f32,
}

impl<'a> MagnitudeContext<'a> {
    pub fn new(level: u8, tags: &'a TagContainer, lookup: &'a dyn Fn(Attribute) -> f32) -> Self {
        Self {
            level,
            tags,
            lookup,
        }
    }

    /// Level of the character the effect is applied to.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Tags the target owns at the time of application.
    pub fn tags(&self) -> &TagContainer {
        self.tags
    }

    /// Current value of an attribute on the target.
    pub fn attribute(&self, attribute: Attribute) -> f32 {
        (self.lookup)(attribute)
    }
}

/// A magnitude computed from the target's state when the effect is applied.
pub trait MagnitudeCalculation: Send + Sync {
    /// Name used in logs and snapshots.
    fn name(&self) -> String;

    fn calculate(&self, context: &MagnitudeContext<'_>) -> f32;
}

#[derive(Clone)]
pub enum Magnitude {
    Constant(f32),
    Calculated(Arc<dyn MagnitudeCalculation>),
}

impl Magnitude {
    pub fn resolve(&self, context: &MagnitudeContext<'_>) -> f32 {
        match self {
            Magnitude::Constant(value) => *value,
            Magnitude::Calculated(calculation) => calculation.calculate(context),
        }
    }
}

impl fmt::Debug for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Magnitude::Calculated(calculation) => {
                f.debug_tuple("Calculated").field(&calculation.name()).finish()
            }
        }
    }
}

/// A single attribute change carried by an effect.
#[derive(Debug, Clone)]
pub struct AttributeModifier {
    pub attribute: Attribute,
    pub op: ModifierOp,
    pub magnitude: Magnitude,
}

impl AttributeModifier {
    pub fn add(attribute: Attribute, value: f32) -> Self {
        Self {
            attribute,
            op: ModifierOp::Add,
            magnitude: Magnitude::Constant(value),
        }
    }

    pub fn multiply(attribute: Attribute, value: f32) -> Self {
        Self {
            attribute,
            op: ModifierOp::Multiply,
            magnitude: Magnitude::Constant(value),
        }
    }

    pub fn override_with(attribute: Attribute, value: f32) -> Self {
        Self {
            attribute,
            op: ModifierOp::Override,
            magnitude: Magnitude::Constant(value),
        }
    }

    pub fn calculated(
        attribute: Attribute,
        op: ModifierOp,
        calculation: Arc<dyn MagnitudeCalculation>,
    ) -> Self {
        Self {
            attribute,
            op,
            magnitude: Magnitude::Calculated(calculation),
        }
    }
}

/// A named passive effect template.
///
/// # Example
///
/// ```
/// use openpf2_engine::entities::{Attribute, AttributeModifier, EffectDefinition};
///
/// let toughness = EffectDefinition::new("Toughness")
///     .with_modifier(AttributeModifier::add(Attribute::MaxHitPoints, 3.0));
///
/// assert_eq!(toughness.name(), "Toughness");
/// assert!(toughness.weight_group().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct EffectDefinition {
    id: EffectId,
    name: String,
    granted_tags: TagContainer,
    modifiers: Vec<AttributeModifier>,
    weight_group: Option<WeightGroup>,
}

impl EffectDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EffectId::new(),
            name: name.into(),
            granted_tags: TagContainer::new(),
            modifiers: Vec::new(),
            weight_group: None,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    pub fn with_id(mut self, id: EffectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_granted_tags(mut self, tags: TagContainer) -> Self {
        self.granted_tags = tags;
        self
    }

    pub fn with_modifier(mut self, modifier: AttributeModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Weight group used when the effect is added without an explicit group.
    pub fn with_weight_group(mut self, group: impl Into<WeightGroup>) -> Self {
        self.weight_group = Some(group.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn granted_tags(&self) -> &TagContainer {
        &self.granted_tags
    }

    pub fn modifiers(&self) -> &[AttributeModifier] {
        &self.modifiers
    }

    pub fn weight_group(&self) -> Option<&WeightGroup> {
        self.weight_group.as_ref()
    }
}
