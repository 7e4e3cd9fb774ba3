//! Value objects - Immutable objects defined by their attributes

mod gameplay_tag;
mod initiative;
mod weight_group;

// Hierarchical gameplay tags and tag queries
pub use gameplay_tag::{GameplayTag, TagContainer};

// Turn order
pub use initiative::InitiativeScore;

// Passive effect ordering
pub use weight_group::{StandardWeightGroup, WeightGroup};
