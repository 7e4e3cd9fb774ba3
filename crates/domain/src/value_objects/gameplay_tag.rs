//! Gameplay tags - dot-separated hierarchical labels carried by characters and effects.
//!
//! A tag such as `Skill.Stealth.Expert` implies its parents (`Skill.Stealth`, `Skill`),
//! so containers answer "has tag" queries hierarchically unless asked for an exact match.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A single validated gameplay tag (e.g. `Skill.Stealth.Trained`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameplayTag(String);

impl GameplayTag {
    /// Create a tag, rejecting empty names, whitespace and empty segments.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();

        if name.is_empty() {
            return Err(DomainError::validation("Gameplay tag cannot be empty"));
        }

        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "Gameplay tag cannot contain whitespace: '{}'",
                name
            )));
        }

        if name.split('.').any(str::is_empty) {
            return Err(DomainError::validation(format!(
                "Gameplay tag has an empty segment: '{}'",
                name
            )));
        }

        Ok(Self(name))
    }

    /// Built-in tag names known to be well-formed.
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this tag equals `other` or is a descendant of it.
    ///
    /// `Skill.Stealth.Expert` matches `Skill.Stealth` and `Skill`, but not `Skill.Steal`.
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other
            || (self.0.len() > other.len()
                && self.0.starts_with(other)
                && self.0.as_bytes()[other.len()] == b'.')
    }

    /// The immediate parent tag, if this tag has more than one segment.
    pub fn parent(&self) -> Option<GameplayTag> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| GameplayTag(parent.to_string()))
    }

    /// Build a child tag by appending a segment (e.g. `Skill.Stealth` + `Expert`).
    pub fn child(&self, segment: &str) -> Result<GameplayTag, DomainError> {
        GameplayTag::new(format!("{}.{}", self.0, segment))
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameplayTag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameplayTag::new(s)
    }
}

impl TryFrom<String> for GameplayTag {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GameplayTag::new(value)
    }
}

impl From<GameplayTag> for String {
    fn from(tag: GameplayTag) -> Self {
        tag.0
    }
}

/// An ordered set of gameplay tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagContainer {
    tags: BTreeSet<GameplayTag>,
}

impl TagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every name into a tag, failing on the first invalid one.
    pub fn from_names<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(GameplayTag::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(|tags| Self { tags })
    }

    /// Add a tag. Returns false if it was already present.
    pub fn add(&mut self, tag: GameplayTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn append(&mut self, other: &TagContainer) {
        self.tags.extend(other.tags.iter().cloned());
    }

    /// Remove a tag. Returns false if it was not present.
    pub fn remove(&mut self, tag: &GameplayTag) -> bool {
        self.tags.remove(tag)
    }

    pub fn remove_all(&mut self, other: &TagContainer) {
        for tag in &other.tags {
            self.tags.remove(tag);
        }
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Hierarchical query: true if any tag equals `name` or descends from it.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.matches(name))
    }

    /// Exact query: true only if `name` itself is in the container.
    pub fn has_tag_exact(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.as_str() == name)
    }

    pub fn has_any(&self, other: &TagContainer) -> bool {
        other.tags.iter().any(|tag| self.has_tag(tag.as_str()))
    }

    /// All tags that equal `prefix` or descend from it.
    pub fn tags_with_prefix(&self, prefix: &str) -> Vec<&GameplayTag> {
        self.tags.iter().filter(|tag| tag.matches(prefix)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameplayTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<GameplayTag> for TagContainer {
    fn from_iter<T: IntoIterator<Item = GameplayTag>>(iter: T) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl Extend<GameplayTag> for TagContainer {
    fn extend<T: IntoIterator<Item = GameplayTag>>(&mut self, iter: T) {
        self.tags.extend(iter);
    }
}

impl fmt::Display for TagContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tags.iter().map(GameplayTag::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}
