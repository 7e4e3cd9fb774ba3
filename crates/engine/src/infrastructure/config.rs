//! Engine configuration loaded from the environment.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const LOG_FILTER_VAR: &str = "OPENPF2_LOG_FILTER";
pub const RESCALE_FACTOR_VAR: &str = "OPENPF2_INITIATIVE_RESCALE_FACTOR";
pub const DEFAULT_LEVEL_VAR: &str = "OPENPF2_DEFAULT_CHARACTER_LEVEL";

/// Highest character level in PF2e.
pub const MAX_CHARACTER_LEVEL: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Multiplier applied to every initiative score when an insertion needs a free slot.
    pub initiative_rescale_factor: i32,
    /// Level given to characters that do not specify one.
    pub default_character_level: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: "openpf2_engine=debug".to_string(),
            initiative_rescale_factor: 10,
            default_character_level: 1,
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, using defaults for missing values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_filter = lookup(LOG_FILTER_VAR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.log_filter);

        let initiative_rescale_factor: i32 = parse_or(
            &lookup,
            RESCALE_FACTOR_VAR,
            defaults.initiative_rescale_factor,
            "an integer of at least 2",
        )?;
        if initiative_rescale_factor < 2 {
            return Err(ConfigError::invalid(
                RESCALE_FACTOR_VAR,
                initiative_rescale_factor,
                "an integer of at least 2",
            ));
        }

        let default_character_level: u8 = parse_or(
            &lookup,
            DEFAULT_LEVEL_VAR,
            defaults.default_character_level,
            "a level between 1 and 20",
        )?;
        if !(1..=MAX_CHARACTER_LEVEL).contains(&default_character_level) {
            return Err(ConfigError::invalid(
                DEFAULT_LEVEL_VAR,
                default_character_level,
                "a level between 1 and 20",
            ));
        }

        Ok(Self {
            log_filter,
            initiative_rescale_factor,
            default_character_level,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, raw, expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (LOG_FILTER_VAR, "openpf2_engine=trace"),
            (RESCALE_FACTOR_VAR, " 100 "),
            (DEFAULT_LEVEL_VAR, "5"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.log_filter, "openpf2_engine=trace");
        assert_eq!(config.initiative_rescale_factor, 100);
        assert_eq!(config.default_character_level, 5);
    }

    #[test]
    fn test_rejects_small_rescale_factor() {
        let err = EngineConfig::from_lookup(lookup_from(&[(RESCALE_FACTOR_VAR, "1")]))
            .expect_err("factor of 1 cannot free a slot");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: RESCALE_FACTOR_VAR,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_out_of_range_level() {
        assert!(EngineConfig::from_lookup(lookup_from(&[(DEFAULT_LEVEL_VAR, "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup_from(&[(DEFAULT_LEVEL_VAR, "21")])).is_err());
        assert!(EngineConfig::from_lookup(lookup_from(&[(DEFAULT_LEVEL_VAR, "five")])).is_err());
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(EngineConfig::default()).expect("serializable");
        assert_eq!(json["initiative_rescale_factor"], 10);
    }
}
