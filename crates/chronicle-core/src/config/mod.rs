//! Engine configuration.
//!
//! `EngineConfig` tunes conflict recording and write retries. It can be built
//! from a JSON document (`parse_json`) or from `CHRONICLE_*` environment
//! variables (`from_env`); every field has a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_MAX_WRITE_RETRIES: u32 = 3;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// How conflict detection treats the mirror of an existing pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// Only `(event, candidate)` is checked; a later save of the candidate
    /// records `(candidate, event)` as well.
    Directional,
    /// Skip insertion when either ordering is already recorded.
    #[default]
    Symmetric,
}

impl FromStr for ConflictMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directional" => Ok(Self::Directional),
            "symmetric" => Ok(Self::Symmetric),
            other => Err(Error::Config(format!(
                "conflict_mode must be 'directional' or 'symmetric', got '{other}'"
            ))),
        }
    }
}

/// Tunables for [`crate::services::CalendarService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    pub conflict_mode: ConflictMode,
    /// Extra attempts after a transient write failure
    pub max_write_retries: u32,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conflict_mode: ConflictMode::default(),
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON payload.
    pub fn parse_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid engine config JSON: {error}")))
    }

    /// Build a configuration from `CHRONICLE_CONFLICT_MODE`,
    /// `CHRONICLE_MAX_WRITE_RETRIES` and `CHRONICLE_BUSY_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(mode) = normalize_text_option(lookup("CHRONICLE_CONFLICT_MODE")) {
            config.conflict_mode = mode.parse()?;
        }
        if let Some(retries) = normalize_text_option(lookup("CHRONICLE_MAX_WRITE_RETRIES")) {
            config.max_write_retries = parse_number("CHRONICLE_MAX_WRITE_RETRIES", &retries)?;
        }
        if let Some(timeout) = normalize_text_option(lookup("CHRONICLE_BUSY_TIMEOUT_MS")) {
            config.busy_timeout_ms = parse_number("CHRONICLE_BUSY_TIMEOUT_MS", &timeout)?;
        }

        Ok(config)
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_symmetric_with_retries() {
        let config = EngineConfig::default();
        assert_eq!(config.conflict_mode, ConflictMode::Symmetric);
        assert_eq!(config.max_write_retries, 3);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parse_json_fills_missing_fields() {
        let config = EngineConfig::parse_json(r#"{ "conflict_mode": "directional" }"#).unwrap();
        assert_eq!(config.conflict_mode, ConflictMode::Directional);
        assert_eq!(config.max_write_retries, 3);
    }

    #[test]
    fn parse_json_rejects_unknown_fields() {
        let error = EngineConfig::parse_json(r#"{ "retries": 2 }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("CHRONICLE_CONFLICT_MODE", " Directional "),
            ("CHRONICLE_MAX_WRITE_RETRIES", "7"),
            ("CHRONICLE_BUSY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.conflict_mode, ConflictMode::Directional);
        assert_eq!(config.max_write_retries, 7);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn env_blank_values_are_ignored() {
        let config =
            EngineConfig::from_lookup(lookup(&[("CHRONICLE_CONFLICT_MODE", "  ")])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn env_rejects_bad_values() {
        assert!(EngineConfig::from_lookup(lookup(&[("CHRONICLE_CONFLICT_MODE", "both")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("CHRONICLE_MAX_WRITE_RETRIES", "-1")])).is_err()
        );
    }
}
