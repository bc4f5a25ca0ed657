//! Partial overrides and merging
//!
//! `ConfigOverrides` carries only the fields a caller wants to change;
//! absent fields leave the base configuration untouched. Sources: code,
//! or the fixed set of environment variables.

use contracts::BusError;

use crate::validator::validate_config;
use crate::BusConfig;

/// Identifier override variable.
pub const ENV_IDENTIFIER: &str = "EVENT_BUS_IDENTIFIER";
/// Dispatcher count override variable.
pub const ENV_DISPATCHERS: &str = "EVENT_BUS_DISPATCHERS";
/// Cache-enabled flag override variable.
pub const ENV_CACHE_ENABLED: &str = "EVENT_BUS_CACHE_ENABLED";
/// Cache capacity override variable.
pub const ENV_MAX_CACHE_SIZE: &str = "EVENT_BUS_MAX_CACHE_SIZE";
/// Queue capacity override variable.
pub const ENV_MAX_QUEUE_SIZE: &str = "EVENT_BUS_MAX_QUEUE_SIZE";
/// Latency target override variable.
pub const ENV_MAX_LATENCY_MS: &str = "EVENT_BUS_MAX_LATENCY_MS";

/// A partial configuration; `None` fields are left at the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub identifier: Option<String>,
    pub dispatcher_count: Option<usize>,
    pub cache_enabled: Option<bool>,
    pub max_cache_size: Option<usize>,
    pub max_queue_size: Option<usize>,
    pub max_latency_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Read overrides from the environment.
    ///
    /// Absent variables leave the corresponding field `None`.
    ///
    /// # Errors
    /// A present but unparseable variable fails the whole read.
    pub fn from_env() -> Result<Self, BusError> {
        Ok(Self {
            identifier: std::env::var(ENV_IDENTIFIER).ok(),
            dispatcher_count: read_parsed(ENV_DISPATCHERS)?,
            cache_enabled: read_bool(ENV_CACHE_ENABLED)?,
            max_cache_size: read_parsed(ENV_MAX_CACHE_SIZE)?,
            max_queue_size: read_parsed(ENV_MAX_QUEUE_SIZE)?,
            max_latency_ms: read_parsed(ENV_MAX_LATENCY_MS)?,
        })
    }

    /// True when no field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the overrides on top of a base configuration.
    pub fn apply(&self, base: &BusConfig) -> BusConfig {
        let mut merged = base.clone();
        if let Some(id) = &self.identifier {
            merged.identifier = id.clone();
        }
        if let Some(count) = self.dispatcher_count {
            merged.dispatcher_count = count;
        }
        if let Some(on) = self.cache_enabled {
            merged.cache_enabled = on;
        }
        if let Some(size) = self.max_cache_size {
            merged.max_cache_size = size;
        }
        if let Some(size) = self.max_queue_size {
            merged.max_queue_size = size;
        }
        if let Some(ms) = self.max_latency_ms {
            merged.max_latency_ms = ms;
        }
        merged
    }
}

/// Apply overrides on top of a base and validate the result.
///
/// # Errors
/// An invalid merged configuration fails with one aggregated error naming
/// every violated field.
pub fn merge_configs(base: BusConfig, overrides: &ConfigOverrides) -> Result<BusConfig, BusError> {
    let merged = overrides.apply(&base);
    let violations = validate_config(&merged);
    if violations.is_empty() {
        Ok(merged)
    } else {
        Err(BusError::ConfigMerge { violations })
    }
}

fn read_parsed<T: std::str::FromStr>(var: &str) -> Result<Option<T>, BusError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| BusError::env_parse(var, e.to_string())),
        Err(_) => Ok(None),
    }
}

fn read_bool(var: &str) -> Result<Option<bool>, BusError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(Some(true)),
        "0" | "false" | "no" => Ok(Some(false)),
        other => Err(BusError::env_parse(
            var,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
