//! Named configuration profiles
//!
//! Pre-filled configurations for common tradeoffs. Profiles are starting
//! points; callers refine them with [`crate::ConfigOverrides`].

use crate::{verbose_exception_handler, BusConfig};

/// Named tuning profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProfile {
    /// Maximum throughput: wide drain batches, large cache and queue, 10ms target.
    HighThroughput,
    /// Memory-constrained: single dispatcher, small cache and queue, 50ms target.
    LowMemory,
    /// Verbose debugging: single dispatcher, caching disabled, verbose exception hook.
    Debug,
    /// Balanced defaults tuned for a 25ms dispatch target.
    Balanced,
}

impl ConfigProfile {
    /// All known profiles, in listing order.
    pub fn all() -> &'static [ConfigProfile] {
        &[
            Self::HighThroughput,
            Self::LowMemory,
            Self::Debug,
            Self::Balanced,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HighThroughput => "high-throughput",
            Self::LowMemory => "low-memory",
            Self::Debug => "debug",
            Self::Balanced => "balanced",
        }
    }

    /// Materialize the profile.
    pub fn config(&self) -> BusConfig {
        let base = BusConfig::default();
        match self {
            Self::HighThroughput => BusConfig {
                identifier: self.name().to_string(),
                dispatcher_count: 8,
                max_cache_size: 1000,
                max_queue_size: 5000,
                max_latency_ms: 10,
                ..base
            },
            Self::LowMemory => BusConfig {
                identifier: self.name().to_string(),
                dispatcher_count: 1,
                max_cache_size: 50,
                max_queue_size: 100,
                max_latency_ms: 50,
                ..base
            },
            Self::Debug => BusConfig {
                identifier: self.name().to_string(),
                dispatcher_count: 1,
                cache_enabled: false,
                max_latency_ms: 100,
                exception_handler: verbose_exception_handler(),
                ..base
            },
            Self::Balanced => BusConfig {
                identifier: self.name().to_string(),
                dispatcher_count: 4,
                max_cache_size: 500,
                max_queue_size: 1000,
                max_latency_ms: 25,
                ..base
            },
        }
    }
}

impl std::str::FromStr for ConfigProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigProfile::all()
            .iter()
            .find(|p| p.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown profile '{s}'"))
    }
}
