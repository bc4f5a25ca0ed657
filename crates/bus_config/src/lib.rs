//! # Bus Config
//!
//! Configuration value object and builder for the event dispatch engine.
//!
//! Responsibilities:
//! - Immutable `BusConfig` with fail-fast fluent builder
//! - Named profiles for common tradeoffs
//! - Non-throwing validation and override merging
//! - Environment variable overrides
//!
//! # Example
//!
//! ```
//! use bus_config::BusConfig;
//!
//! let config = BusConfig::builder()
//!     .identifier("worker-bus").unwrap()
//!     .dispatchers(4).unwrap()
//!     .latency_target(25).unwrap()
//!     .build();
//! assert_eq!(config.dispatcher_count, 4);
//! ```

mod overrides;
mod profiles;
mod validator;

pub use overrides::{merge_configs, ConfigOverrides};
pub use profiles::ConfigProfile;
pub use validator::validate_config;

use std::fmt;
use std::sync::Arc;

use contracts::BusError;
use tracing::{debug, error};

/// Callback invoked for errors the engine cannot otherwise route.
pub type ExceptionHandler = Arc<dyn Fn(&BusError, Option<&str>) + Send + Sync>;

/// Immutable tuning parameters for one bus instance.
///
/// Created once at bus construction and never mutated.
#[derive(Clone)]
pub struct BusConfig {
    /// Instance identifier (metrics registry key)
    pub identifier: String,
    /// Items drained from the async queue per tick
    pub dispatcher_count: usize,
    /// Spawn the drain worker at construction; when false, draining is
    /// driven explicitly (deterministic in tests)
    pub daemon_mode: bool,
    /// Enable the publication result cache
    pub cache_enabled: bool,
    /// Result cache capacity; 0 stores nothing
    pub max_cache_size: usize,
    /// Async dispatch queue capacity
    pub max_queue_size: usize,
    /// Latency warning threshold, never enforced as a hard deadline
    pub max_latency_ms: u64,
    /// Invoked on uncaught handler errors from the async dispatch path
    pub exception_handler: ExceptionHandler,
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("identifier", &self.identifier)
            .field("dispatcher_count", &self.dispatcher_count)
            .field("daemon_mode", &self.daemon_mode)
            .field("cache_enabled", &self.cache_enabled)
            .field("max_cache_size", &self.max_cache_size)
            .field("max_queue_size", &self.max_queue_size)
            .field("max_latency_ms", &self.max_latency_ms)
            .finish()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            identifier: "event-bus".to_string(),
            dispatcher_count: 2,
            daemon_mode: true,
            cache_enabled: true,
            max_cache_size: 500,
            max_queue_size: 1000,
            max_latency_ms: 100,
            exception_handler: default_exception_handler(),
        }
    }
}

impl BusConfig {
    /// Start a fluent builder from the defaults.
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Default hook: log and continue.
pub fn default_exception_handler() -> ExceptionHandler {
    Arc::new(|err, context| {
        error!(error = %err, context = context.unwrap_or("-"), "unhandled bus error");
    })
}

/// Verbose hook for debug profiles: full debug representation.
pub fn verbose_exception_handler() -> ExceptionHandler {
    Arc::new(|err, context| {
        error!(error = %err, context = context.unwrap_or("-"), "unhandled bus error");
        debug!(error = ?err, "error detail");
    })
}

/// Fluent builder; each setter validates its input and fails fast.
pub struct BusConfigBuilder {
    config: BusConfig,
}

impl BusConfigBuilder {
    /// Set the instance identifier. Rejects empty strings.
    pub fn identifier(mut self, id: impl Into<String>) -> Result<Self, BusError> {
        let id = id.into();
        if id.is_empty() {
            return Err(BusError::config_validation(
                "identifier",
                "identifier must not be empty",
            ));
        }
        self.config.identifier = id;
        Ok(self)
    }

    /// Set how many queued items each drain tick dispatches. Rejects 0.
    pub fn dispatchers(mut self, count: usize) -> Result<Self, BusError> {
        if count < 1 {
            return Err(BusError::config_validation(
                "dispatcher_count",
                format!("dispatcher_count must be >= 1, got {count}"),
            ));
        }
        self.config.dispatcher_count = count;
        Ok(self)
    }

    pub fn daemon_mode(mut self, on: bool) -> Self {
        self.config.daemon_mode = on;
        self
    }

    pub fn cache_enabled(mut self, on: bool) -> Self {
        self.config.cache_enabled = on;
        self
    }

    /// Set the result cache capacity. 0 is allowed and stores nothing.
    pub fn max_cache(mut self, size: usize) -> Self {
        self.config.max_cache_size = size;
        self
    }

    /// Set the async queue capacity. Rejects 0.
    pub fn max_queue(mut self, size: usize) -> Result<Self, BusError> {
        if size < 1 {
            return Err(BusError::config_validation(
                "max_queue_size",
                format!("max_queue_size must be >= 1, got {size}"),
            ));
        }
        self.config.max_queue_size = size;
        Ok(self)
    }

    /// Set the latency warning threshold in milliseconds. Rejects 0.
    pub fn latency_target(mut self, ms: u64) -> Result<Self, BusError> {
        if ms < 1 {
            return Err(BusError::config_validation(
                "max_latency_ms",
                format!("max_latency_ms must be >= 1, got {ms}"),
            ));
        }
        self.config.max_latency_ms = ms;
        Ok(self)
    }

    pub fn on_exception(
        mut self,
        handler: impl Fn(&BusError, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.config.exception_handler = Arc::new(handler);
        self
    }

    /// Freeze the configuration.
    pub fn build(self) -> BusConfig {
        self.config
    }
}
