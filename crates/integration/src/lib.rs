//! # Integration
//!
//! Domain layer on top of the event bus.
//!
//! Responsibilities:
//! - Closed catalog of system events sharing a `{type, timestamp, source}` envelope
//! - Tool instrumentation (start/complete/error events + latency alarms)
//! - Periodic performance monitoring with alert emission
//! - Process-wide bus accessor for convenience, with reset for tests

pub mod events;
pub mod global;
pub mod monitor;
pub mod tool;

pub use events::{AlertSeverity, SystemEvent, SystemEventPayload};
pub use global::{global_bus, reset_global_bus, set_global_bus};
pub use monitor::{MonitorOptions, PerformanceMonitor, DEFAULT_ERROR_RATE_THRESHOLD};
pub use tool::InstrumentedTool;
