//! # System Events
//!
//! The closed catalog of events that flow through the bus. Every event
//! shares the `{type, timestamp, source}` envelope on the wire; consumers
//! subscribe by exact `type` string match (no wildcards, no hierarchy).

use chrono::Utc;
use serde::{Deserialize, Serialize};

use contracts::BusEvent;

/// Envelope shared by every event on the wire.
///
/// `payload` is flattened, so the serialized form is
/// `{"type": "...", "timestamp": ..., "source": "...", ...variant fields}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Epoch milliseconds, stamped by the producer.
    pub timestamp: i64,
    /// Producing component ("tool:search", "performance-monitor", ...).
    pub source: String,
    #[serde(flatten)]
    pub payload: SystemEventPayload,
}

/// Variant fields per event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEventPayload {
    // =========================================================================
    // TOOL EXECUTION
    // =========================================================================
    /// A wrapped tool started executing.
    ToolExecutionStart {
        tool_name: String,
        params: serde_json::Value,
    },

    /// A wrapped tool finished, successfully or not.
    ToolExecutionComplete {
        tool_name: String,
        success: bool,
        duration_ms: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // =========================================================================
    // MEMORY STORE
    // =========================================================================
    /// A value was written to the memory store.
    MemoryStored { key: String, size_bytes: u64 },

    /// A value was looked up in the memory store.
    MemoryRetrieved { key: String, found: bool },

    /// A value was removed from the memory store.
    MemoryDeleted { key: String },

    // =========================================================================
    // CACHE
    // =========================================================================
    /// A cache lookup hit.
    CacheHit { key: String },

    /// A cache lookup missed.
    CacheMiss { key: String },

    /// A cache entry or region was invalidated.
    CacheInvalidate { reason: String },

    // =========================================================================
    // PERFORMANCE
    // =========================================================================
    /// A watched metric crossed its threshold.
    PerformanceAlert {
        metric: String,
        severity: AlertSeverity,
        value: f64,
        threshold: f64,
    },

    // =========================================================================
    // SYSTEM LIFECYCLE
    // =========================================================================
    /// The surrounding system came up.
    SystemStartup { version: String },

    /// The surrounding system is going down.
    SystemShutdown { uptime_ms: u64 },

    /// An error the system wants observers to see.
    SystemError { message: String },
}

/// Alert severity: critical above twice the threshold, warning otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl SystemEventPayload {
    /// The wire `type` tag, which is also the routing key.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionComplete { .. } => "tool_execution_complete",
            Self::MemoryStored { .. } => "memory_stored",
            Self::MemoryRetrieved { .. } => "memory_retrieved",
            Self::MemoryDeleted { .. } => "memory_deleted",
            Self::CacheHit { .. } => "cache_hit",
            Self::CacheMiss { .. } => "cache_miss",
            Self::CacheInvalidate { .. } => "cache_invalidate",
            Self::PerformanceAlert { .. } => "performance_alert",
            Self::SystemStartup { .. } => "system_startup",
            Self::SystemShutdown { .. } => "system_shutdown",
            Self::SystemError { .. } => "system_error",
        }
    }
}

impl SystemEvent {
    /// Wrap a payload with the current timestamp.
    pub fn now(source: impl Into<String>, payload: SystemEventPayload) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            payload,
        }
    }

    pub fn tool_start(
        source: impl Into<String>,
        tool_name: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self::now(
            source,
            SystemEventPayload::ToolExecutionStart {
                tool_name: tool_name.into(),
                params,
            },
        )
    }

    pub fn tool_complete(
        source: impl Into<String>,
        tool_name: impl Into<String>,
        duration_ms: f64,
        result: serde_json::Value,
    ) -> Self {
        Self::now(
            source,
            SystemEventPayload::ToolExecutionComplete {
                tool_name: tool_name.into(),
                success: true,
                duration_ms,
                result: Some(result),
                error: None,
            },
        )
    }

    pub fn tool_failed(
        source: impl Into<String>,
        tool_name: impl Into<String>,
        duration_ms: f64,
        error: impl Into<String>,
    ) -> Self {
        Self::now(
            source,
            SystemEventPayload::ToolExecutionComplete {
                tool_name: tool_name.into(),
                success: false,
                duration_ms,
                result: None,
                error: Some(error.into()),
            },
        )
    }

    pub fn performance_alert(
        source: impl Into<String>,
        metric: impl Into<String>,
        value: f64,
        threshold: f64,
    ) -> Self {
        let severity = if value > threshold * 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        Self::now(
            source,
            SystemEventPayload::PerformanceAlert {
                metric: metric.into(),
                severity,
                value,
                threshold,
            },
        )
    }

    pub fn startup(source: impl Into<String>, version: impl Into<String>) -> Self {
        Self::now(
            source,
            SystemEventPayload::SystemStartup {
                version: version.into(),
            },
        )
    }

    pub fn shutdown(source: impl Into<String>, uptime_ms: u64) -> Self {
        Self::now(source, SystemEventPayload::SystemShutdown { uptime_ms })
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::now(
            source,
            SystemEventPayload::SystemError {
                message: message.into(),
            },
        )
    }
}

impl BusEvent for SystemEvent {
    fn event_type(&self) -> &str {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_has_flat_envelope() {
        let event = SystemEvent::tool_start("tool:search", "search", serde_json::json!({"q": 1}));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "tool_execution_start");
        assert_eq!(value["source"], "tool:search");
        assert!(value["timestamp"].is_i64());
        assert_eq!(value["tool_name"], "search");
        assert_eq!(value["params"]["q"], 1);
    }

    #[test]
    fn test_event_type_matches_wire_tag() {
        let event = SystemEvent::error("core", "oops");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
        assert_eq!(event.event_type(), "system_error");
    }

    #[test]
    fn test_failed_completion_skips_result_field() {
        let event = SystemEvent::tool_failed("tool:x", "x", 3.0, "broken");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "broken");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_alert_severity_doubles_threshold() {
        let warning = SystemEvent::performance_alert("m", "latency", 30.0, 25.0);
        let critical = SystemEvent::performance_alert("m", "latency", 60.0, 25.0);

        let severity = |e: &SystemEvent| match &e.payload {
            SystemEventPayload::PerformanceAlert { severity, .. } => *severity,
            _ => panic!("wrong payload"),
        };
        assert_eq!(severity(&warning), AlertSeverity::Warning);
        assert_eq!(severity(&critical), AlertSeverity::Critical);
    }

    #[test]
    fn test_round_trip() {
        let event = SystemEvent::shutdown("core", 1234);
        let json = serde_json::to_string(&event).unwrap();
        let back: SystemEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "system_shutdown");
        assert_eq!(back.source, "core");
    }
}
