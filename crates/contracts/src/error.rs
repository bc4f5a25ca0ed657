//! Layered error definitions
//!
//! Categorized by source: config / dispatch / queue / tool

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum BusError {
    // ===== Configuration Errors =====
    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Configuration merge produced an invalid result
    #[error("config merge failed: {}", violations.join("; "))]
    ConfigMerge { violations: Vec<String> },

    /// Environment variable could not be parsed
    #[error("env var '{var}' invalid: {message}")]
    EnvParse { var: String, message: String },

    // ===== Dispatch Errors =====
    /// A result was dispatched more than once
    #[error("publication result already dispatched")]
    AlreadyDispatched,

    /// A subscribed handler failed during dispatch
    #[error("handler '{subscriber_id}' failed: {message}")]
    Handler {
        subscriber_id: String,
        message: String,
    },

    /// Event value could not be serialized for cache keying
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== Queue Errors =====
    /// The bus has been shut down and accepts no further work
    #[error("bus is shut down")]
    Shutdown,

    /// The dispatch queue closed unexpectedly
    #[error("dispatch queue closed")]
    QueueClosed,

    // ===== Tool Errors =====
    /// Tool execution error
    #[error("tool '{tool_name}' failed: {message}")]
    Tool { tool_name: String, message: String },

    // ===== General Errors =====
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl BusError {
    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create environment parse error
    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParse {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Create handler failure error
    pub fn handler(subscriber_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            subscriber_id: subscriber_id.into(),
            message: message.into(),
        }
    }

    /// Create tool execution error
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_error_names_all_fields() {
        let err = BusError::ConfigMerge {
            violations: vec![
                "dispatcher_count must be >= 1".to_string(),
                "max_queue_size must be >= 1".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("dispatcher_count"), "got: {msg}");
        assert!(msg.contains("max_queue_size"), "got: {msg}");
    }

    #[test]
    fn test_handler_error_display() {
        let err = BusError::handler("sub-3", "boom");
        assert_eq!(err.to_string(), "handler 'sub-3' failed: boom");
    }
}
