//! Configuration validation
//!
//! Rules:
//! - identifier non-empty
//! - dispatcher_count >= 1
//! - max_queue_size >= 1
//! - max_latency_ms >= 1

use crate::BusConfig;

/// Collect every violation in a configuration.
///
/// Returns human-readable messages, one per violated field; empty when the
/// configuration is valid. Never panics. Used by [`crate::merge_configs`],
/// which can assemble out-of-range values the builder would have rejected.
pub fn validate_config(config: &BusConfig) -> Vec<String> {
    let mut violations = Vec::new();

    if config.identifier.is_empty() {
        violations.push("identifier must not be empty".to_string());
    }
    if config.dispatcher_count < 1 {
        violations.push(format!(
            "dispatcher_count must be >= 1, got {}",
            config.dispatcher_count
        ));
    }
    if config.max_queue_size < 1 {
        violations.push(format!(
            "max_queue_size must be >= 1, got {}",
            config.max_queue_size
        ));
    }
    if config.max_latency_ms < 1 {
        violations.push(format!(
            "max_latency_ms must be >= 1, got {}",
            config.max_latency_ms
        ));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&BusConfig::default()).is_empty());
    }

    #[test]
    fn test_all_violations_collected() {
        let mut config = BusConfig::default();
        config.identifier = String::new();
        config.dispatcher_count = 0;
        config.max_queue_size = 0;
        config.max_latency_ms = 0;

        let violations = validate_config(&config);
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.contains("identifier")));
        assert!(violations.iter().any(|v| v.contains("dispatcher_count")));
        assert!(violations.iter().any(|v| v.contains("max_queue_size")));
        assert!(violations.iter().any(|v| v.contains("max_latency_ms")));
    }
}
