//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use bus_config::{validate_config, ConfigOverrides, ConfigProfile};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    identifier: String,
    dispatcher_count: usize,
    cache_enabled: bool,
    max_cache_size: usize,
    max_queue_size: usize,
    max_latency_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(profile = %args.profile, "Validating resolved configuration");

    let result = validate(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate(args: &ValidateArgs) -> ValidationResult {
    let profile: ConfigProfile = match args.profile.parse() {
        Ok(profile) => profile,
        Err(e) => {
            return ValidationResult {
                valid: false,
                profile: args.profile.clone(),
                error: Some(e),
                violations: Vec::new(),
                summary: None,
            }
        }
    };

    let overrides = match ConfigOverrides::from_env() {
        Ok(overrides) => overrides,
        Err(e) => {
            return ValidationResult {
                valid: false,
                profile: args.profile.clone(),
                error: Some(e.to_string()),
                violations: Vec::new(),
                summary: None,
            }
        }
    };

    let merged = overrides.apply(&profile.config());
    let violations = validate_config(&merged);

    ValidationResult {
        valid: violations.is_empty(),
        profile: args.profile.clone(),
        error: None,
        violations,
        summary: Some(ConfigSummary {
            identifier: merged.identifier.clone(),
            dispatcher_count: merged.dispatcher_count,
            cache_enabled: merged.cache_enabled,
            max_cache_size: merged.max_cache_size,
            max_queue_size: merged.max_queue_size,
            max_latency_ms: merged.max_latency_ms,
        }),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid (profile: {})", result.profile);
    } else {
        println!("✗ Configuration is invalid (profile: {})", result.profile);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
        for violation in &result.violations {
            println!("  - {}", violation);
        }
    }

    if let Some(ref summary) = result.summary {
        println!("\n  Identifier: {}", summary.identifier);
        println!("  Dispatchers: {}", summary.dispatcher_count);
        println!(
            "  Cache: {} (max {})",
            if summary.cache_enabled { "enabled" } else { "disabled" },
            summary.max_cache_size
        );
        println!("  Queue: {}", summary.max_queue_size);
        println!("  Latency target: {}ms", summary.max_latency_ms);
    }
}
