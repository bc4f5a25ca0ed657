//! `profiles` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;

use bus_config::ConfigProfile;

use crate::cli::ProfilesArgs;

#[derive(Serialize)]
struct ProfileRow {
    name: &'static str,
    dispatcher_count: usize,
    cache_enabled: bool,
    max_cache_size: usize,
    max_queue_size: usize,
    max_latency_ms: u64,
}

/// Execute the `profiles` command
pub fn run_profiles(args: &ProfilesArgs) -> Result<()> {
    let rows: Vec<ProfileRow> = ConfigProfile::all()
        .iter()
        .map(|profile| {
            let config = profile.config();
            ProfileRow {
                name: profile.name(),
                dispatcher_count: config.dispatcher_count,
                cache_enabled: config.cache_enabled,
                max_cache_size: config.max_cache_size,
                max_queue_size: config.max_queue_size,
                max_latency_ms: config.max_latency_ms,
            }
        })
        .collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&rows).context("Failed to serialize profile list")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Available profiles:\n");
    for row in rows {
        println!("  {}", row.name);
        println!("    dispatchers: {}", row.dispatcher_count);
        println!(
            "    cache: {} (max {})",
            if row.cache_enabled { "enabled" } else { "disabled" },
            row.max_cache_size
        );
        println!("    queue: {}", row.max_queue_size);
        println!("    latency target: {}ms\n", row.max_latency_ms);
    }
    Ok(())
}
