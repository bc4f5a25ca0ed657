//! `run` command implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use bus_config::{merge_configs, ConfigOverrides, ConfigProfile};
use contracts::SubscribeOptions;
use event_bus::EventBus;
use integration::{MonitorOptions, PerformanceMonitor, SystemEvent, SystemEventPayload};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_bench(args: &RunArgs) -> Result<()> {
    let profile: ConfigProfile = args
        .profile
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    // Environment overrides apply on top of the chosen profile
    let overrides = ConfigOverrides::from_env().context("Failed to read environment overrides")?;
    let config =
        merge_configs(profile.config(), &overrides).context("Invalid merged configuration")?;

    info!(
        profile = profile.name(),
        dispatchers = config.dispatcher_count,
        queue = config.max_queue_size,
        cache = config.cache_enabled,
        latency_target_ms = config.max_latency_ms,
        "Configuration resolved"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start Prometheus exporter")?;
    }

    let latency_target_ms = config.max_latency_ms;
    let bus = Arc::new(EventBus::new(config));
    let invocations = register_subscribers(&bus, args.subscribers);

    let monitor = args.monitor.then(|| {
        PerformanceMonitor::spawn(
            Arc::clone(&bus),
            MonitorOptions {
                latency_threshold_ms: latency_target_ms,
                check_interval_ms: 500,
                on_alert: None,
            },
        )
    });

    info!(
        events = args.events,
        subscribers = args.subscribers,
        mode = if args.async_dispatch { "async" } else { "sync" },
        "Starting workload"
    );
    let started = Instant::now();

    run_workload(&bus, args).await?;

    // Drain whatever the async path still holds, then stop
    bus.shutdown_gracefully(args.drain_timeout_ms).await;
    let elapsed = started.elapsed();

    if let Some(monitor) = monitor {
        monitor.cancel().await;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&bus.snapshot())
            .context("Failed to serialize metrics snapshot")?;
        println!("{}", json);
    } else {
        print_summary(&bus, args, elapsed, invocations.load(Ordering::SeqCst));
    }

    Ok(())
}

/// Register synthetic subscribers with spread priorities.
fn register_subscribers(bus: &Arc<EventBus<SystemEvent>>, count: usize) -> Arc<AtomicU64> {
    let invocations = Arc::new(AtomicU64::new(0));
    for i in 0..count {
        let invocations = Arc::clone(&invocations);
        bus.on(
            "memory_stored",
            move |_event: SystemEvent| {
                let invocations = Arc::clone(&invocations);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            SubscribeOptions::default().priority(i as i32),
        );
    }
    invocations
}

async fn run_workload(bus: &Arc<EventBus<SystemEvent>>, args: &RunArgs) -> Result<()> {
    // Fixed timestamp keeps cycled payloads canonically identical, so a
    // keyspace smaller than the event count exercises the result cache.
    let base_timestamp = chrono::Utc::now().timestamp_millis();

    for i in 0..args.events {
        let key = if args.keyspace == 0 {
            format!("key-{i}")
        } else {
            format!("key-{}", i % args.keyspace)
        };
        let event = SystemEvent {
            timestamp: base_timestamp,
            source: "bench".to_string(),
            payload: SystemEventPayload::MemoryStored { key, size_bytes: 64 },
        };

        if args.async_dispatch {
            bus.publish_async(event)
                .context("Publish failed during workload")?;
        } else {
            let result = bus.publish(event).context("Publish failed during workload")?;
            result.dispatch().await;
        }
    }
    Ok(())
}

fn print_summary(bus: &EventBus<SystemEvent>, args: &RunArgs, elapsed: std::time::Duration, invocations: u64) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        args.events as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("\n=== Workload Summary ===");
    println!("Profile: {}", args.profile);
    println!(
        "Mode: {}",
        if args.async_dispatch { "async" } else { "sync" }
    );
    println!("Events published: {}", args.events);
    println!("Handler invocations: {}", invocations);
    println!("Wall time: {:.2}s ({:.0} events/s)", elapsed.as_secs_f64(), rate);
    println!();
    println!("{}", bus.formatted_metrics());
}
