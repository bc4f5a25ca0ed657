//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};

/// Event Bus - in-process event dispatch engine driver
#[derive(Parser, Debug)]
#[command(
    name = "event-bus",
    author,
    version,
    about = "Event dispatch engine workload driver",
    long_about = "Drives the in-process publish/subscribe engine with synthetic workloads.\n\n\
                  Builds a bus from a named profile plus environment overrides, registers \n\
                  synthetic subscribers, publishes events synchronously or through the \n\
                  bounded async queue, and reports latency percentiles at exit."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENT_BUS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVENT_BUS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synthetic publish workload and report metrics
    Run(RunArgs),

    /// Validate the resolved configuration without running
    Validate(ValidateArgs),

    /// List the named configuration profiles
    Profiles(ProfilesArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Configuration profile (high-throughput, low-memory, debug, balanced)
    #[arg(short, long, default_value = "balanced", env = "EVENT_BUS_PROFILE")]
    pub profile: String,

    /// Number of events to publish
    #[arg(short, long, default_value = "10000", env = "EVENT_BUS_BENCH_EVENTS")]
    pub events: u64,

    /// Number of synthetic subscribers
    #[arg(short, long, default_value = "4", env = "EVENT_BUS_BENCH_SUBSCRIBERS")]
    pub subscribers: usize,

    /// Distinct event payloads to cycle through (0 = every event unique)
    #[arg(long, default_value = "0", env = "EVENT_BUS_BENCH_KEYSPACE")]
    pub keyspace: u64,

    /// Publish through the bounded async queue instead of dispatching inline
    #[arg(long = "async")]
    pub async_dispatch: bool,

    /// Run the performance monitor alongside the workload
    #[arg(long)]
    pub monitor: bool,

    /// Drain timeout for graceful shutdown, in milliseconds
    #[arg(long, default_value = "10000")]
    pub drain_timeout_ms: u64,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVENT_BUS_METRICS_PORT")]
    pub metrics_port: u16,

    /// Output the final metrics snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration profile used as the base
    #[arg(short, long, default_value = "balanced", env = "EVENT_BUS_PROFILE")]
    pub profile: String,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `profiles` command
#[derive(Parser, Debug)]
pub struct ProfilesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
