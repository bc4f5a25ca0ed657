//! PerformanceMonitor - periodic latency and error-rate checks

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use event_bus::EventBus;

use crate::events::SystemEvent;

/// Fixed default trigger for the error-rate check (errors per dispatch).
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.01;

/// Callback invoked with each alert before it is published.
pub type AlertCallback = Arc<dyn Fn(&SystemEvent) + Send + Sync>;

/// Options for [`PerformanceMonitor::spawn`].
#[derive(Clone)]
pub struct MonitorOptions {
    /// p95 latency threshold for both publish and dispatch series.
    pub latency_threshold_ms: u64,
    pub check_interval_ms: u64,
    pub on_alert: Option<AlertCallback>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 25,
            check_interval_ms: 1_000,
            on_alert: None,
        }
    }
}

/// Handle to a running monitor loop.
///
/// The loop compares the bus's current p95 publish/dispatch latency and
/// error rate against thresholds and emits `performance_alert` events when
/// exceeded. Dropping the handle does not stop the loop; call
/// [`PerformanceMonitor::cancel`].
pub struct PerformanceMonitor {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl PerformanceMonitor {
    /// Spawn the periodic check loop.
    pub fn spawn(bus: Arc<EventBus<SystemEvent>>, options: MonitorOptions) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let interval = Duration::from_millis(options.check_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            debug!("performance monitor started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        check(&bus, &options);
                    }
                }
            }
            debug!("performance monitor stopped");
        });

        Self { handle, shutdown }
    }

    /// Stop the loop and wait for it to finish.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

fn check(bus: &Arc<EventBus<SystemEvent>>, options: &MonitorOptions) {
    let snapshot = bus.snapshot();
    let threshold = options.latency_threshold_ms as f64;

    let checks = [
        ("publish_latency_p95_ms", snapshot.publish_latency.p95, threshold),
        ("dispatch_latency_p95_ms", snapshot.dispatch_latency.p95, threshold),
        ("error_rate", snapshot.error_rate(), DEFAULT_ERROR_RATE_THRESHOLD),
    ];

    for (metric, value, threshold) in checks {
        if value <= threshold {
            continue;
        }
        warn!(
            bus = %snapshot.identifier,
            metric,
            value,
            threshold,
            "performance threshold exceeded"
        );
        let alert = SystemEvent::performance_alert("performance-monitor", metric, value, threshold);
        if let Some(on_alert) = &options.on_alert {
            on_alert(&alert);
        }
        let _ = bus.publish_async(alert);
    }
}
