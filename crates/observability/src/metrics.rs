//! 事件总线指标收集模块
//!
//! 每实例计数器 + 有界滚动延迟采样窗口；聚合器用于多实例报表。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use ringbuf::{traits::*, HeapRb};
use serde::Serialize;
use tracing::warn;

/// Rolling sample window capacity per latency series.
pub const DEFAULT_SAMPLE_WINDOW: usize = 1000;

/// Bounded rolling window of latency samples
///
/// Oldest sample is dropped once the window is full, so percentile
/// statistics always describe recent behavior.
struct LatencyWindow {
    samples: HeapRb<f64>,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: HeapRb::new(capacity),
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.is_full() {
            let _ = self.samples.try_pop();
        }
        let _ = self.samples.try_push(value);
    }

    fn clear(&mut self) {
        while self.samples.try_pop().is_some() {}
    }

    fn stats(&self) -> LatencyStats {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        LatencyStats {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

/// Index the sorted samples at `ceil(p/100 * n) - 1`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Percentile summary of one latency series
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyStats {
    /// Mean of each field across instances.
    ///
    /// This is an averaged estimate, not a recomputation from pooled raw
    /// samples; counts are summed.
    pub fn averaged(stats: &[LatencyStats]) -> LatencyStats {
        if stats.is_empty() {
            return LatencyStats::default();
        }
        let n = stats.len() as f64;
        LatencyStats {
            count: stats.iter().map(|s| s.count).sum(),
            min: stats.iter().map(|s| s.min).sum::<f64>() / n,
            max: stats.iter().map(|s| s.max).sum::<f64>() / n,
            mean: stats.iter().map(|s| s.mean).sum::<f64>() / n,
            p50: stats.iter().map(|s| s.p50).sum::<f64>() / n,
            p95: stats.iter().map(|s| s.p95).sum::<f64>() / n,
            p99: stats.iter().map(|s| s.p99).sum::<f64>() / n,
        }
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3} max={:.3} mean={:.3} p50={:.3} p95={:.3} p99={:.3} (n={})",
                self.min, self.max, self.mean, self.p50, self.p95, self.p99, self.count
            )
        }
    }
}

/// Per-instance bus metrics
///
/// Counters are cumulative for the instance lifetime; latency series are
/// bounded rolling windows. All updates are also mirrored to the `metrics`
/// facade for Prometheus export.
pub struct BusMetrics {
    identifier: String,
    max_latency_ms: u64,
    started_at: Mutex<Instant>,

    publishes: AtomicU64,
    dispatches: AtomicU64,
    subscribes: AtomicU64,
    unsubscribes: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_invalidations: AtomicU64,
    queue_drops: AtomicU64,

    publish_window: Mutex<LatencyWindow>,
    dispatch_window: Mutex<LatencyWindow>,
}

impl fmt::Debug for BusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusMetrics")
            .field("identifier", &self.identifier)
            .field("publishes", &self.publishes.load(Ordering::Relaxed))
            .field("dispatches", &self.dispatches.load(Ordering::Relaxed))
            .field("errors", &self.errors.load(Ordering::Relaxed))
            .finish()
    }
}

impl BusMetrics {
    /// Create a metrics instance for one bus.
    pub fn new(identifier: impl Into<String>, max_latency_ms: u64) -> Self {
        Self::with_window(identifier, max_latency_ms, DEFAULT_SAMPLE_WINDOW)
    }

    /// Create with a custom sample window capacity.
    pub fn with_window(
        identifier: impl Into<String>,
        max_latency_ms: u64,
        window: usize,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            max_latency_ms,
            started_at: Mutex::new(Instant::now()),
            publishes: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            subscribes: AtomicU64::new(0),
            unsubscribes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_invalidations: AtomicU64::new(0),
            queue_drops: AtomicU64::new(0),
            publish_window: Mutex::new(LatencyWindow::new(window)),
            dispatch_window: Mutex::new(LatencyWindow::new(window)),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Record one publish call and its overhead.
    pub fn record_publish(&self, latency_ms: f64) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_publishes_total", "bus" => self.identifier.clone()).increment(1);
        histogram!("event_bus_publish_latency_ms", "bus" => self.identifier.clone())
            .record(latency_ms);

        if let Ok(mut window) = self.publish_window.lock() {
            window.push(latency_ms);
        }
        if latency_ms > self.max_latency_ms as f64 {
            warn!(
                bus = %self.identifier,
                latency_ms,
                target_ms = self.max_latency_ms,
                "publish latency over target"
            );
        }
    }

    /// Record one dispatch (handler chain execution) and its duration.
    pub fn record_dispatch(&self, latency_ms: f64) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_dispatches_total", "bus" => self.identifier.clone()).increment(1);
        histogram!("event_bus_dispatch_latency_ms", "bus" => self.identifier.clone())
            .record(latency_ms);

        if let Ok(mut window) = self.dispatch_window.lock() {
            window.push(latency_ms);
        }
        if latency_ms > self.max_latency_ms as f64 {
            warn!(
                bus = %self.identifier,
                latency_ms,
                target_ms = self.max_latency_ms,
                "dispatch latency over target"
            );
        }
    }

    pub fn record_subscribe(&self) {
        self.subscribes.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_subscribes_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn record_unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_unsubscribes_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_errors_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_cache_hits_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_cache_misses_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn record_cache_invalidation(&self) {
        self.cache_invalidations.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_cache_invalidations_total", "bus" => self.identifier.clone())
            .increment(1);
    }

    pub fn record_queue_drop(&self) {
        self.queue_drops.fetch_add(1, Ordering::Relaxed);
        counter!("event_bus_queue_dropped_total", "bus" => self.identifier.clone()).increment(1);
    }

    pub fn queue_drops(&self) -> u64 {
        self.queue_drops.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self
            .started_at
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let publishes = self.publishes.load(Ordering::Relaxed);
        let dispatches = self.dispatches.load(Ordering::Relaxed);

        let per_sec = |count: u64| {
            if uptime_secs > 0.0 {
                count as f64 / uptime_secs
            } else {
                0.0
            }
        };

        MetricsSnapshot {
            identifier: self.identifier.clone(),
            uptime_secs,
            publishes,
            dispatches,
            subscribes: self.subscribes.load(Ordering::Relaxed),
            unsubscribes: self.unsubscribes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            publishes_per_sec: per_sec(publishes),
            dispatches_per_sec: per_sec(dispatches),
            publish_latency: self
                .publish_window
                .lock()
                .map(|w| w.stats())
                .unwrap_or_default(),
            dispatch_latency: self
                .dispatch_window
                .lock()
                .map(|w| w.stats())
                .unwrap_or_default(),
        }
    }

    /// Zero all counters and clear sample windows in place.
    pub fn reset(&self) {
        self.publishes.store(0, Ordering::Relaxed);
        self.dispatches.store(0, Ordering::Relaxed);
        self.subscribes.store(0, Ordering::Relaxed);
        self.unsubscribes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.cache_invalidations.store(0, Ordering::Relaxed);
        self.queue_drops.store(0, Ordering::Relaxed);
        if let Ok(mut window) = self.publish_window.lock() {
            window.clear();
        }
        if let Ok(mut window) = self.dispatch_window.lock() {
            window.clear();
        }
        if let Ok(mut started) = self.started_at.lock() {
            *started = Instant::now();
        }
    }
}

/// Point-in-time metrics snapshot for one instance
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub identifier: String,
    pub uptime_secs: f64,
    pub publishes: u64,
    pub dispatches: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_invalidations: u64,
    pub queue_drops: u64,
    pub publishes_per_sec: f64,
    pub dispatches_per_sec: f64,
    pub publish_latency: LatencyStats,
    pub dispatch_latency: LatencyStats,
}

impl MetricsSnapshot {
    /// Handler failures per dispatch; 0 when nothing dispatched yet.
    pub fn error_rate(&self) -> f64 {
        if self.dispatches > 0 {
            self.errors as f64 / self.dispatches as f64
        } else {
            0.0
        }
    }

    /// Cache hits over all cache lookups.
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups > 0 {
            self.cache_hits as f64 / lookups as f64
        } else {
            0.0
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bus Metrics [{}] ===", self.identifier)?;
        writeln!(f, "Uptime: {:.2}s", self.uptime_secs)?;
        writeln!(
            f,
            "Publishes: {} ({:.2}/s)",
            self.publishes, self.publishes_per_sec
        )?;
        writeln!(
            f,
            "Dispatches: {} ({:.2}/s)",
            self.dispatches, self.dispatches_per_sec
        )?;
        writeln!(
            f,
            "Subscribes: {} / Unsubscribes: {}",
            self.subscribes, self.unsubscribes
        )?;
        writeln!(
            f,
            "Errors: {} ({:.2}% of dispatches)",
            self.errors,
            self.error_rate() * 100.0
        )?;
        writeln!(
            f,
            "Cache: {} hits / {} misses / {} flushes ({:.2}% hit rate)",
            self.cache_hits,
            self.cache_misses,
            self.cache_invalidations,
            self.cache_hit_rate() * 100.0
        )?;
        writeln!(f, "Queue drops: {}", self.queue_drops)?;
        writeln!(f, "Publish latency (ms): {}", self.publish_latency)?;
        writeln!(f, "Dispatch latency (ms): {}", self.dispatch_latency)?;
        Ok(())
    }
}

/// Multi-instance aggregator
///
/// Holds a registry of instances keyed by identifier; produces fleet-wide
/// sums and averaged percentile estimates.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    instances: Mutex<HashMap<String, Arc<BusMetrics>>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance, replacing any previous one with the same identifier.
    pub fn register(&self, metrics: Arc<BusMetrics>) {
        if let Ok(mut instances) = self.instances.lock() {
            instances.insert(metrics.identifier().to_string(), metrics);
        }
    }

    pub fn unregister(&self, identifier: &str) {
        if let Ok(mut instances) = self.instances.lock() {
            instances.remove(identifier);
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().map(|i| i.len()).unwrap_or(0)
    }

    /// Fleet-wide stats: summed counters, averaged percentile estimates.
    pub fn aggregated(&self) -> AggregatedStats {
        let snapshots: Vec<MetricsSnapshot> = self
            .instances
            .lock()
            .map(|instances| instances.values().map(|m| m.snapshot()).collect())
            .unwrap_or_default();

        let publish_stats: Vec<LatencyStats> =
            snapshots.iter().map(|s| s.publish_latency).collect();
        let dispatch_stats: Vec<LatencyStats> =
            snapshots.iter().map(|s| s.dispatch_latency).collect();

        AggregatedStats {
            instance_count: snapshots.len(),
            publishes: snapshots.iter().map(|s| s.publishes).sum(),
            dispatches: snapshots.iter().map(|s| s.dispatches).sum(),
            subscribes: snapshots.iter().map(|s| s.subscribes).sum(),
            unsubscribes: snapshots.iter().map(|s| s.unsubscribes).sum(),
            errors: snapshots.iter().map(|s| s.errors).sum(),
            cache_hits: snapshots.iter().map(|s| s.cache_hits).sum(),
            cache_misses: snapshots.iter().map(|s| s.cache_misses).sum(),
            cache_invalidations: snapshots.iter().map(|s| s.cache_invalidations).sum(),
            queue_drops: snapshots.iter().map(|s| s.queue_drops).sum(),
            publish_latency: LatencyStats::averaged(&publish_stats),
            dispatch_latency: LatencyStats::averaged(&dispatch_stats),
        }
    }

    /// Identifiers of instances whose dispatch p95 exceeds the target.
    pub fn check_latency_health(&self, target_ms: u64) -> Vec<String> {
        let mut unhealthy: Vec<String> = self
            .instances
            .lock()
            .map(|instances| {
                instances
                    .values()
                    .filter(|m| m.snapshot().dispatch_latency.p95 > target_ms as f64)
                    .map(|m| m.identifier().to_string())
                    .collect()
            })
            .unwrap_or_default();
        unhealthy.sort();
        unhealthy
    }
}

/// Fleet-wide aggregated stats
///
/// Latency fields are the mean of each instance's own percentile estimate,
/// not a recomputation from pooled raw samples.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedStats {
    pub instance_count: usize,
    pub publishes: u64,
    pub dispatches: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_invalidations: u64,
    pub queue_drops: u64,
    pub publish_latency: LatencyStats,
    pub dispatch_latency: LatencyStats,
}

impl fmt::Display for AggregatedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Aggregated Bus Metrics ===")?;
        writeln!(f, "Instances: {}", self.instance_count)?;
        writeln!(f, "Publishes: {}", self.publishes)?;
        writeln!(f, "Dispatches: {}", self.dispatches)?;
        writeln!(f, "Errors: {}", self.errors)?;
        writeln!(
            f,
            "Cache: {} hits / {} misses / {} flushes",
            self.cache_hits, self.cache_misses, self.cache_invalidations
        )?;
        writeln!(f, "Queue drops: {}", self.queue_drops)?;
        writeln!(f, "Publish latency avg (ms): {}", self.publish_latency)?;
        writeln!(f, "Dispatch latency avg (ms): {}", self.dispatch_latency)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_indexing() {
        // 10 samples: p50 sits at index ceil(0.5 * 10) - 1 = 4
        let metrics = BusMetrics::new("test", 1000);
        for i in 1..=10 {
            metrics.record_publish(i as f64);
        }
        let stats = metrics.snapshot().publish_latency;
        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.p50, 5.0);
        assert_eq!(stats.p95, 10.0);
        assert_eq!(stats.p99, 10.0);
        assert!((stats.mean - 5.5).abs() < 1e-10);
    }

    #[test]
    fn test_single_sample_stats() {
        let metrics = BusMetrics::new("test", 1000);
        metrics.record_dispatch(3.0);
        let stats = metrics.snapshot().dispatch_latency;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.p50, 3.0);
        assert_eq!(stats.p99, 3.0);
    }

    #[test]
    fn test_window_drops_oldest() {
        let metrics = BusMetrics::with_window("test", 1000, 3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            metrics.record_publish(v);
        }
        // 100.0 evicted; extremes come from the remaining window
        let stats = metrics.snapshot().publish_latency;
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_counters_and_rates() {
        let metrics = BusMetrics::new("test", 1000);
        metrics.record_publish(1.0);
        metrics.record_publish(1.0);
        metrics.record_dispatch(1.0);
        metrics.record_error();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.publishes, 2);
        assert_eq!(snapshot.dispatches, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.error_rate(), 1.0);
        assert!((snapshot.cache_hit_rate() - 1.0 / 3.0).abs() < 1e-10);
        assert!(snapshot.publishes_per_sec > 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = BusMetrics::new("test", 1000);
        metrics.record_publish(5.0);
        metrics.record_error();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.publishes, 0);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.publish_latency.count, 0);
    }

    #[test]
    fn test_aggregator_sums_and_averages() {
        let aggregator = MetricsAggregator::new();
        let a = Arc::new(BusMetrics::new("bus-a", 1000));
        let b = Arc::new(BusMetrics::new("bus-b", 1000));
        aggregator.register(Arc::clone(&a));
        aggregator.register(Arc::clone(&b));

        a.record_dispatch(10.0);
        b.record_dispatch(20.0);
        a.record_publish(1.0);

        let stats = aggregator.aggregated();
        assert_eq!(stats.instance_count, 2);
        assert_eq!(stats.dispatches, 2);
        assert_eq!(stats.publishes, 1);
        // Mean of per-instance p95 estimates (10 and 20)
        assert!((stats.dispatch_latency.p95 - 15.0).abs() < 1e-10);
    }

    #[test]
    fn test_latency_health_check() {
        let aggregator = MetricsAggregator::new();
        let fast = Arc::new(BusMetrics::new("fast", 1000));
        let slow = Arc::new(BusMetrics::new("slow", 1000));
        aggregator.register(Arc::clone(&fast));
        aggregator.register(Arc::clone(&slow));

        fast.record_dispatch(5.0);
        slow.record_dispatch(80.0);

        let unhealthy = aggregator.check_latency_health(25);
        assert_eq!(unhealthy, vec!["slow".to_string()]);
    }

    #[test]
    fn test_formatted_report() {
        let metrics = BusMetrics::new("report", 1000);
        metrics.record_publish(1.0);
        let report = metrics.snapshot().to_string();
        assert!(report.contains("=== Bus Metrics [report] ==="));
        assert!(report.contains("Publishes: 1"));
    }
}
