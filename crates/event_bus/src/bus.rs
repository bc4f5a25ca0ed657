//! EventBus - publish/subscribe engine with cached publications

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use bus_config::BusConfig;
use contracts::{BusError, BusEvent, HandlerFuture, RegisteredHandler, SubscribeOptions};
use observability::{BusMetrics, MetricsSnapshot};

use crate::cache::ResultCache;
use crate::publication::PublicationResult;
use crate::queue::{DispatchQueue, QueueItem};
use crate::registry::SubscriberRegistry;

/// Poll interval while draining during graceful shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(5);

/// In-process publish/subscribe bus.
///
/// Generic over the event type; the bus only needs the discriminator for
/// routing and serializability for cache keying. Construction spawns the
/// drain worker when `daemon_mode` is set, so a bus must be created inside
/// a tokio runtime.
pub struct EventBus<E: BusEvent> {
    config: BusConfig,
    registry: Arc<RwLock<SubscriberRegistry<E>>>,
    cache: Mutex<ResultCache<E>>,
    metrics: Arc<BusMetrics>,
    queue: DispatchQueue<E>,
    accepting: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_subscriber_id: AtomicU64,
}

impl<E: BusEvent> EventBus<E> {
    /// Create a bus from a frozen configuration.
    #[instrument(name = "event_bus_new", skip(config), fields(bus = %config.identifier))]
    pub fn new(config: BusConfig) -> Self {
        let metrics = Arc::new(BusMetrics::new(&config.identifier, config.max_latency_ms));
        let queue = DispatchQueue::new(
            config.max_queue_size,
            Arc::clone(&metrics),
            Arc::clone(&config.exception_handler),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = if config.daemon_mode {
            Some(queue.spawn_worker(config.dispatcher_count, shutdown_rx))
        } else {
            None
        };
        let cache_capacity = if config.cache_enabled {
            config.max_cache_size
        } else {
            0
        };

        info!(
            bus = %config.identifier,
            dispatchers = config.dispatcher_count,
            queue = config.max_queue_size,
            cache = config.cache_enabled,
            "EventBus started"
        );

        Self {
            registry: Arc::new(RwLock::new(SubscriberRegistry::new())),
            cache: Mutex::new(ResultCache::new(cache_capacity)),
            metrics,
            queue,
            accepting: AtomicBool::new(true),
            shutdown_tx,
            worker: Mutex::new(worker),
            next_subscriber_id: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<BusMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Point-in-time metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Human-readable multi-line metrics report.
    pub fn formatted_metrics(&self) -> String {
        self.snapshot().to_string()
    }

    /// Publish an event, resolving (or recalling) its matching handlers.
    ///
    /// With caching enabled, canonically identical event values between
    /// registry changes return the same shared result object. Publish-call
    /// latency is always recorded and logged when over target, never
    /// enforced.
    pub fn publish(&self, event: E) -> Result<Arc<PublicationResult<E>>, BusError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(BusError::Shutdown);
        }
        let started = Instant::now();

        let result = if self.config.cache_enabled {
            let key = serde_json::to_string(&event)?;
            let cached = self
                .cache
                .lock()
                .ok()
                .and_then(|cache| cache.get(&key));

            match cached {
                Some(hit) => {
                    self.metrics.record_cache_hit();
                    debug!(event_type = hit.event().event_type(), "publication cache hit");
                    hit
                }
                None => {
                    self.metrics.record_cache_miss();
                    let result = Arc::new(self.resolve(event));
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(key, Arc::clone(&result));
                    }
                    result
                }
            }
        } else {
            Arc::new(self.resolve(event))
        };

        self.metrics
            .record_publish(started.elapsed().as_secs_f64() * 1000.0);
        Ok(result)
    }

    fn resolve(&self, event: E) -> PublicationResult<E> {
        let snapshot = self
            .registry
            .read()
            .map(|registry| registry.snapshot(event.event_type()))
            .unwrap_or_default();

        if snapshot.is_empty() {
            debug!(event_type = event.event_type(), "no subscribers, dead publication");
            PublicationResult::dead(event, Arc::clone(&self.metrics))
        } else {
            PublicationResult::standard(
                event,
                snapshot,
                Arc::downgrade(&self.registry),
                Arc::clone(&self.metrics),
            )
        }
    }

    /// Publish and queue the result for a later drain tick.
    ///
    /// Never blocks: at queue capacity the publication is dropped with a
    /// warning and the caller sees no error.
    pub fn publish_async(&self, event: E) -> Result<Arc<PublicationResult<E>>, BusError> {
        let result = self.publish(event)?;
        self.enqueue(Arc::clone(&result));
        Ok(result)
    }

    /// Like [`Self::publish_async`], additionally warning when the item is
    /// not drained by the deadline. The deadline never cancels anything.
    pub fn publish_async_with_timeout(
        &self,
        event: E,
        timeout_ms: u64,
    ) -> Result<Arc<PublicationResult<E>>, BusError> {
        let result = self.publish(event)?;
        self.enqueue_with_deadline(Arc::clone(&result), Some(Duration::from_millis(timeout_ms)));
        Ok(result)
    }

    /// Queue an already-produced publication for async dispatch.
    pub fn enqueue(&self, result: Arc<PublicationResult<E>>) {
        self.enqueue_with_deadline(result, None);
    }

    fn enqueue_with_deadline(
        &self,
        result: Arc<PublicationResult<E>>,
        deadline: Option<Duration>,
    ) {
        if !self.accepting.load(Ordering::Acquire) {
            warn!(
                event_type = result.event().event_type(),
                "bus shut down, publication not queued"
            );
            return;
        }
        self.queue.try_enqueue(QueueItem {
            result,
            enqueued_at: Instant::now(),
            deadline,
        });
    }

    /// Subscribe a handler to an event type.
    ///
    /// Every subscribe flushes the whole result cache: cached publications
    /// snapshot the registry, so any registry change invalidates all of
    /// them at once. Returns the subscriber id.
    pub fn on<F, Fut>(
        &self,
        event_type: impl Into<String>,
        handler: F,
        opts: SubscribeOptions<E>,
    ) -> String
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BusError>> + Send + 'static,
    {
        let event_type = event_type.into();
        let subscriber_id = opts.subscriber_id.unwrap_or_else(|| {
            format!(
                "sub-{}",
                self.next_subscriber_id.fetch_add(1, Ordering::Relaxed)
            )
        });

        let registered = RegisteredHandler {
            handler: Arc::new(move |event: E| -> HandlerFuture { Box::pin(handler(event)) }),
            priority: opts.priority,
            filter: opts.filter,
            once: opts.once,
            subscriber_id: subscriber_id.clone(),
        };

        if let Ok(mut registry) = self.registry.write() {
            registry.insert(&event_type, registered);
        }
        self.flush_cache();
        self.metrics.record_subscribe();
        debug!(event_type = %event_type, subscriber_id = %subscriber_id, "subscribed");

        subscriber_id
    }

    /// Subscribe a handler that fires exactly once.
    pub fn once<F, Fut>(&self, event_type: impl Into<String>, handler: F) -> String
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BusError>> + Send + 'static,
    {
        self.on(event_type, handler, SubscribeOptions::default().once())
    }

    /// Remove one registration, or the whole bucket when `subscriber_id` is
    /// None. Always flushes the cache. Returns how many were removed.
    pub fn off(&self, event_type: &str, subscriber_id: Option<&str>) -> usize {
        let removed = self
            .registry
            .write()
            .map(|mut registry| registry.remove(event_type, subscriber_id))
            .unwrap_or(0);
        self.flush_cache();
        self.metrics.record_unsubscribe();
        debug!(event_type, removed, "unsubscribed");
        removed
    }

    fn flush_cache(&self) {
        if !self.config.cache_enabled {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        self.metrics.record_cache_invalidation();
    }

    /// Registered handlers for a type (filters not evaluated).
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.registry
            .read()
            .map(|registry| registry.handler_count(event_type))
            .unwrap_or(0)
    }

    /// Items queued but not yet dispatched.
    pub fn pending_dispatches(&self) -> usize {
        self.queue.pending()
    }

    /// Drain one batch now (up to `dispatcher_count` items).
    ///
    /// Intended for `daemon_mode = false`, where no background worker runs
    /// and draining is driven explicitly.
    pub async fn drain_now(&self) -> usize {
        self.queue.drain_batch(self.config.dispatcher_count).await
    }

    /// Drain the queue, then stop.
    ///
    /// Polls until the queue is empty or the timeout elapses; undelivered
    /// items are logged and discarded with the worker.
    #[instrument(name = "event_bus_shutdown", skip(self), fields(bus = %self.config.identifier))]
    pub async fn shutdown_gracefully(&self, timeout_ms: u64) {
        self.accepting.store(false, Ordering::Release);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let has_worker = self
            .worker
            .lock()
            .map(|worker| worker.is_some())
            .unwrap_or(false);

        while self.queue.pending() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    remaining = self.queue.pending(),
                    "shutdown timeout, undelivered publications remain"
                );
                break;
            }
            if has_worker {
                tokio::time::sleep(SHUTDOWN_POLL).await;
            } else {
                self.drain_now().await;
            }
        }

        self.stop_worker(false).await;
        info!("EventBus shutdown complete");
    }

    /// Discard the queue immediately without draining.
    pub async fn force_shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        self.stop_worker(true).await;
        let discarded = self.queue.discard_all().await;
        if discarded > 0 {
            warn!(discarded, "queue discarded on forced shutdown");
        }
        info!("EventBus force shutdown complete");
    }

    /// Graceful shutdown with a default drain timeout.
    pub async fn shutdown(&self) {
        self.shutdown_gracefully(5_000).await;
    }

    async fn stop_worker(&self, abort: bool) {
        let _ = self.shutdown_tx.send(true);
        let handle = self
            .worker
            .lock()
            .ok()
            .and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if abort {
                handle.abort();
            }
            let _ = handle.await;
        }
    }
}

impl<E: BusEvent> Drop for EventBus<E> {
    fn drop(&mut self) {
        // Unblocks the worker if the bus is dropped without a shutdown call
        let _ = self.shutdown_tx.send(true);
    }
}
