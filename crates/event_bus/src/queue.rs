//! Bounded dispatch queue - drop-newest backpressure + periodic batch drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use bus_config::ExceptionHandler;
use contracts::BusEvent;
use observability::BusMetrics;

use crate::publication::PublicationResult;

/// Fixed interval between drain ticks.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// A queued publication awaiting its drain tick.
pub(crate) struct QueueItem<E: BusEvent> {
    pub result: Arc<PublicationResult<E>>,
    pub enqueued_at: Instant,
    /// Observational only: logs a warning when drained late, never cancels.
    pub deadline: Option<Duration>,
}

/// Bounded FIFO feeding the drain worker.
///
/// Enqueue never blocks the publisher: at capacity the newest item is
/// dropped with a warning and a counter bump, and the caller sees no error.
pub(crate) struct DispatchQueue<E: BusEvent> {
    tx: mpsc::Sender<QueueItem<E>>,
    rx: Arc<Mutex<mpsc::Receiver<QueueItem<E>>>>,
    pending: Arc<AtomicUsize>,
    metrics: Arc<BusMetrics>,
    exception_handler: ExceptionHandler,
}

impl<E: BusEvent> Clone for DispatchQueue<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            pending: Arc::clone(&self.pending),
            metrics: Arc::clone(&self.metrics),
            exception_handler: Arc::clone(&self.exception_handler),
        }
    }
}

impl<E: BusEvent> DispatchQueue<E> {
    pub fn new(
        capacity: usize,
        metrics: Arc<BusMetrics>,
        exception_handler: ExceptionHandler,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            pending: Arc::new(AtomicUsize::new(0)),
            metrics,
            exception_handler,
        }
    }

    /// Enqueue without blocking.
    ///
    /// Returns true if queued, false if dropped (queue full or closed).
    pub fn try_enqueue(&self, item: QueueItem<E>) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(mpsc::error::TrySendError::Full(item)) => {
                self.metrics.record_queue_drop();
                warn!(
                    event_type = item.result.event().event_type(),
                    "dispatch queue full, publication dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("dispatch queue closed unexpectedly");
                false
            }
        }
    }

    /// Items enqueued but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Pop and dispatch up to `batch` items, one at a time in sequence.
    ///
    /// Returns how many items were dispatched.
    pub async fn drain_batch(&self, batch: usize) -> usize {
        let mut rx = self.rx.lock().await;
        let mut drained = 0;

        for _ in 0..batch {
            let item = match rx.try_recv() {
                Ok(item) => item,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            };
            self.pending.fetch_sub(1, Ordering::SeqCst);

            if let Some(deadline) = item.deadline {
                let waited = item.enqueued_at.elapsed();
                if waited > deadline {
                    warn!(
                        event_type = item.result.event().event_type(),
                        waited_ms = waited.as_millis() as u64,
                        deadline_ms = deadline.as_millis() as u64,
                        "publication drained after its deadline"
                    );
                }
            }

            let outcome = item.result.dispatch().await;
            for err in &outcome.errors {
                (self.exception_handler)(err, Some("async dispatch"));
            }
            drained += 1;
        }

        drained
    }

    /// Discard everything without dispatching. Returns the discarded count.
    pub async fn discard_all(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            discarded += 1;
        }
        discarded
    }

    /// Spawn the periodic drain worker.
    pub fn spawn_worker(
        &self,
        dispatcher_count: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            debug!("drain worker started");
            let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        queue.drain_batch(dispatcher_count).await;
                    }
                }
            }
            debug!("drain worker stopped");
        })
    }
}
