//! PublicationResult - snapshot of matching handlers, not yet executed

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Instant;

use tracing::{debug, warn};

use contracts::{BusError, BusEvent, DispatchOutcome, RegisteredHandler};
use observability::BusMetrics;

use crate::registry::SubscriberRegistry;

/// Whether any subscribers matched at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationKind {
    /// No handlers existed for the topic type; dispatching is a no-op.
    Dead,
    /// Holds a handler snapshot taken at publish time.
    Standard,
}

/// Result of a publish call.
///
/// Standard results carry an immutable snapshot of the matching bucket;
/// later subscribe/unsubscribe never retroactively affects it. Shared via
/// `Arc` so cached publications hand out the same object, with a dispatched
/// flag that flips exactly once across all holders.
pub struct PublicationResult<E: BusEvent> {
    kind: PublicationKind,
    event: E,
    snapshot: Vec<RegisteredHandler<E>>,
    dispatched: AtomicBool,
    /// Live registry handle for one-shot removal; dead for Dead results.
    registry: Weak<RwLock<SubscriberRegistry<E>>>,
    metrics: Arc<BusMetrics>,
}

impl<E: BusEvent> fmt::Debug for PublicationResult<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicationResult")
            .field("kind", &self.kind)
            .field("event_type", &self.event.event_type())
            .field("handlers", &self.snapshot.len())
            .field("dispatched", &self.dispatched.load(Ordering::Relaxed))
            .finish()
    }
}

impl<E: BusEvent> PublicationResult<E> {
    /// Publication with no matching subscribers.
    pub fn dead(event: E, metrics: Arc<BusMetrics>) -> Self {
        Self {
            kind: PublicationKind::Dead,
            event,
            snapshot: Vec::new(),
            dispatched: AtomicBool::new(false),
            registry: Weak::new(),
            metrics,
        }
    }

    /// Publication snapshotting the bucket that matched at publish time.
    pub fn standard(
        event: E,
        snapshot: Vec<RegisteredHandler<E>>,
        registry: Weak<RwLock<SubscriberRegistry<E>>>,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            kind: PublicationKind::Standard,
            event,
            snapshot,
            dispatched: AtomicBool::new(false),
            registry,
            metrics,
        }
    }

    pub fn kind(&self) -> PublicationKind {
        self.kind
    }

    pub fn is_dead(&self) -> bool {
        self.kind == PublicationKind::Dead
    }

    /// Handlers in the snapshot (before filtering).
    pub fn handler_count(&self) -> usize {
        self.snapshot.len()
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    /// Execute the snapshotted handler chain.
    ///
    /// Handlers run in descending priority (registration order breaks ties),
    /// awaited one at a time; a slow handler delays the ones after it in the
    /// same dispatch. Per-handler failures are collected without aborting
    /// the chain. Fired one-shot handlers are removed from the live
    /// registry. Idempotent: a second call reports `AlreadyDispatched`
    /// without re-running anything.
    pub async fn dispatch(&self) -> DispatchOutcome {
        if self.kind == PublicationKind::Dead {
            debug!(
                event_type = self.event.event_type(),
                "dispatch of dead publication is a no-op"
            );
            return DispatchOutcome::dead();
        }

        if self
            .dispatched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                event_type = self.event.event_type(),
                "publication already dispatched"
            );
            return DispatchOutcome::already_dispatched();
        }

        let started = Instant::now();

        let mut ordered = self.snapshot.clone();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut invoked = 0;
        let mut errors = Vec::new();
        let mut fired_once = Vec::new();

        for registration in &ordered {
            if let Some(filter) = &registration.filter {
                if !filter(&self.event) {
                    continue;
                }
            }

            match (registration.handler)(self.event.clone()).await {
                Ok(()) => invoked += 1,
                Err(e) => {
                    self.metrics.record_error();
                    errors.push(BusError::handler(
                        &registration.subscriber_id,
                        e.to_string(),
                    ));
                }
            }

            if registration.once {
                fired_once.push(registration.subscriber_id.clone());
            }
        }

        if !fired_once.is_empty() {
            if let Some(registry) = self.registry.upgrade() {
                if let Ok(mut registry) = registry.write() {
                    registry.remove_fired_once(self.event.event_type(), &fired_once);
                }
            }
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_dispatch(duration_ms);

        DispatchOutcome {
            success: errors.is_empty(),
            handlers_invoked: invoked,
            errors,
            duration_ms,
        }
    }
}
