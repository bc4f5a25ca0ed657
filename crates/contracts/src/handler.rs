//! Handler registration types shared between the bus and its callers

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::BusError;

/// Boxed future returned by an event handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BusError>> + Send>>;

/// An event handler: receives its own clone of the published event.
pub type HandlerFn<E> = Arc<dyn Fn(E) -> HandlerFuture + Send + Sync>;

/// Optional predicate deciding whether a handler sees a given event.
pub type FilterFn<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A single registration in a subscriber bucket.
///
/// Owned exclusively by the per-type bucket; removed on unsubscribe or
/// automatically after firing when `once` is set.
#[derive(Clone)]
pub struct RegisteredHandler<E> {
    pub handler: HandlerFn<E>,
    /// Higher priority runs first; ties keep registration order.
    pub priority: i32,
    pub filter: Option<FilterFn<E>>,
    pub once: bool,
    /// Unique per registration.
    pub subscriber_id: String,
}

impl<E> fmt::Debug for RegisteredHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("subscriber_id", &self.subscriber_id)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

/// Options for a subscription.
pub struct SubscribeOptions<E> {
    pub priority: i32,
    pub filter: Option<FilterFn<E>>,
    pub once: bool,
    /// Auto-generated ("sub-N") when not supplied.
    pub subscriber_id: Option<String>,
}

impl<E> Default for SubscribeOptions<E> {
    fn default() -> Self {
        Self {
            priority: 0,
            filter: None,
            once: false,
            subscriber_id: None,
        }
    }
}

impl<E> SubscribeOptions<E> {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn filter(mut self, filter: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn subscriber_id(mut self, id: impl Into<String>) -> Self {
        self.subscriber_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let opts: SubscribeOptions<String> = SubscribeOptions::default();
        assert_eq!(opts.priority, 0);
        assert!(!opts.once);
        assert!(opts.filter.is_none());
        assert!(opts.subscriber_id.is_none());
    }

    #[test]
    fn test_options_chaining() {
        let opts: SubscribeOptions<String> = SubscribeOptions::default()
            .priority(5)
            .once()
            .filter(|s: &String| s.starts_with("x"))
            .subscriber_id("custom");
        assert_eq!(opts.priority, 5);
        assert!(opts.once);
        assert!((opts.filter.unwrap())(&"xyz".to_string()));
        assert_eq!(opts.subscriber_id.as_deref(), Some("custom"));
    }
}
