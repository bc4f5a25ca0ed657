//! Subscriber registry - per-type handler buckets

use std::collections::HashMap;

use contracts::RegisteredHandler;

/// Handler buckets keyed by event type.
///
/// Mutated synchronously by subscribe/unsubscribe; publish takes an owned
/// snapshot of a bucket so later registry changes never retroactively affect
/// an already-produced publication result.
pub struct SubscriberRegistry<E> {
    buckets: HashMap<String, Vec<RegisteredHandler<E>>>,
}

impl<E> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }
}

impl<E> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration to its bucket (registration order preserved).
    pub fn insert(&mut self, event_type: &str, handler: RegisteredHandler<E>) {
        self.buckets
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove one registration by id, or the whole bucket when `id` is None.
    ///
    /// Returns how many registrations were removed.
    pub fn remove(&mut self, event_type: &str, subscriber_id: Option<&str>) -> usize {
        match subscriber_id {
            Some(id) => {
                let Some(bucket) = self.buckets.get_mut(event_type) else {
                    return 0;
                };
                let before = bucket.len();
                bucket.retain(|h| h.subscriber_id != id);
                let removed = before - bucket.len();
                if bucket.is_empty() {
                    self.buckets.remove(event_type);
                }
                removed
            }
            None => self
                .buckets
                .remove(event_type)
                .map(|bucket| bucket.len())
                .unwrap_or(0),
        }
    }

    /// Drop fired one-shot registrations from the live bucket.
    pub fn remove_fired_once(&mut self, event_type: &str, subscriber_ids: &[String]) {
        let Some(bucket) = self.buckets.get_mut(event_type) else {
            return;
        };
        bucket.retain(|h| !(h.once && subscriber_ids.contains(&h.subscriber_id)));
        if bucket.is_empty() {
            self.buckets.remove(event_type);
        }
    }

    /// Owned copy of a bucket at this instant; empty when no subscribers.
    pub fn snapshot(&self, event_type: &str) -> Vec<RegisteredHandler<E>>
    where
        E: Clone,
    {
        self.buckets.get(event_type).cloned().unwrap_or_default()
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.buckets.get(event_type).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_handler(id: &str, once: bool) -> RegisteredHandler<String> {
        RegisteredHandler {
            handler: Arc::new(|_| Box::pin(async { Ok(()) })),
            priority: 0,
            filter: None,
            once,
            subscriber_id: id.to_string(),
        }
    }

    #[test]
    fn test_insert_and_snapshot() {
        let mut registry = SubscriberRegistry::new();
        registry.insert("a", noop_handler("s1", false));
        registry.insert("a", noop_handler("s2", false));
        registry.insert("b", noop_handler("s3", false));

        assert_eq!(registry.snapshot("a").len(), 2);
        assert_eq!(registry.snapshot("b").len(), 1);
        assert!(registry.snapshot("c").is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut registry = SubscriberRegistry::new();
        registry.insert("a", noop_handler("s1", false));
        registry.insert("a", noop_handler("s2", false));

        assert_eq!(registry.remove("a", Some("s1")), 1);
        assert_eq!(registry.handler_count("a"), 1);
        assert_eq!(registry.remove("a", Some("missing")), 0);
    }

    #[test]
    fn test_remove_whole_bucket() {
        let mut registry = SubscriberRegistry::new();
        registry.insert("a", noop_handler("s1", false));
        registry.insert("a", noop_handler("s2", false));

        assert_eq!(registry.remove("a", None), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_fired_once_keeps_persistent() {
        let mut registry = SubscriberRegistry::new();
        registry.insert("a", noop_handler("keep", false));
        registry.insert("a", noop_handler("fire", true));

        registry.remove_fired_once("a", &["keep".to_string(), "fire".to_string()]);
        let remaining = registry.snapshot("a");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subscriber_id, "keep");
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut registry = SubscriberRegistry::new();
        registry.insert("a", noop_handler("s1", false));
        let snapshot = registry.snapshot("a");
        registry.remove("a", None);
        // The snapshot survives registry mutation
        assert_eq!(snapshot.len(), 1);
    }
}
