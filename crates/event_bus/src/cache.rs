//! Publication result cache
//!
//! Keyed by the canonical `serde_json` string of the event value, so two
//! structurally different events with identical serializations share an
//! entry. Known aliasing risk, accepted: the registry flush on every
//! subscribe/unsubscribe bounds how stale a shared entry can get.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::publication::PublicationResult;
use contracts::BusEvent;

/// Insertion-ordered cache with single-oldest eviction.
pub struct ResultCache<E: BusEvent> {
    entries: HashMap<String, Arc<PublicationResult<E>>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<E: BusEvent> ResultCache<E> {
    /// Capacity 0 stores nothing; every lookup is a miss.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<PublicationResult<E>>> {
        self.entries.get(key).cloned()
    }

    /// Insert, evicting the oldest entry by insertion order at capacity.
    pub fn insert(&mut self, key: String, result: Arc<PublicationResult<E>>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, result);
    }

    /// Full flush.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
