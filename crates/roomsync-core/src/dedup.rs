//! Duplicate suppression for non-state events.
//!
//! The same event can reach the core from the live stream and from a
//! pagination window that overlaps it. The guard remembers ids it has
//! already let through, evicting the oldest once it reaches capacity.

use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Default number of remembered event ids.
pub const DEFAULT_DEDUP_CAPACITY: usize = 65_536;

/// Bounded set of processed event ids.
#[derive(Debug)]
pub struct DedupGuard {
    seen: HashSet<String>,
    /// Insertion order, oldest first. Only maintained when bounded.
    order: VecDeque<String>,
    /// Zero means unbounded.
    capacity: usize,
}

impl DedupGuard {
    /// Create a guard with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DEDUP_CAPACITY)
    }

    /// Create a guard remembering at most `capacity` ids (`0` = unbounded).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Record `event_id`.
    ///
    /// Returns `true` if the id had not been seen, `false` for a duplicate.
    pub fn check_and_insert(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }

        if self.capacity > 0 {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                    trace!(event_id = %oldest, "Evicted dedup entry");
                }
            }
            self.order.push_back(event_id.to_string());
        }

        self.seen.insert(event_id.to_string());
        true
    }

    /// Check whether `event_id` is currently remembered.
    #[must_use]
    pub fn contains(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been remembered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Configured capacity (`0` = unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new()
    }
}
