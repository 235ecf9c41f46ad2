//! Bounded, time-expiring store for resolved analysis outcomes.
//!
//! Keyed by [`ImageFingerprint`]. Entries older than the expiry window are
//! evicted lazily on lookup; capacity pressure evicts the least-recently-used
//! entry. Nothing is persisted — a restart starts cold.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::analysis::types::AnalysisOutcome;
use crate::fingerprint::ImageFingerprint;

use super::CacheStats;

/// A stored outcome with its insertion time.
struct Entry {
    outcome: AnalysisOutcome,
    inserted_at: Instant,
}

/// Map plus access order. Oldest key at the front of `order`, newest at the
/// back, so `pop_front()` always removes the least-recently-used entry.
struct LruState {
    entries: HashMap<ImageFingerprint, Entry>,
    order: VecDeque<ImageFingerprint>,
}

/// Bounded LRU cache of analysis outcomes with lazy time expiry.
///
/// All operations take the internal lock for their full read-check-write
/// sequence; a poisoned lock is treated as a cache that has nothing to offer.
pub struct OutcomeCache {
    state: Mutex<LruState>,
    capacity: usize,
    expiry: Duration,
}

impl OutcomeCache {
    /// Create a cache with the given capacity bound and expiry window.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize, expiry: Duration) -> Self {
        assert!(capacity > 0, "cache capacity must be > 0");
        Self {
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            expiry,
        }
    }

    /// Look up an outcome, promoting it to most-recently-used.
    ///
    /// Returns `None` if the key is absent or the stored entry has aged past
    /// the expiry window (the expired entry is evicted in the same critical
    /// section).
    pub fn get(&self, key: &ImageFingerprint) -> Option<AnalysisOutcome> {
        let mut state = self.state.lock().ok()?;

        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() > self.expiry,
        };
        if expired {
            state.entries.remove(key);
            state.order.retain(|k| k != key);
            return None;
        }

        state.order.retain(|k| k != key);
        state.order.push_back(key.clone());
        state.entries.get(key).map(|e| e.outcome.clone())
    }

    /// Insert or overwrite an outcome, evicting the LRU entry at capacity.
    ///
    /// Overwriting an existing key refreshes its insertion time and moves it
    /// to most-recently-used without changing the entry count.
    pub fn put(&self, key: ImageFingerprint, outcome: AnalysisOutcome) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if state.entries.contains_key(&key) {
            state.order.retain(|k| k != &key);
        } else if state.entries.len() >= self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.entries.remove(&evicted);
            }
        }
        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            Entry {
                outcome,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove all entries.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.order.clear();
        }
    }

    /// Current occupancy.
    pub fn stats(&self) -> CacheStats {
        let size = self.state.lock().map(|s| s.entries.len()).unwrap_or(0);
        CacheStats {
            size,
            capacity: self.capacity,
        }
    }
}
