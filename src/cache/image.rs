//! Bounded store for prepared upload images.
//!
//! Repeated analyses of the same photo within a session (a retry racing a
//! fresh request, a re-submit after a transient failure) would otherwise
//! redo the decode/resize/re-encode work. Entries are evicted purely by
//! capacity — the artifact is a performance optimization, so no expiry
//! window applies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::fingerprint::ImageFingerprint;
use crate::preprocess::PreparedImage;

use super::CacheStats;

struct LruState {
    entries: HashMap<ImageFingerprint, Arc<PreparedImage>>,
    order: VecDeque<ImageFingerprint>,
}

/// Bounded LRU cache of [`PreparedImage`] artifacts.
///
/// Values are shared via `Arc` — the JPEG payload can run to hundreds of
/// kilobytes and a hit should not copy it.
pub struct PreparedImageCache {
    state: Mutex<LruState>,
    capacity: usize,
}

impl PreparedImageCache {
    /// Create a cache with the given capacity bound.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be > 0");
        Self {
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Look up a prepared image, promoting it to most-recently-used.
    pub fn get(&self, key: &ImageFingerprint) -> Option<Arc<PreparedImage>> {
        let mut state = self.state.lock().ok()?;
        if !state.entries.contains_key(key) {
            return None;
        }
        state.order.retain(|k| k != key);
        state.order.push_back(key.clone());
        state.entries.get(key).cloned()
    }

    /// Insert a prepared image, evicting the LRU entry at capacity.
    ///
    /// Returns the stored handle so the caller shares the cached allocation
    /// without a second lookup.
    pub fn put(&self, key: ImageFingerprint, image: PreparedImage) -> Arc<PreparedImage> {
        let stored = Arc::new(image);
        let Ok(mut state) = self.state.lock() else {
            return stored;
        };

        if state.entries.contains_key(&key) {
            state.order.retain(|k| k != &key);
        } else if state.entries.len() >= self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.entries.remove(&evicted);
            }
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, Arc::clone(&stored));
        stored
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
