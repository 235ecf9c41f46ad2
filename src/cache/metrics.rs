//! Cache-hit accounting for the analysis pipeline.
//!
//! An explicit counter object owned by the service and shared by `Arc`, not
//! module-level globals — callers inject or read it, and isolated tests get
//! isolated counters. Process-scoped; counts reset on restart.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic hit/miss counters for the outcome cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Hits over total lookups; 0.0 before any lookup.
    pub hit_rate: f32,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        };
        MetricsSnapshot {
            hits,
            misses,
            hit_rate,
        }
    }

    /// Zero both counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_are_zero() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.hits(), 0);
        assert_eq!(metrics.misses(), 0);
        assert_eq!(metrics.snapshot().hit_rate, 0.0);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let snap = metrics.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn reset_zeroes_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_miss();
        metrics.reset();

        assert_eq!(metrics.hits(), 0);
        assert_eq!(metrics.misses(), 0);
    }

    #[test]
    fn increments_are_thread_safe() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(CacheMetrics::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let metrics = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    metrics.record_hit();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.hits(), 1000);
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"hits\":1"));
        assert!(json.contains("hit_rate"));
    }
}
