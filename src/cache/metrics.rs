use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives cache outcomes from the score cache and the warmer.
pub trait MetricsSink: Send + Sync {
    fn record_hit(&self);
    fn record_miss(&self);
    fn record_error(&self);
    fn snapshot(&self) -> MetricsSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// hits / (hits + misses); 1.0 before any lookup.
    pub hit_rate: f64,
    /// errors / all operations; 0.0 before any operation.
    pub error_rate: f64,
}

/// Lock-free counters.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for CacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);

        let lookups = hits + misses;
        let operations = lookups + errors;
        MetricsSnapshot {
            hits,
            misses,
            errors,
            hit_rate: if lookups == 0 {
                1.0
            } else {
                hits as f64 / lookups as f64
            },
            error_rate: if operations == 0 {
                0.0
            } else {
                errors as f64 / operations as f64
            },
        }
    }
}
