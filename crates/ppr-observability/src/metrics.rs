//! Engine-level counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Prerender attempts run.
    pub prerenders: u64,
    /// Shell cache hits.
    pub cache_hits: u64,
    /// Shell cache misses.
    pub cache_misses: u64,
    /// Holes emitted into stored shells.
    pub holes_emitted: u64,
    /// Holes filled by streaming resume.
    pub holes_resumed: u64,
    /// Full-dynamic renders served.
    pub synchronous_renders: u64,
    /// Intercepted postpone signals.
    pub interceptions: u64,
    /// Render attempts failed by a genuine error.
    pub render_errors: u64,
    /// Streams abandoned because the client went away.
    pub abandoned_streams: u64,
}

impl MetricsSnapshot {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Fraction of lookups that hit, if any lookups happened.
    pub fn hit_ratio(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / lookups as f64)
        }
    }
}

/// Counters shared by every request the engine serves.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    prerenders: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    holes_emitted: AtomicU64,
    holes_resumed: AtomicU64,
    synchronous_renders: AtomicU64,
    interceptions: AtomicU64,
    render_errors: AtomicU64,
    abandoned_streams: AtomicU64,
}

impl EngineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prerender(&self, holes: usize, interceptions: usize) {
        self.prerenders.fetch_add(1, Ordering::Relaxed);
        self.holes_emitted.fetch_add(holes as u64, Ordering::Relaxed);
        self.interceptions
            .fetch_add(interceptions as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hole_resumed(&self) {
        self.holes_resumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synchronous_render(&self) {
        self.synchronous_renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_error(&self) {
        self.render_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned_stream(&self) {
        self.abandoned_streams.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            prerenders: self.prerenders.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            holes_emitted: self.holes_emitted.load(Ordering::Relaxed),
            holes_resumed: self.holes_resumed.load(Ordering::Relaxed),
            synchronous_renders: self.synchronous_renders.load(Ordering::Relaxed),
            interceptions: self.interceptions.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            abandoned_streams: self.abandoned_streams.load(Ordering::Relaxed),
        }
    }
}
