//! Cache Statistics Module
//!
//! Per-segment atomic counters and the aggregated snapshot reported by the cache.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

// == Segment Stats ==
/// Counters owned by one segment.
///
/// Written under the segment lock, read with relaxed loads from anywhere.
/// Everything except `entry_count` only grows until reset.
#[derive(Debug, Default)]
pub struct SegmentStats {
    entry_count: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
    evacuations: AtomicU64,
    expirations: AtomicU64,
    overwrites: AtomicU64,
    touches: AtomicU64,
    /// Accumulated lookup latency in nanoseconds
    access_time_ns: AtomicU64,
    /// Number of lookups folded into `access_time_ns`
    access_samples: AtomicU64,
}

impl SegmentStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Recorders ==
    pub fn record_insert(&self) {
        self.entry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removal(&self) {
        self.entry_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a hit along with the time the lookup took.
    pub fn record_hit(&self, elapsed_ns: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.access_time_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
        self.access_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evacuation(&self) {
        self.evacuations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overwrite(&self) {
        self.overwrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_touch(&self) {
        self.touches.fetch_add(1, Ordering::Relaxed);
    }

    // == Resets ==
    /// Zeroes the live entry count (used when the segment is cleared).
    pub fn clear_entries(&self) {
        self.entry_count.store(0, Ordering::Relaxed);
    }

    /// Zeroes every cumulative counter, leaving the entry count intact.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evacuations,
            &self.expirations,
            &self.overwrites,
            &self.touches,
            &self.access_time_ns,
            &self.access_samples,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    // == Readers ==
    pub fn entry_count(&self) -> i64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evacuations(&self) -> u64 {
        self.evacuations.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn overwrites(&self) -> u64 {
        self.overwrites.load(Ordering::Relaxed)
    }

    pub fn touches(&self) -> u64 {
        self.touches.load(Ordering::Relaxed)
    }

    pub fn access_time_ns(&self) -> u64 {
        self.access_time_ns.load(Ordering::Relaxed)
    }

    pub fn access_samples(&self) -> u64 {
        self.access_samples.load(Ordering::Relaxed)
    }
}

// == Cache Stats ==
/// Aggregated snapshot across all segments.
///
/// Segments are sampled one after another, so the totals are not taken at a
/// single instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of live entries
    pub entry_count: i64,
    /// Number of successful lookups
    pub hits: u64,
    /// Number of failed lookups (absent or expired)
    pub misses: u64,
    /// Entries displaced by newer writes
    pub evacuations: u64,
    /// Entries found expired on access
    pub expirations: u64,
    /// Sets that replaced an existing key
    pub overwrites: u64,
    /// Successful TTL refreshes
    pub touches: u64,
    /// Average lookup latency in nanoseconds
    pub average_access_time: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl CacheStats {
    // == Aggregate ==
    /// Sums the counters of every segment.
    pub fn aggregate<'a>(segments: impl IntoIterator<Item = &'a SegmentStats>) -> Self {
        let mut stats = Self::default();
        let mut access_time_ns = 0u64;
        let mut access_samples = 0u64;

        for segment in segments {
            stats.entry_count += segment.entry_count();
            stats.hits += segment.hits();
            stats.misses += segment.misses();
            stats.evacuations += segment.evacuations();
            stats.expirations += segment.expirations();
            stats.overwrites += segment.overwrites();
            stats.touches += segment.touches();
            access_time_ns += segment.access_time_ns();
            access_samples += segment.access_samples();
        }

        stats.average_access_time = average(access_time_ns, access_samples);
        stats.hit_rate = hit_rate(stats.hits, stats.misses);
        stats
    }

    // == Lookup Count ==
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

// == Utility Functions ==
/// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Integer average, 0 when there are no samples.
pub fn average(total: u64, samples: u64) -> u64 {
    if samples == 0 {
        0
    } else {
        total / samples
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = SegmentStats::new();
        assert_eq!(stats.entry_count(), 0);
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.evacuations(), 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(hit_rate(0, 0), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        assert_eq!(hit_rate(3, 0), 1.0);
        assert_eq!(hit_rate(0, 2), 0.0);
        assert_eq!(hit_rate(1, 1), 0.5);
    }

    #[test]
    fn test_average_access_time() {
        assert_eq!(average(0, 0), 0);
        assert_eq!(average(300, 3), 100);
    }

    #[test]
    fn test_reset_keeps_entry_count() {
        let stats = SegmentStats::new();
        stats.record_insert();
        stats.record_insert();
        stats.record_hit(50);
        stats.record_miss();
        stats.record_evacuation();
        stats.record_expiration();
        stats.record_overwrite();
        stats.record_touch();

        stats.reset();

        assert_eq!(stats.entry_count(), 2);
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.evacuations(), 0);
        assert_eq!(stats.expirations(), 0);
        assert_eq!(stats.overwrites(), 0);
        assert_eq!(stats.touches(), 0);
        assert_eq!(stats.access_samples(), 0);
    }

    #[test]
    fn test_aggregate_across_segments() {
        let first = SegmentStats::new();
        let second = SegmentStats::new();

        first.record_insert();
        first.record_hit(100);
        second.record_insert();
        second.record_hit(300);
        second.record_miss();
        second.record_evacuation();

        let stats = CacheStats::aggregate([&first, &second]);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evacuations, 1);
        assert_eq!(stats.lookups(), 3);
        assert_eq!(stats.average_access_time, 200);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
