//! Cache Store Module
//!
//! The sharding coordinator: 256 independently locked segments behind a
//! single key space. Every operation hashes the key once, picks the segment
//! from the low byte of the hash and runs entirely under that segment's lock.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::cache::segment::Segment;
use crate::cache::stats::{self, CacheStats, SegmentStats};
use crate::cache::timer::{SystemTimer, Timer};
use crate::cache::{MIN_CAPACITY, SEGMENT_COUNT};
use crate::error::{CacheError, Result};

// == Hashing ==
/// 64-bit hash driving both segment routing and the in-segment index.
pub fn hash_key(key: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(key, 0)
}

/// Segment owning a hash
fn segment_of(hash: u64) -> usize {
    (hash as usize) & (SEGMENT_COUNT - 1)
}

/// Fixed-width encoding used by the integer-key helpers
fn int_key(key: i64) -> [u8; 8] {
    key.to_le_bytes()
}

// == Cache ==
/// Concurrent, fixed-capacity cache with per-entry TTL.
///
/// Generic over the clock used for expiration; defaults to sampling the
/// system clock on every call.
pub struct Cache<T: Timer = SystemTimer> {
    segments: Box<[Mutex<Segment>]>,
    /// Lock-free handles to each segment's counters
    stats: Box<[Arc<SegmentStats>]>,
    timer: T,
}

impl Cache<SystemTimer> {
    // == Constructor ==
    /// Creates a cache of `capacity` bytes using the sampling system timer.
    pub fn new(capacity: usize) -> Self {
        Self::with_timer(capacity, SystemTimer)
    }
}

impl<T: Timer> Cache<T> {
    /// Creates a cache of `capacity` bytes driven by `timer`.
    ///
    /// Capacities below [`MIN_CAPACITY`] are raised to it; the total is split
    /// evenly across the segments.
    pub fn with_timer(capacity: usize, timer: T) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let segment_capacity = capacity / SEGMENT_COUNT;

        let segments: Vec<Segment> = (0..SEGMENT_COUNT)
            .map(|_| Segment::new(segment_capacity))
            .collect();
        let stats = segments.iter().map(|s| Arc::clone(s.stats())).collect();
        let segments = segments.into_iter().map(Mutex::new).collect();

        info!(
            "Cache initialized: capacity={} bytes, segments={}, segment_capacity={} bytes",
            capacity, SEGMENT_COUNT, segment_capacity
        );

        Self {
            segments,
            stats,
            timer,
        }
    }

    // == Capacity ==
    /// Effective total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.segment_capacity() * SEGMENT_COUNT
    }

    /// Arena size of each segment; entries larger than this are rejected.
    pub fn segment_capacity(&self) -> usize {
        self.segments[0].lock().capacity()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Hashes `key` and locks the segment that owns it.
    fn locate(&self, key: &[u8]) -> (u64, MutexGuard<'_, Segment>) {
        let hash = hash_key(key);
        (hash, self.segments[segment_of(hash)].lock())
    }

    // == Set ==
    /// Stores a key-value pair. A `ttl_seconds` of 0 means the entry never expires.
    pub fn set(&self, key: &[u8], value: &[u8], ttl_seconds: u32) -> Result<()> {
        let (hash, mut segment) = self.locate(key);
        segment.set(key, value, hash, ttl_seconds, self.timer.now())
    }

    // == Get ==
    /// Retrieves a copy of the value for `key`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_with_expiration(key).map(|(value, _)| value)
    }

    /// Retrieves the value for `key` and its absolute expiration (0 = never).
    pub fn get_with_expiration(&self, key: &[u8]) -> Result<(Vec<u8>, u32)> {
        let mut value = Vec::new();
        let (hash, mut segment) = self.locate(key);
        let expire_at = segment.get(key, hash, self.timer.now(), false, &mut value)?;
        Ok((value, expire_at))
    }

    /// Retrieves the value into a reusable buffer, returning its length.
    ///
    /// `buf` is cleared first; its allocation is kept across calls.
    pub fn get_with_buf(&self, key: &[u8], buf: &mut Vec<u8>) -> Result<usize> {
        buf.clear();
        let (hash, mut segment) = self.locate(key);
        segment.get(key, hash, self.timer.now(), false, buf)?;
        Ok(buf.len())
    }

    // == Views ==
    /// Runs `f` on the stored value while the segment lock is held.
    ///
    /// `f` must not block or call back into the cache.
    pub fn get_fn<R>(&self, key: &[u8], f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let (hash, mut segment) = self.locate(key);
        segment.view(key, hash, self.timer.now(), false, f)
    }

    /// Like [`Cache::get_fn`], but leaves hit and miss counters untouched.
    pub fn peek_fn<R>(&self, key: &[u8], f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let (hash, mut segment) = self.locate(key);
        segment.view(key, hash, self.timer.now(), true, f)
    }

    // == Get Or Set ==
    /// Returns the current value, or stores and returns `value` if the key is
    /// absent or expired. Read and write happen under one lock acquisition.
    pub fn get_or_set(&self, key: &[u8], value: &[u8], ttl_seconds: u32) -> Result<Vec<u8>> {
        let (hash, mut segment) = self.locate(key);
        let now = self.timer.now();

        let mut existing = Vec::new();
        match segment.get(key, hash, now, false, &mut existing) {
            Ok(_) => Ok(existing),
            Err(CacheError::NotFound) => {
                segment.set(key, value, hash, ttl_seconds, now)?;
                Ok(value.to_vec())
            }
            Err(err) => Err(err),
        }
    }

    // == Set And Get ==
    /// Stores `value` and returns the value it replaced, if any was live.
    /// Read and write happen under one lock acquisition.
    pub fn set_and_get(&self, key: &[u8], value: &[u8], ttl_seconds: u32) -> Result<Option<Vec<u8>>> {
        let (hash, mut segment) = self.locate(key);
        let now = self.timer.now();

        let mut previous = Vec::new();
        let existed = match segment.get(key, hash, now, false, &mut previous) {
            Ok(_) => true,
            Err(CacheError::NotFound) => false,
            Err(err) => return Err(err),
        };

        segment.set(key, value, hash, ttl_seconds, now)?;
        Ok(existed.then_some(previous))
    }

    // == Touch ==
    /// Replaces the TTL of a live entry without rewriting its value.
    pub fn touch(&self, key: &[u8], ttl_seconds: u32) -> Result<()> {
        let (hash, mut segment) = self.locate(key);
        segment.touch(key, hash, ttl_seconds, self.timer.now())
    }

    // == TTL ==
    /// Seconds remaining before `key` expires; 0 for entries that never expire.
    pub fn ttl(&self, key: &[u8]) -> Result<u32> {
        let (hash, mut segment) = self.locate(key);
        segment.ttl(key, hash, self.timer.now())
    }

    // == Delete ==
    /// Removes `key`, returning whether an entry was registered for it.
    pub fn del(&self, key: &[u8]) -> bool {
        let (hash, mut segment) = self.locate(key);
        segment.del(key, hash)
    }

    // == Integer Keys ==
    pub fn set_int(&self, key: i64, value: &[u8], ttl_seconds: u32) -> Result<()> {
        self.set(&int_key(key), value, ttl_seconds)
    }

    pub fn get_int(&self, key: i64) -> Result<Vec<u8>> {
        self.get(&int_key(key))
    }

    pub fn get_int_with_expiration(&self, key: i64) -> Result<(Vec<u8>, u32)> {
        self.get_with_expiration(&int_key(key))
    }

    pub fn del_int(&self, key: i64) -> bool {
        self.del(&int_key(key))
    }

    // == Clear ==
    /// Empties every segment. Arena memory is kept for reuse.
    pub fn clear(&self) {
        for segment in self.segments.iter() {
            segment.lock().clear();
        }
        info!("Cache cleared");
    }

    // == Reset Statistics ==
    /// Zeroes all cumulative counters. Live entry counts are kept.
    pub fn reset_statistics(&self) {
        for segment in self.segments.iter() {
            segment.lock().reset_statistics();
        }
        debug!("Cache statistics reset");
    }

    // == Stats ==
    /// Aggregated snapshot of every counter.
    pub fn stats(&self) -> CacheStats {
        CacheStats::aggregate(self.stats.iter().map(Arc::as_ref))
    }

    fn sum(&self, counter: impl Fn(&SegmentStats) -> u64) -> u64 {
        self.stats.iter().map(|s| counter(s.as_ref())).sum()
    }

    pub fn entry_count(&self) -> i64 {
        self.stats.iter().map(|s| s.entry_count()).sum()
    }

    pub fn hit_count(&self) -> u64 {
        self.sum(SegmentStats::hits)
    }

    pub fn miss_count(&self) -> u64 {
        self.sum(SegmentStats::misses)
    }

    pub fn lookup_count(&self) -> u64 {
        self.hit_count() + self.miss_count()
    }

    pub fn evacuate_count(&self) -> u64 {
        self.sum(SegmentStats::evacuations)
    }

    pub fn expired_count(&self) -> u64 {
        self.sum(SegmentStats::expirations)
    }

    pub fn overwrite_count(&self) -> u64 {
        self.sum(SegmentStats::overwrites)
    }

    pub fn touched_count(&self) -> u64 {
        self.sum(SegmentStats::touches)
    }

    /// Average lookup latency in nanoseconds, 0 before any hit.
    pub fn average_access_time(&self) -> u64 {
        stats::average(
            self.sum(SegmentStats::access_time_ns),
            self.sum(SegmentStats::access_samples),
        )
    }

    /// hits / (hits + misses), 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        stats::hit_rate(self.hit_count(), self.miss_count())
    }
}

impl<T: Timer> std::fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("segments", &self.segments.len())
            .field("entry_count", &self.entry_count())
            .finish()
    }
}
