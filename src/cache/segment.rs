//! Segment Module
//!
//! One shard of the cache: a ring-buffer arena plus the index pointing into it.
//! A segment is single-threaded; the owning cache serializes access with a lock.
//!
//! Writes always land at the head of the ring. When the head needs bytes that
//! still belong to older entries, those entries are evacuated from the tail in
//! write order, so the oldest-written data always goes first. Expired entries
//! are only noticed when accessed.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::cache::entry::{expire_at, is_expired, EntryHeader};
use crate::cache::index::{Index, Slot, SlotRef};
use crate::cache::ring::RingBuffer;
use crate::cache::stats::SegmentStats;
use crate::error::{CacheError, Result};

// == Segment ==
#[derive(Debug)]
pub struct Segment {
    ring: RingBuffer,
    index: Index,
    /// Offset where the next entry is written
    head: usize,
    /// Offset of the oldest entry still occupying the arena
    tail: usize,
    /// Bytes occupied between `tail` and `head`
    used: usize,
    /// Contiguous copy of a wrapped value handed to view callbacks
    scratch: Vec<u8>,
    stats: Arc<SegmentStats>,
}

impl Segment {
    // == Constructor ==
    /// Creates a segment with an arena of exactly `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            index: Index::new(),
            head: 0,
            tail: 0,
            used: 0,
            scratch: Vec::new(),
            stats: Arc::new(SegmentStats::new()),
        }
    }

    // == Accessors ==
    /// Shared handle to this segment's counters, readable without the lock.
    pub fn stats(&self) -> &Arc<SegmentStats> {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    // == Set ==
    /// Stores `key` -> `value`, evacuating the oldest entries if space is needed.
    ///
    /// A `ttl_seconds` of 0 stores an entry that never expires.
    pub fn set(&mut self, key: &[u8], value: &[u8], hash: u64, ttl_seconds: u32, now: u32) -> Result<()> {
        let header = EntryHeader::for_entry(
            hash,
            key,
            value,
            expire_at(now, ttl_seconds),
            self.ring.capacity(),
        )
        .inspect_err(|err| debug!("Rejected set: {}", err))?;
        let len = header.entry_len();

        // The old bytes stay in the arena until the tail reclaims them
        let existing = self.lookup(key, hash);
        if let Some(at) = existing {
            self.index.remove(at);
            self.stats.record_overwrite();
        }

        self.make_room(len);

        let offset = self.head;
        self.ring.write_at(offset, &header.encode());
        self.ring
            .write_at(self.ring.wrap(offset, EntryHeader::SIZE), key);
        self.ring
            .write_at(self.ring.wrap(offset, EntryHeader::SIZE + key.len()), value);
        self.head = self.ring.wrap(offset, len);
        self.used += len;

        self.index.insert(hash, offset, len, header.expire_at);
        if existing.is_none() {
            self.stats.record_insert();
        }

        Ok(())
    }

    // == Get ==
    /// Appends the value for `key` to `buf` and returns its expiration.
    ///
    /// With `peek` set, hit and miss counters are left untouched; expired
    /// entries are still removed.
    pub fn get(&mut self, key: &[u8], hash: u64, now: u32, peek: bool, buf: &mut Vec<u8>) -> Result<u32> {
        let started = Instant::now();

        let Some(slot) = self.find_live(key, hash, now, peek) else {
            return Err(CacheError::NotFound);
        };

        let (offset, len) = self.value_range(&slot, key.len());
        self.ring.extend_into(offset, len, buf);

        if !peek {
            self.stats.record_hit(elapsed_ns(started));
        }
        Ok(slot.expire_at)
    }

    // == View ==
    /// Passes the value for `key` to `f` without copying it out of the arena,
    /// unless it wraps around the end of the ring.
    pub fn view<R>(
        &mut self,
        key: &[u8],
        hash: u64,
        now: u32,
        peek: bool,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R> {
        let started = Instant::now();

        let Some(slot) = self.find_live(key, hash, now, peek) else {
            return Err(CacheError::NotFound);
        };

        if !peek {
            self.stats.record_hit(elapsed_ns(started));
        }

        let (offset, len) = self.value_range(&slot, key.len());
        let (head, tail) = self.ring.slices(offset, len);
        if tail.is_empty() {
            return Ok(f(head));
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(head);
        self.scratch.extend_from_slice(tail);
        Ok(f(&self.scratch))
    }

    // == Touch ==
    /// Replaces the expiration of a live entry in place.
    pub fn touch(&mut self, key: &[u8], hash: u64, ttl_seconds: u32, now: u32) -> Result<()> {
        let at = self.find_live_ref(key, hash, now).ok_or(CacheError::NotFound)?;

        let expire = expire_at(now, ttl_seconds);
        let slot = self.index.slot_mut(at);
        slot.expire_at = expire;
        let offset = slot.offset;

        self.ring.write_at(
            self.ring.wrap(offset, EntryHeader::EXPIRE_OFFSET),
            &expire.to_le_bytes(),
        );
        self.stats.record_touch();
        Ok(())
    }

    // == TTL ==
    /// Returns the seconds left before `key` expires, 0 if it never does.
    pub fn ttl(&mut self, key: &[u8], hash: u64, now: u32) -> Result<u32> {
        let at = self.find_live_ref(key, hash, now).ok_or(CacheError::NotFound)?;

        let expire = self.index.slot(at).expire_at;
        Ok(if expire == 0 { 0 } else { expire - now })
    }

    // == Delete ==
    /// Unregisters `key`. Its bytes are reclaimed later by the tail.
    pub fn del(&mut self, key: &[u8], hash: u64) -> bool {
        match self.lookup(key, hash) {
            Some(at) => {
                self.index.remove(at);
                self.stats.record_removal();
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Forgets every entry without releasing the arena.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.used = 0;
        self.index.clear();
        self.stats.clear_entries();
    }

    // == Reset Statistics ==
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    // == Lookup ==
    /// Finds the slot whose stored key equals `key`, expired or not.
    fn lookup(&self, key: &[u8], hash: u64) -> Option<SlotRef> {
        let ring = &self.ring;
        self.index.find(hash, |slot| {
            let header = read_header(ring, slot.offset);
            header.hash == hash
                && header.key_len as usize == key.len()
                && ring.eq_at(ring.wrap(slot.offset, EntryHeader::SIZE), key)
        })
    }

    /// Like [`Segment::lookup`], but drops the entry if it has expired.
    fn find_live_ref(&mut self, key: &[u8], hash: u64, now: u32) -> Option<SlotRef> {
        let at = self.lookup(key, hash)?;

        if is_expired(self.index.slot(at).expire_at, now) {
            self.index.remove(at);
            self.stats.record_expiration();
            self.stats.record_removal();
            return None;
        }
        Some(at)
    }

    /// Lookup path shared by reads, counting misses unless peeking.
    fn find_live(&mut self, key: &[u8], hash: u64, now: u32, peek: bool) -> Option<Slot> {
        let found = self.find_live_ref(key, hash, now).map(|at| *self.index.slot(at));
        if found.is_none() && !peek {
            self.stats.record_miss();
        }
        found
    }

    /// Arena offset and length of the value stored in `slot`.
    fn value_range(&self, slot: &Slot, key_len: usize) -> (usize, usize) {
        let skip = EntryHeader::SIZE + key_len;
        (self.ring.wrap(slot.offset, skip), slot.len - skip)
    }

    // == Make Room ==
    /// Advances the tail until `len` contiguous bytes are free at the head.
    fn make_room(&mut self, len: usize) {
        let mut evacuated = 0usize;

        while self.ring.capacity() - self.used < len {
            let header = read_header(&self.ring, self.tail);
            let entry_len = header.entry_len();

            // Deleted, expired and overwritten entries no longer have a slot here
            if let Some(at) = self.index.find_by_offset(header.hash, self.tail) {
                self.index.remove(at);
                self.stats.record_evacuation();
                self.stats.record_removal();
                evacuated += 1;
            }

            self.tail = self.ring.wrap(self.tail, entry_len);
            self.used -= entry_len;
        }

        if evacuated > 0 {
            trace!("Evacuated {} entries to write {} bytes", evacuated, len);
        }
    }
}

// == Utility Functions ==
fn read_header(ring: &RingBuffer, offset: usize) -> EntryHeader {
    let mut buf = [0u8; EntryHeader::SIZE];
    ring.read_at(offset, &mut buf);
    EntryHeader::decode(&buf)
}

fn elapsed_ns(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash_key;

    const NOW: u32 = 1_700_000_000;

    /// 20-byte header + 2-byte key + 8-byte value
    const ENTRY: usize = 30;

    fn set(segment: &mut Segment, key: &str, value: &str, ttl: u32) -> Result<()> {
        segment.set(key.as_bytes(), value.as_bytes(), hash_key(key.as_bytes()), ttl, NOW)
    }

    fn get(segment: &mut Segment, key: &str, now: u32) -> Result<String> {
        let mut buf = Vec::new();
        segment.get(key.as_bytes(), hash_key(key.as_bytes()), now, false, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_segment_set_and_get() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 0).unwrap();

        assert_eq!(get(&mut segment, "key1", NOW).unwrap(), "value1");
        assert_eq!(segment.stats().entry_count(), 1);
        assert_eq!(segment.stats().hits(), 1);
    }

    #[test]
    fn test_segment_get_nonexistent() {
        let mut segment = Segment::new(1024);

        assert!(matches!(get(&mut segment, "missing", NOW), Err(CacheError::NotFound)));
        assert_eq!(segment.stats().misses(), 1);
    }

    #[test]
    fn test_segment_returns_expiration() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 60).unwrap();

        let mut buf = Vec::new();
        let expire = segment
            .get(b"key1", hash_key(b"key1"), NOW, false, &mut buf)
            .unwrap();
        assert_eq!(expire, NOW + 60);
    }

    #[test]
    fn test_segment_overwrite() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 0).unwrap();
        set(&mut segment, "key1", "value2", 0).unwrap();

        assert_eq!(get(&mut segment, "key1", NOW).unwrap(), "value2");
        assert_eq!(segment.stats().entry_count(), 1);
        assert_eq!(segment.stats().overwrites(), 1);
    }

    #[test]
    fn test_segment_delete() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 0).unwrap();

        assert!(segment.del(b"key1", hash_key(b"key1")));
        assert!(!segment.del(b"key1", hash_key(b"key1")));
        assert!(matches!(get(&mut segment, "key1", NOW), Err(CacheError::NotFound)));
        assert_eq!(segment.stats().entry_count(), 0);
    }

    #[test]
    fn test_segment_lazy_expiration() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 10).unwrap();

        assert!(get(&mut segment, "key1", NOW + 9).is_ok());
        assert!(matches!(get(&mut segment, "key1", NOW + 10), Err(CacheError::NotFound)));

        let stats = segment.stats();
        assert_eq!(stats.expirations(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.evacuations(), 0);
        assert_eq!(stats.entry_count(), 0);
    }

    #[test]
    fn test_segment_oversized_entry() {
        let mut segment = Segment::new(64);
        set(&mut segment, "ok", "fine", 0).unwrap();

        let big = "x".repeat(64);
        let result = set(&mut segment, "zz", &big, 0);
        assert!(matches!(result, Err(CacheError::OversizedEntry { capacity: 64, .. })));

        // Nothing was disturbed by the rejected write
        assert_eq!(get(&mut segment, "ok", NOW).unwrap(), "fine");
        assert_eq!(segment.stats().evacuations(), 0);
    }

    #[test]
    fn test_segment_fifo_evacuation() {
        let mut segment = Segment::new(100);
        for key in ["k0", "k1", "k2"] {
            set(&mut segment, key, "abcdefgh", 0).unwrap();
        }
        // Reading k0 must not protect it from eviction
        assert!(get(&mut segment, "k0", NOW).is_ok());

        set(&mut segment, "k3", "abcdefgh", 0).unwrap();
        set(&mut segment, "k4", "abcdefgh", 0).unwrap();

        assert!(get(&mut segment, "k0", NOW).is_err());
        assert!(get(&mut segment, "k1", NOW).is_err());
        for key in ["k2", "k3", "k4"] {
            assert_eq!(get(&mut segment, key, NOW).unwrap(), "abcdefgh");
        }
        assert_eq!(segment.stats().evacuations(), 2);
        assert_eq!(segment.stats().entry_count(), 3);
    }

    #[test]
    fn test_segment_wrapped_entry_is_readable() {
        let mut segment = Segment::new(100);
        for (key, value) in [("a0", "00000000"), ("a1", "11111111"), ("a2", "22222222")] {
            set(&mut segment, key, value, 0).unwrap();
        }
        // Written at offset 90, wraps past the end of the arena
        set(&mut segment, "a3", "33333333", 0).unwrap();

        assert_eq!(get(&mut segment, "a3", NOW).unwrap(), "33333333");

        let viewed = segment
            .view(b"a3", hash_key(b"a3"), NOW, false, |value| value.to_vec())
            .unwrap();
        assert_eq!(viewed, b"33333333");
    }

    #[test]
    fn test_segment_dead_bytes_are_not_evacuations() {
        let mut segment = Segment::new(ENTRY * 3 + 10);
        for value in ["11111111", "22222222", "33333333", "44444444"] {
            set(&mut segment, "k0", value, 0).unwrap();
        }
        segment.del(b"k0", hash_key(b"k0"));
        set(&mut segment, "k1", "55555555", 0).unwrap();

        assert_eq!(segment.stats().evacuations(), 0);
        assert_eq!(segment.stats().overwrites(), 3);
        assert_eq!(segment.stats().entry_count(), 1);
    }

    #[test]
    fn test_segment_touch_updates_only_expiration() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 5).unwrap();

        segment.touch(b"key1", hash_key(b"key1"), 100, NOW + 4).unwrap();

        assert_eq!(get(&mut segment, "key1", NOW + 50).unwrap(), "value1");
        assert_eq!(segment.ttl(b"key1", hash_key(b"key1"), NOW + 50).unwrap(), 54);
        assert_eq!(segment.stats().touches(), 1);
    }

    #[test]
    fn test_segment_touch_expired_entry() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 5).unwrap();

        let result = segment.touch(b"key1", hash_key(b"key1"), 100, NOW + 5);
        assert!(matches!(result, Err(CacheError::NotFound)));
        assert_eq!(segment.stats().expirations(), 1);
        assert_eq!(segment.stats().touches(), 0);
    }

    #[test]
    fn test_segment_ttl_never_expires() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 0).unwrap();

        assert_eq!(segment.ttl(b"key1", hash_key(b"key1"), NOW).unwrap(), 0);
        assert!(matches!(
            segment.ttl(b"other", hash_key(b"other"), NOW),
            Err(CacheError::NotFound)
        ));
    }

    #[test]
    fn test_segment_peek_leaves_counters() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 5).unwrap();

        let mut buf = Vec::new();
        segment.get(b"key1", hash_key(b"key1"), NOW, true, &mut buf).unwrap();
        let missing = segment.get(b"nope", hash_key(b"nope"), NOW, true, &mut buf);
        assert!(missing.is_err());
        assert_eq!(segment.stats().hits(), 0);
        assert_eq!(segment.stats().misses(), 0);

        // Peeking still acts on expiration
        let expired = segment.get(b"key1", hash_key(b"key1"), NOW + 5, true, &mut buf);
        assert!(expired.is_err());
        assert_eq!(segment.stats().expirations(), 1);
        assert_eq!(segment.stats().entry_count(), 0);
    }

    #[test]
    fn test_segment_clear() {
        let mut segment = Segment::new(1024);
        set(&mut segment, "key1", "value1", 0).unwrap();
        set(&mut segment, "key2", "value2", 0).unwrap();
        get(&mut segment, "key1", NOW).unwrap();

        segment.clear();

        assert_eq!(segment.stats().entry_count(), 0);
        assert_eq!(segment.stats().hits(), 1);
        assert!(get(&mut segment, "key2", NOW).is_err());

        set(&mut segment, "key3", "value3", 0).unwrap();
        assert_eq!(get(&mut segment, "key3", NOW).unwrap(), "value3");
    }
}
