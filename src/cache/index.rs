//! Segment Index Module
//!
//! Maps key hashes to arena locations. A fixed number of buckets each hold a
//! small vector of slot descriptors kept sorted by fingerprint, so candidate
//! matches are found by binary search before any key bytes are compared.

/// Number of buckets per segment index
pub const BUCKET_COUNT: usize = 256;

// == Hash Helpers ==
/// Bucket selected by the second byte of the hash (the first picks the segment).
pub fn bucket_of(hash: u64) -> usize {
    ((hash >> 8) as usize) & (BUCKET_COUNT - 1)
}

/// Short disambiguator stored in each slot.
pub fn fingerprint_of(hash: u64) -> u16 {
    (hash >> 16) as u16
}

// == Slot ==
/// Descriptor of one live entry in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub fingerprint: u16,
    /// Arena offset of the entry header
    pub offset: usize,
    /// Total encoded length of the entry
    pub len: usize,
    /// Absolute expiration (Unix seconds), 0 = never
    pub expire_at: u32,
}

/// Position of a slot inside the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub bucket: usize,
    pub pos: usize,
}

// == Index ==
#[derive(Debug)]
pub struct Index {
    buckets: Vec<Vec<Slot>>,
}

impl Index {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKET_COUNT],
        }
    }

    // == Candidates ==
    /// Returns the positions in `bucket` whose fingerprint equals `fingerprint`.
    pub fn candidates(&self, bucket: usize, fingerprint: u16) -> std::ops::Range<usize> {
        let slots = &self.buckets[bucket];
        let start = slots.partition_point(|slot| slot.fingerprint < fingerprint);
        let end = start + slots[start..].partition_point(|slot| slot.fingerprint == fingerprint);
        start..end
    }

    // == Find ==
    /// Finds the slot for `hash` whose entry satisfies `matches`.
    pub fn find(&self, hash: u64, mut matches: impl FnMut(&Slot) -> bool) -> Option<SlotRef> {
        let bucket = bucket_of(hash);
        let fingerprint = fingerprint_of(hash);

        self.candidates(bucket, fingerprint)
            .find(|&pos| matches(&self.buckets[bucket][pos]))
            .map(|pos| SlotRef { bucket, pos })
    }

    // == Find By Offset ==
    /// Finds the live slot registered for the entry stored at `offset`.
    pub fn find_by_offset(&self, hash: u64, offset: usize) -> Option<SlotRef> {
        self.find(hash, |slot| slot.offset == offset)
    }

    // == Slot Access ==
    pub fn slot(&self, at: SlotRef) -> &Slot {
        &self.buckets[at.bucket][at.pos]
    }

    pub fn slot_mut(&mut self, at: SlotRef) -> &mut Slot {
        &mut self.buckets[at.bucket][at.pos]
    }

    // == Insert ==
    /// Inserts a slot for `hash`, keeping the bucket ordered by fingerprint.
    pub fn insert(&mut self, hash: u64, offset: usize, len: usize, expire_at: u32) {
        let bucket = bucket_of(hash);
        let fingerprint = fingerprint_of(hash);
        let slots = &mut self.buckets[bucket];

        let pos = slots.partition_point(|slot| slot.fingerprint <= fingerprint);
        slots.insert(
            pos,
            Slot {
                fingerprint,
                offset,
                len,
                expire_at,
            },
        );
    }

    // == Remove ==
    pub fn remove(&mut self, at: SlotRef) -> Slot {
        self.buckets[at.bucket].remove(at.pos)
    }

    // == Clear ==
    /// Empties every bucket while keeping their allocations.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
    }

    // == Length ==
    /// Total number of registered slots.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with(bucket: u8, fingerprint: u16) -> u64 {
        ((fingerprint as u64) << 16) | ((bucket as u64) << 8)
    }

    #[test]
    fn test_hash_helpers() {
        let hash = hash_with(0x12, 0xABCD) | 0x34;
        assert_eq!(bucket_of(hash), 0x12);
        assert_eq!(fingerprint_of(hash), 0xABCD);
    }

    #[test]
    fn test_insert_keeps_fingerprint_order() {
        let mut index = Index::new();
        index.insert(hash_with(1, 30), 0, 10, 0);
        index.insert(hash_with(1, 10), 10, 10, 0);
        index.insert(hash_with(1, 20), 20, 10, 0);

        let fingerprints: Vec<u16> = (0..3)
            .map(|pos| index.slot(SlotRef { bucket: 1, pos }).fingerprint)
            .collect();
        assert_eq!(fingerprints, vec![10, 20, 30]);
    }

    #[test]
    fn test_candidates_for_colliding_fingerprints() {
        let mut index = Index::new();
        let hash = hash_with(5, 99);
        index.insert(hash, 0, 10, 0);
        index.insert(hash_with(5, 7), 10, 10, 0);
        index.insert(hash, 20, 10, 0);

        assert_eq!(index.candidates(5, 99).len(), 2);
        assert_eq!(index.candidates(5, 8).len(), 0);

        let found = index.find_by_offset(hash, 20).unwrap();
        assert_eq!(index.slot(found).offset, 20);
        assert!(index.find_by_offset(hash, 10).is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut index = Index::new();
        index.insert(hash_with(0, 1), 0, 10, 0);
        index.insert(hash_with(200, 1), 10, 10, 0);
        assert_eq!(index.len(), 2);

        let at = index.find_by_offset(hash_with(0, 1), 0).unwrap();
        let removed = index.remove(at);
        assert_eq!(removed.offset, 0);
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }
}
