//! Cache Entry Module
//!
//! Defines the encoded layout of an entry inside a segment arena.
//!
//! ```text
//! +----------+-----------+---------+-----------+-----+-------+
//! | hash u64 | expire u32| klen u32| vlen u32  | key | value |
//! +----------+-----------+---------+-----------+-----+-------+
//! ```
//!
//! All header fields are little-endian. Only `expire` is ever rewritten in place.

use crate::error::{CacheError, Result};

// == Entry Header ==
/// Fixed-size header preceding every key/value pair in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Full 64-bit hash of the key
    pub hash: u64,
    /// Absolute expiration (Unix seconds), 0 = never expires
    pub expire_at: u32,
    /// Key length in bytes
    pub key_len: u32,
    /// Value length in bytes
    pub value_len: u32,
}

impl EntryHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 20;

    /// Byte offset of the expiration field within the header
    pub const EXPIRE_OFFSET: usize = 8;

    // == Constructor ==
    /// Builds the header for `key`/`value`, rejecting pairs whose lengths
    /// cannot be represented or that can never fit an arena of `capacity`.
    pub fn for_entry(
        hash: u64,
        key: &[u8],
        value: &[u8],
        expire_at: u32,
        capacity: usize,
    ) -> Result<Self> {
        let size = Self::SIZE + key.len() + value.len();
        let oversized = || CacheError::OversizedEntry { size, capacity };

        if size > capacity {
            return Err(oversized());
        }

        Ok(Self {
            hash,
            expire_at,
            key_len: u32::try_from(key.len()).map_err(|_| oversized())?,
            value_len: u32::try_from(value.len()).map_err(|_| oversized())?,
        })
    }

    // == Entry Length ==
    /// Total encoded length: header, key and value.
    pub fn entry_len(&self) -> usize {
        Self::SIZE + self.key_len as usize + self.value_len as usize
    }

    // == Encode ==
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.hash.to_le_bytes());
        buf[8..12].copy_from_slice(&self.expire_at.to_le_bytes());
        buf[12..16].copy_from_slice(&self.key_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.value_len.to_le_bytes());
        buf
    }

    // == Decode ==
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        let mut hash = [0u8; 8];
        hash.copy_from_slice(&buf[0..8]);

        Self {
            hash: u64::from_le_bytes(hash),
            expire_at: u32_at(8),
            key_len: u32_at(12),
            value_len: u32_at(16),
        }
    }
}

// == Expiration Helpers ==
/// Converts a relative TTL into an absolute expiration, 0 meaning never.
pub fn expire_at(now: u32, ttl_seconds: u32) -> u32 {
    if ttl_seconds == 0 {
        0
    } else {
        now.saturating_add(ttl_seconds)
    }
}

/// Checks whether an absolute expiration has been reached at `now`.
///
/// Boundary condition: an entry is expired once `now >= expire_at`.
pub fn is_expired(expire_at: u32, now: u32) -> bool {
    expire_at != 0 && expire_at <= now
}
