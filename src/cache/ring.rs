//! Ring Buffer Module
//!
//! Fixed-size circular byte arena backing one segment. Reads and writes wrap
//! around the end of the buffer transparently.

// == Ring Buffer ==
/// Owned, fixed-length byte arena addressed by offsets in `0..capacity`.
#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[u8]>,
}

impl RingBuffer {
    // == Constructor ==
    /// Allocates a zeroed arena of `capacity` bytes. Never grows afterwards.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    // == Capacity ==
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    // == Wrap ==
    /// Maps `offset + delta` back into the arena.
    pub fn wrap(&self, offset: usize, delta: usize) -> usize {
        (offset + delta) % self.data.len()
    }

    // == Slices ==
    /// Returns the byte range `offset..offset + len` as up to two slices,
    /// the second one non-empty only when the range wraps.
    pub fn slices(&self, offset: usize, len: usize) -> (&[u8], &[u8]) {
        let head_len = len.min(self.data.len() - offset);
        let head = &self.data[offset..offset + head_len];
        let tail = &self.data[..len - head_len];
        (head, tail)
    }

    // == Write ==
    /// Copies `bytes` into the arena starting at `offset`, wrapping if needed.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let head_len = bytes.len().min(self.data.len() - offset);
        self.data[offset..offset + head_len].copy_from_slice(&bytes[..head_len]);
        self.data[..bytes.len() - head_len].copy_from_slice(&bytes[head_len..]);
    }

    // == Read ==
    /// Fills `out` from the arena starting at `offset`, wrapping if needed.
    pub fn read_at(&self, offset: usize, out: &mut [u8]) {
        let (head, tail) = self.slices(offset, out.len());
        out[..head.len()].copy_from_slice(head);
        out[head.len()..].copy_from_slice(tail);
    }

    // == Append To ==
    /// Appends the range `offset..offset + len` to `out`.
    pub fn extend_into(&self, offset: usize, len: usize, out: &mut Vec<u8>) {
        let (head, tail) = self.slices(offset, len);
        out.reserve(len);
        out.extend_from_slice(head);
        out.extend_from_slice(tail);
    }

    // == Equals ==
    /// Compares the range starting at `offset` with `bytes` without copying.
    pub fn eq_at(&self, offset: usize, bytes: &[u8]) -> bool {
        let (head, tail) = self.slices(offset, bytes.len());
        head == &bytes[..head.len()] && tail == &bytes[head.len()..]
    }
}
