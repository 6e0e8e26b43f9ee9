//! Cache Module
//!
//! Segmented, fixed-capacity in-memory cache with per-entry TTL.

mod entry;
mod index;
mod ring;
mod segment;
mod stats;
mod store;
mod timer;


// Re-export public types
pub use entry::EntryHeader;
pub use segment::Segment;
pub use stats::{CacheStats, SegmentStats};
pub use store::{hash_key, Cache};
pub use timer::{unix_time, CachedTimer, SystemTimer, Timer};

// == Public Constants ==
/// Number of independently locked segments
pub const SEGMENT_COUNT: usize = 256;

/// Smallest total capacity in bytes; smaller requests are raised to it
pub const MIN_CAPACITY: usize = 512 * 1024;
