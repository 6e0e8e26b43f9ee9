//! Segcache Server - A segmented in-memory cache with per-entry TTL
//!
//! The cache splits a fixed byte budget across 256 independently locked
//! ring-buffer segments and evicts in write order when a segment fills up.
//! An HTTP front end exposes it as a small key-value service.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{Cache, CachedTimer, SystemTimer, Timer};
pub use config::Config;
pub use error::{CacheError, Result};
