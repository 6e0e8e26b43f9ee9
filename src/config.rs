//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total cache capacity in bytes, split across all segments
    pub capacity: usize,
    /// TTL in seconds for requests that omit one (0 = never expire)
    pub default_ttl: u32,
    /// HTTP server port
    pub server_port: u16,
    /// Use the background-refreshed timer instead of sampling the clock per call
    pub cached_timer: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Total cache size in bytes (default: 64 MiB)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 = never (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHED_TIMER` - `true` or `false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: var_or("CACHE_CAPACITY", defaults.capacity),
            default_ttl: var_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: var_or("SERVER_PORT", defaults.server_port),
            cached_timer: var_or("CACHED_TIMER", defaults.cached_timer),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024 * 1024,
            default_ttl: 0,
            server_port: 3000,
            cached_timer: true,
        }
    }
}

/// Parses an environment variable, falling back when unset or malformed.
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
