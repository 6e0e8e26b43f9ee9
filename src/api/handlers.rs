//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{Cache, CacheStats, CachedTimer, SystemTimer, Timer};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, KeyResponse, MessageResponse, SetRequest,
    TouchRequest, TtlResponse,
};

/// Clock shared between the cache and whoever owns its lifecycle
pub type SharedTimer = Arc<dyn Timer>;

/// Cache type served over HTTP
pub type SharedCache = Arc<Cache<SharedTimer>>;

/// Application state shared across all handlers.
///
/// The cache locks internally per segment, so no outer lock is needed.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache
    pub cache: SharedCache,
    /// TTL applied when a request does not carry one
    pub default_ttl: u32,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: Cache<SharedTimer>, default_ttl: u32) -> Self {
        Self {
            cache: Arc::new(cache),
            default_ttl,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Returns the cached timer too when one was started, so the caller can
    /// stop it at shutdown.
    pub fn from_config(config: &Config) -> (Self, Option<Arc<CachedTimer>>) {
        let cached = config
            .cached_timer
            .then(|| Arc::new(CachedTimer::start()));
        let timer: SharedTimer = match &cached {
            Some(cached) => Arc::clone(cached) as SharedTimer,
            None => Arc::new(SystemTimer),
        };

        let cache = Cache::with_timer(config.capacity, timer);
        (Self::new(cache, config.default_ttl), cached)
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.unwrap_or(state.default_ttl);
    state
        .cache
        .set(req.key.as_bytes(), req.value.as_bytes(), ttl)?;

    Ok(Json(KeyResponse::new(req.key, "set successfully")))
}

/// Handler for GET /get/:key
///
/// Retrieves a value and its expiration from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let (value, expire_at) = state.cache.get_with_expiration(key.as_bytes())?;

    Ok(Json(GetResponse::new(
        key,
        String::from_utf8_lossy(&value),
        expire_at,
    )))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting an absent key is not an error.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.cache.del(key.as_bytes());
    Json(DeleteResponse::new(key, deleted))
}

/// Handler for PUT /touch
///
/// Replaces the TTL of an existing key.
pub async fn touch_handler(
    State(state): State<AppState>,
    Json(req): Json<TouchRequest>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.unwrap_or(state.default_ttl);
    state.cache.touch(req.key.as_bytes(), ttl)?;

    Ok(Json(KeyResponse::new(req.key, "touched successfully")))
}

/// Handler for GET /ttl/:key
pub async fn ttl_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TtlResponse>> {
    let ttl = state.cache.ttl(key.as_bytes())?;
    Ok(Json(TtlResponse::new(key, ttl)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.clear();
    Json(MessageResponse::new("Cache cleared"))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Handler for POST /stats/reset
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.reset_statistics();
    Json(MessageResponse::new("Statistics reset"))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
