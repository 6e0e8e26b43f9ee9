//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `PUT /touch` - Refresh the TTL of a key
//! - `GET /ttl/:key` - Seconds left before a key expires
//! - `POST /clear` - Drop every entry
//! - `GET /stats` - Get cache statistics
//! - `POST /stats/reset` - Zero the cumulative counters
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
