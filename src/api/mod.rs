//! API Module
//!
//! HTTP handlers, the page cache middleware, and routing.
//!
//! # Endpoints
//! - `POST /admin-cache/purge` - Purge site-wide or one session
//! - `GET|PUT /admin-cache/settings` - Read or replace settings
//! - `POST /admin-cache/events/:name` - Fire a purge-bound event
//! - `GET /admin-cache/prefetch` - Prefetch nonce and URL list
//! - `GET /admin-cache/stats` - Engine statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{page_cache_layer, OperatorPrivilege, SESSION_COOKIE};
pub use routes::create_router;
