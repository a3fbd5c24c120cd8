//! Admin Page Cache - per-session output cache for admin interfaces
//!
//! Captures rendered admin pages per operator session and serves them back
//! until they expire or are purged.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod rules;
pub mod settings;
pub(crate) mod sync;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
