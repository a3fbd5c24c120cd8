//! Background Tasks Module
//!
//! # Tasks
//! - Store sweep: drops expired pages from the in-memory store

mod cleanup;

pub use cleanup::spawn_cleanup_task;
