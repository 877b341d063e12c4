//! Retention enforcement engine for voice consent records.
//!
//! Finds consent records whose statutory retention window has elapsed,
//! soft-deletes them, cascades to downstream artifact stores, and appends
//! an append-only audit trail proving what was done and why.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod types;
