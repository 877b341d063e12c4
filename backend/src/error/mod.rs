//! Error taxonomy for the retention engine.
//!
//! Only two classes are real errors: storage failures and the fatal
//! whole-run scan failure. Per-record and per-artifact problems are
//! reported as structured outcome values so one bad record can never
//! abort its siblings.

use thiserror::Error;

/// Failure talking to the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fatal, whole-run failure. The scanner is the only component allowed to
/// terminate a run early: without a trustworthy scan there is nothing
/// actionable to enforce.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("retention scan failed: {0}")]
    Scan(#[source] StoreError),
}
