use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ConsentRecordId, SubjectId};

/// Statutory retention period for voice consent records, applied when a
/// record is created.
pub const DEFAULT_RETENTION_MONTHS: u32 = 36;

/// A subject's consent to voice-cloning processing.
///
/// The retention deadline is fixed once, at consent time, and never
/// recomputed. Expiry is not a stored state: a record is "expired" exactly
/// when `now >= retention_deadline`, so the deadline stays the single
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsentRecord {
    pub id: ConsentRecordId,
    pub subject_id: SubjectId,
    pub purpose: String,
    pub policy_version: String,
    pub agreed_at: DateTime<Utc>,
    pub retention_deadline: DateTime<Utc>,
    /// Set exactly once, on first successful deletion. Soft delete only:
    /// the record itself survives as the legal trace that deletion
    /// happened.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConsentRecord {
    pub fn new(
        subject_id: SubjectId,
        purpose: String,
        policy_version: String,
        agreed_at: DateTime<Utc>,
        retention: Months,
    ) -> Self {
        Self {
            id: ConsentRecordId::new(),
            subject_id,
            purpose,
            policy_version,
            agreed_at,
            retention_deadline: agreed_at + retention,
            deleted_at: None,
            created_at: agreed_at,
        }
    }

    /// Due for enforcement: not yet deleted and past the deadline.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.retention_deadline <= now
    }
}
