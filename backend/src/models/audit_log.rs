use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};

use crate::types::{AuditLogId, ConsentRecordId};

/// Compliance-relevant actions recorded against a consent record.
///
/// A closed enumeration, never a free-form string, so the trail stays
/// queryable and its meaning is stable across time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ConsentRecorded,
    AutoDeletedRetention,
    VoiceProfileDeleted,
}

impl AuditAction {
    pub fn db_value(&self) -> &'static str {
        match self {
            AuditAction::ConsentRecorded => "consent_recorded",
            AuditAction::AutoDeletedRetention => "auto_deleted_retention",
            AuditAction::VoiceProfileDeleted => "voice_profile_deleted",
        }
    }
}

/// One immutable entry in the audit trail.
///
/// Entries reference their consent record by id only; nothing that happens
/// to the record can cascade into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub consent_record_id: ConsentRecordId,
    pub action: AuditAction,
    /// `None` is the system sentinel: the action was taken by the automated
    /// retention job rather than a human operator.
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub details: Option<Json<Value>>,
}

/// Facts needed to reconstruct why a retention deletion happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionDeletionDetails {
    pub retention_deadline: DateTime<Utc>,
    pub agreed_at: DateTime<Utc>,
    pub artifacts_deleted: u64,
    pub artifact_failures: u64,
}

impl AuditLogEntry {
    /// Entry documenting an automatic retention deletion.
    pub fn auto_deleted_retention(
        consent_record_id: ConsentRecordId,
        details: &RetentionDeletionDetails,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            consent_record_id,
            action: AuditAction::AutoDeletedRetention,
            performed_by: None,
            performed_at,
            details: serde_json::to_value(details).ok().map(Json),
        }
    }

    /// Entry documenting that the cascade removed cloned voice profiles.
    pub fn voice_profile_deleted(
        consent_record_id: ConsentRecordId,
        artifacts_deleted: u64,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            consent_record_id,
            action: AuditAction::VoiceProfileDeleted,
            performed_by: None,
            performed_at,
            details: Some(Json(
                serde_json::json!({ "artifacts_deleted": artifacts_deleted }),
            )),
        }
    }
}
