use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::audit_log::AuditLogEntry;
use crate::types::ConsentRecordId;

// No update or delete here: the ledger is the durable proof of compliance
// and must stay reconstructible even if consent data is later purged.

pub async fn insert_audit_log_entry(
    pool: &PgPool,
    entry: &AuditLogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_log_entries \
         (id, consent_record_id, action, performed_by, performed_at, details) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(entry.id)
    .bind(entry.consent_record_id)
    .bind(entry.action.db_value())
    .bind(&entry.performed_by)
    .bind(entry.performed_at)
    .bind(&entry.details)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Reporting helper, not part of the engine's contract: the core only ever
/// appends.
pub async fn list_audit_log_entries_for_record(
    pool: &PgPool,
    consent_record_id: ConsentRecordId,
) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditLogEntry>(
        "SELECT id, consent_record_id, action, performed_by, performed_at, details \
         FROM audit_log_entries WHERE consent_record_id = $1 \
         ORDER BY performed_at ASC, id ASC",
    )
    .bind(consent_record_id)
    .fetch_all(pool)
    .await
}

/// Append-only ledger seam. No update or delete exists in this contract;
/// the migration additionally installs a database trigger rejecting any
/// rewrite of `audit_log_entries`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgAuditLog {
    pool: DbPool,
}

impl PgAuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        Ok(insert_audit_log_entry(&self.pool, entry).await?)
    }
}
