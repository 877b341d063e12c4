use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::consent_record::ConsentRecord;
use crate::types::ConsentRecordId;

pub async fn insert_consent_record(
    pool: &PgPool,
    record: &ConsentRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO consent_records \
         (id, subject_id, purpose, policy_version, agreed_at, retention_deadline, \
         deleted_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id)
    .bind(record.subject_id)
    .bind(&record.purpose)
    .bind(&record.policy_version)
    .bind(record.agreed_at)
    .bind(record.retention_deadline)
    .bind(record.deleted_at)
    .bind(record.created_at)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Records due for enforcement at `now`. Oldest deadline first, so under a
/// time-boxed run the most urgent records are processed first.
pub async fn find_due_records(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<ConsentRecord>, sqlx::Error> {
    sqlx::query_as::<_, ConsentRecord>(
        "SELECT id, subject_id, purpose, policy_version, agreed_at, retention_deadline, \
         deleted_at, created_at \
         FROM consent_records \
         WHERE deleted_at IS NULL AND retention_deadline <= $1 \
         ORDER BY retention_deadline ASC, id ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Conditional soft delete: the update only lands while `deleted_at` is
/// null, so under concurrent runs at most one caller wins the write.
/// Returns `true` when the record was already deleted.
pub async fn mark_consent_record_deleted(
    pool: &PgPool,
    id: ConsentRecordId,
    deleted_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE consent_records SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(deleted_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 0)
}

pub async fn fetch_consent_record(
    pool: &PgPool,
    id: ConsentRecordId,
) -> Result<Option<ConsentRecord>, sqlx::Error> {
    sqlx::query_as::<_, ConsentRecord>(
        "SELECT id, subject_id, purpose, policy_version, agreed_at, retention_deadline, \
         deleted_at, created_at \
         FROM consent_records WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Persistence seam the retention engine runs against.
///
/// Mockable with `MockConsentStore` in tests; `PgConsentStore` is the
/// production implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Pure read; never mutates state.
    async fn find_due_records(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentRecord>, StoreError>;

    /// Sets `deleted_at` if it is currently null. Returns `true` when the
    /// record was already deleted, surfacing idempotency without a
    /// separate read.
    async fn mark_deleted(
        &self,
        id: ConsentRecordId,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgConsentStore {
    pool: DbPool,
}

impl PgConsentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsentStore for PgConsentStore {
    async fn find_due_records(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentRecord>, StoreError> {
        Ok(find_due_records(&self.pool, now).await?)
    }

    async fn mark_deleted(
        &self,
        id: ConsentRecordId,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(mark_consent_record_deleted(&self.pool, id, deleted_at).await?)
    }
}
