#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};

use consentkeeper_backend::error::StoreError;
use consentkeeper_backend::models::audit_log::AuditLogEntry;
use consentkeeper_backend::models::consent_record::{ConsentRecord, DEFAULT_RETENTION_MONTHS};
use consentkeeper_backend::repositories::{AuditLog, ConsentStore};
use consentkeeper_backend::services::deletion_gateway::{
    ArtifactDeletionReport, ArtifactFailure, DeletionGateway,
};
use consentkeeper_backend::types::{ConsentRecordId, SubjectId};

/// Hermetic `ConsentStore` with the same semantics as the Postgres
/// implementation: predicate-based due query, conditional soft delete.
#[derive(Default)]
pub struct InMemoryConsentStore {
    pub records: Mutex<Vec<ConsentRecord>>,
    pub fail_scan: bool,
    pub fail_mark_for: Vec<ConsentRecordId>,
}

impl InMemoryConsentStore {
    pub fn with_records(records: Vec<ConsentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn record(&self, id: ConsentRecordId) -> Option<ConsentRecord> {
        self.records
            .lock()
            .expect("lock records")
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn find_due_records(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentRecord>, StoreError> {
        if self.fail_scan {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut due: Vec<ConsentRecord> = self
            .records
            .lock()
            .expect("lock records")
            .iter()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.retention_deadline);
        Ok(due)
    }

    async fn mark_deleted(
        &self,
        id: ConsentRecordId,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.fail_mark_for.contains(&id) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut records = self.records.lock().expect("lock records");
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(true);
        };
        if record.deleted_at.is_some() {
            return Ok(true);
        }
        record.deleted_at = Some(deleted_at);
        Ok(false)
    }
}

/// Append-only ledger that records every entry it is given.
#[derive(Default)]
pub struct RecordingAuditLog {
    pub entries: Mutex<Vec<AuditLogEntry>>,
}

impl RecordingAuditLog {
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().expect("lock entries").clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.entries.lock().expect("lock entries").push(entry.clone());
        Ok(())
    }
}

/// Gateway returning a fixed report for every subject.
#[derive(Default)]
pub struct StubGateway {
    pub deleted_per_subject: u64,
    pub failures: Vec<ArtifactFailure>,
}

#[async_trait]
impl DeletionGateway for StubGateway {
    async fn delete_dependent_artifacts(&self, _subject_id: SubjectId) -> ArtifactDeletionReport {
        ArtifactDeletionReport {
            deleted: self.deleted_per_subject,
            failures: self.failures.clone(),
        }
    }
}

pub fn consent_record(agreed_at: DateTime<Utc>) -> ConsentRecord {
    ConsentRecord::new(
        SubjectId::new(),
        "voice_cloning".to_string(),
        "v1".to_string(),
        agreed_at,
        Months::new(DEFAULT_RETENTION_MONTHS),
    )
}
