//! Retention enforcement: the scanner that finds due records and the
//! enforcer that deletes one record as an isolated unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::audit_log::{AuditLogEntry, RetentionDeletionDetails};
use crate::models::consent_record::ConsentRecord;
use crate::repositories::audit_log::AuditLog;
use crate::repositories::consent_record::ConsentStore;
use crate::services::deletion_gateway::{ArtifactFailure, DeletionGateway};

/// Per-record result of enforcement. Scoped to one record; a failure here
/// never aborts processing of sibling records.
#[derive(Debug, Clone, PartialEq)]
pub enum EnforcementOutcome {
    /// The record was soft-deleted by this call.
    Deleted {
        artifacts_deleted: u64,
        artifact_failures: Vec<ArtifactFailure>,
    },
    /// The record was already deleted: an overlapping run or a retry got
    /// there first. No-op, no duplicate audit entry.
    AlreadyDeleted,
    /// A storage write failed. The record stays selectable for the next
    /// scheduled run unless the soft delete already landed.
    Failed { reason: String },
}

/// Read-only query for records whose retention deadline has passed.
///
/// Side-effect free, so it is safe to re-invoke and safe for dry-run
/// tooling.
pub struct RetentionScanner {
    store: Arc<dyn ConsentStore>,
}

impl RetentionScanner {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }

    pub async fn find_due_records(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsentRecord>, StoreError> {
        let due = self.store.find_due_records(now).await?;
        tracing::debug!(count = due.len(), "scanned for due consent records");
        Ok(due)
    }
}

/// Enforces the retention limit on a single due record: best-effort cascade
/// to dependent artifacts, conditional soft delete, one
/// `auto_deleted_retention` audit entry.
pub struct RetentionEnforcer {
    store: Arc<dyn ConsentStore>,
    audit: Arc<dyn AuditLog>,
    gateway: Arc<dyn DeletionGateway>,
}

impl RetentionEnforcer {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        audit: Arc<dyn AuditLog>,
        gateway: Arc<dyn DeletionGateway>,
    ) -> Self {
        Self {
            store,
            audit,
            gateway,
        }
    }

    pub async fn enforce(
        &self,
        record: &ConsentRecord,
        now: DateTime<Utc>,
    ) -> EnforcementOutcome {
        if record.deleted_at.is_some() {
            return EnforcementOutcome::AlreadyDeleted;
        }

        // Best-effort cascade. Artifact failures are operational debt to be
        // retried separately, never a reason to retain the record past its
        // legal deadline.
        let report = self
            .gateway
            .delete_dependent_artifacts(record.subject_id)
            .await;

        match self.store.mark_deleted(record.id, now).await {
            // Conditional write: a concurrent enforcer already won. The
            // winner owns the audit entry.
            Ok(true) => return EnforcementOutcome::AlreadyDeleted,
            Ok(false) => {}
            Err(err) => {
                return EnforcementOutcome::Failed {
                    reason: format!("marking record deleted failed: {}", err),
                };
            }
        }

        let details = RetentionDeletionDetails {
            retention_deadline: record.retention_deadline,
            agreed_at: record.agreed_at,
            artifacts_deleted: report.deleted,
            artifact_failures: report.failures.len() as u64,
        };
        let entry = AuditLogEntry::auto_deleted_retention(record.id, &details, now);
        if let Err(err) = self.audit.append(&entry).await {
            // The soft delete is already durable; surface the missing entry
            // rather than retrying into a duplicate.
            return EnforcementOutcome::Failed {
                reason: format!("audit append failed: {}", err),
            };
        }

        if report.deleted > 0 {
            let cascade_entry =
                AuditLogEntry::voice_profile_deleted(record.id, report.deleted, now);
            if let Err(err) = self.audit.append(&cascade_entry).await {
                tracing::warn!(
                    record_id = %record.id,
                    error = %err,
                    "cascade audit entry could not be appended"
                );
            }
        }

        tracing::info!(
            record_id = %record.id,
            subject_id = %record.subject_id,
            retention_deadline = %record.retention_deadline,
            artifacts_deleted = report.deleted,
            "consent record deleted by retention enforcement"
        );

        EnforcementOutcome::Deleted {
            artifacts_deleted: report.deleted,
            artifact_failures: report.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, TimeZone};

    use crate::models::audit_log::AuditAction;
    use crate::models::consent_record::DEFAULT_RETENTION_MONTHS;
    use crate::repositories::audit_log::MockAuditLog;
    use crate::repositories::consent_record::MockConsentStore;
    use crate::services::deletion_gateway::{ArtifactDeletionReport, MockDeletionGateway};
    use crate::types::SubjectId;

    fn due_record() -> ConsentRecord {
        let agreed_at = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        ConsentRecord::new(
            SubjectId::new(),
            "voice_cloning".to_string(),
            "v1".to_string(),
            agreed_at,
            Months::new(DEFAULT_RETENTION_MONTHS),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()
    }

    fn enforcer(
        store: MockConsentStore,
        audit: MockAuditLog,
        gateway: MockDeletionGateway,
    ) -> RetentionEnforcer {
        RetentionEnforcer::new(Arc::new(store), Arc::new(audit), Arc::new(gateway))
    }

    #[tokio::test]
    async fn deletes_and_audits_a_due_record() {
        let record = due_record();
        let record_id = record.id;

        let mut gateway = MockDeletionGateway::new();
        gateway
            .expect_delete_dependent_artifacts()
            .times(1)
            .returning(|_| ArtifactDeletionReport::default());

        let mut store = MockConsentStore::new();
        store
            .expect_mark_deleted()
            .withf(move |id, at| *id == record_id && *at == now())
            .times(1)
            .returning(|_, _| Ok(false));

        let mut audit = MockAuditLog::new();
        audit
            .expect_append()
            .withf(move |entry| {
                entry.consent_record_id == record_id
                    && entry.action == AuditAction::AutoDeletedRetention
                    && entry.performed_by.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = enforcer(store, audit, gateway).enforce(&record, now()).await;
        assert_eq!(
            outcome,
            EnforcementOutcome::Deleted {
                artifacts_deleted: 0,
                artifact_failures: vec![],
            }
        );
    }

    #[tokio::test]
    async fn already_deleted_record_is_a_no_op() {
        let mut record = due_record();
        record.deleted_at = Some(now());

        // No expectations: any store, audit, or gateway call would panic.
        let outcome = enforcer(
            MockConsentStore::new(),
            MockAuditLog::new(),
            MockDeletionGateway::new(),
        )
        .enforce(&record, now())
        .await;

        assert_eq!(outcome, EnforcementOutcome::AlreadyDeleted);
    }

    #[tokio::test]
    async fn losing_the_conditional_write_skips_the_audit_entry() {
        let record = due_record();

        let mut gateway = MockDeletionGateway::new();
        gateway
            .expect_delete_dependent_artifacts()
            .returning(|_| ArtifactDeletionReport::default());

        let mut store = MockConsentStore::new();
        store.expect_mark_deleted().returning(|_, _| Ok(true));

        // MockAuditLog with no expectations: an append would panic.
        let outcome = enforcer(store, MockAuditLog::new(), gateway)
            .enforce(&record, now())
            .await;

        assert_eq!(outcome, EnforcementOutcome::AlreadyDeleted);
    }

    #[tokio::test]
    async fn mark_failure_is_isolated_and_skips_the_audit_entry() {
        let record = due_record();

        let mut gateway = MockDeletionGateway::new();
        gateway
            .expect_delete_dependent_artifacts()
            .returning(|_| ArtifactDeletionReport::default());

        let mut store = MockConsentStore::new();
        store
            .expect_mark_deleted()
            .returning(|_, _| Err(StoreError::Database(sqlx::Error::PoolClosed)));

        let outcome = enforcer(store, MockAuditLog::new(), gateway)
            .enforce(&record, now())
            .await;

        assert!(
            matches!(outcome, EnforcementOutcome::Failed { ref reason }
                if reason.contains("marking record deleted failed")),
            "{outcome:?}"
        );
    }

    #[tokio::test]
    async fn audit_append_failure_surfaces_as_record_failure() {
        let record = due_record();

        let mut gateway = MockDeletionGateway::new();
        gateway
            .expect_delete_dependent_artifacts()
            .returning(|_| ArtifactDeletionReport::default());

        let mut store = MockConsentStore::new();
        store.expect_mark_deleted().returning(|_, _| Ok(false));

        let mut audit = MockAuditLog::new();
        audit
            .expect_append()
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolClosed)));

        let outcome = enforcer(store, audit, gateway).enforce(&record, now()).await;

        assert!(
            matches!(outcome, EnforcementOutcome::Failed { ref reason }
                if reason.contains("audit append failed")),
            "{outcome:?}"
        );
    }

    #[tokio::test]
    async fn cascade_failure_still_deletes_the_record() {
        let record = due_record();
        let record_id = record.id;

        let mut gateway = MockDeletionGateway::new();
        gateway.expect_delete_dependent_artifacts().returning(|_| {
            ArtifactDeletionReport {
                deleted: 0,
                failures: vec![ArtifactFailure {
                    artifact: "voice_profile:v1".to_string(),
                    reason: "provider unavailable".to_string(),
                }],
            }
        });

        let mut store = MockConsentStore::new();
        store
            .expect_mark_deleted()
            .times(1)
            .returning(|_, _| Ok(false));

        let mut audit = MockAuditLog::new();
        audit
            .expect_append()
            .withf(move |entry| {
                entry.consent_record_id == record_id
                    && entry.action == AuditAction::AutoDeletedRetention
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = enforcer(store, audit, gateway).enforce(&record, now()).await;

        match outcome {
            EnforcementOutcome::Deleted {
                artifacts_deleted,
                artifact_failures,
            } => {
                assert_eq!(artifacts_deleted, 0);
                assert_eq!(artifact_failures.len(), 1);
            }
            other => panic!("expected Deleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_cascade_appends_a_voice_profile_entry() {
        let record = due_record();

        let mut gateway = MockDeletionGateway::new();
        gateway.expect_delete_dependent_artifacts().returning(|_| {
            ArtifactDeletionReport {
                deleted: 2,
                failures: vec![],
            }
        });

        let mut store = MockConsentStore::new();
        store.expect_mark_deleted().returning(|_, _| Ok(false));

        let mut audit = MockAuditLog::new();
        audit
            .expect_append()
            .withf(|entry| entry.action == AuditAction::AutoDeletedRetention)
            .times(1)
            .returning(|_| Ok(()));
        audit
            .expect_append()
            .withf(|entry| entry.action == AuditAction::VoiceProfileDeleted)
            .times(1)
            .returning(|_| Ok(()));

        let outcome = enforcer(store, audit, gateway).enforce(&record, now()).await;
        assert_eq!(
            outcome,
            EnforcementOutcome::Deleted {
                artifacts_deleted: 2,
                artifact_failures: vec![],
            }
        );
    }
}
