//! The scheduled entry point: scan once, enforce each due record in
//! isolation, aggregate outcomes, decide whether an operator alert is
//! warranted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::JobError;
use crate::repositories::audit_log::AuditLog;
use crate::repositories::consent_record::ConsentStore;
use crate::services::deletion_gateway::DeletionGateway;
use crate::services::retention::{EnforcementOutcome, RetentionEnforcer, RetentionScanner};
use crate::types::ConsentRecordId;

/// One record the run could not fully handle: either its own writes failed
/// or some of its dependent artifacts survived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub record_id: ConsentRecordId,
    pub reason: String,
}

/// Aggregate outcome of one scheduled run.
///
/// Always well-formed, even on partial failure, and serializable: this is
/// the structured payload handed to the notification collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub records_found: u64,
    pub records_deleted: u64,
    pub dependent_artifacts_deleted: u64,
    pub failures: Vec<RecordFailure>,
    pub ran_at: DateTime<Utc>,
}

impl JobSummary {
    fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            records_found: 0,
            records_deleted: 0,
            dependent_artifacts_deleted: 0,
            failures: Vec::new(),
            ran_at,
        }
    }

    /// Sole signal the caller uses to decide whether to notify an
    /// operator.
    pub fn needs_attention(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs the retention job once for an externally supplied `now`.
///
/// Holds no timer of its own; determinism over the `now` parameter is what
/// keeps the engine testable without wall-clock mocking. Records are
/// processed sequentially in scanner order, but nothing below depends on
/// that: enforcement is idempotent, so records could equally be fanned out
/// across workers for large backlogs.
pub struct RetentionJob {
    scanner: RetentionScanner,
    enforcer: RetentionEnforcer,
}

impl RetentionJob {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        audit: Arc<dyn AuditLog>,
        gateway: Arc<dyn DeletionGateway>,
    ) -> Self {
        Self {
            scanner: RetentionScanner::new(store.clone()),
            enforcer: RetentionEnforcer::new(store, audit, gateway),
        }
    }

    /// A scan failure is the only fatal error; everything below the record
    /// level lands in the summary's `failures` list. No in-run retries:
    /// the next scheduled run re-selects whatever is still undeleted.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<JobSummary, JobError> {
        let due = self
            .scanner
            .find_due_records(now)
            .await
            .map_err(JobError::Scan)?;

        let mut summary = JobSummary::new(now);
        summary.records_found = due.len() as u64;

        for record in &due {
            match self.enforcer.enforce(record, now).await {
                EnforcementOutcome::Deleted {
                    artifacts_deleted,
                    artifact_failures,
                } => {
                    summary.records_deleted += 1;
                    summary.dependent_artifacts_deleted += artifacts_deleted;
                    for failure in artifact_failures {
                        summary.failures.push(RecordFailure {
                            record_id: record.id,
                            reason: format!(
                                "dependent artifact {}: {}",
                                failure.artifact, failure.reason
                            ),
                        });
                    }
                }
                EnforcementOutcome::AlreadyDeleted => {
                    tracing::debug!(record_id = %record.id, "record already deleted, skipping");
                }
                EnforcementOutcome::Failed { reason } => {
                    tracing::warn!(
                        record_id = %record.id,
                        %reason,
                        "retention enforcement failed for record"
                    );
                    summary.failures.push(RecordFailure {
                        record_id: record.id,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            records_found = summary.records_found,
            records_deleted = summary.records_deleted,
            dependent_artifacts_deleted = summary.dependent_artifacts_deleted,
            failures = summary.failures.len(),
            "retention run complete"
        );

        Ok(summary)
    }
}
