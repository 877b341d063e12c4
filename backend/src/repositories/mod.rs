pub mod audit_log;
pub mod consent_record;

pub use audit_log::{AuditLog, PgAuditLog};
pub use consent_record::{ConsentStore, PgConsentStore};
