//! Persistent audit trail of user and pipeline actions.

mod audit_log;

pub use audit_log::{AuditAction, AuditEntry, AuditLog, Outcome};
