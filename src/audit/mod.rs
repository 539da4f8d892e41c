//! Audit counters for ledger activity.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_audit_log, create_shared_audit_log_with_persistence, AuditLog, AuditStats,
    SharedAuditLog,
};
