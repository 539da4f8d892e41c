//! Ledger activity counters.
//!
//! Counts what the ledger has done (and refused to do) so operators can
//! see activity without reading the event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity counters for a ledger process.
#[derive(Debug)]
pub struct AuditLog {
    /// Plants registered
    plants_registered: AtomicU64,
    /// Readings appended to history
    readings_accepted: AtomicU64,
    /// Ownership transfers completed
    transfers: AtomicU64,
    /// Status changes applied
    status_changes: AtomicU64,
    /// Alert events emitted
    alerts_emitted: AtomicU64,
    /// Mutations refused with an error
    mutations_rejected: AtomicU64,
    /// Readings refused by validation (subset of rejections)
    readings_rejected: AtomicU64,
    /// Event deliveries that a sink reported as failed
    sink_failures: AtomicU64,
    /// When this process started counting
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            plants_registered: AtomicU64::new(0),
            readings_accepted: AtomicU64::new(0),
            transfers: AtomicU64::new(0),
            status_changes: AtomicU64::new(0),
            alerts_emitted: AtomicU64::new(0),
            mutations_rejected: AtomicU64::new(0),
            readings_rejected: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that loads and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous audit stats");
        }

        log
    }

    pub fn record_registration(&self) {
        self.plants_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transfer(&self) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_change(&self) {
        self.status_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alerts(&self, count: u64) {
        self.alerts_emitted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a refused mutation; `validation` marks rejected readings.
    pub fn record_rejection(&self, validation: bool) {
        self.mutations_rejected.fetch_add(1, Ordering::Relaxed);
        if validation {
            self.readings_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            plants_registered: self.plants_registered.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            mutations_rejected: self.mutations_rejected.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// A summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Ledger Activity:\n\
             - Plants registered: {}\n\
             - Readings accepted: {}\n\
             - Readings rejected by validation: {}\n\
             - Ownership transfers: {}\n\
             - Status changes: {}\n\
             - Alerts emitted: {}\n\
             - Mutations rejected: {}\n\
             - Event delivery failures: {}\n\
             - Session duration: {} seconds",
            stats.plants_registered,
            stats.readings_accepted,
            stats.readings_rejected,
            stats.transfers,
            stats.status_changes,
            stats.alerts_emitted,
            stats.mutations_rejected,
            stats.sink_failures,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                plants_registered: stats.plants_registered,
                readings_accepted: stats.readings_accepted,
                transfers: stats.transfers,
                status_changes: stats.status_changes,
                alerts_emitted: stats.alerts_emitted,
                mutations_rejected: stats.mutations_rejected,
                readings_rejected: stats.readings_rejected,
                sink_failures: stats.sink_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.plants_registered
                    .store(persisted.plants_registered, Ordering::Relaxed);
                self.readings_accepted
                    .store(persisted.readings_accepted, Ordering::Relaxed);
                self.transfers.store(persisted.transfers, Ordering::Relaxed);
                self.status_changes
                    .store(persisted.status_changes, Ordering::Relaxed);
                self.alerts_emitted
                    .store(persisted.alerts_emitted, Ordering::Relaxed);
                self.mutations_rejected
                    .store(persisted.mutations_rejected, Ordering::Relaxed);
                self.readings_rejected
                    .store(persisted.readings_rejected, Ordering::Relaxed);
                self.sink_failures
                    .store(persisted.sink_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub plants_registered: u64,
    pub readings_accepted: u64,
    pub transfers: u64,
    pub status_changes: u64,
    pub alerts_emitted: u64,
    pub mutations_rejected: u64,
    pub readings_rejected: u64,
    pub sink_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    plants_registered: u64,
    #[serde(default)]
    readings_accepted: u64,
    #[serde(default)]
    transfers: u64,
    #[serde(default)]
    status_changes: u64,
    #[serde(default)]
    alerts_emitted: u64,
    #[serde(default)]
    mutations_rejected: u64,
    #[serde(default)]
    readings_rejected: u64,
    #[serde(default)]
    sink_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

pub fn create_shared_audit_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

pub fn create_shared_audit_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();

        log.record_registration();
        log.record_reading();
        log.record_reading();
        log.record_alerts(3);
        log.record_rejection(true);
        log.record_rejection(false);

        let stats = log.stats();
        assert_eq!(stats.plants_registered, 1);
        assert_eq!(stats.readings_accepted, 2);
        assert_eq!(stats.alerts_emitted, 3);
        assert_eq!(stats.mutations_rejected, 2);
        assert_eq!(stats.readings_rejected, 1);
    }

    #[test]
    fn test_summary_format() {
        let log = AuditLog::new();
        let summary = log.summary();

        assert!(summary.contains("Plants registered"));
        assert!(summary.contains("Alerts emitted"));
        assert!(summary.contains("Event delivery failures"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.json");

        let log = AuditLog::with_persistence(path.clone());
        log.record_transfer();
        log.record_sink_failure();
        log.save().unwrap();

        let reloaded = AuditLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.transfers, 1);
        assert_eq!(stats.sink_failures, 1);
    }
}
