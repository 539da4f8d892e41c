//! Plant Ledger - an append-only registry of plants and their health readings.
//!
//! Plants are registered to an owner, receive timestamped environmental
//! readings, and can be handed over to new owners. Every accepted reading is
//! scored, checked against alert thresholds and kept forever.
//!
//! # Guarantees
//!
//! - **Append-only history**: readings are never edited or removed
//! - **Ledger-stamped time**: timestamps come from the ledger clock, never the caller
//! - **Owner-gated writes**: only the current owner may submit, transfer or change status
//! - **Ordered events**: notifications are delivered in mutation order
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Plant Ledger                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Registry   │──▶│   Health    │──▶│  Scoring /  │       │
//! │  │ (ownership) │   │  (history)  │   │   Alerts    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                 │                 │               │
//! │         ▼                 ▼                 ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Audit     │   │  Analytics  │   │ Event Sinks │       │
//! │  │    Log      │   │ (7d window) │   │  (ordered)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use plant_ledger::{HealthSnapshot, Ledger, OwnerId, SystemClock};
//!
//! let ledger = Ledger::new(SystemClock);
//! let alice = OwnerId::new("alice");
//!
//! let id = ledger.register("Fern", "Nephrolepis exaltata", &alice).unwrap();
//! let outcome = ledger
//!     .submit(id, HealthSnapshot::new(25, 2000, 50, 650, 1200), &alice)
//!     .unwrap();
//!
//! assert_eq!(outcome.score, 80);
//! assert_eq!(outcome.alerts.len(), 1);
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod events;
pub mod ledger;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use config::Config;
pub use core::{
    Alert, AlertKind, AnalyticsReport, HealthSnapshot, OwnerId, Plant, PlantId, PlantStatus,
    WindowStatistics,
};
pub use events::{
    ChannelSink, EventEnvelope, EventSink, LedgerEvent, MemorySink, NullSink, SinkError,
    TracingSink,
};
pub use ledger::{
    Clock, Ledger, LedgerError, ManualClock, SharedLedger, SubmitOutcome, SystemClock,
};
pub use store::{LedgerSnapshot, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
