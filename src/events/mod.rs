//! Ledger notifications.
//!
//! Every successful mutation produces one or more events. The ledger wraps
//! each in an [`EventEnvelope`] carrying a ledger-wide sequence number and
//! hands it to its sinks in mutation order.

pub mod sink;

use crate::core::alerts::Alert;
use crate::core::types::{HealthSnapshot, OwnerId, PlantId, PlantStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export commonly used types
pub use sink::{ChannelSink, EventSink, MemorySink, NullSink, SinkError, TracingSink};

/// A ledger notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Registered {
        plant_id: PlantId,
        owner: OwnerId,
        name: String,
        species: String,
        created_at: u64,
    },
    HealthUpdated {
        plant_id: PlantId,
        snapshot: HealthSnapshot,
        score: u8,
    },
    Transferred {
        plant_id: PlantId,
        from: OwnerId,
        to: OwnerId,
    },
    StatusChanged {
        plant_id: PlantId,
        status: PlantStatus,
    },
    Alert(Alert),
}

impl LedgerEvent {
    /// Plant the event concerns.
    pub fn plant_id(&self) -> PlantId {
        match self {
            LedgerEvent::Registered { plant_id, .. }
            | LedgerEvent::HealthUpdated { plant_id, .. }
            | LedgerEvent::Transferred { plant_id, .. }
            | LedgerEvent::StatusChanged { plant_id, .. } => *plant_id,
            LedgerEvent::Alert(alert) => alert.plant_id,
        }
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Registered { .. } => "registered",
            LedgerEvent::HealthUpdated { .. } => "health_updated",
            LedgerEvent::Transferred { .. } => "transferred",
            LedgerEvent::StatusChanged { .. } => "status_changed",
            LedgerEvent::Alert(_) => "alert",
        }
    }
}

/// An event as delivered to sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique delivery id
    pub id: Uuid,
    /// Ledger-wide position, starting at 1
    pub sequence: u64,
    /// Ledger time of the mutation
    pub emitted_at: u64,
    pub event: LedgerEvent,
}

impl EventEnvelope {
    pub fn new(sequence: u64, emitted_at: u64, event: LedgerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            emitted_at,
            event,
        }
    }
}
