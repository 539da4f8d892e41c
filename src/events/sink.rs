//! Event sinks.
//!
//! Sinks are invoked while the ledger's writer lock is held, so they must
//! be quick and must not call back into the ledger.

use crate::events::EventEnvelope;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{Mutex, PoisonError};

/// Errors a sink may report. The ledger logs them and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("event channel is full")]
    Full,
    #[error("event channel receiver has been dropped")]
    Disconnected,
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Receiver of ledger events.
pub trait EventSink: Send + Sync {
    fn deliver(&self, envelope: &EventEnvelope) -> Result<(), SinkError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _envelope: &EventEnvelope) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one structured log line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn deliver(&self, envelope: &EventEnvelope) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&envelope.event)
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        tracing::info!(
            target: "plant_ledger::events",
            sequence = envelope.sequence,
            event = envelope.event.name(),
            plant_id = %envelope.event.plant_id(),
            %payload,
            "ledger event"
        );
        Ok(())
    }
}

/// Forwards events over a bounded channel without blocking.
pub struct ChannelSink {
    sender: Sender<EventEnvelope>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<EventEnvelope>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: Sender<EventEnvelope>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, envelope: &EventEnvelope) -> Result<(), SinkError> {
        self.sender.try_send(envelope.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Disconnected,
        })
    }
}

/// Keeps every delivered event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn deliver(&self, envelope: &EventEnvelope) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
        Ok(())
    }
}
