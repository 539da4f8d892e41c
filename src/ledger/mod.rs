//! The plant ledger.
//!
//! [`Ledger`] is the single serializing authority over [`Registry`] and
//! [`HealthLedger`]. Mutations take the writer lock, run every guard
//! before touching state, apply the change, then deliver events to the
//! configured sinks before releasing the lock. Event order therefore
//! matches mutation order. Reads share the lock and always see a fully
//! applied state.

pub mod clock;
pub mod error;
pub mod health;
pub mod registry;

use crate::audit::{create_shared_audit_log, SharedAuditLog};
use crate::core::analytics::{self, AnalyticsReport, WindowStatistics, ROLLING_WINDOW_SECS};
use crate::core::types::{HealthSnapshot, OwnerId, Plant, PlantId, PlantStatus};
use crate::events::{EventEnvelope, EventSink, LedgerEvent};
use crate::store::{LedgerSnapshot, StoreError, StoredPlant, STORE_VERSION};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use health::{HealthLedger, SubmitOutcome};
pub use registry::{PlantRecord, Registry};

/// Everything guarded by the ledger lock.
#[derive(Debug, Default)]
struct LedgerState {
    registry: Registry,
    health: HealthLedger,
    sequence: u64,
}

/// Thread-safe plant ledger.
pub struct Ledger {
    state: RwLock<LedgerState>,
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn EventSink>>,
    audit: SharedAuditLog,
}

/// A ledger shared between threads or request handlers.
pub type SharedLedger = Arc<Ledger>;

impl Ledger {
    /// Create an empty ledger using the given clock.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            clock: Arc::new(clock),
            sinks: Vec::new(),
            audit: create_shared_audit_log(),
        }
    }

    /// Rebuild a ledger from persisted state.
    pub fn restore(snapshot: LedgerSnapshot, clock: impl Clock + 'static) -> Result<Self, StoreError> {
        if snapshot.version != STORE_VERSION {
            return Err(StoreError::Version(snapshot.version));
        }

        let mut records = Vec::with_capacity(snapshot.plants.len());
        let mut histories = Vec::with_capacity(snapshot.plants.len());
        for StoredPlant { plant, history } in snapshot.plants {
            histories.push((plant.id, history));
            records.push(plant);
        }

        let registry =
            Registry::from_records(records, snapshot.total_plants).map_err(StoreError::Corrupt)?;
        let health = HealthLedger::from_histories(histories).map_err(StoreError::Corrupt)?;

        let ledger = Self::new(clock);
        {
            let mut state = ledger.write_state();
            state.registry = registry;
            state.health = health;
            state.sequence = snapshot.last_sequence;
        }
        Ok(ledger)
    }

    /// Add an event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Use a specific audit log instead of a private one.
    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver events to every sink. Sink failures never undo a mutation.
    fn emit(&self, state: &mut LedgerState, now: u64, events: Vec<LedgerEvent>) {
        for event in events {
            state.sequence += 1;
            let envelope = EventEnvelope::new(state.sequence, now, event);
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(&envelope) {
                    self.audit.record_sink_failure();
                    tracing::warn!(
                        sequence = envelope.sequence,
                        event = envelope.event.name(),
                        error = %e,
                        "event delivery failed"
                    );
                }
            }
        }
    }

    fn rejected<T>(&self, operation: &str, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        if let Err(ref e) = result {
            self.audit.record_rejection(e.is_validation());
            tracing::warn!(operation, code = e.code(), error = %e, "mutation rejected");
        }
        result
    }

    /// Register a plant owned by `owner`.
    pub fn register(&self, name: &str, species: &str, owner: &OwnerId) -> Result<PlantId, LedgerError> {
        let mut state = self.write_state();
        let now = self.clock.now();

        let id = self.rejected("register", state.registry.register(name, species, owner, now))?;
        let (name, species) = state
            .registry
            .get(id)
            .map(|r| (r.name.clone(), r.species.clone()))
            .unwrap_or_default();

        self.audit.record_registration();
        tracing::info!(plant_id = %id, owner = %owner, %name, %species, "plant registered");

        self.emit(
            &mut state,
            now,
            vec![LedgerEvent::Registered {
                plant_id: id,
                owner: owner.clone(),
                name,
                species,
                created_at: now,
            }],
        );
        Ok(id)
    }

    /// Append a reading. The caller-supplied timestamp is ignored.
    pub fn submit(
        &self,
        id: PlantId,
        snapshot: HealthSnapshot,
        caller: &OwnerId,
    ) -> Result<SubmitOutcome, LedgerError> {
        let mut state = self.write_state();
        let now = self.clock.now();

        let LedgerState {
            registry, health, ..
        } = &mut *state;
        let outcome = self.rejected("submit", health.submit(registry, id, snapshot, caller, now))?;

        self.audit.record_reading();
        self.audit.record_alerts(outcome.alerts.len() as u64);
        tracing::debug!(
            plant_id = %id,
            score = outcome.score,
            alerts = outcome.alerts.len(),
            timestamp = outcome.snapshot.timestamp,
            "reading accepted"
        );

        let mut events = Vec::with_capacity(1 + outcome.alerts.len());
        events.push(LedgerEvent::HealthUpdated {
            plant_id: id,
            snapshot: outcome.snapshot,
            score: outcome.score,
        });
        events.extend(outcome.alerts.iter().cloned().map(LedgerEvent::Alert));
        self.emit(&mut state, now, events);

        Ok(outcome)
    }

    /// Hand a plant over to `new_owner`. History is untouched.
    pub fn transfer(&self, id: PlantId, new_owner: &OwnerId, caller: &OwnerId) -> Result<(), LedgerError> {
        let mut state = self.write_state();
        let now = self.clock.now();

        let previous = self.rejected("transfer", state.registry.transfer(id, new_owner, caller))?;

        self.audit.record_transfer();
        tracing::info!(plant_id = %id, from = %previous, to = %new_owner, "plant transferred");

        self.emit(
            &mut state,
            now,
            vec![LedgerEvent::Transferred {
                plant_id: id,
                from: previous,
                to: new_owner.clone(),
            }],
        );
        Ok(())
    }

    /// Activate or deactivate a plant.
    pub fn set_status(&self, id: PlantId, status: PlantStatus, caller: &OwnerId) -> Result<(), LedgerError> {
        let mut state = self.write_state();
        let now = self.clock.now();

        let changed = self.rejected("set_status", state.registry.set_status(id, status, caller))?;
        if !changed {
            return Ok(());
        }

        self.audit.record_status_change();
        tracing::info!(plant_id = %id, %status, "plant status changed");

        self.emit(
            &mut state,
            now,
            vec![LedgerEvent::StatusChanged {
                plant_id: id,
                status,
            }],
        );
        Ok(())
    }

    /// Run the ownership and status guards of [`Ledger::submit`] without
    /// submitting anything.
    pub fn check_submit(&self, id: PlantId, caller: &OwnerId) -> Result<(), LedgerError> {
        let state = self.read_state();
        health::ensure_accepting(&state.registry, id, caller)
    }

    pub fn exists(&self, id: PlantId) -> bool {
        self.read_state().registry.exists(id)
    }

    /// Full view of a plant.
    pub fn plant(&self, id: PlantId) -> Result<Plant, LedgerError> {
        let state = self.read_state();
        let record = state.registry.require(id)?;
        let health = state.health.current_snapshot(&state.registry, id)?;
        Ok(Plant {
            id,
            name: record.name.clone(),
            species: record.species.clone(),
            owner: record.owner.clone(),
            status: record.status,
            created_at: record.created_at,
            last_updated: state.health.last_updated(id),
            health,
        })
    }

    pub fn current_snapshot(&self, id: PlantId) -> Result<HealthSnapshot, LedgerError> {
        let state = self.read_state();
        state.health.current_snapshot(&state.registry, id)
    }

    /// The most recent `limit` readings, oldest first; `0` returns all.
    pub fn history(&self, id: PlantId, limit: usize) -> Result<Vec<HealthSnapshot>, LedgerError> {
        let state = self.read_state();
        state.health.history(&state.registry, id, limit)
    }

    /// Analytics as of the ledger clock.
    pub fn analyze(&self, id: PlantId) -> Result<AnalyticsReport, LedgerError> {
        self.analyze_at(id, self.clock.now())
    }

    /// Analytics as of an explicit time.
    pub fn analyze_at(&self, id: PlantId, now: u64) -> Result<AnalyticsReport, LedgerError> {
        let state = self.read_state();
        let record = state.registry.require(id)?;
        let current = state.health.current_snapshot(&state.registry, id)?;
        Ok(analytics::analyze(
            record.created_at,
            &current,
            state.health.readings(id),
            now,
        ))
    }

    /// Per-metric statistics over the rolling window, as of the ledger clock.
    pub fn window_statistics(&self, id: PlantId) -> Result<WindowStatistics, LedgerError> {
        let now = self.clock.now();
        let state = self.read_state();
        state.registry.require(id)?;
        Ok(analytics::window_statistics(
            state.health.readings(id),
            now,
            ROLLING_WINDOW_SECS,
        ))
    }

    /// Plants currently held by `owner`. Order is unspecified.
    pub fn owner_set_of(&self, owner: &OwnerId) -> Vec<PlantId> {
        self.read_state().registry.owner_set_of(owner)
    }

    /// Number of plants ever registered.
    pub fn total_plants(&self) -> u64 {
        self.read_state().registry.total()
    }

    /// Number of readings across all plants.
    pub fn total_readings(&self) -> usize {
        self.read_state().health.total_readings()
    }

    /// Capture the state for persistence.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.read_state();
        let plants = state
            .registry
            .records()
            .iter()
            .map(|record| StoredPlant {
                plant: record.clone(),
                history: state.health.readings(record.id).to_vec(),
            })
            .collect();

        LedgerSnapshot {
            version: STORE_VERSION,
            total_plants: state.registry.total(),
            last_sequence: state.sequence,
            plants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::AlertKind;
    use crate::events::{MemorySink, SinkError};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn deliver(&self, _envelope: &EventEnvelope) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".to_string()))
        }
    }

    fn alice() -> OwnerId {
        OwnerId::new("alice")
    }

    fn ledger_with_memory() -> (Ledger, Arc<MemorySink>, ManualClock) {
        let clock = ManualClock::new(1_000);
        let sink = Arc::new(MemorySink::new());
        let ledger = Ledger::new(clock.clone()).with_sink(sink.clone());
        (ledger, sink, clock)
    }

    #[test]
    fn test_register_emits_event() {
        let (ledger, sink, _) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[0].emitted_at, 1_000);
        assert!(matches!(
            &events[0].event,
            LedgerEvent::Registered { plant_id, created_at: 1_000, .. } if *plant_id == id
        ));
        assert_eq!(ledger.audit().stats().plants_registered, 1);
    }

    #[test]
    fn test_submit_emits_update_then_alerts() {
        let (ledger, sink, clock) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();
        clock.advance(60);

        let reading = HealthSnapshot::new(25, 2000, 50, 650, 1200);
        let outcome = ledger.submit(id, reading, &alice()).unwrap();
        assert_eq!(outcome.score, 80);
        assert_eq!(outcome.snapshot.timestamp, 1_060);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1].event, LedgerEvent::HealthUpdated { score: 80, .. }));
        assert!(matches!(
            &events[2].event,
            LedgerEvent::Alert(alert) if alert.kind == AlertKind::LowSoilMoisture
        ));
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_rejected_mutation_emits_nothing() {
        let (ledger, sink, _) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();

        let mut bad = HealthSnapshot::new(50, 2000, 60, 650, 1500);
        bad.humidity = 150;
        assert_eq!(ledger.submit(id, bad, &alice()), Err(LedgerError::InvalidHumidity(150)));
        assert_eq!(
            ledger.transfer(id, &alice(), &alice()),
            Err(LedgerError::SelfTransfer)
        );

        assert_eq!(sink.len(), 1);
        assert!(ledger.history(id, 0).unwrap().is_empty());
        let stats = ledger.audit().stats();
        assert_eq!(stats.mutations_rejected, 2);
        assert_eq!(stats.readings_rejected, 1);
    }

    #[test]
    fn test_sink_failure_does_not_roll_back() {
        let clock = ManualClock::new(5);
        let ledger = Ledger::new(clock).with_sink(Arc::new(FailingSink));

        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();
        let reading = HealthSnapshot::new(10, 2000, 60, 650, 1500);
        ledger.submit(id, reading, &alice()).unwrap();

        assert_eq!(ledger.history(id, 0).unwrap().len(), 1);
        // registered + health_updated + one alert
        assert_eq!(ledger.audit().stats().sink_failures, 3);
    }

    #[test]
    fn test_plant_view() {
        let (ledger, _, clock) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();

        let plant = ledger.plant(id).unwrap();
        assert_eq!(plant.last_updated, 0);
        assert_eq!(plant.health, HealthSnapshot::SENTINEL);

        clock.advance(10);
        ledger
            .submit(id, HealthSnapshot::new(50, 2000, 60, 650, 1500), &alice())
            .unwrap();
        let plant = ledger.plant(id).unwrap();
        assert_eq!(plant.last_updated, 1_010);
        assert_eq!(plant.owner, alice());
        assert_eq!(plant.created_at, 1_000);
    }

    #[test]
    fn test_status_change_is_idempotent() {
        let (ledger, sink, _) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();

        ledger.set_status(id, PlantStatus::Active, &alice()).unwrap();
        assert_eq!(sink.len(), 1);

        ledger.set_status(id, PlantStatus::Dormant, &alice()).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(
            ledger.submit(id, HealthSnapshot::new(50, 2000, 60, 650, 1500), &alice()),
            Err(LedgerError::Dormant(id))
        );
    }

    #[test]
    fn test_snapshot_restore_preserves_state() {
        let (ledger, _, clock) = ledger_with_memory();
        let a = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();
        let b = ledger.register("Cactus", "Cereus", &alice()).unwrap();
        clock.advance(5);
        ledger
            .submit(a, HealthSnapshot::new(50, 2000, 60, 650, 1500), &alice())
            .unwrap();
        ledger.transfer(b, &OwnerId::new("bob"), &alice()).unwrap();

        let snapshot = ledger.snapshot();
        let restored = Ledger::restore(snapshot.clone(), clock.clone()).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.owner_set_of(&alice()), vec![a]);
        assert_eq!(restored.owner_set_of(&OwnerId::new("bob")), vec![b]);
        assert_eq!(restored.current_snapshot(a).unwrap().timestamp, 1_005);
        assert_eq!(restored.plant(b).unwrap().last_updated, 0);

        let c = restored.register("Ivy", "Hedera", &alice()).unwrap();
        assert_eq!(c, PlantId(3));
    }

    #[test]
    fn test_restore_rejects_corrupt_history() {
        let (ledger, _, _) = ledger_with_memory();
        let id = ledger.register("Fern", "Nephrolepis", &alice()).unwrap();
        ledger
            .submit(id, HealthSnapshot::new(50, 2000, 60, 650, 1500), &alice())
            .unwrap();

        let mut snapshot = ledger.snapshot();
        snapshot.plants[0].history[0].timestamp = 0;
        assert!(matches!(
            Ledger::restore(snapshot, ManualClock::new(0)),
            Err(StoreError::Corrupt(_))
        ));
    }
}
