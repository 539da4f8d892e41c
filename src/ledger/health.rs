//! Append-only reading history and current snapshots.

use crate::core::alerts::{alerts, Alert};
use crate::core::scoring::score;
use crate::core::types::{HealthSnapshot, OwnerId, PlantId, PlantStatus};
use crate::core::validator::validate;
use crate::ledger::error::LedgerError;
use crate::ledger::registry::Registry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Health state of a single plant.
#[derive(Debug, Clone, Default)]
struct HealthEntry {
    current: HealthSnapshot,
    history: Vec<HealthSnapshot>,
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    /// The reading as recorded, stamped by the ledger
    pub snapshot: HealthSnapshot,
    pub score: u8,
    pub alerts: Vec<Alert>,
}

/// Owns per-plant history and the current snapshot.
#[derive(Debug, Clone, Default)]
pub struct HealthLedger {
    entries: BTreeMap<PlantId, HealthEntry>,
}

/// Guards that run before a reading is validated: the plant exists, the
/// caller owns it and it is not dormant.
pub fn ensure_accepting(registry: &Registry, id: PlantId, caller: &OwnerId) -> Result<(), LedgerError> {
    let record = registry.ensure_owner(id, caller)?;
    if record.status == PlantStatus::Dormant {
        return Err(LedgerError::Dormant(id));
    }
    Ok(())
}

impl HealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted histories.
    ///
    /// Each history must be non-decreasing and free of sentinel stamps. The
    /// current snapshot is the last record.
    pub fn from_histories(
        histories: impl IntoIterator<Item = (PlantId, Vec<HealthSnapshot>)>,
    ) -> Result<Self, String> {
        let mut ledger = Self::new();
        for (id, history) in histories {
            if history.iter().any(HealthSnapshot::is_sentinel) {
                return Err(format!("plant {id} has a reading with timestamp 0"));
            }
            if history.windows(2).any(|pair| pair[1].timestamp < pair[0].timestamp) {
                return Err(format!("plant {id} history is out of order"));
            }
            let current = history.last().copied().unwrap_or_default();
            ledger.entries.insert(id, HealthEntry { current, history });
        }
        Ok(ledger)
    }

    /// Accept a reading for a plant.
    ///
    /// Guards run before anything is written; on error the ledger is
    /// untouched. The reading is stamped with `now`, bumped forward if needed
    /// so history never goes backwards and never carries the sentinel stamp.
    pub fn submit(
        &mut self,
        registry: &Registry,
        id: PlantId,
        snapshot: HealthSnapshot,
        caller: &OwnerId,
        now: u64,
    ) -> Result<SubmitOutcome, LedgerError> {
        ensure_accepting(registry, id, caller)?;
        validate(&snapshot)?;

        let entry = self.entries.entry(id).or_default();
        let last = entry.history.last().map_or(0, |r| r.timestamp);
        let stamped = snapshot.stamped(now.max(last).max(1));

        entry.current = stamped;
        entry.history.push(stamped);

        Ok(SubmitOutcome {
            snapshot: stamped,
            score: score(&stamped),
            alerts: alerts(id, &stamped),
        })
    }

    /// Current snapshot; the sentinel if no reading was ever accepted.
    pub fn current_snapshot(&self, registry: &Registry, id: PlantId) -> Result<HealthSnapshot, LedgerError> {
        registry.require(id)?;
        Ok(self.current(id))
    }

    fn current(&self, id: PlantId) -> HealthSnapshot {
        self.entries.get(&id).map(|e| e.current).unwrap_or_default()
    }

    /// The most recent `limit` readings, oldest first. `0` means all.
    pub fn history(
        &self,
        registry: &Registry,
        id: PlantId,
        limit: usize,
    ) -> Result<Vec<HealthSnapshot>, LedgerError> {
        registry.require(id)?;
        let all = self.readings(id);
        let skip = if limit == 0 || limit >= all.len() {
            0
        } else {
            all.len() - limit
        };
        Ok(all[skip..].to_vec())
    }

    /// Full history of a plant (empty if unknown or never updated).
    pub fn readings(&self, id: PlantId) -> &[HealthSnapshot] {
        self.entries
            .get(&id)
            .map(|e| e.history.as_slice())
            .unwrap_or(&[])
    }

    /// Timestamp of the last accepted reading, 0 if none.
    pub fn last_updated(&self, id: PlantId) -> u64 {
        self.current(id).timestamp
    }

    /// Total readings across all plants.
    pub fn total_readings(&self) -> usize {
        self.entries.values().map(|e| e.history.len()).sum()
    }
}
