//! Plant lifecycle and the owner index.
//!
//! Plants live in an arena indexed by `id - 1`. Each owner maps to a
//! growable list of the plant ids it currently holds; removal on transfer
//! is swap-and-pop, so owner lists carry no ordering guarantee after a
//! transfer.

use crate::core::types::{OwnerId, PlantId, PlantStatus};
use crate::ledger::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry-owned attributes of a plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub id: PlantId,
    pub name: String,
    pub species: String,
    pub owner: OwnerId,
    #[serde(default)]
    pub status: PlantStatus,
    pub created_at: u64,
}

/// Owns plant registration, ownership and the owner index.
#[derive(Debug, Clone)]
pub struct Registry {
    plants: Vec<PlantRecord>,
    owners: HashMap<OwnerId, Vec<PlantId>>,
    next_id: PlantId,
    total: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plants: Vec::new(),
            owners: HashMap::new(),
            next_id: PlantId::FIRST,
            total: 0,
        }
    }

    /// Rebuild a registry from persisted records.
    ///
    /// Records must carry ids `1..=n` in order with non-null owners. The
    /// owner index is derived from the records.
    pub fn from_records(records: Vec<PlantRecord>, total: u64) -> Result<Self, String> {
        if total != records.len() as u64 {
            return Err(format!(
                "plant counter {total} does not match {} stored plants",
                records.len()
            ));
        }

        let mut registry = Self::new();
        for record in records {
            if record.id != registry.next_id {
                return Err(format!(
                    "expected plant id {} but found {}",
                    registry.next_id, record.id
                ));
            }
            if record.owner.is_null() {
                return Err(format!("plant {} has a null owner", record.id));
            }
            if record.name.trim().is_empty() || record.species.trim().is_empty() {
                return Err(format!("plant {} has an empty name or species", record.id));
            }
            registry.insert(record);
        }
        Ok(registry)
    }

    fn insert(&mut self, record: PlantRecord) {
        self.owners
            .entry(record.owner.clone())
            .or_default()
            .push(record.id);
        self.next_id = record.id.next();
        self.total += 1;
        self.plants.push(record);
    }

    /// Register a new plant and return its identifier.
    pub fn register(
        &mut self,
        name: &str,
        species: &str,
        owner: &OwnerId,
        now: u64,
    ) -> Result<PlantId, LedgerError> {
        let name = name.trim();
        let species = species.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        if species.is_empty() {
            return Err(LedgerError::EmptySpecies);
        }
        if owner.is_null() {
            return Err(LedgerError::InvalidOwner);
        }

        let id = self.next_id;
        self.insert(PlantRecord {
            id,
            name: name.to_string(),
            species: species.to_string(),
            owner: owner.clone(),
            status: PlantStatus::Active,
            created_at: now,
        });
        Ok(id)
    }

    /// Move a plant to a new owner. Returns the previous owner.
    pub fn transfer(
        &mut self,
        id: PlantId,
        new_owner: &OwnerId,
        caller: &OwnerId,
    ) -> Result<OwnerId, LedgerError> {
        self.ensure_owner(id, caller)?;
        if new_owner.is_null() {
            return Err(LedgerError::InvalidOwner);
        }
        if new_owner == caller {
            return Err(LedgerError::SelfTransfer);
        }

        let previous = caller.clone();
        if let Some(set) = self.owners.get_mut(&previous) {
            if let Some(pos) = set.iter().position(|p| *p == id) {
                set.swap_remove(pos);
            }
            if set.is_empty() {
                self.owners.remove(&previous);
            }
        }
        self.owners.entry(new_owner.clone()).or_default().push(id);

        if let Some(record) = self.record_mut(id) {
            record.owner = new_owner.clone();
        }
        Ok(previous)
    }

    /// Change a plant's status. Returns whether anything changed.
    pub fn set_status(
        &mut self,
        id: PlantId,
        status: PlantStatus,
        caller: &OwnerId,
    ) -> Result<bool, LedgerError> {
        if self.ensure_owner(id, caller)?.status == status {
            return Ok(false);
        }
        if let Some(record) = self.record_mut(id) {
            record.status = status;
        }
        Ok(true)
    }

    fn index(id: PlantId) -> Option<usize> {
        if id.is_none() {
            None
        } else {
            usize::try_from(id.0 - 1).ok()
        }
    }

    fn record_mut(&mut self, id: PlantId) -> Option<&mut PlantRecord> {
        Self::index(id).and_then(|i| self.plants.get_mut(i))
    }

    pub fn get(&self, id: PlantId) -> Option<&PlantRecord> {
        Self::index(id).and_then(|i| self.plants.get(i))
    }

    /// Look up a plant or fail with `NotFound`.
    pub fn require(&self, id: PlantId) -> Result<&PlantRecord, LedgerError> {
        self.get(id).ok_or(LedgerError::NotFound(id))
    }

    /// Look up a plant and check that `caller` owns it.
    pub fn ensure_owner(&self, id: PlantId, caller: &OwnerId) -> Result<&PlantRecord, LedgerError> {
        let record = self.require(id)?;
        if record.owner != *caller {
            return Err(LedgerError::NotOwner);
        }
        Ok(record)
    }

    pub fn exists(&self, id: PlantId) -> bool {
        self.get(id).is_some()
    }

    /// Plant ids currently held by `owner`.
    pub fn owner_set_of(&self, owner: &OwnerId) -> Vec<PlantId> {
        self.owners.get(owner).cloned().unwrap_or_default()
    }

    /// Total number of plants ever registered.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Identifier the next registration will receive.
    pub fn next_id(&self) -> PlantId {
        self.next_id
    }

    pub fn records(&self) -> &[PlantRecord] {
        &self.plants
    }

    /// Number of distinct owners holding at least one plant.
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }
}
