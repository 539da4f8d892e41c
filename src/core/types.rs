//! Ledger data types.
//!
//! Fixed-point conventions: temperature and pH carry two implied decimal
//! digits (`2150` is 21.50 °C, `650` is pH 6.50). Timestamps are unix seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered plant.
///
/// `0` is reserved as the "no entity" value and is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantId(pub u64);

impl PlantId {
    /// The reserved "no entity" identifier.
    pub const NONE: PlantId = PlantId(0);

    /// The first identifier handed out by a fresh registry.
    pub const FIRST: PlantId = PlantId(1);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn next(self) -> PlantId {
        PlantId(self.0 + 1)
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The all-zero address that some callers use to mean "nobody".
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// An owner (or caller) identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The null identity.
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Whether this identity is the null identity (blank or the zero address).
    pub fn is_null(&self) -> bool {
        let trimmed = self.0.trim();
        trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ZERO_ADDRESS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One point-in-time set of health readings.
///
/// The all-zero value (`HealthSnapshot::default()`) is the sentinel for
/// "no reading yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Soil moisture, percent (0-100)
    pub soil_moisture: u8,
    /// Temperature in hundredths of a degree Celsius
    pub temperature: i32,
    /// Relative humidity, percent (0-100)
    pub humidity: u8,
    /// pH in hundredths (400-1000)
    pub ph: u16,
    /// Light intensity in lux
    pub light_intensity: u32,
    /// When the ledger accepted this reading; 0 for the sentinel
    #[serde(default)]
    pub timestamp: u64,
}

impl HealthSnapshot {
    /// The "no reading yet" snapshot.
    pub const SENTINEL: HealthSnapshot = HealthSnapshot {
        soil_moisture: 0,
        temperature: 0,
        humidity: 0,
        ph: 0,
        light_intensity: 0,
        timestamp: 0,
    };

    /// Unstamped reading. Arguments follow field order.
    pub fn new(soil_moisture: u8, temperature: i32, humidity: u8, ph: u16, light_intensity: u32) -> Self {
        Self {
            soil_moisture,
            temperature,
            humidity,
            ph,
            light_intensity,
            timestamp: 0,
        }
    }

    /// Whether this is the "no reading yet" value.
    pub fn is_sentinel(&self) -> bool {
        self.timestamp == 0
    }

    /// Copy of this snapshot stamped with the given time.
    pub fn stamped(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Lifecycle status of a plant. Plants are never deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantStatus {
    #[default]
    Active,
    /// Deactivated: history is retained, new readings are refused
    Dormant,
}

impl fmt::Display for PlantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlantStatus::Active => write!(f, "active"),
            PlantStatus::Dormant => write!(f, "dormant"),
        }
    }
}

/// Full read-only view of a plant, assembled from registry and health state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: PlantId,
    pub name: String,
    pub species: String,
    pub owner: OwnerId,
    pub status: PlantStatus,
    pub created_at: u64,
    /// 0 when no reading has ever been accepted
    pub last_updated: u64,
    pub health: HealthSnapshot,
}
