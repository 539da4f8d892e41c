//! Threshold alerts derived from a snapshot.
//!
//! Only soil moisture, temperature and humidity raise alerts. pH and light
//! affect the score but never alert.

use crate::core::scoring::{HUMIDITY_RANGE, MOISTURE_RANGE, TEMPERATURE_RANGE};
use crate::core::types::{HealthSnapshot, PlantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    LowSoilMoisture,
    HighSoilMoisture,
    LowTemperature,
    HighTemperature,
    LowHumidity,
    HighHumidity,
}

impl AlertKind {
    /// Wire name of the alert kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowSoilMoisture => "LOW_SOIL_MOISTURE",
            AlertKind::HighSoilMoisture => "HIGH_SOIL_MOISTURE",
            AlertKind::LowTemperature => "LOW_TEMPERATURE",
            AlertKind::HighTemperature => "HIGH_TEMPERATURE",
            AlertKind::LowHumidity => "LOW_HUMIDITY",
            AlertKind::HighHumidity => "HIGH_HUMIDITY",
        }
    }

    /// Fixed human-readable message for this kind.
    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::LowSoilMoisture => "Soil moisture is too low - water your plant",
            AlertKind::HighSoilMoisture => "Soil moisture is too high - reduce watering",
            AlertKind::LowTemperature => "Temperature is too low - move plant somewhere warmer",
            AlertKind::HighTemperature => "Temperature is too high - move plant somewhere cooler",
            AlertKind::LowHumidity => "Humidity is too low - mist your plant",
            AlertKind::HighHumidity => "Humidity is too high - improve ventilation",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single alert for a plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub plant_id: PlantId,
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn new(plant_id: PlantId, kind: AlertKind) -> Self {
        Self {
            plant_id,
            kind,
            message: kind.message().to_string(),
        }
    }
}

/// Pick at most one of `low`/`high` for a value against its band.
fn classify<T: PartialOrd>(value: T, band: &RangeInclusive<T>, low: AlertKind, high: AlertKind) -> Option<AlertKind> {
    if value < *band.start() {
        Some(low)
    } else if value > *band.end() {
        Some(high)
    } else {
        None
    }
}

/// Derive alerts for a snapshot, in moisture, temperature, humidity order.
///
/// The sentinel snapshot produces no alerts.
pub fn alerts(plant_id: PlantId, snapshot: &HealthSnapshot) -> Vec<Alert> {
    if snapshot.is_sentinel() {
        return Vec::new();
    }

    [
        classify(
            snapshot.soil_moisture,
            &MOISTURE_RANGE,
            AlertKind::LowSoilMoisture,
            AlertKind::HighSoilMoisture,
        ),
        classify(
            snapshot.temperature,
            &TEMPERATURE_RANGE,
            AlertKind::LowTemperature,
            AlertKind::HighTemperature,
        ),
        classify(
            snapshot.humidity,
            &HUMIDITY_RANGE,
            AlertKind::LowHumidity,
            AlertKind::HighHumidity,
        ),
    ]
    .into_iter()
    .flatten()
    .map(|kind| Alert::new(plant_id, kind))
    .collect()
}
