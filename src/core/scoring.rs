//! Health score computation.
//!
//! A score starts at 100 and loses a fixed weight for each metric outside
//! its comfort band. Deductions are independent and additive.

use crate::core::types::HealthSnapshot;
use std::ops::RangeInclusive;

/// Comfortable soil moisture band (percent).
pub const MOISTURE_RANGE: RangeInclusive<u8> = 30..=70;

/// Comfortable temperature band (×100 °C).
pub const TEMPERATURE_RANGE: RangeInclusive<i32> = 1500..=3000;

/// Comfortable humidity band (percent).
pub const HUMIDITY_RANGE: RangeInclusive<u8> = 40..=80;

/// Comfortable pH band (×100).
pub const PH_RANGE: RangeInclusive<u16> = 600..=700;

/// Minimum comfortable light intensity (lux).
pub const MIN_LIGHT: u32 = 1000;

pub const MOISTURE_PENALTY: i32 = 20;
pub const TEMPERATURE_PENALTY: i32 = 20;
pub const HUMIDITY_PENALTY: i32 = 15;
pub const PH_PENALTY: i32 = 15;
pub const LIGHT_PENALTY: i32 = 10;

/// Score a snapshot on a 0-100 scale.
///
/// The sentinel snapshot scores 0.
pub fn score(snapshot: &HealthSnapshot) -> u8 {
    if snapshot.is_sentinel() {
        return 0;
    }

    let total = 100 - deductions(snapshot);

    // The fixed weights sum to 80, so the clamp only matters if rules are added.
    total.clamp(0, 100) as u8
}

/// Sum of all applicable deductions for a snapshot.
fn deductions(snapshot: &HealthSnapshot) -> i32 {
    let mut total = 0;
    if !MOISTURE_RANGE.contains(&snapshot.soil_moisture) {
        total += MOISTURE_PENALTY;
    }
    if !TEMPERATURE_RANGE.contains(&snapshot.temperature) {
        total += TEMPERATURE_PENALTY;
    }
    if !HUMIDITY_RANGE.contains(&snapshot.humidity) {
        total += HUMIDITY_PENALTY;
    }
    if !PH_RANGE.contains(&snapshot.ph) {
        total += PH_PENALTY;
    }
    if snapshot.light_intensity < MIN_LIGHT {
        total += LIGHT_PENALTY;
    }
    total
}
