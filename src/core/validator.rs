//! Legality checks for incoming readings.
//!
//! Only soil moisture, humidity and pH have legal ranges. Temperature and
//! light are accepted as-is here; out-of-comfort values for those only
//! affect scoring and alerts.

use crate::core::types::HealthSnapshot;
use crate::ledger::LedgerError;

/// Highest legal soil moisture / humidity percentage.
pub const MAX_PERCENT: u8 = 100;

/// Lowest legal pH (×100).
pub const MIN_PH: u16 = 400;

/// Highest legal pH (×100).
pub const MAX_PH: u16 = 1000;

/// Check a reading against legal ranges.
///
/// Checks run in a fixed order (moisture, humidity, pH) and the first
/// failure is reported.
pub fn validate(snapshot: &HealthSnapshot) -> Result<(), LedgerError> {
    if snapshot.soil_moisture > MAX_PERCENT {
        return Err(LedgerError::InvalidMoisture(snapshot.soil_moisture.into()));
    }
    if snapshot.humidity > MAX_PERCENT {
        return Err(LedgerError::InvalidHumidity(snapshot.humidity.into()));
    }
    if !(MIN_PH..=MAX_PH).contains(&snapshot.ph) {
        return Err(LedgerError::InvalidPh(snapshot.ph));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(moisture: u8, humidity: u8, ph: u16) -> HealthSnapshot {
        HealthSnapshot::new(moisture, 2000, humidity, ph, 1200)
    }

    #[test]
    fn test_accepts_boundaries() {
        assert!(validate(&reading(0, 0, 400)).is_ok());
        assert!(validate(&reading(100, 100, 1000)).is_ok());
    }

    #[test]
    fn test_rejects_moisture() {
        assert_eq!(validate(&reading(101, 50, 650)), Err(LedgerError::InvalidMoisture(101)));
    }

    #[test]
    fn test_rejects_humidity() {
        assert_eq!(validate(&reading(50, 101, 650)), Err(LedgerError::InvalidHumidity(101)));
    }

    #[test]
    fn test_rejects_ph_out_of_domain() {
        assert_eq!(validate(&reading(50, 50, 399)), Err(LedgerError::InvalidPh(399)));
        assert_eq!(validate(&reading(50, 50, 1001)), Err(LedgerError::InvalidPh(1001)));
        assert_eq!(validate(&reading(50, 50, 0)), Err(LedgerError::InvalidPh(0)));
    }

    #[test]
    fn test_first_failure_wins() {
        assert_eq!(validate(&reading(200, 200, 0)), Err(LedgerError::InvalidMoisture(200)));
        assert_eq!(validate(&reading(50, 200, 0)), Err(LedgerError::InvalidHumidity(200)));
    }

    #[test]
    fn test_temperature_and_light_unranged() {
        let mut snapshot = reading(50, 50, 650);
        snapshot.temperature = -9_999;
        snapshot.light_intensity = 0;
        assert!(validate(&snapshot).is_ok());

        snapshot.temperature = i32::MAX;
        snapshot.light_intensity = u32::MAX;
        assert!(validate(&snapshot).is_ok());
    }
}
