//! Aggregate statistics over a plant's history.
//!
//! The rolling window is inclusive at its lower edge: a reading stamped
//! exactly `now - window` counts, one second older does not.

use crate::core::scoring::score;
use crate::core::types::HealthSnapshot;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Seconds in a day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Length of the rolling analytics window (7 days).
pub const ROLLING_WINDOW_SECS: u64 = 7 * SECONDS_PER_DAY;

/// Summary analytics for one plant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Score of the current snapshot
    pub health_score: u8,
    /// Number of readings ever accepted
    pub total_readings: u64,
    /// Truncated mean soil moisture over the rolling window
    pub avg_soil_moisture_7d: u8,
    /// Truncated mean temperature (×100 °C) over the rolling window
    pub avg_temperature_7d: i32,
    /// Whole days since registration
    pub days_active: u64,
}

/// Descriptive statistics of one metric within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; 0 with fewer than two readings
    pub std_dev: f64,
}

/// Extended per-metric statistics over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub window_start: u64,
    pub window_end: u64,
    pub soil_moisture: MetricSummary,
    /// Degrees Celsius (already divided by 100)
    pub temperature: MetricSummary,
    pub humidity: MetricSummary,
}

/// Lower edge of a window ending at `now`.
pub fn window_start(now: u64, window_secs: u64) -> u64 {
    now.saturating_sub(window_secs)
}

/// Readings inside the window ending at `now`.
fn in_window<'a>(
    history: &'a [HealthSnapshot],
    now: u64,
    window_secs: u64,
) -> impl Iterator<Item = &'a HealthSnapshot> {
    let start = window_start(now, window_secs);
    history.iter().filter(move |r| r.timestamp >= start)
}

/// Compute the summary report for a plant.
///
/// `current` is scored independently of the window; `history` is the full,
/// chronologically ordered reading sequence.
pub fn analyze(
    registered_at: u64,
    current: &HealthSnapshot,
    history: &[HealthSnapshot],
    now: u64,
) -> AnalyticsReport {
    let days_active = now.saturating_sub(registered_at) / SECONDS_PER_DAY;

    if history.is_empty() {
        return AnalyticsReport {
            days_active,
            ..AnalyticsReport::default()
        };
    }

    let mut count: i64 = 0;
    let mut moisture_sum: i64 = 0;
    let mut temperature_sum: i64 = 0;
    for reading in in_window(history, now, ROLLING_WINDOW_SECS) {
        count += 1;
        moisture_sum += i64::from(reading.soil_moisture);
        temperature_sum += i64::from(reading.temperature);
    }

    let (avg_soil_moisture_7d, avg_temperature_7d) = if count == 0 {
        (0, 0)
    } else {
        // Integer division truncates toward zero, including for negative temperatures.
        ((moisture_sum / count) as u8, (temperature_sum / count) as i32)
    };

    AnalyticsReport {
        health_score: score(current),
        total_readings: history.len() as u64,
        avg_soil_moisture_7d,
        avg_temperature_7d,
        days_active,
    }
}

fn summarize(values: &[f64]) -> MetricSummary {
    if values.is_empty() {
        return MetricSummary::default();
    }

    let std_dev = if values.len() < 2 {
        0.0
    } else {
        Statistics::std_dev(values.iter())
    };

    MetricSummary {
        count: values.len(),
        min: Statistics::min(values.iter()),
        max: Statistics::max(values.iter()),
        mean: Statistics::mean(values.iter()),
        std_dev,
    }
}

/// Compute extended statistics for readings in the window ending at `now`.
pub fn window_statistics(history: &[HealthSnapshot], now: u64, window_secs: u64) -> WindowStatistics {
    let mut moisture = Vec::new();
    let mut temperature = Vec::new();
    let mut humidity = Vec::new();

    for reading in in_window(history, now, window_secs) {
        moisture.push(f64::from(reading.soil_moisture));
        temperature.push(f64::from(reading.temperature) / 100.0);
        humidity.push(f64::from(reading.humidity));
    }

    WindowStatistics {
        window_start: window_start(now, window_secs),
        window_end: now,
        soil_moisture: summarize(&moisture),
        temperature: summarize(&temperature),
        humidity: summarize(&humidity),
    }
}
