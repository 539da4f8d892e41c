//! Pure domain logic for the plant ledger.
//!
//! This module contains:
//! - Plant, owner and snapshot types
//! - Reading validation
//! - Health scoring and threshold alerts
//! - Rolling-window analytics
//!
//! Nothing here holds state or touches the clock.

pub mod alerts;
pub mod analytics;
pub mod scoring;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use alerts::{alerts, Alert, AlertKind};
pub use analytics::{
    analyze, window_statistics, AnalyticsReport, MetricSummary, WindowStatistics,
    ROLLING_WINDOW_SECS, SECONDS_PER_DAY,
};
pub use scoring::score;
pub use types::{HealthSnapshot, OwnerId, Plant, PlantId, PlantStatus};
pub use validator::validate;
