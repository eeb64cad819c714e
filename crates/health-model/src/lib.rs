//! Health Monitoring Data Model
//!
//! Types shared by every stage of a monitoring cycle: readings and snapshots,
//! verdicts, alert events, delivery records, and recommendations.

mod alert;
mod reading;
mod recommendation;
mod severity;
mod verdict;

pub use alert::{
    AlertEvent, AttemptOutcome, Channel, ChannelResult, DeliveryAttempt, DeliveryOutcome,
    DeliveryReport,
};
pub use reading::{Profile, Reading, Snapshot, SourceFailure};
pub use recommendation::{FocusArea, Recommendation};
pub use severity::Severity;
pub use verdict::{Verdict, VerdictSource};

/// Identifier of a monitored user
pub type UserId = String;

/// Canonical metric names produced by the reading aggregator
pub mod metric {
    pub const HEART_RATE: &str = "heart_rate";
    pub const SYSTOLIC: &str = "blood_pressure_systolic";
    pub const DIASTOLIC: &str = "blood_pressure_diastolic";
    pub const OXYGEN_SATURATION: &str = "oxygen_saturation";
    pub const BODY_TEMPERATURE: &str = "body_temperature";
    pub const BLOOD_GLUCOSE: &str = "blood_glucose";
    pub const RESPIRATORY_RATE: &str = "respiratory_rate";
    pub const STEPS: &str = "steps";
    pub const SLEEP_HOURS: &str = "sleep_hours";
}
