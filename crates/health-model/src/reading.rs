//! Readings, snapshots, and user profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A single measurement reported by a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Source that produced the reading (e.g. "wearable", "ehr")
    pub source_id: String,
    /// Metric name
    pub metric: String,
    /// Measured value
    pub value: f64,
    /// Unit of the value
    pub unit: String,
    /// When the measurement was taken
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    /// Create a new reading
    pub fn new(
        source_id: impl Into<String>,
        metric: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            metric: metric.into(),
            value,
            unit: unit.into(),
            observed_at,
        }
    }
}

/// A source that failed during collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: String,
}

/// One evaluation cycle's aggregated readings for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub user_id: UserId,
    pub cycle_id: u64,
    /// Readings ordered by observation time
    pub readings: Vec<Reading>,
    pub collected_at: DateTime<Utc>,
    /// At least one source failed
    pub partial: bool,
    /// No fresh readings survived filtering
    pub empty: bool,
    pub failed_sources: Vec<SourceFailure>,
}

impl Snapshot {
    /// Readings for a given metric
    pub fn readings_for<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a Reading> + 'a {
        self.readings.iter().filter(move |r| r.metric == metric)
    }
}

/// Health profile of a monitored user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub age: Option<u32>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

impl Profile {
    /// Whether the profile lists a condition (case-insensitive, `_`/`-`/space agnostic)
    pub fn has_condition(&self, condition: &str) -> bool {
        let wanted = normalize_condition(condition);
        self.conditions
            .iter()
            .any(|c| normalize_condition(c) == wanted)
    }
}

fn normalize_condition(raw: &str) -> String {
    let lowered: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();

    match lowered.as_str() {
        "high_blood_pressure" | "htn" => "hypertension".to_string(),
        "type_1_diabetes" | "type_2_diabetes" | "diabetes_mellitus" => "diabetes".to_string(),
        "heart_failure" | "coronary_artery_disease" | "cad" => "heart_disease".to_string(),
        "atrial_fibrillation" | "afib" => "arrhythmia".to_string(),
        _ => lowered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_matching() {
        let profile = Profile {
            age: Some(64),
            conditions: vec!["High Blood Pressure".into(), "Type-2 Diabetes".into()],
            medications: vec![],
        };
        assert!(profile.has_condition("hypertension"));
        assert!(profile.has_condition("diabetes"));
        assert!(!profile.has_condition("copd"));
    }

    #[test]
    fn test_readings_for_metric() {
        let now = Utc::now();
        let snapshot = Snapshot {
            user_id: "u1".into(),
            cycle_id: 1,
            readings: vec![
                Reading::new("watch", "heart_rate", 72.0, "bpm", now),
                Reading::new("cuff", "blood_pressure_systolic", 121.0, "mmHg", now),
                Reading::new("ring", "heart_rate", 75.0, "bpm", now),
            ],
            collected_at: now,
            partial: false,
            empty: false,
            failed_sources: vec![],
        };
        assert_eq!(snapshot.readings_for("heart_rate").count(), 2);
    }
}
