//! Threshold Rules

use health_model::{metric, Profile, Reading, Severity, Snapshot, Verdict};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the fallback classifier
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// None of the readings is a metric the rules understand
    #[error("No readings applicable to fallback rules ({0} readings inspected)")]
    NoApplicableReadings(usize),
}

/// A rule that fired for a reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub metric: String,
    pub value: f64,
    pub severity: Severity,
    pub description: &'static str,
}

/// Deterministic classifier over normalized readings
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEngine;

impl FallbackEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify a snapshot.
    ///
    /// The verdict carries the highest severity any rule produced. Fails only
    /// when no reading is a metric the rules cover.
    pub fn classify(&self, snapshot: &Snapshot, profile: &Profile) -> Result<Verdict, FallbackError> {
        let mut applicable = 0usize;
        let mut hits = Vec::new();

        for reading in &snapshot.readings {
            if let Some((severity, description)) = self.evaluate_reading(reading, profile) {
                applicable += 1;
                if severity > Severity::Normal {
                    hits.push(RuleHit {
                        metric: reading.metric.clone(),
                        value: reading.value,
                        severity,
                        description,
                    });
                }
            }
        }

        if applicable == 0 {
            return Err(FallbackError::NoApplicableReadings(snapshot.readings.len()));
        }

        let severity = hits
            .iter()
            .map(|h| h.severity)
            .max()
            .unwrap_or(Severity::Normal);

        let rationale = if hits.is_empty() {
            format!("{} readings within fallback thresholds", applicable)
        } else {
            hits.iter()
                .map(|h| format!("{} {:.1}: {}", h.metric, h.value, h.description))
                .collect::<Vec<_>>()
                .join("; ")
        };

        debug!(
            user_id = %snapshot.user_id,
            applicable,
            hits = hits.len(),
            "Fallback classification: {}",
            severity
        );

        Ok(Verdict::fallback(severity, rationale, 1.0))
    }

    /// Severity band for a single reading, `None` if the metric is not covered
    pub fn evaluate_reading(
        &self,
        reading: &Reading,
        profile: &Profile,
    ) -> Option<(Severity, &'static str)> {
        let v = reading.value;
        let band = match reading.metric.as_str() {
            metric::SYSTOLIC => systolic(v, profile.has_condition("hypertension")),
            metric::DIASTOLIC => diastolic(v, profile.has_condition("hypertension")),
            metric::HEART_RATE => heart_rate(
                v,
                profile.has_condition("heart_disease") || profile.has_condition("arrhythmia"),
            ),
            metric::OXYGEN_SATURATION => oxygen_saturation(v, profile.has_condition("copd")),
            metric::BODY_TEMPERATURE => body_temperature(v),
            metric::BLOOD_GLUCOSE => blood_glucose(v, profile.has_condition("diabetes")),
            metric::RESPIRATORY_RATE => respiratory_rate(v),
            _ => return None,
        };
        Some(band)
    }
}

fn systolic(v: f64, hypertensive: bool) -> (Severity, &'static str) {
    if hypertensive {
        if v > 180.0 {
            (Severity::Critical, "hypertensive crisis")
        } else if v >= 160.0 {
            (Severity::Warning, "above hypertensive management target")
        } else if v >= 140.0 {
            (Severity::Advisory, "elevated for managed hypertension")
        } else if v < 90.0 {
            (Severity::Warning, "hypotension")
        } else {
            (Severity::Normal, "within range")
        }
    } else if v >= 180.0 {
        (Severity::Critical, "hypertensive crisis")
    } else if v >= 140.0 {
        (Severity::Warning, "stage 2 hypertension")
    } else if v >= 130.0 {
        (Severity::Advisory, "stage 1 hypertension")
    } else if v < 90.0 {
        (Severity::Warning, "hypotension")
    } else {
        (Severity::Normal, "within range")
    }
}

fn diastolic(v: f64, hypertensive: bool) -> (Severity, &'static str) {
    if hypertensive {
        if v > 120.0 {
            (Severity::Critical, "hypertensive crisis")
        } else if v >= 100.0 {
            (Severity::Warning, "above hypertensive management target")
        } else if v >= 90.0 {
            (Severity::Advisory, "elevated for managed hypertension")
        } else if v < 60.0 {
            (Severity::Warning, "hypotension")
        } else {
            (Severity::Normal, "within range")
        }
    } else if v >= 120.0 {
        (Severity::Critical, "hypertensive crisis")
    } else if v >= 90.0 {
        (Severity::Warning, "stage 2 hypertension")
    } else if v < 60.0 {
        (Severity::Warning, "hypotension")
    } else {
        (Severity::Normal, "within range")
    }
}

fn heart_rate(v: f64, cardiac: bool) -> (Severity, &'static str) {
    let critical_high = if cardiac { 130.0 } else { 150.0 };
    if v < 40.0 {
        (Severity::Critical, "severe bradycardia")
    } else if v > critical_high {
        (Severity::Critical, "severe tachycardia")
    } else if v < 50.0 {
        (Severity::Warning, "bradycardia")
    } else if v > 120.0 {
        (Severity::Warning, "tachycardia")
    } else if v < 60.0 || v > 100.0 {
        (Severity::Advisory, "heart rate outside resting range")
    } else {
        (Severity::Normal, "within range")
    }
}

fn oxygen_saturation(v: f64, copd: bool) -> (Severity, &'static str) {
    let (critical, warning, advisory) = if copd {
        (85.0, 88.0, 92.0)
    } else {
        (88.0, 92.0, 95.0)
    };
    if v < critical {
        (Severity::Critical, "severe hypoxemia")
    } else if v < warning {
        (Severity::Warning, "hypoxemia")
    } else if v < advisory {
        (Severity::Advisory, "low oxygen saturation")
    } else {
        (Severity::Normal, "within range")
    }
}

fn body_temperature(v: f64) -> (Severity, &'static str) {
    if v >= 40.0 {
        (Severity::Critical, "hyperpyrexia")
    } else if v < 35.0 {
        (Severity::Critical, "hypothermia")
    } else if v >= 39.0 {
        (Severity::Warning, "high fever")
    } else if v >= 38.0 {
        (Severity::Advisory, "fever")
    } else if v < 36.0 {
        (Severity::Advisory, "low body temperature")
    } else {
        (Severity::Normal, "within range")
    }
}

fn blood_glucose(v: f64, diabetic: bool) -> (Severity, &'static str) {
    let advisory_high = if diabetic { 200.0 } else { 180.0 };
    if v < 54.0 {
        (Severity::Critical, "severe hypoglycemia")
    } else if v > 400.0 {
        (Severity::Critical, "severe hyperglycemia")
    } else if v < 70.0 {
        (Severity::Warning, "hypoglycemia")
    } else if v > 250.0 {
        (Severity::Warning, "hyperglycemia")
    } else if v > advisory_high {
        (Severity::Advisory, "elevated glucose")
    } else {
        (Severity::Normal, "within range")
    }
}

fn respiratory_rate(v: f64) -> (Severity, &'static str) {
    if v < 8.0 || v > 30.0 {
        (Severity::Critical, "respiratory rate critical")
    } else if v > 24.0 {
        (Severity::Warning, "tachypnea")
    } else if v > 20.0 {
        (Severity::Advisory, "elevated respiratory rate")
    } else {
        (Severity::Normal, "within range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use health_model::VerdictSource;
    use proptest::prelude::*;

    fn snapshot(readings: &[(&str, f64)]) -> Snapshot {
        let now = Utc::now();
        Snapshot {
            user_id: "u1".into(),
            cycle_id: 1,
            readings: readings
                .iter()
                .map(|(m, v)| Reading::new("test", *m, *v, "", now))
                .collect(),
            collected_at: now,
            partial: false,
            empty: readings.is_empty(),
            failed_sources: vec![],
        }
    }

    fn hypertensive() -> Profile {
        Profile {
            age: Some(67),
            conditions: vec!["hypertension".into()],
            medications: vec!["lisinopril".into()],
        }
    }

    #[test]
    fn test_hypertensive_crisis_is_critical() {
        let engine = FallbackEngine::new();
        let verdict = engine
            .classify(&snapshot(&[(metric::SYSTOLIC, 190.0)]), &hypertensive())
            .unwrap();

        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.source, VerdictSource::FallbackRule);
        assert!(verdict.rationale.contains("hypertensive crisis"));
    }

    #[test]
    fn test_diastolic_crisis() {
        let engine = FallbackEngine::new();
        let verdict = engine
            .classify(&snapshot(&[(metric::DIASTOLIC, 125.0)]), &hypertensive())
            .unwrap();
        assert_eq!(verdict.severity, Severity::Critical);
    }

    #[test]
    fn test_profile_changes_thresholds() {
        let engine = FallbackEngine::new();
        let reading = snapshot(&[(metric::SYSTOLIC, 150.0)]);

        let general = engine.classify(&reading, &Profile::default()).unwrap();
        let managed = engine.classify(&reading, &hypertensive()).unwrap();

        assert_eq!(general.severity, Severity::Warning);
        assert_eq!(managed.severity, Severity::Advisory);
    }

    #[test]
    fn test_produces_all_tiers() {
        let engine = FallbackEngine::new();
        let profile = Profile::default();
        let cases = [
            (72.0, Severity::Normal),
            (105.0, Severity::Advisory),
            (125.0, Severity::Warning),
            (160.0, Severity::Critical),
        ];
        for (hr, expected) in cases {
            let verdict = engine
                .classify(&snapshot(&[(metric::HEART_RATE, hr)]), &profile)
                .unwrap();
            assert_eq!(verdict.severity, expected, "heart rate {}", hr);
        }
    }

    #[test]
    fn test_highest_hit_wins() {
        let engine = FallbackEngine::new();
        let verdict = engine
            .classify(
                &snapshot(&[
                    (metric::HEART_RATE, 105.0),
                    (metric::OXYGEN_SATURATION, 86.0),
                    ("steps", 200.0),
                ]),
                &Profile::default(),
            )
            .unwrap();
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.rationale.contains("heart_rate"));
        assert!(verdict.rationale.contains("oxygen_saturation"));
    }

    #[test]
    fn test_copd_oxygen_targets() {
        let engine = FallbackEngine::new();
        let copd = Profile {
            conditions: vec!["COPD".into()],
            ..Default::default()
        };
        let verdict = engine
            .classify(&snapshot(&[(metric::OXYGEN_SATURATION, 89.0)]), &copd)
            .unwrap();
        assert_eq!(verdict.severity, Severity::Advisory);
    }

    #[test]
    fn test_no_applicable_readings() {
        let engine = FallbackEngine::new();
        let result = engine.classify(&snapshot(&[("steps", 3000.0)]), &Profile::default());
        assert!(matches!(result, Err(FallbackError::NoApplicableReadings(1))));
    }

    proptest! {
        #[test]
        fn prop_systolic_severity_monotonic_above_normal(a in 90.0f64..300.0, b in 90.0f64..300.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for hypertension in [false, true] {
                let (s_lo, _) = systolic(lo, hypertension);
                let (s_hi, _) = systolic(hi, hypertension);
                prop_assert!(s_lo <= s_hi);
            }
        }
    }
}
