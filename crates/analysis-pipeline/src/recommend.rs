//! Recommendation Engine
//!
//! Derives a recommendation from a cycle's verdict, the readings behind it,
//! and the user's profile. Deterministic; never calls the oracle.

use chrono::Utc;
use health_model::{metric, FocusArea, Profile, Recommendation, Severity, Snapshot, Verdict};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// Advice lines taken from each focus area
const ADVICE_PER_AREA: usize = 2;

/// Builds per-cycle recommendations
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(
        &self,
        snapshot: &Snapshot,
        profile: &Profile,
        verdict: &Verdict,
    ) -> Recommendation {
        let focus_areas = focus_areas(snapshot, profile, verdict.severity);

        let mut actions: Vec<String> = verdict
            .severity
            .recommended_actions()
            .iter()
            .map(|a| a.to_string())
            .collect();
        for area in &focus_areas {
            actions.extend(
                area.advice()
                    .iter()
                    .take(ADVICE_PER_AREA)
                    .map(|a| a.to_string()),
            );
        }

        debug!(
            user_id = %snapshot.user_id,
            cycle_id = snapshot.cycle_id,
            "Recommendation focus: {:?}",
            focus_areas
        );

        Recommendation {
            id: Uuid::new_v4(),
            user_id: snapshot.user_id.clone(),
            cycle_id: snapshot.cycle_id,
            priority: verdict.severity,
            focus_areas,
            actions,
            follow_up_hours: follow_up_hours(verdict.severity),
            created_at: Utc::now(),
        }
    }
}

fn latest(snapshot: &Snapshot, name: &str) -> Option<f64> {
    snapshot.readings_for(name).last().map(|r| r.value)
}

fn focus_areas(snapshot: &Snapshot, profile: &Profile, severity: Severity) -> Vec<FocusArea> {
    let mut areas = BTreeSet::from([FocusArea::Lifestyle]);

    if let Some(hr) = latest(snapshot, metric::HEART_RATE) {
        if !(60.0..=100.0).contains(&hr) {
            areas.extend([FocusArea::Exercise, FocusArea::Stress]);
        }
    }

    let systolic = latest(snapshot, metric::SYSTOLIC).is_some_and(|v| v >= 130.0);
    let diastolic = latest(snapshot, metric::DIASTOLIC).is_some_and(|v| v >= 80.0);
    if systolic || diastolic {
        areas.extend([FocusArea::Nutrition, FocusArea::Exercise]);
    }

    if latest(snapshot, metric::BLOOD_GLUCOSE).is_some_and(|v| v > 140.0) {
        areas.insert(FocusArea::Nutrition);
    }
    if latest(snapshot, metric::STEPS).is_some_and(|v| v < 5000.0) {
        areas.insert(FocusArea::Exercise);
    }
    if latest(snapshot, metric::SLEEP_HOURS).is_some_and(|v| v < 7.0) {
        areas.extend([FocusArea::Sleep, FocusArea::Stress]);
    }

    if !profile.medications.is_empty() && severity >= Severity::Warning {
        areas.insert(FocusArea::Medication);
    }

    areas.into_iter().collect()
}

fn follow_up_hours(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 24,
        Severity::Warning => 72,
        Severity::Advisory => 168,
        Severity::Normal => 720,
    }
}
