//! Per-cycle health recommendations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Severity, UserId};

/// Area a recommendation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Lifestyle,
    Nutrition,
    Exercise,
    Sleep,
    Stress,
    Medication,
}

impl FocusArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::Lifestyle => "lifestyle",
            FocusArea::Nutrition => "nutrition",
            FocusArea::Exercise => "exercise",
            FocusArea::Sleep => "sleep",
            FocusArea::Stress => "stress",
            FocusArea::Medication => "medication",
        }
    }

    /// Standing advice for the area, most important first
    pub fn advice(&self) -> &'static [&'static str] {
        match self {
            FocusArea::Lifestyle => &[
                "Stay hydrated throughout the day",
                "Limit alcohol and avoid smoking",
                "Keep up regular health checkups",
            ],
            FocusArea::Nutrition => &[
                "Reduce sodium and processed foods",
                "Eat fruits and vegetables daily",
                "Control portion sizes",
            ],
            FocusArea::Exercise => &[
                "Aim for 150 minutes of moderate activity per week",
                "Start slowly and increase intensity gradually",
                "Stop exercising if you feel chest pain or dizziness",
            ],
            FocusArea::Sleep => &[
                "Keep a consistent sleep schedule",
                "Avoid screens an hour before bed",
                "Limit caffeine in the afternoon",
            ],
            FocusArea::Stress => &[
                "Practice deep breathing exercises daily",
                "Take regular breaks during the day",
            ],
            FocusArea::Medication => &[
                "Take medications exactly as prescribed",
                "Report side effects to your healthcare provider",
            ],
        }
    }
}

impl fmt::Display for FocusArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation produced by a completed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: UserId,
    pub cycle_id: u64,
    /// Severity of the verdict the recommendation was derived from
    pub priority: Severity,
    /// Sorted, without duplicates
    pub focus_areas: Vec<FocusArea>,
    pub actions: Vec<String>,
    /// Hours until the user should review progress
    pub follow_up_hours: u32,
    pub created_at: DateTime<Utc>,
}
