//! Severity tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational severity of a verdict or alert, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Advisory,
    Warning,
    Critical,
}

impl Severity {
    /// All tiers in ascending order
    pub const ALL: [Severity; 4] = [
        Severity::Normal,
        Severity::Advisory,
        Severity::Warning,
        Severity::Critical,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Advisory => "advisory",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity label.
    ///
    /// Accepts the tier names as well as the legacy risk vocabulary
    /// (`low`, `medium`, `high`) used by older reasoning prompts.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "normal" | "low" | "none" => Some(Severity::Normal),
            "advisory" | "medium" | "moderate" => Some(Severity::Advisory),
            "warning" | "high" => Some(Severity::Warning),
            "critical" | "emergency" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// One tier lower, saturating at `Normal`
    pub fn lowered(&self) -> Self {
        match self {
            Severity::Critical => Severity::Warning,
            Severity::Warning => Severity::Advisory,
            Severity::Advisory | Severity::Normal => Severity::Normal,
        }
    }

    /// Recommended follow-up actions attached to notifications of this tier
    pub fn recommended_actions(&self) -> &'static [&'static str] {
        match self {
            Severity::Critical => &[
                "Seek immediate medical attention",
                "Contact emergency services if symptoms worsen",
                "Notify your healthcare provider",
            ],
            Severity::Warning => &[
                "Schedule a medical consultation within 24 hours",
                "Monitor symptoms closely",
                "Contact your healthcare provider",
            ],
            Severity::Advisory => &[
                "Schedule a medical consultation within 1 week",
                "Continue monitoring",
            ],
            Severity::Normal => &["Continue regular monitoring"],
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
