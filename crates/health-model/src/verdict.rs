//! Analysis verdicts

use serde::{Deserialize, Serialize};

use crate::Severity;

/// Where a verdict came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// External reasoning oracle
    Oracle,
    /// Deterministic threshold rules
    FallbackRule,
}

/// Classified result of analyzing one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub severity: Severity,
    pub rationale: String,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    pub source: VerdictSource,
    /// Severity was downgraded because of low confidence
    #[serde(default)]
    pub needs_review: bool,
}

impl Verdict {
    /// Verdict produced by the reasoning oracle
    pub fn oracle(severity: Severity, rationale: impl Into<String>, confidence: f64) -> Self {
        Self {
            severity,
            rationale: rationale.into(),
            confidence,
            source: VerdictSource::Oracle,
            needs_review: false,
        }
    }

    /// Verdict produced by the fallback rules
    pub fn fallback(severity: Severity, rationale: impl Into<String>, confidence: f64) -> Self {
        Self {
            severity,
            rationale: rationale.into(),
            confidence,
            source: VerdictSource::FallbackRule,
            needs_review: false,
        }
    }
}
