//! Per-user alert state

use chrono::{DateTime, Utc};
use health_model::{Severity, VerdictSource};
use serde::{Deserialize, Serialize};

/// A de-escalation waiting for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeescalation {
    /// Highest lower severity seen during the streak
    pub target: Severity,
    /// Consecutive lower cycles so far
    pub count: u32,
}

/// Alert state tracked for one user across cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub current_severity: Severity,
    /// Source of the verdict that set the current severity
    pub severity_source: Option<VerdictSource>,
    /// When the current severity was entered
    pub since: DateTime<Utc>,
    pub consecutive_same_severity_count: u32,
    pub last_alert_sent_at: Option<DateTime<Utc>>,
    /// Repeat notifications at the current severity are held until then
    pub suppress_until: Option<DateTime<Utc>>,
    pub pending_deescalation: Option<PendingDeescalation>,
}

impl AlertState {
    /// Fresh state at `Normal`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current_severity: Severity::Normal,
            severity_source: None,
            since: now,
            consecutive_same_severity_count: 0,
            last_alert_sent_at: None,
            suppress_until: None,
            pending_deescalation: None,
        }
    }

    /// Whether repeat notifications are currently held back
    pub fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.suppress_until.is_some_and(|until| now < until)
    }
}
