//! Session records and status reports

use alerting::{AlertState, TransitionKind};
use chrono::{DateTime, Utc};
use health_model::{DeliveryReport, Profile, Recommendation, Severity, UserId, Verdict};
use serde::Serialize;
use uuid::Uuid;

use crate::SessionConfig;

/// Lifecycle status of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
}

/// A user's monitoring session
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSession {
    pub user_id: UserId,
    pub profile: Profile,
    pub config: SessionConfig,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycle_count: u64,
}

/// Whether the last cycle could produce a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded { reason: String },
}

/// Cycle counters for one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    pub completed: u64,
    pub no_evidence: u64,
    pub failed: u64,
    pub skipped: u64,
    pub alerts_emitted: u64,
    pub oracle_fallbacks: u64,
}

/// Result of one cycle attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Verdict committed to the alert state
    Completed {
        cycle_id: u64,
        severity: Severity,
        transition: TransitionKind,
        alert_id: Option<Uuid>,
    },
    /// No fresh readings; alert state held
    NoEvidence { cycle_id: u64 },
    /// Analysis unavailable; alert state unchanged
    Failed { cycle_id: u64, reason: String },
    /// Another cycle was running, or the session is paused
    Skipped,
    /// Session stopped mid-cycle; nothing committed
    Cancelled { cycle_id: u64 },
}

impl CycleOutcome {
    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed { .. } => "completed",
            CycleOutcome::NoEvidence { .. } => "no_evidence",
            CycleOutcome::Failed { .. } => "failed",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Everything known about a session right now
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session: MonitoringSession,
    pub alert_state: AlertState,
    pub health: Health,
    pub stats: CycleStats,
    pub last_verdict: Option<Verdict>,
    pub last_recommendation: Option<Recommendation>,
    pub last_delivery: Option<DeliveryReport>,
}
