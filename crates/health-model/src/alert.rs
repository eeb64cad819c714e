//! Alert events and delivery records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Severity, UserId, Verdict};

/// An alert handed to the notification dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub user_id: UserId,
    pub severity: Severity,
    pub previous_severity: Severity,
    pub verdict: Verdict,
    pub created_at: DateTime<Utc>,
    /// Identifies the logical alert across concurrent dispatches
    pub dedupe_key: String,
}

/// Notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// In-app notification
    App,
    Email,
    Sms,
    /// Voice call / emergency contact tier
    Voice,
    /// Secondary on-call contact, used only as a last resort
    OnCall,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::App => "app",
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Voice => "voice",
            Channel::OnCall => "on_call",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Delivered,
    Failed,
    Pending,
}

impl AttemptOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptOutcome::Pending)
    }
}

/// Record of a single send attempt on one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub alert_event_id: Uuid,
    pub channel: Channel,
    /// 1-based attempt number
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub attempted_at: DateTime<Utc>,
}

/// Overall outcome for an alert event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// Every channel in the tier succeeded
    Delivered,
    /// Some, but not all, tier channels succeeded
    Degraded,
    /// No tier channel succeeded
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Degraded => "degraded",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

/// Final result for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: Channel,
    pub delivered: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Result of dispatching one alert event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub alert_event_id: Uuid,
    pub user_id: UserId,
    pub severity: Severity,
    pub outcome: DeliveryOutcome,
    pub channels: Vec<ChannelResult>,
    /// Last-resort channel result, present only when the tier failed on a critical alert
    pub fallback: Option<ChannelResult>,
    pub attempts: Vec<DeliveryAttempt>,
    pub completed_at: DateTime<Utc>,
}

impl DeliveryReport {
    /// Whether anybody was reached, including the fallback channel
    pub fn reached_anyone(&self) -> bool {
        self.outcome != DeliveryOutcome::Failed
            || self.fallback.as_ref().is_some_and(|f| f.delivered)
    }
}
