//! Alert Escalation State Machine

use chrono::{DateTime, Utc};
use health_model::{AlertEvent, Severity, Verdict, VerdictSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AlertState, PendingDeescalation};

/// Invalid alert configuration
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("deescalation_confirmations must be at least 1")]
    NoConfirmations,
    #[error("dedupe_bucket_secs must be greater than 0")]
    ZeroDedupeBucket,
    #[error("{field} must not exceed {max} seconds")]
    WindowTooLong { field: &'static str, max: u64 },
}

/// Upper bound for every configured window (one year)
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Consecutive lower cycles required before lowering severity (default: 2)
    pub deescalation_confirmations: u32,
    /// Repeat suppression for Advisory (seconds)
    pub advisory_suppression_secs: u64,
    /// Repeat suppression for Warning (seconds)
    pub warning_suppression_secs: u64,
    /// Repeat suppression for Critical (seconds, 0 = re-notify every cycle)
    pub critical_suppression_secs: u64,
    /// Width of the dedupe key time bucket (seconds)
    pub dedupe_bucket_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            deescalation_confirmations: 2,
            advisory_suppression_secs: 3600,
            warning_suppression_secs: 1800, // 30 minutes
            critical_suppression_secs: 0,
            dedupe_bucket_secs: 300,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deescalation_confirmations == 0 {
            return Err(ConfigError::NoConfirmations);
        }
        if self.dedupe_bucket_secs == 0 {
            return Err(ConfigError::ZeroDedupeBucket);
        }
        for (field, secs) in [
            ("advisory_suppression_secs", self.advisory_suppression_secs),
            ("warning_suppression_secs", self.warning_suppression_secs),
            ("critical_suppression_secs", self.critical_suppression_secs),
            ("dedupe_bucket_secs", self.dedupe_bucket_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(ConfigError::WindowTooLong {
                    field,
                    max: MAX_WINDOW_SECS,
                });
            }
        }
        Ok(())
    }

    /// Repeat-suppression window for a severity
    pub fn suppression_window(&self, severity: Severity) -> chrono::Duration {
        let secs = match severity {
            Severity::Normal => 0,
            Severity::Advisory => self.advisory_suppression_secs,
            Severity::Warning => self.warning_suppression_secs,
            Severity::Critical => self.critical_suppression_secs,
        };
        chrono::Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// End of the suppression window for a severity entered or notified at `now`
    fn suppressed_until(&self, severity: Severity, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.suppression_window(severity))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// What a cycle did to the alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Severity rose
    Escalated,
    /// Severity fell after enough confirmations
    Deescalated,
    /// Lower severity seen, waiting for confirmation
    DeescalationPending,
    /// An oracle verdict replaced a severity set by the fallback rules
    OracleOverride,
    /// Same severity, notification repeated
    Repeated,
    /// Same severity, nothing to send
    Held,
}

/// Result of evaluating one verdict
#[derive(Debug, Clone)]
pub struct Transition {
    pub kind: TransitionKind,
    /// State to commit
    pub state: AlertState,
    pub event: Option<AlertEvent>,
}

/// Computes alert state transitions for one user
#[derive(Debug, Clone, Default)]
pub struct AlertStateMachine {
    config: AlertConfig,
}

impl AlertStateMachine {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Compute the next state for an incoming verdict.
    ///
    /// Pure: `current` is not touched, the caller commits `Transition::state`.
    pub fn evaluate(
        &self,
        current: &AlertState,
        verdict: &Verdict,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Transition {
        let incoming = verdict.severity;
        let previous = current.current_severity;
        let mut next = current.clone();

        if incoming > previous {
            self.enter(&mut next, incoming, verdict.source, now);
            let event = self.notify(&mut next, user_id, previous, verdict, now);
            info!(user_id, "Escalated {} -> {}", previous, incoming);
            return Transition {
                kind: TransitionKind::Escalated,
                state: next,
                event: Some(event),
            };
        }

        if incoming < previous {
            if current.severity_source == Some(VerdictSource::FallbackRule)
                && verdict.source == VerdictSource::Oracle
            {
                self.enter(&mut next, incoming, verdict.source, now);
                info!(user_id, "Oracle verdict overrides fallback {} -> {}", previous, incoming);
                return Transition {
                    kind: TransitionKind::OracleOverride,
                    state: next,
                    event: None,
                };
            }

            let pending = match current.pending_deescalation {
                Some(p) => PendingDeescalation {
                    target: p.target.max(incoming),
                    count: p.count + 1,
                },
                None => PendingDeescalation {
                    target: incoming,
                    count: 1,
                },
            };

            if pending.count >= self.config.deescalation_confirmations {
                self.enter(&mut next, pending.target, verdict.source, now);
                info!(
                    user_id,
                    "De-escalated {} -> {} after {} confirmations",
                    previous,
                    pending.target,
                    pending.count
                );
                return Transition {
                    kind: TransitionKind::Deescalated,
                    state: next,
                    event: None,
                };
            }

            debug!(
                user_id,
                "De-escalation to {} pending ({}/{})",
                pending.target,
                pending.count,
                self.config.deescalation_confirmations
            );
            next.pending_deescalation = Some(pending);
            return Transition {
                kind: TransitionKind::DeescalationPending,
                state: next,
                event: None,
            };
        }

        next.consecutive_same_severity_count += 1;
        next.pending_deescalation = None;
        if verdict.source == VerdictSource::Oracle || next.severity_source.is_none() {
            next.severity_source = Some(verdict.source);
        }

        if previous == Severity::Normal || current.is_suppressed(now) {
            return Transition {
                kind: TransitionKind::Held,
                state: next,
                event: None,
            };
        }

        let event = self.notify(&mut next, user_id, previous, verdict, now);
        debug!(user_id, "Repeating {} notification", previous);
        Transition {
            kind: TransitionKind::Repeated,
            state: next,
            event: Some(event),
        }
    }

    /// Dedupe key for an alert: user, severity, and time bucket
    pub fn dedupe_key(&self, user_id: &str, severity: Severity, at: DateTime<Utc>) -> String {
        let bucket = at
            .timestamp()
            .div_euclid(self.config.dedupe_bucket_secs.clamp(1, MAX_WINDOW_SECS) as i64);
        format!("{}:{}:{}", user_id, severity, bucket)
    }

    fn enter(
        &self,
        state: &mut AlertState,
        severity: Severity,
        source: VerdictSource,
        now: DateTime<Utc>,
    ) {
        state.current_severity = severity;
        state.severity_source = Some(source);
        state.since = now;
        state.consecutive_same_severity_count = 1;
        state.pending_deescalation = None;
        state.suppress_until = Some(self.config.suppressed_until(severity, now));
    }

    fn notify(
        &self,
        state: &mut AlertState,
        user_id: &str,
        previous: Severity,
        verdict: &Verdict,
        now: DateTime<Utc>,
    ) -> AlertEvent {
        state.last_alert_sent_at = Some(now);
        state.suppress_until = Some(self.config.suppressed_until(verdict.severity, now));

        AlertEvent {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            severity: verdict.severity,
            previous_severity: previous,
            verdict: verdict.clone(),
            created_at: now,
            dedupe_key: self.dedupe_key(user_id, verdict.severity, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const USER: &str = "u1";

    fn oracle(severity: Severity) -> Verdict {
        Verdict::oracle(severity, "test", 0.9)
    }

    fn fallback(severity: Severity) -> Verdict {
        Verdict::fallback(severity, "rule", 1.0)
    }

    /// Feeds verdicts five minutes apart, committing each transition
    struct Harness {
        machine: AlertStateMachine,
        state: AlertState,
        now: DateTime<Utc>,
    }

    impl Harness {
        fn new(config: AlertConfig) -> Self {
            let now = Utc::now();
            Self {
                machine: AlertStateMachine::new(config),
                state: AlertState::new(now),
                now,
            }
        }

        fn feed(&mut self, verdict: Verdict) -> Transition {
            self.now = self.now + chrono::Duration::minutes(5);
            let transition = self.machine.evaluate(&self.state, &verdict, USER, self.now);
            self.state = transition.state.clone();
            transition
        }
    }

    #[test]
    fn test_escalation_always_emits() {
        let mut h = Harness::new(AlertConfig::default());

        for severity in [Severity::Advisory, Severity::Warning, Severity::Critical] {
            let t = h.feed(oracle(severity));
            assert_eq!(t.kind, TransitionKind::Escalated);
            let event = t.event.expect("escalation must emit");
            assert_eq!(event.severity, severity);
            assert_eq!(h.state.consecutive_same_severity_count, 1);
        }
    }

    #[test]
    fn test_escalation_ignores_suppression_window() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Warning));
        assert!(h.state.is_suppressed(h.now));

        let t = h.feed(oracle(Severity::Critical));
        assert!(t.event.is_some());
        assert_eq!(t.event.unwrap().previous_severity, Severity::Warning);
    }

    #[test]
    fn test_single_normal_after_critical_does_not_reset() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Critical));

        let t = h.feed(oracle(Severity::Normal));

        assert_eq!(t.kind, TransitionKind::DeescalationPending);
        assert!(t.event.is_none());
        assert_eq!(h.state.current_severity, Severity::Critical);
    }

    #[test]
    fn test_deescalation_after_confirmations() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Critical));
        h.feed(oracle(Severity::Normal));

        let t = h.feed(oracle(Severity::Normal));

        assert_eq!(t.kind, TransitionKind::Deescalated);
        assert!(t.event.is_none());
        assert_eq!(h.state.current_severity, Severity::Normal);
        assert!(h.state.pending_deescalation.is_none());
    }

    #[test]
    fn test_deescalation_target_is_highest_in_streak() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Critical));
        h.feed(oracle(Severity::Warning));
        h.feed(oracle(Severity::Normal));

        assert_eq!(h.state.current_severity, Severity::Warning);
    }

    #[test]
    fn test_same_severity_breaks_streak() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Warning));
        h.feed(oracle(Severity::Normal));
        h.feed(oracle(Severity::Warning));
        h.feed(oracle(Severity::Normal));

        assert_eq!(h.state.current_severity, Severity::Warning);
        assert_eq!(h.state.pending_deescalation.map(|p| p.count), Some(1));
    }

    #[test]
    fn test_critical_renotifies_every_cycle() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Critical));

        for _ in 0..3 {
            let t = h.feed(oracle(Severity::Critical));
            assert_eq!(t.kind, TransitionKind::Repeated);
            assert!(t.event.is_some());
        }
        assert_eq!(h.state.consecutive_same_severity_count, 4);
    }

    #[test]
    fn test_pending_deescalation_does_not_renotify_critical() {
        let config = AlertConfig {
            deescalation_confirmations: 3,
            ..Default::default()
        };
        let mut h = Harness::new(config);
        h.feed(oracle(Severity::Critical));

        assert!(h.feed(oracle(Severity::Warning)).event.is_none());
        assert!(h.feed(oracle(Severity::Warning)).event.is_none());
        assert_eq!(h.state.current_severity, Severity::Critical);
    }

    #[test]
    fn test_warning_suppressed_for_window() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Warning));

        // 5 cycles * 5 minutes = 25 minutes, still inside the 30 minute window
        for _ in 0..5 {
            let t = h.feed(oracle(Severity::Warning));
            assert_eq!(t.kind, TransitionKind::Held);
            assert!(t.event.is_none());
        }

        let t = h.feed(oracle(Severity::Warning));
        assert_eq!(t.kind, TransitionKind::Repeated);
        assert!(t.event.is_some());
    }

    #[test]
    fn test_normal_never_emits() {
        let mut h = Harness::new(AlertConfig::default());
        for _ in 0..5 {
            assert!(h.feed(oracle(Severity::Normal)).event.is_none());
        }
    }

    #[test]
    fn test_oracle_overrides_fallback() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(fallback(Severity::Critical));

        let t = h.feed(oracle(Severity::Advisory));

        assert_eq!(t.kind, TransitionKind::OracleOverride);
        assert_eq!(h.state.current_severity, Severity::Advisory);
        assert_eq!(h.state.severity_source, Some(VerdictSource::Oracle));
    }

    #[test]
    fn test_fallback_does_not_override_oracle() {
        let mut h = Harness::new(AlertConfig::default());
        h.feed(oracle(Severity::Critical));

        let t = h.feed(fallback(Severity::Normal));

        assert_eq!(t.kind, TransitionKind::DeescalationPending);
        assert_eq!(h.state.current_severity, Severity::Critical);
    }

    #[test]
    fn test_evaluate_does_not_mutate_input() {
        let machine = AlertStateMachine::default();
        let now = Utc::now();
        let state = AlertState::new(now);

        let t = machine.evaluate(&state, &oracle(Severity::Critical), USER, now);

        assert_eq!(state.current_severity, Severity::Normal);
        assert_eq!(t.state.current_severity, Severity::Critical);
    }

    #[test]
    fn test_dedupe_key_buckets() {
        let machine = AlertStateMachine::default();
        let base = DateTime::<Utc>::from_timestamp(1_700_000_100, 0).unwrap();

        let a = machine.dedupe_key(USER, Severity::Critical, base);
        let b = machine.dedupe_key(USER, Severity::Critical, base + chrono::Duration::seconds(60));
        let c = machine.dedupe_key(USER, Severity::Critical, base + chrono::Duration::seconds(400));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("u1:critical:"));
    }

    #[test]
    fn test_config_validation() {
        let config = AlertConfig {
            deescalation_confirmations: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoConfirmations)));
        assert!(AlertConfig::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_window_rejected() {
        let config = AlertConfig {
            warning_suppression_secs: 10_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooLong {
                field: "warning_suppression_secs",
                ..
            })
        ));
    }

    #[test]
    fn test_oversized_window_saturates_instead_of_overflowing() {
        let config = AlertConfig {
            warning_suppression_secs: u64::MAX,
            ..Default::default()
        };
        let machine = AlertStateMachine::new(config);
        let now = Utc::now();

        let t = machine.evaluate(&AlertState::new(now), &oracle(Severity::Warning), USER, now);
        assert_eq!(t.kind, TransitionKind::Escalated);
        assert!(t.state.is_suppressed(now + chrono::Duration::days(300)));

        let late = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(1);
        let t = machine.evaluate(&AlertState::new(late), &oracle(Severity::Warning), USER, late);
        assert_eq!(t.state.suppress_until, Some(DateTime::<Utc>::MAX_UTC));
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop::sample::select(Severity::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_every_escalation_emits_exactly_one_event(
            sequence in prop::collection::vec(severity_strategy(), 1..40)
        ) {
            let mut h = Harness::new(AlertConfig::default());
            for severity in sequence {
                let before = h.state.current_severity;
                let t = h.feed(oracle(severity));
                if severity > before {
                    prop_assert_eq!(t.kind, TransitionKind::Escalated);
                    let event = t.event.as_ref();
                    prop_assert!(event.is_some());
                    prop_assert_eq!(event.map(|e| e.severity), Some(severity));
                }
                if let Some(event) = &t.event {
                    prop_assert!(event.severity >= before);
                }
            }
        }

        #[test]
        fn prop_deescalation_needs_consecutive_lower_cycles(
            sequence in prop::collection::vec(severity_strategy(), 1..40),
            confirmations in 1u32..4,
        ) {
            let config = AlertConfig { deescalation_confirmations: confirmations, ..Default::default() };
            let mut h = Harness::new(config);
            let mut history: Vec<Severity> = Vec::new();
            for severity in sequence {
                let before = h.state.current_severity;
                h.feed(oracle(severity));
                history.push(severity);
                if h.state.current_severity < before {
                    let n = confirmations as usize;
                    prop_assert!(history.len() >= n);
                    prop_assert!(history[history.len() - n..].iter().all(|s| *s < before));
                }
            }
        }
    }
}
