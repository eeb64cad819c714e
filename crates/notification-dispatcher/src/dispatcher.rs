//! Dispatcher Implementation

use chrono::Utc;
use health_model::{
    AlertEvent, AttemptOutcome, Channel, ChannelResult, DeliveryOutcome, DeliveryReport, Severity,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::{AttemptLog, DispatchError, NotificationMessage, Transport, TransportError};

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Attempts per channel, including the first (default: 3)
    pub max_attempts: u32,
    /// Backoff base, doubled after each failed attempt (default: 2000ms)
    pub retry_base_ms: u64,
    /// Bound on a single send (default: 10000ms)
    pub send_timeout_ms: u64,
    /// Contact tried when every channel of a critical tier failed
    pub fallback_channel: Channel,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_ms: 2000,
            send_timeout_ms: 10_000,
            fallback_channel: Channel::OnCall,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_attempts == 0 {
            return Err(DispatchError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(DispatchError::InvalidConfig(
                "send_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if tier_channels(Severity::Critical).contains(&self.fallback_channel) {
            return Err(DispatchError::InvalidConfig(format!(
                "fallback_channel {} is already part of the critical tier",
                self.fallback_channel
            )));
        }
        Ok(())
    }

    /// Wait before attempt `attempt + 1`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_base_ms.saturating_mul(factor))
    }
}

/// Channels notified for a severity
pub fn tier_channels(severity: Severity) -> &'static [Channel] {
    match severity {
        Severity::Normal => &[],
        Severity::Advisory => &[Channel::App],
        Severity::Warning => &[Channel::App, Channel::Email],
        Severity::Critical => &[Channel::App, Channel::Email, Channel::Sms, Channel::Voice],
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Holds a dedupe key for the duration of one dispatch
struct InFlightGuard {
    in_flight: InFlight,
    key: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, key: &str) -> Result<Self, DispatchError> {
        let mut keys = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.to_string()) {
            return Err(DispatchError::Duplicate(key.to_string()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        keys.remove(&self.key);
    }
}

/// Delivers alert events over the channel tier for their severity
pub struct NotificationDispatcher {
    transport: Arc<dyn Transport>,
    config: DispatchConfig,
    in_flight: InFlight,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: DispatchConfig) -> Self {
        info!("Creating notification dispatcher with config: {:?}", config);
        Self {
            transport,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Deliver one alert event.
    ///
    /// Returns `Duplicate` without sending if a dispatch with the same dedupe
    /// key is still running. Channel failures are reported in the
    /// `DeliveryReport`, never as an error.
    pub async fn dispatch(&self, event: &AlertEvent) -> Result<DeliveryReport, DispatchError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, &event.dedupe_key)?;

        let tier = tier_channels(event.severity);
        let message = Arc::new(NotificationMessage::render(event));
        let log = Arc::new(AttemptLog::new(event.id));

        let mut tasks = JoinSet::new();
        for &channel in tier {
            tasks.spawn(deliver(
                Arc::clone(&self.transport),
                self.config.clone(),
                channel,
                event.user_id.clone(),
                Arc::clone(&message),
                Arc::clone(&log),
            ));
        }

        let mut results = Vec::with_capacity(tier.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(user_id = %event.user_id, "Channel task failed: {}", e),
            }
        }
        for &channel in tier {
            if !results.iter().any(|r| r.channel == channel) {
                results.push(ChannelResult {
                    channel,
                    delivered: false,
                    attempts: 0,
                    last_error: Some("delivery task aborted".to_string()),
                });
            }
        }
        results.sort_by_key(|r| tier.iter().position(|c| *c == r.channel));

        let delivered = results.iter().filter(|r| r.delivered).count();
        let outcome = if delivered == results.len() {
            DeliveryOutcome::Delivered
        } else if delivered > 0 {
            DeliveryOutcome::Degraded
        } else {
            DeliveryOutcome::Failed
        };

        let fallback = if outcome == DeliveryOutcome::Failed && event.severity == Severity::Critical
        {
            let channel = self.config.fallback_channel;
            warn!(
                user_id = %event.user_id,
                %channel,
                "Every critical channel failed, trying fallback contact"
            );
            let result = deliver(
                Arc::clone(&self.transport),
                self.config.clone(),
                channel,
                event.user_id.clone(),
                Arc::clone(&message),
                Arc::clone(&log),
            )
            .await;
            if !result.delivered {
                error!(user_id = %event.user_id, "Critical alert reached nobody");
            }
            Some(result)
        } else {
            None
        };

        metrics::counter!("sentinel_deliveries_total", "outcome" => outcome.as_str()).increment(1);
        info!(
            user_id = %event.user_id,
            alert_id = %event.id,
            "Dispatched {} alert: {} ({}/{} channels)",
            event.severity,
            outcome.as_str(),
            delivered,
            results.len()
        );

        Ok(DeliveryReport {
            alert_event_id: event.id,
            user_id: event.user_id.clone(),
            severity: event.severity,
            outcome,
            channels: results,
            fallback,
            attempts: log.entries(),
            completed_at: Utc::now(),
        })
    }
}

/// Retry loop for a single channel
async fn deliver(
    transport: Arc<dyn Transport>,
    config: DispatchConfig,
    channel: Channel,
    user_id: String,
    message: Arc<NotificationMessage>,
    log: Arc<AttemptLog>,
) -> ChannelResult {
    let max_attempts = config.max_attempts.max(1);
    let send_timeout = Duration::from_millis(config.send_timeout_ms);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let handle = log.begin(channel, attempt);
        let result = tokio::time::timeout(send_timeout, transport.send(channel, &user_id, &message))
            .await
            .unwrap_or(Err(TransportError::Timeout(config.send_timeout_ms)));

        match result {
            Ok(()) => {
                log.resolve(handle, AttemptOutcome::Delivered);
                debug!(%user_id, %channel, attempt, "Delivered");
                return ChannelResult {
                    channel,
                    delivered: true,
                    attempts: attempt,
                    last_error: None,
                };
            }
            Err(e) => {
                log.resolve(handle, AttemptOutcome::Failed);
                warn!(%user_id, %channel, attempt, "Send failed: {}", e);
                last_error = Some(e.to_string());
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(config.backoff(attempt)).await;
        }
    }

    ChannelResult {
        channel,
        delivered: false,
        attempts: max_attempts,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use health_model::Verdict;
    use std::collections::HashMap;
    use uuid::Uuid;

    /// Transport where each channel fails a scripted number of times
    #[derive(Default)]
    struct ScriptedTransport {
        failures: HashMap<Channel, u32>,
        delay: Duration,
        calls: Mutex<HashMap<Channel, u32>>,
    }

    impl ScriptedTransport {
        fn failing(channels: &[Channel]) -> Self {
            Self {
                failures: channels.iter().map(|c| (*c, u32::MAX)).collect(),
                ..Default::default()
            }
        }

        fn calls(&self, channel: Channel) -> u32 {
            self.calls.lock().unwrap().get(&channel).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            channel: Channel,
            _user_id: &str,
            _message: &NotificationMessage,
        ) -> Result<(), TransportError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(channel).or_insert(0);
                *n += 1;
                *n
            };
            tokio::time::sleep(self.delay).await;
            match self.failures.get(&channel) {
                Some(&fails) if call <= fails => {
                    Err(TransportError::Unavailable(format!("{} gateway down", channel)))
                }
                _ => Ok(()),
            }
        }
    }

    fn event(severity: Severity) -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            severity,
            previous_severity: Severity::Normal,
            verdict: Verdict::oracle(severity, "test", 0.9),
            created_at: Utc::now(),
            dedupe_key: format!("u1:{}:1", severity),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_partial_failure_is_degraded() {
        let transport = Arc::new(ScriptedTransport::failing(&[Channel::Sms, Channel::Voice]));
        let dispatcher = NotificationDispatcher::new(transport.clone(), DispatchConfig::default());

        let report = dispatcher.dispatch(&event(Severity::Critical)).await.unwrap();

        assert_eq!(report.outcome, DeliveryOutcome::Degraded);
        assert!(report.fallback.is_none());
        assert_eq!(transport.calls(Channel::OnCall), 0);
        assert_eq!(transport.calls(Channel::Sms), 3);
        assert_eq!(
            report.channels.iter().map(|r| r.channel).collect::<Vec<_>>(),
            vec![Channel::App, Channel::Email, Channel::Sms, Channel::Voice]
        );
        assert!(report.reached_anyone());
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_total_failure_uses_fallback() {
        let transport = Arc::new(ScriptedTransport::failing(tier_channels(Severity::Critical)));
        let dispatcher = NotificationDispatcher::new(transport.clone(), DispatchConfig::default());

        let report = dispatcher.dispatch(&event(Severity::Critical)).await.unwrap();

        assert_eq!(report.outcome, DeliveryOutcome::Failed);
        let fallback = report.fallback.as_ref().unwrap();
        assert_eq!(fallback.channel, Channel::OnCall);
        assert!(fallback.delivered);
        assert!(report.reached_anyone());
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_failure_has_no_fallback() {
        let transport = Arc::new(ScriptedTransport::failing(&[Channel::App, Channel::Email]));
        let dispatcher = NotificationDispatcher::new(transport.clone(), DispatchConfig::default());

        let report = dispatcher.dispatch(&event(Severity::Warning)).await.unwrap();

        assert_eq!(report.outcome, DeliveryOutcome::Failed);
        assert!(report.fallback.is_none());
        assert!(!report.reached_anyone());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_exponential_backoff() {
        let transport = Arc::new(ScriptedTransport {
            failures: HashMap::from([(Channel::App, 2)]),
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(transport.clone(), DispatchConfig::default());

        let start = tokio::time::Instant::now();
        let report = dispatcher.dispatch(&event(Severity::Advisory)).await.unwrap();

        assert_eq!(report.outcome, DeliveryOutcome::Delivered);
        assert_eq!(report.channels[0].attempts, 3);
        // 2s after the first failure, 4s after the second
        assert!(start.elapsed() >= Duration::from_secs(6));

        let outcomes: Vec<_> = report.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![AttemptOutcome::Failed, AttemptOutcome::Failed, AttemptOutcome::Delivered]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_counts_as_failure() {
        let transport = Arc::new(ScriptedTransport {
            delay: Duration::from_secs(60),
            ..Default::default()
        });
        let config = DispatchConfig {
            max_attempts: 1,
            ..Default::default()
        };
        let dispatcher = NotificationDispatcher::new(transport, config);

        let report = dispatcher.dispatch(&event(Severity::Advisory)).await.unwrap();

        assert_eq!(report.outcome, DeliveryOutcome::Failed);
        assert!(report.channels[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_in_flight_is_rejected() {
        let transport = Arc::new(ScriptedTransport {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(transport.clone(), DispatchConfig::default());
        let alert = event(Severity::Warning);

        let (first, second) = tokio::join!(dispatcher.dispatch(&alert), dispatcher.dispatch(&alert));

        assert!(first.is_ok());
        assert!(matches!(second, Err(DispatchError::Duplicate(_))));
        assert_eq!(transport.calls(Channel::App), 1);

        // Key is released once the first dispatch finishes
        assert!(dispatcher.dispatch(&alert).await.is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = DispatchConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_config_validation() {
        let config = DispatchConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DispatchError::InvalidConfig(_))));
        assert!(DispatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fallback_must_be_outside_critical_tier() {
        for &channel in tier_channels(Severity::Critical) {
            let config = DispatchConfig {
                fallback_channel: channel,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(DispatchError::InvalidConfig(_))),
                "{} accepted as fallback",
                channel
            );
        }
    }
}
