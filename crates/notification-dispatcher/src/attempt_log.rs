//! Delivery attempt log

use chrono::Utc;
use health_model::{AttemptOutcome, Channel, DeliveryAttempt};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Append-only record of send attempts for one alert event.
///
/// Each attempt is appended as `Pending` and resolved exactly once.
#[derive(Debug)]
pub struct AttemptLog {
    alert_event_id: Uuid,
    entries: Mutex<Vec<DeliveryAttempt>>,
}

impl AttemptLog {
    pub fn new(alert_event_id: Uuid) -> Self {
        Self {
            alert_event_id,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record a new pending attempt, returning its handle
    pub fn begin(&self, channel: Channel, attempt_number: u32) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(DeliveryAttempt {
            alert_event_id: self.alert_event_id,
            channel,
            attempt_number,
            outcome: AttemptOutcome::Pending,
            attempted_at: Utc::now(),
        });
        entries.len() - 1
    }

    /// Resolve a pending attempt. Returns false if it was already resolved
    /// or `outcome` is not terminal.
    pub fn resolve(&self, handle: usize, outcome: AttemptOutcome) -> bool {
        if !outcome.is_terminal() {
            return false;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(handle) {
            Some(entry) if entry.outcome == AttemptOutcome::Pending => {
                entry.outcome = outcome;
                true
            }
            _ => false,
        }
    }

    pub fn entries(&self) -> Vec<DeliveryAttempt> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_once() {
        let log = AttemptLog::new(Uuid::new_v4());
        let h = log.begin(Channel::Sms, 1);

        assert_eq!(log.entries()[0].outcome, AttemptOutcome::Pending);
        assert!(log.resolve(h, AttemptOutcome::Failed));
        assert!(!log.resolve(h, AttemptOutcome::Delivered));
        assert_eq!(log.entries()[0].outcome, AttemptOutcome::Failed);
    }

    #[test]
    fn test_pending_is_not_a_resolution() {
        let log = AttemptLog::new(Uuid::new_v4());
        let h = log.begin(Channel::App, 1);
        assert!(!log.resolve(h, AttemptOutcome::Pending));
        assert!(!log.resolve(h + 1, AttemptOutcome::Delivered));
    }
}
