//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, Utc};
use health_model::{AlertEvent, DeliveryReport, Reading, Recommendation, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Stored alert with its evidence and delivery result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub event: AlertEvent,
    /// Readings the verdict was based on
    pub readings: Vec<Reading>,
    pub delivery: Option<DeliveryReport>,
    /// Recommendation produced by the same cycle
    pub recommendation: Option<Recommendation>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Repository for alert history and pushed readings
pub struct Repository {
    alerts: Mutex<VecDeque<AlertRecord>>,
    inbox: Mutex<HashMap<String, VecDeque<Reading>>>,
    max_alert_records: usize,
    /// Per-user inbox bound; oldest readings are dropped first
    max_inbox_readings: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Lock(e.to_string()))
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_retention(10_000, 1_000)
    }

    pub fn with_retention(max_alert_records: usize, max_inbox_readings: usize) -> Self {
        info!(
            "Creating in-memory repository (alerts={}, inbox={})",
            max_alert_records, max_inbox_readings
        );
        Self {
            alerts: Mutex::new(VecDeque::new()),
            inbox: Mutex::new(HashMap::new()),
            max_alert_records: max_alert_records.max(1),
            max_inbox_readings: max_inbox_readings.max(1),
        }
    }

    /// Store an alert together with the snapshot that produced it
    pub fn record_alert(
        &self,
        event: &AlertEvent,
        snapshot: &Snapshot,
        recommendation: Option<&Recommendation>,
    ) -> Result<(), StorageError> {
        let mut alerts = lock(&self.alerts)?;

        while alerts.len() >= self.max_alert_records {
            alerts.pop_front();
        }

        alerts.push_back(AlertRecord {
            event: event.clone(),
            readings: snapshot.readings.clone(),
            delivery: None,
            recommendation: recommendation.cloned(),
            acknowledged_at: None,
        });
        debug!(user_id = %event.user_id, "Recorded alert {}", event.id);
        Ok(())
    }

    /// Attach a delivery report to its alert
    pub fn record_delivery(&self, report: &DeliveryReport) -> Result<(), StorageError> {
        let mut alerts = lock(&self.alerts)?;
        let record = alerts
            .iter_mut()
            .rev()
            .find(|r| r.event.id == report.alert_event_id)
            .ok_or(StorageError::AlertNotFound(report.alert_event_id))?;
        record.delivery = Some(report.clone());
        Ok(())
    }

    /// Alerts for a user created at or after `since`, newest first
    pub fn alerts_for(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let alerts = lock(&self.alerts)?;
        Ok(alerts
            .iter()
            .rev()
            .filter(|r| r.event.user_id == user_id && r.event.created_at >= since)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Mark an alert acknowledged. Acknowledging twice keeps the first time.
    pub fn acknowledge(&self, user_id: &str, alert_id: Uuid) -> Result<AlertRecord, StorageError> {
        let mut alerts = lock(&self.alerts)?;
        let record = alerts
            .iter_mut()
            .find(|r| r.event.id == alert_id && r.event.user_id == user_id)
            .ok_or(StorageError::AlertNotFound(alert_id))?;
        record.acknowledged_at.get_or_insert_with(Utc::now);
        Ok(record.clone())
    }

    /// Queue readings for a user, returning the inbox size
    pub fn push_readings(&self, user_id: &str, readings: Vec<Reading>) -> Result<usize, StorageError> {
        let mut inbox = lock(&self.inbox)?;
        let queue = inbox.entry(user_id.to_string()).or_default();
        queue.extend(readings);
        while queue.len() > self.max_inbox_readings {
            queue.pop_front();
        }
        Ok(queue.len())
    }

    /// Take every queued reading for a user, keeping those observed at or after `since`
    pub fn drain_readings(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StorageError> {
        let mut inbox = lock(&self.inbox)?;
        Ok(inbox
            .remove(user_id)
            .map(|queue| queue.into_iter().filter(|r| r.observed_at >= since).collect())
            .unwrap_or_default())
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}
