//! Notification message rendering

use health_model::{AlertEvent, Severity};
use serde::Serialize;
use uuid::Uuid;

/// Message content delivered on every channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub alert_event_id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub recommended_actions: Vec<String>,
    /// Set when the verdict was downgraded for low confidence
    pub needs_review: bool,
}

impl NotificationMessage {
    pub fn render(event: &AlertEvent) -> Self {
        let title = match event.severity {
            Severity::Critical => "CRITICAL health alert",
            Severity::Warning => "Health warning",
            Severity::Advisory => "Health advisory",
            Severity::Normal => "Health update",
        };

        let mut body = if event.severity > event.previous_severity {
            format!(
                "Status changed from {} to {}. {}",
                event.previous_severity, event.severity, event.verdict.rationale
            )
        } else {
            format!("Status remains {}. {}", event.severity, event.verdict.rationale)
        };
        if event.verdict.needs_review {
            body.push_str(" (pending clinical review)");
        }

        Self {
            alert_event_id: event.id,
            severity: event.severity,
            title: title.to_string(),
            body: body.trim_end().to_string(),
            recommended_actions: event
                .severity
                .recommended_actions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            needs_review: event.verdict.needs_review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use health_model::Verdict;

    fn event(severity: Severity, previous: Severity) -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            severity,
            previous_severity: previous,
            verdict: Verdict::oracle(severity, "systolic 190 mmHg", 0.9),
            created_at: Utc::now(),
            dedupe_key: "u1:critical:1".into(),
        }
    }

    #[test]
    fn test_escalation_message() {
        let msg = NotificationMessage::render(&event(Severity::Critical, Severity::Normal));
        assert_eq!(msg.title, "CRITICAL health alert");
        assert!(msg.body.contains("from normal to critical"));
        assert!(msg.body.contains("systolic 190"));
        assert!(!msg.recommended_actions.is_empty());
    }

    #[test]
    fn test_repeat_message() {
        let msg = NotificationMessage::render(&event(Severity::Warning, Severity::Warning));
        assert!(msg.body.starts_with("Status remains warning"));
    }
}
