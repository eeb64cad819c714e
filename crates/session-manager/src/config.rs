//! Monitoring configuration

use alerting::{AlertConfig, MAX_WINDOW_SECS};
use analysis_pipeline::PipelineConfig;
use notification_dispatcher::DispatchConfig;
use reading_aggregator::AggregatorConfig;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Per-session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between cycles (default: 300)
    pub poll_interval_secs: u64,
    /// Seconds before the first cycle
    pub start_delay_secs: u64,
    pub alert: AlertConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            start_delay_secs: 0,
            alert: AlertConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.poll_interval_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        for (field, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("start_delay_secs", self.start_delay_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(SessionError::InvalidConfig(format!(
                    "{} must not exceed {} seconds",
                    field, MAX_WINDOW_SECS
                )));
            }
        }
        self.alert
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))
    }
}

/// Settings for the whole monitoring stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub aggregator: AggregatorConfig,
    pub pipeline: PipelineConfig,
    pub dispatch: DispatchConfig,
    /// Defaults for sessions started without their own config
    pub session: SessionConfig,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        self.aggregator
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        self.pipeline
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        self.dispatch
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = SessionConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_schedule_rejected() {
        let config = SessionConfig {
            start_delay_secs: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));

        let config = SessionConfig {
            alert: AlertConfig {
                advisory_suppression_secs: MAX_WINDOW_SECS + 1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_aggregator_checked() {
        let mut config = MonitorConfig::default();
        config.aggregator.collect_deadline_ms = 0;
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_defaults_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }
}
