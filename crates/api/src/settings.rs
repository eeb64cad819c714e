//! Service configuration
//!
//! Layered with the `config` crate: struct defaults, then an optional TOML
//! file (`sentinel.toml`, or the path in `SENTINEL_CONFIG`), then
//! `SENTINEL__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use session_manager::MonitorConfig;

use crate::rate_limit::RateLimitConfig;

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "SENTINEL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "sentinel.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub oracle: OracleSettings,
    pub notifications: NotificationSettings,
    pub rate_limit: RateLimitConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub endpoint: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/analyze".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Notification gateway; notifications are only logged when unset
    pub webhook_url: Option<String>,
}

impl Settings {
    /// Load from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_model::Channel;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.server.addr, "0.0.0.0:8080");
        assert_eq!(settings.monitor.session.poll_interval_secs, 300);
        assert_eq!(settings.monitor.session.alert.deescalation_confirmations, 2);
        assert_eq!(settings.monitor.dispatch.fallback_channel, Channel::OnCall);
        assert!(settings.notifications.webhook_url.is_none());
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
            [logging]
            json = true

            [monitor.session]
            poll_interval_secs = 60

            [monitor.session.alert]
            warning_suppression_secs = 600

            [monitor.dispatch]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.monitor.session.poll_interval_secs, 60);
        assert_eq!(settings.monitor.session.alert.warning_suppression_secs, 600);
        assert_eq!(settings.monitor.session.alert.advisory_suppression_secs, 3600);
        assert_eq!(settings.monitor.dispatch.max_attempts, 5);
        assert_eq!(settings.monitor.dispatch.fallback_channel, Channel::OnCall);
        assert!(settings.monitor.validate().is_ok());
    }

    #[test]
    fn test_fallback_inside_critical_tier_rejected() {
        let settings = Settings::from_toml(
            r#"
            [monitor.dispatch]
            fallback_channel = "voice"
            "#,
        )
        .unwrap();
        assert_eq!(settings.monitor.dispatch.fallback_channel, Channel::Voice);
        assert!(settings.monitor.validate().is_err());
    }
}
