//! HTTP-backed oracle and notification transports

use analysis_pipeline::{OracleError, OracleRequest, ReasoningOracle};
use async_trait::async_trait;
use health_model::Channel;
use notification_dispatcher::{NotificationMessage, Transport, TransportError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::settings::OracleSettings;

/// Reasoning oracle reached over HTTP.
///
/// POSTs the request as JSON and returns the response body verbatim.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOracle {
    pub fn new(settings: &OracleSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("health-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn analyze(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        debug!("Oracle responded with {} bytes", body.len());
        Ok(body)
    }
}

/// Transport that only logs, used when no gateway is configured
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(
        &self,
        channel: Channel,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError> {
        info!(
            user_id,
            %channel,
            severity = %message.severity,
            "{}: {}",
            message.title,
            message.body
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel: Channel,
    user_id: &'a str,
    message: &'a NotificationMessage,
}

/// Posts every notification to a gateway that fans out to real channels
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(
        &self,
        channel: Channel,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError> {
        let payload = WebhookPayload {
            channel,
            user_id,
            message,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            warn!(user_id, %channel, "Gateway rejected notification: {}", status);
            return Err(TransportError::Rejected(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(TransportError::Unavailable(format!("HTTP {}", status)));
        }
        Ok(())
    }
}
