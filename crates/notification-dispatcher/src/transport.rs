//! Channel transport boundary

use async_trait::async_trait;
use health_model::Channel;

use crate::{NotificationMessage, TransportError};

/// Sends one message on one channel.
///
/// A single call is one attempt; retries and timeouts are handled by the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        channel: Channel,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError>;
}
