//! Notification Dispatcher
//!
//! Fans an alert event out to the channel tier for its severity:
//! - Concurrent per-channel delivery with independent retry and backoff
//! - In-flight dedupe on the event's dedupe key
//! - Last-resort fallback contact when a critical tier fails outright
//! - Attempt log of every send

mod attempt_log;
mod dispatcher;
mod message;
mod transport;

pub use attempt_log::AttemptLog;
pub use dispatcher::{tier_channels, DispatchConfig, NotificationDispatcher};
pub use message::NotificationMessage;
pub use transport::Transport;

use thiserror::Error;

/// Errors from a single transport send
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
    #[error("Message rejected: {0}")]
    Rejected(String),
    #[error("Send timeout after {0}ms")]
    Timeout(u64),
}

/// Dispatch errors
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Another dispatch with the same dedupe key is still running
    #[error("Duplicate dispatch for {0}")]
    Duplicate(String),
    #[error("Invalid dispatch config: {0}")]
    InvalidConfig(String),
}
