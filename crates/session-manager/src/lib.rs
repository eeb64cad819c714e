//! Session Manager
//!
//! Owns the registry of monitoring sessions. Each session runs its own task
//! that ticks on the poll interval and drives one cycle at a time:
//! collect readings, analyze, update alert state, dispatch notifications.

mod config;
mod cycle;
mod manager;
mod session;

pub use config::{MonitorConfig, SessionConfig};
pub use cycle::Monitor;
pub use manager::SessionManager;
pub use session::{CycleOutcome, CycleStats, Health, MonitoringSession, SessionStatus, StatusReport};

use thiserror::Error;

/// Session control errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session already active for {0}")]
    AlreadyActive(String),
    #[error("No session for {0}")]
    NoSuchSession(String),
    #[error("Invalid session config: {0}")]
    InvalidConfig(String),
}
