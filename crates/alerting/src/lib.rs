//! Alerting System
//!
//! Per-user escalation state machine: immediate escalation, confirmed
//! de-escalation, repeat suppression, and dedupe keys for dispatch.

mod machine;
mod state;

pub use machine::{
    AlertConfig, AlertStateMachine, ConfigError, Transition, TransitionKind, MAX_WINDOW_SECS,
};
pub use state::{AlertState, PendingDeescalation};
