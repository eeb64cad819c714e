//! Rule-Based Fallback System
//!
//! Provides deterministic threshold rules, keyed by profile conditions, for
//! when the reasoning oracle is unavailable or its answer cannot be used.

mod rules;

pub use rules::{FallbackEngine, FallbackError, RuleHit};
