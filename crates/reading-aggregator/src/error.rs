//! Aggregation Error Types

use thiserror::Error;

/// Errors reported by an individual data source
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source could not be reached or refused the request
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Source did not answer within its timeout
    #[error("Source timed out after {0}ms")]
    Timeout(u64),
}

/// Errors raised while checking a reading
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Value outside the physiologically plausible range
    #[error("{metric} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        metric: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// NaN or infinite value
    #[error("{metric} value is not a finite number")]
    NonFinite { metric: String },
}

/// Invalid aggregator configuration
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },
    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: u64 },
}
