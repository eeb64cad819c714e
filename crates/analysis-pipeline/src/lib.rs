//! Analysis Pipeline
//!
//! Submits snapshots to the external reasoning oracle, parses its answer into
//! a strict verdict, and falls back to deterministic rules when the oracle is
//! slow, unreachable, or incoherent.

mod oracle;
mod pipeline;
mod recommend;

pub use oracle::{parse_oracle_response, OracleAssessment, OracleRequest, ReasoningOracle};
pub use pipeline::{AnalysisPipeline, PipelineConfig};
pub use recommend::RecommendationEngine;

use thiserror::Error;

/// Errors from the reasoning oracle
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle timeout after {0}ms")]
    Timeout(u64),
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Timeout(_) => "timeout",
            OracleError::Malformed(_) => "malformed",
            OracleError::Unavailable(_) => "unavailable",
        }
    }
}

/// Errors during analysis
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Neither the oracle nor the fallback rules could classify the snapshot
    #[error("Analysis unavailable: oracle failed ({oracle}) and fallback unusable ({fallback})")]
    Unavailable { oracle: String, fallback: String },
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),
}
