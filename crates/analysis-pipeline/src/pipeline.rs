//! Analysis Pipeline Implementation

use fallback::FallbackEngine;
use health_model::{Profile, Severity, Snapshot, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::oracle::{parse_oracle_response, OracleRequest, ReasoningOracle};
use crate::{AnalysisError, OracleError};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Oracle call timeout (default: 5000ms)
    pub oracle_timeout_ms: u64,
    /// Oracle confidence below this is not trusted at face value (default: 0.4)
    pub confidence_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: 5000,
            confidence_threshold: 0.4,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "confidence_threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(AnalysisError::InvalidConfig(
                "oracle_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns a snapshot into a verdict
pub struct AnalysisPipeline {
    oracle: Arc<dyn ReasoningOracle>,
    fallback: FallbackEngine,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    /// Create a new pipeline
    pub fn new(oracle: Arc<dyn ReasoningOracle>, config: PipelineConfig) -> Self {
        info!("Creating analysis pipeline with config: {:?}", config);
        Self {
            oracle,
            fallback: FallbackEngine::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Evaluate a snapshot for a profile.
    ///
    /// Oracle failures are absorbed by the fallback rules; an error is returned
    /// only when the fallback cannot classify the snapshot either.
    pub async fn evaluate(
        &self,
        snapshot: &Snapshot,
        profile: &Profile,
    ) -> Result<Verdict, AnalysisError> {
        if snapshot.empty {
            debug!(user_id = %snapshot.user_id, "Empty snapshot, skipping oracle");
            return Ok(Verdict::fallback(
                Severity::Normal,
                "no current readings",
                0.0,
            ));
        }

        let oracle_error = match self.call_oracle(snapshot, profile).await {
            Ok(verdict) => return Ok(verdict),
            Err(e) => e,
        };

        warn!(
            user_id = %snapshot.user_id,
            cycle_id = snapshot.cycle_id,
            "Degraded analysis, using fallback rules: {}",
            oracle_error
        );
        metrics::counter!("sentinel_oracle_fallbacks_total", "reason" => oracle_error.kind())
            .increment(1);

        match self.fallback.classify(snapshot, profile) {
            Ok(verdict) => Ok(verdict),
            Err(fallback_error) => {
                error!(
                    user_id = %snapshot.user_id,
                    cycle_id = snapshot.cycle_id,
                    "Analysis unavailable: {}",
                    fallback_error
                );
                Err(AnalysisError::Unavailable {
                    oracle: oracle_error.to_string(),
                    fallback: fallback_error.to_string(),
                })
            }
        }
    }

    async fn call_oracle(
        &self,
        snapshot: &Snapshot,
        profile: &Profile,
    ) -> Result<Verdict, OracleError> {
        let request = OracleRequest {
            profile: profile.clone(),
            snapshot: snapshot.clone(),
        };

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(self.config.oracle_timeout_ms);
        let text = tokio::time::timeout(timeout, self.oracle.analyze(&request))
            .await
            .map_err(|_| OracleError::Timeout(self.config.oracle_timeout_ms))??;

        let assessment = parse_oracle_response(&text)?;
        debug!(
            user_id = %snapshot.user_id,
            "Oracle answered {} (conf={:.2}) in {}ms",
            assessment.severity,
            assessment.confidence,
            start.elapsed().as_millis()
        );

        let mut verdict = Verdict::oracle(
            assessment.severity,
            assessment.rationale,
            assessment.confidence,
        );

        if verdict.confidence < self.config.confidence_threshold
            && verdict.severity >= Severity::Warning
        {
            let original = verdict.severity;
            verdict.severity = original.lowered();
            verdict.needs_review = true;
            verdict.rationale = format!(
                "{} [low confidence {:.2}: downgraded from {}, flagged for review]",
                verdict.rationale, verdict.confidence, original
            );
            warn!(
                user_id = %snapshot.user_id,
                "Low-confidence {} verdict downgraded to {}",
                original,
                verdict.severity
            );
        }

        Ok(verdict)
    }
}
