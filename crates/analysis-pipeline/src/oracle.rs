//! Reasoning Oracle Boundary

use async_trait::async_trait;
use health_model::{Profile, Severity, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::OracleError;

/// Request sent to the oracle
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub profile: Profile,
    pub snapshot: Snapshot,
}

/// External medical-reasoning endpoint.
///
/// Implementations return the raw response text; the pipeline owns parsing.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn analyze(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Validated oracle answer
#[derive(Debug, Clone, PartialEq)]
pub struct OracleAssessment {
    pub severity: Severity,
    pub rationale: String,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawOracleResponse {
    #[serde(alias = "risk_level", alias = "severity_level")]
    severity: Option<String>,
    #[serde(alias = "reasoning")]
    rationale: Option<String>,
    confidence: Option<f64>,
}

/// Parse raw oracle text into a validated assessment.
///
/// Tolerates prose or code fences around a single JSON object; everything
/// else about the shape is strict.
pub fn parse_oracle_response(text: &str) -> Result<OracleAssessment, OracleError> {
    let object = extract_json_object(text)
        .ok_or_else(|| OracleError::Malformed("no JSON object in response".to_string()))?;

    let raw: RawOracleResponse = serde_json::from_value(Value::Object(object))
        .map_err(|e| OracleError::Malformed(format!("invalid JSON: {}", e)))?;

    let label = raw
        .severity
        .ok_or_else(|| OracleError::Malformed("missing severity".to_string()))?;
    let severity = Severity::from_label(&label)
        .ok_or_else(|| OracleError::Malformed(format!("unknown severity '{}'", label)))?;

    let confidence = raw
        .confidence
        .ok_or_else(|| OracleError::Malformed("missing confidence".to_string()))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(OracleError::Malformed(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }

    Ok(OracleAssessment {
        severity,
        rationale: raw.rationale.unwrap_or_default().trim().to_string(),
        confidence,
    })
}

/// First complete JSON object in the text; trailing prose is ignored
fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        match serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
        {
            Some(Ok(Value::Object(object))) => Some(object),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_oracle_response(
            r#"{"severity": "warning", "rationale": "BP trending up", "confidence": 0.82}"#,
        )
        .unwrap();
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.rationale, "BP trending up");
        assert!((parsed.confidence - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_fenced_legacy_response() {
        let text = "Here is my assessment:\n```json\n{\"risk_level\": \"high\", \"reasoning\": \"tachycardia\", \"confidence\": 0.7}\n```";
        let parsed = parse_oracle_response(text).unwrap();
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.rationale, "tachycardia");
    }

    #[test]
    fn test_missing_confidence_is_malformed() {
        let err = parse_oracle_response(r#"{"severity": "critical"}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_out_of_range_confidence_is_malformed() {
        let err =
            parse_oracle_response(r#"{"severity": "normal", "confidence": 1.7}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_unknown_severity_is_malformed() {
        let err = parse_oracle_response(r#"{"severity": "dire", "confidence": 0.9}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_error_payload_is_malformed() {
        let err = parse_oracle_response(
            r#"{"error": "throttled", "message": "Unable to perform medical reasoning"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_braces_in_trailing_prose_ignored() {
        let text = concat!(
            "{\"severity\": \"advisory\", \"rationale\": \"mild\", \"confidence\": 0.6}\n",
            "Note: values like {systolic} were averaged."
        );
        let parsed = parse_oracle_response(text).unwrap();
        assert_eq!(parsed.severity, Severity::Advisory);
    }

    #[test]
    fn test_braces_in_leading_prose_skipped() {
        let text = "Inputs {hr, bp} reviewed. {\"severity\": \"warning\", \"confidence\": 0.8}";
        let parsed = parse_oracle_response(text).unwrap();
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.rationale, "");
    }

    #[test]
    fn test_prose_only_is_malformed() {
        assert!(parse_oracle_response("I cannot help with that.").is_err());
    }
}
