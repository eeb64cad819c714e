//! Reading Ingestion Routes

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use health_model::Reading;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{error::ApiError, AppState};

/// A reading pushed by a device or app
#[derive(Debug, Deserialize)]
pub struct ReadingInput {
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    pub source_id: Option<String>,
    /// Defaults to the time of receipt
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PushReadingsRequest {
    pub readings: Vec<ReadingInput>,
}

#[derive(Debug, Serialize)]
pub struct PushReadingsResponse {
    pub accepted: usize,
    pub queued: usize,
}

pub async fn push_readings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<PushReadingsRequest>,
) -> Result<Json<PushReadingsResponse>, ApiError> {
    if request.readings.is_empty() {
        return Err(ApiError::BadRequest("no readings in request".to_string()));
    }

    let now = Utc::now();
    let readings: Vec<Reading> = request
        .readings
        .into_iter()
        .map(|r| {
            Reading::new(
                r.source_id.unwrap_or_else(|| "api".to_string()),
                r.metric,
                r.value,
                r.unit,
                r.observed_at.unwrap_or(now),
            )
        })
        .collect();

    let accepted = readings.len();
    let queued = state.repository.push_readings(&user_id, readings)?;
    metrics::counter!("sentinel_readings_ingested_total").increment(accepted as u64);

    Ok(Json(PushReadingsResponse { accepted, queued }))
}
