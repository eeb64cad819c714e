//! Alert Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::AlertRecord;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

/// Query parameters for the alert history endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Look-back window in days
    #[serde(default = "default_days")]
    pub days: u32,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_days() -> u32 {
    7
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<AlertRecord>,
    pub count: usize,
    pub unacknowledged_count: usize,
}

/// Get alert history for a user, newest first
pub async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AlertQuery>,
) -> Result<Json<AlertResponse>, ApiError> {
    let since = Utc::now() - chrono::Duration::days(i64::from(params.days));
    let alerts = state.repository.alerts_for(&user_id, since, params.limit)?;
    let unack = alerts.iter().filter(|a| a.acknowledged_at.is_none()).count();

    Ok(Json(AlertResponse {
        count: alerts.len(),
        unacknowledged_count: unack,
        data: alerts,
    }))
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path((user_id, alert_id)): Path<(String, Uuid)>,
) -> Result<Json<AlertRecord>, ApiError> {
    Ok(Json(state.repository.acknowledge(&user_id, alert_id)?))
}
