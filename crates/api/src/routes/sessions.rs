//! Session Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use health_model::Profile;
use serde::Deserialize;
use session_manager::{CycleOutcome, MonitoringSession, SessionConfig, StatusReport};
use std::sync::Arc;

use crate::{error::ApiError, AppState};

/// Body for starting a session
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub user_id: String,
    #[serde(default)]
    pub profile: Profile,
    /// Falls back to the service-wide session defaults
    pub config: Option<SessionConfig>,
}

/// Body for updating a live session; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub profile: Option<Profile>,
    pub config: Option<SessionConfig>,
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<MonitoringSession>> {
    Json(state.sessions.list().await)
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<MonitoringSession>), ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }

    let config = request
        .config
        .unwrap_or_else(|| state.default_session.clone());
    let session = state
        .sessions
        .start(&request.user_id, request.profile, config)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<StatusReport>, ApiError> {
    Ok(Json(state.sessions.status(&user_id).await?))
}

pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<MonitoringSession>, ApiError> {
    if request.profile.is_none() && request.config.is_none() {
        return Err(ApiError::BadRequest(
            "nothing to update: expected profile or config".to_string(),
        ));
    }
    let session = state
        .sessions
        .update(&user_id, request.profile, request.config)
        .await?;
    Ok(Json(session))
}

pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MonitoringSession>, ApiError> {
    Ok(Json(state.sessions.stop(&user_id).await?))
}

pub async fn pause_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MonitoringSession>, ApiError> {
    Ok(Json(state.sessions.pause(&user_id).await?))
}

pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MonitoringSession>, ApiError> {
    Ok(Json(state.sessions.resume(&user_id).await?))
}

pub async fn trigger_cycle(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CycleOutcome>, ApiError> {
    Ok(Json(state.sessions.trigger_cycle(&user_id).await?))
}
