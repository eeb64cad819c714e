//! Health Monitoring API Server
//!
//! REST control surface for monitoring sessions, reading ingestion and alert
//! history, plus Prometheus metrics.

use anyhow::Context;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};

pub mod clients;
pub mod error;
pub mod rate_limit;
mod routes;
pub mod settings;

use analysis_pipeline::AnalysisPipeline;
use notification_dispatcher::{NotificationDispatcher, Transport};
use reading_aggregator::{DataSource, ReadingAggregator};
use session_manager::{Monitor, SessionConfig, SessionManager, SessionStatus};
use storage::{InboxSource, Repository};

use crate::clients::{HttpOracle, LogTransport, WebhookTransport};
use crate::error::ApiError;
use crate::settings::{LoggingSettings, Settings};

/// Application state shared across handlers
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub repository: Arc<Repository>,
    /// Config for sessions started without one
    pub default_session: SessionConfig,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionManager>,
        repository: Arc<Repository>,
        default_session: SessionConfig,
    ) -> Self {
        Self {
            sessions,
            repository,
            default_session,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub sessions: SessionCounts,
    pub stored_alerts: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct SessionCounts {
    pub active: usize,
    pub paused: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route(
            "/api/v1/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::start_session),
        )
        .route(
            "/api/v1/sessions/:user_id",
            get(routes::sessions::get_status)
                .patch(routes::sessions::update_session)
                .delete(routes::sessions::stop_session),
        )
        .route(
            "/api/v1/sessions/:user_id/pause",
            post(routes::sessions::pause_session),
        )
        .route(
            "/api/v1/sessions/:user_id/resume",
            post(routes::sessions::resume_session),
        )
        .route(
            "/api/v1/sessions/:user_id/cycle",
            post(routes::sessions::trigger_cycle),
        )
        .route(
            "/api/v1/readings/:user_id",
            post(routes::readings::push_readings),
        )
        .route("/api/v1/alerts/:user_id", get(routes::alerts::get_alerts))
        .route(
            "/api/v1/alerts/:user_id/:alert_id/ack",
            post(routes::alerts::acknowledge_alert),
        )
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut counts = SessionCounts::default();
    for session in state.sessions.list().await {
        match session.status {
            SessionStatus::Active => counts.active += 1,
            SessionStatus::Paused => counts.paused += 1,
            SessionStatus::Stopped => {}
        }
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sessions: counts,
        stored_alerts: state.repository.alert_count(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ApiError::MetricsDisabled)
}

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let level: Level = settings
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", settings.level))?;

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

/// Wire the monitoring stack from settings
pub fn build_monitor(settings: &Settings, repository: Arc<Repository>) -> anyhow::Result<Monitor> {
    settings.monitor.validate()?;

    let sources: Vec<Arc<dyn DataSource>> =
        vec![Arc::new(InboxSource::new("inbox", Arc::clone(&repository)))];

    let oracle = HttpOracle::new(&settings.oracle).context("failed to build oracle client")?;

    let transport: Arc<dyn Transport> = match &settings.notifications.webhook_url {
        Some(url) => {
            info!("Delivering notifications via {}", url);
            Arc::new(WebhookTransport::new(url).context("failed to build webhook client")?)
        }
        None => {
            info!("No notification gateway configured, logging notifications only");
            Arc::new(LogTransport)
        }
    };

    Ok(Monitor::new(
        ReadingAggregator::new(sources, settings.monitor.aggregator.clone()),
        AnalysisPipeline::new(Arc::new(oracle), settings.monitor.pipeline.clone()),
        NotificationDispatcher::new(transport, settings.monitor.dispatch.clone()),
        repository,
    ))
}

/// Run the server
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let repository = Arc::new(Repository::new());
    let monitor = build_monitor(&settings, Arc::clone(&repository))?;
    let sessions = Arc::new(SessionManager::new(monitor));

    let state = Arc::new(
        AppState::new(sessions, repository, settings.monitor.session.clone()).with_metrics(metrics),
    );

    let governor = rate_limit::create_governor_config(&settings.rate_limit)
        .context("rate_limit.per_second and rate_limit.burst_size must be non-zero")?;
    let app = create_router(state).layer(GovernorLayer { config: governor });

    info!("Starting API server on {}", settings.server.addr);

    let listener = tokio::net::TcpListener::bind(&settings.server.addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
