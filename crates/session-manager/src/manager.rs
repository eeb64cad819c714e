//! Session registry and control operations

use alerting::AlertStateMachine;
use chrono::Utc;
use health_model::Profile;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cycle::{run_cycle, run_session, Monitor, SessionContext};
use crate::session::{CycleOutcome, MonitoringSession, SessionStatus, StatusReport};
use crate::{SessionConfig, SessionError};

/// Delivery reports buffered per session before dispatch tasks wait
const REPORT_BUFFER: usize = 32;
/// How long `stop` waits for the session task to wind down
const STOP_GRACE: Duration = Duration::from_secs(5);

struct SessionHandle {
    ctx: Arc<SessionContext>,
    cancel: watch::Sender<bool>,
    /// Poll interval of the session task
    schedule: watch::Sender<Duration>,
    task: JoinHandle<()>,
}

/// Owns every monitoring session
pub struct SessionManager {
    monitor: Arc<Monitor>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor: Arc::new(monitor),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Start monitoring a user.
    ///
    /// Fails with `AlreadyActive` if the user has a session, active or
    /// paused; the existing session is left untouched.
    pub async fn start(
        &self,
        user_id: &str,
        profile: Profile,
        config: SessionConfig,
    ) -> Result<MonitoringSession, SessionError> {
        config.validate()?;

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(user_id) {
            return Err(SessionError::AlreadyActive(user_id.to_string()));
        }

        let session = MonitoringSession {
            user_id: user_id.to_string(),
            profile,
            config: config.clone(),
            status: SessionStatus::Active,
            started_at: Utc::now(),
            last_cycle_at: None,
            cycle_count: 0,
        };

        let (reports_tx, reports_rx) = mpsc::channel(REPORT_BUFFER);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (schedule_tx, schedule_rx) =
            watch::channel(Duration::from_secs(config.poll_interval_secs));
        let ctx = Arc::new(SessionContext::new(session.clone(), reports_tx));

        let task = tokio::spawn(run_session(
            Arc::clone(&self.monitor),
            Arc::clone(&ctx),
            cancel_rx,
            reports_rx,
            schedule_rx,
            Duration::from_secs(config.start_delay_secs),
        ));

        sessions.insert(
            user_id.to_string(),
            SessionHandle {
                ctx,
                cancel: cancel_tx,
                schedule: schedule_tx,
                task,
            },
        );

        info!(user_id, "Monitoring started");
        Ok(session)
    }

    /// Stop monitoring a user and discard the session's alert state
    pub async fn stop(&self, user_id: &str) -> Result<MonitoringSession, SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(user_id)
            .ok_or_else(|| SessionError::NoSuchSession(user_id.to_string()))?;

        let _ = handle.cancel.send(true);
        if tokio::time::timeout(STOP_GRACE, handle.task).await.is_err() {
            warn!(user_id, "Session task did not stop within {:?}", STOP_GRACE);
        }

        let mut session = handle.ctx.state.lock().await.session.clone();
        session.status = SessionStatus::Stopped;
        info!(user_id, "Monitoring stopped");
        Ok(session)
    }

    /// Change a live session's profile and/or config.
    ///
    /// Alert state, stats, and status are kept. A changed poll interval
    /// restarts the schedule with the next cycle one interval away;
    /// `start_delay_secs` only applies at `start`.
    pub async fn update(
        &self,
        user_id: &str,
        profile: Option<Profile>,
        config: Option<SessionConfig>,
    ) -> Result<MonitoringSession, SessionError> {
        if let Some(config) = &config {
            config.validate()?;
        }

        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(user_id)
            .ok_or_else(|| SessionError::NoSuchSession(user_id.to_string()))?;

        let mut state = handle.ctx.state.lock().await;
        if let Some(profile) = profile {
            state.session.profile = profile;
        }
        if let Some(config) = config {
            if config.poll_interval_secs != state.session.config.poll_interval_secs {
                handle
                    .schedule
                    .send_replace(Duration::from_secs(config.poll_interval_secs));
            }
            if config.alert != state.session.config.alert {
                state.machine = AlertStateMachine::new(config.alert.clone());
            }
            state.session.config = config;
        }

        info!(user_id, "Session updated");
        Ok(state.session.clone())
    }

    /// Suspend cycles; alert state is frozen until `resume`
    pub async fn pause(&self, user_id: &str) -> Result<MonitoringSession, SessionError> {
        self.set_status(user_id, SessionStatus::Paused).await
    }

    pub async fn resume(&self, user_id: &str) -> Result<MonitoringSession, SessionError> {
        self.set_status(user_id, SessionStatus::Active).await
    }

    async fn set_status(
        &self,
        user_id: &str,
        status: SessionStatus,
    ) -> Result<MonitoringSession, SessionError> {
        let ctx = self.context(user_id).await?;
        let mut state = ctx.state.lock().await;
        if state.session.status != status {
            state.session.status = status;
            info!(user_id, "Session {:?}", status);
        }
        Ok(state.session.clone())
    }

    pub async fn status(&self, user_id: &str) -> Result<StatusReport, SessionError> {
        let ctx = self.context(user_id).await?;
        let state = ctx.state.lock().await;
        Ok(StatusReport {
            session: state.session.clone(),
            alert_state: state.alert_state.clone(),
            health: state.health.clone(),
            stats: state.stats.clone(),
            last_verdict: state.last_verdict.clone(),
            last_recommendation: state.last_recommendation.clone(),
            last_delivery: state.last_delivery.clone(),
        })
    }

    /// All sessions, ordered by user
    pub async fn list(&self) -> Vec<MonitoringSession> {
        let contexts: Vec<_> = self
            .sessions
            .read()
            .await
            .values()
            .map(|h| Arc::clone(&h.ctx))
            .collect();

        let mut sessions = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            sessions.push(ctx.state.lock().await.session.clone());
        }
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        sessions
    }

    /// Run one cycle now, under the same guard as scheduled cycles
    pub async fn trigger_cycle(&self, user_id: &str) -> Result<CycleOutcome, SessionError> {
        let (ctx, mut cancel) = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(user_id)
                .ok_or_else(|| SessionError::NoSuchSession(user_id.to_string()))?;
            (Arc::clone(&handle.ctx), handle.cancel.subscribe())
        };

        Ok(run_cycle(&self.monitor, &ctx, &mut cancel).await)
    }

    async fn context(&self, user_id: &str) -> Result<Arc<SessionContext>, SessionError> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|h| Arc::clone(&h.ctx))
            .ok_or_else(|| SessionError::NoSuchSession(user_id.to_string()))
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for handle in self.sessions.get_mut().values() {
            let _ = handle.cancel.send(true);
        }
    }
}
