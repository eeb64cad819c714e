//! Monitoring cycle

use alerting::{AlertState, AlertStateMachine};
use analysis_pipeline::{AnalysisPipeline, RecommendationEngine};
use chrono::Utc;
use health_model::{AlertEvent, DeliveryReport, Recommendation, Verdict, VerdictSource};
use notification_dispatcher::NotificationDispatcher;
use reading_aggregator::ReadingAggregator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::Repository;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::session::{CycleOutcome, CycleStats, Health, MonitoringSession, SessionStatus};

/// Components shared by every session
pub struct Monitor {
    pub aggregator: ReadingAggregator,
    pub pipeline: AnalysisPipeline,
    pub dispatcher: NotificationDispatcher,
    pub recommender: RecommendationEngine,
    pub repository: Arc<Repository>,
}

impl Monitor {
    pub fn new(
        aggregator: ReadingAggregator,
        pipeline: AnalysisPipeline,
        dispatcher: NotificationDispatcher,
        repository: Arc<Repository>,
    ) -> Self {
        Self {
            aggregator,
            pipeline,
            dispatcher,
            recommender: RecommendationEngine::new(),
            repository,
        }
    }
}

/// Mutable per-session state, committed once per cycle
pub(crate) struct SessionState {
    pub session: MonitoringSession,
    /// Rebuilt when the session's alert config is updated
    pub machine: AlertStateMachine,
    pub alert_state: AlertState,
    pub health: Health,
    pub stats: CycleStats,
    pub last_verdict: Option<Verdict>,
    pub last_recommendation: Option<Recommendation>,
    pub last_delivery: Option<DeliveryReport>,
}

pub(crate) struct SessionContext {
    pub user_id: String,
    pub state: Mutex<SessionState>,
    /// Held for the duration of a cycle
    cycle_guard: Arc<Mutex<()>>,
    next_cycle_id: AtomicU64,
    reports: mpsc::Sender<DeliveryReport>,
}

impl SessionContext {
    pub fn new(
        session: MonitoringSession,
        reports: mpsc::Sender<DeliveryReport>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: session.user_id.clone(),
            state: Mutex::new(SessionState {
                machine: AlertStateMachine::new(session.config.alert.clone()),
                session,
                alert_state: AlertState::new(now),
                health: Health::Healthy,
                stats: CycleStats::default(),
                last_verdict: None,
                last_recommendation: None,
                last_delivery: None,
            }),
            cycle_guard: Arc::new(Mutex::new(())),
            next_cycle_id: AtomicU64::new(0),
            reports,
        }
    }
}

/// Resolves once the session is cancelled or its controller is gone
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

fn new_ticker(start_delay: Duration, poll_interval: Duration) -> Interval {
    let start = Instant::now()
        .checked_add(start_delay)
        .unwrap_or_else(Instant::now);
    let mut ticker = interval_at(start, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Session task: ticks, runs cycles, and collects delivery reports until cancelled.
///
/// A new value on `schedule` replaces the poll interval; the next tick is
/// one full interval later.
pub(crate) async fn run_session(
    monitor: Arc<Monitor>,
    ctx: Arc<SessionContext>,
    mut cancel: watch::Receiver<bool>,
    mut reports: mpsc::Receiver<DeliveryReport>,
    mut schedule: watch::Receiver<Duration>,
    start_delay: Duration,
) {
    let poll_interval = *schedule.borrow_and_update();
    let mut ticker = new_ticker(start_delay, poll_interval);
    info!(user_id = %ctx.user_id, "Session task started (interval={:?})", poll_interval);

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            Some(report) = reports.recv() => record_delivery(&monitor, &ctx, report).await,
            Ok(()) = schedule.changed() => {
                let poll_interval = *schedule.borrow_and_update();
                ticker = new_ticker(poll_interval, poll_interval);
                info!(user_id = %ctx.user_id, "Schedule changed (interval={:?})", poll_interval);
            }
            _ = ticker.tick() => {
                run_cycle(&monitor, &ctx, &mut cancel).await;
            }
        }
    }

    info!(user_id = %ctx.user_id, "Session task stopped");
}

async fn record_delivery(monitor: &Monitor, ctx: &SessionContext, report: DeliveryReport) {
    if let Err(e) = monitor.repository.record_delivery(&report) {
        warn!(user_id = %ctx.user_id, "Failed to store delivery report: {}", e);
    }
    ctx.state.lock().await.last_delivery = Some(report);
}

/// Run one cycle under the session's cycle guard
pub(crate) async fn run_cycle(
    monitor: &Arc<Monitor>,
    ctx: &Arc<SessionContext>,
    cancel: &mut watch::Receiver<bool>,
) -> CycleOutcome {
    let outcome = execute(monitor, ctx, cancel).await;
    metrics::counter!("sentinel_cycles_total", "result" => outcome.label()).increment(1);
    outcome
}

async fn execute(
    monitor: &Arc<Monitor>,
    ctx: &Arc<SessionContext>,
    cancel: &mut watch::Receiver<bool>,
) -> CycleOutcome {
    let user_id = ctx.user_id.as_str();

    let Ok(_guard) = Arc::clone(&ctx.cycle_guard).try_lock_owned() else {
        warn!(user_id, "Previous cycle still running, skipping");
        ctx.state.lock().await.stats.skipped += 1;
        return CycleOutcome::Skipped;
    };

    let profile = {
        let state = ctx.state.lock().await;
        if state.session.status != SessionStatus::Active {
            debug!(user_id, "Session paused, skipping");
            return CycleOutcome::Skipped;
        }
        state.session.profile.clone()
    };

    let cycle_id = ctx.next_cycle_id.fetch_add(1, Ordering::Relaxed) + 1;
    let since = monitor.aggregator.window_start(Utc::now());

    let snapshot = tokio::select! {
        biased;
        _ = cancelled(cancel) => return CycleOutcome::Cancelled { cycle_id },
        snapshot = monitor.aggregator.collect(user_id, cycle_id, since) => snapshot,
    };

    if snapshot.empty {
        let mut state = ctx.state.lock().await;
        state.stats.no_evidence += 1;
        mark_cycle(&mut state.session);
        info!(user_id, cycle_id, "No current readings, holding alert state");
        return CycleOutcome::NoEvidence { cycle_id };
    }

    let result = tokio::select! {
        biased;
        _ = cancelled(cancel) => return CycleOutcome::Cancelled { cycle_id },
        result = monitor.pipeline.evaluate(&snapshot, &profile) => result,
    };

    let verdict = match result {
        Ok(verdict) => verdict,
        Err(e) => {
            error!(user_id, cycle_id, "Cycle failed: {}", e);
            let reason = e.to_string();
            let mut state = ctx.state.lock().await;
            state.health = Health::Degraded {
                reason: reason.clone(),
            };
            state.stats.failed += 1;
            mark_cycle(&mut state.session);
            return CycleOutcome::Failed { cycle_id, reason };
        }
    };

    let recommendation = monitor.recommender.recommend(&snapshot, &profile, &verdict);

    let transition = {
        let mut state = ctx.state.lock().await;
        if *cancel.borrow() {
            return CycleOutcome::Cancelled { cycle_id };
        }

        let transition = state
            .machine
            .evaluate(&state.alert_state, &verdict, user_id, Utc::now());

        state.alert_state = transition.state.clone();
        state.health = Health::Healthy;
        state.stats.completed += 1;
        if verdict.source == VerdictSource::FallbackRule {
            state.stats.oracle_fallbacks += 1;
        }
        if transition.event.is_some() {
            state.stats.alerts_emitted += 1;
        }
        state.last_verdict = Some(verdict);
        state.last_recommendation = Some(recommendation.clone());
        mark_cycle(&mut state.session);
        transition
    };

    debug!(
        user_id,
        cycle_id,
        "Cycle complete: {:?} at {}",
        transition.kind,
        transition.state.current_severity
    );

    let alert_id = transition.event.as_ref().map(|e| e.id);
    if let Some(event) = transition.event {
        metrics::counter!("sentinel_alerts_total", "severity" => event.severity.as_str())
            .increment(1);
        if let Err(e) = monitor
            .repository
            .record_alert(&event, &snapshot, Some(&recommendation))
        {
            warn!(user_id, cycle_id, "Failed to store alert: {}", e);
        }
        spawn_dispatch(Arc::clone(monitor), ctx.reports.clone(), cancel.clone(), event);
    }

    CycleOutcome::Completed {
        cycle_id,
        severity: transition.state.current_severity,
        transition: transition.kind,
        alert_id,
    }
}

fn mark_cycle(session: &mut MonitoringSession) {
    session.last_cycle_at = Some(Utc::now());
    session.cycle_count += 1;
}

/// Deliver an alert without holding up the cycle.
///
/// Stopping the session abandons the delivery: outstanding sends and
/// retries are aborted and no report is recorded.
fn spawn_dispatch(
    monitor: Arc<Monitor>,
    reports: mpsc::Sender<DeliveryReport>,
    mut cancel: watch::Receiver<bool>,
    event: AlertEvent,
) {
    tokio::spawn(async move {
        let result = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                info!(user_id = %event.user_id, "Session stopped, abandoning delivery of alert {}", event.id);
                return;
            }
            result = monitor.dispatcher.dispatch(&event) => result,
        };

        match result {
            Ok(report) => {
                if let Err(mpsc::error::SendError(report)) = reports.send(report).await {
                    // Session already stopped
                    if let Err(e) = monitor.repository.record_delivery(&report) {
                        warn!(user_id = %event.user_id, "Failed to store delivery report: {}", e);
                    }
                }
            }
            Err(e) => warn!(user_id = %event.user_id, "Dispatch skipped: {}", e),
        }
    });
}
