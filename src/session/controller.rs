//! Session lifecycle controller
//!
//! The orchestrating state machine for one open session: it loads durable
//! state, ticks elapsed time, watches for drill completion, guards capture
//! requests, drives the watch protocol, and owns the end/cancel/leave-active
//! decision flow. It is the only component in the engine with side effects;
//! everything it derives comes from the pure calculators.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join3;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::clock::{elapsed_seconds, format_elapsed, SessionClock};
use super::lifecycle::{apply_phase, ControllerPhase, OneShot};
use super::state::{
    AggregateStats, CapturedTarget, Session, SessionId, SessionPatch, SessionStatus,
    SessionTotals, TargetKind,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::progress::{score, DrillProgress, NextTargetPlan, ScoreBreakdown};
use crate::service::{
    CaptureRoute, DepartureChoice, ListScope, Navigator, SessionDataService, SessionPrompter,
};
use crate::watch::{
    ConnectionState, DeviceChannel, SessionEndPayload, SessionStartPayload, StartOutcome,
    SyncState, WatchSync, WatchTelemetry,
};

/// One-shot notification raised the first time all drill requirements hold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionNotice {
    pub progress: DrillProgress,
}

/// Orchestrating controller for one open session
pub struct SessionController {
    data: Arc<dyn SessionDataService>,
    navigator: Arc<dyn Navigator>,
    prompter: Arc<dyn SessionPrompter>,
    config: EngineConfig,
    watch: WatchSync,
    /// Flipped true when the view leaves the session's scope; the watch
    /// acknowledgement wait observes it between attempts
    abandon: watch::Sender<bool>,
    phase: ControllerPhase,
    session: Option<Session>,
    targets: Vec<CapturedTarget>,
    stats: AggregateStats,
    clock: Option<SessionClock>,
    completion_shown: OneShot,
}

impl SessionController {
    pub fn new(
        data: Arc<dyn SessionDataService>,
        channel: Arc<dyn DeviceChannel>,
        navigator: Arc<dyn Navigator>,
        prompter: Arc<dyn SessionPrompter>,
        config: EngineConfig,
    ) -> Self {
        let (abandon, _) = watch::channel(false);
        let watch_sync = WatchSync::new(channel, config.watch.retry.clone());
        Self {
            data,
            navigator,
            prompter,
            config,
            watch: watch_sync,
            abandon,
            phase: ControllerPhase::Loading,
            session: None,
            targets: Vec::new(),
            stats: AggregateStats::default(),
            clock: None,
            completion_shown: OneShot::new(),
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn targets(&self) -> &[CapturedTarget] {
        &self.targets
    }

    pub fn watch_state(&self) -> SyncState {
        self.watch.state()
    }

    /// Load session, captured targets, and aggregate stats concurrently.
    ///
    /// Failure leaves the controller in the recoverable `LoadFailed` phase;
    /// calling `load` again retries.
    pub async fn load(&mut self, id: &SessionId) -> Result<()> {
        // Re-entry starts clean: previous clock stopped, abandon re-armed
        self.stop_clock();
        self.abandon.send_replace(false);
        self.phase = ControllerPhase::Loading;

        let loaded = try_join3(
            self.data.session(id),
            self.data.captured_targets(id),
            self.data.aggregate_stats(id),
        )
        .await;

        match loaded {
            Ok((session, targets, stats)) => {
                debug!(session = %session.id, "session loaded");
                self.watch.bind(&session.id);
                self.completion_shown.reset();
                if session.is_open() {
                    self.clock = Some(SessionClock::spawn(
                        session.started_at,
                        self.config.capture.tick_interval,
                    ));
                }
                self.session = Some(session);
                self.targets = targets;
                self.stats = stats;
                apply_phase(&mut self.phase, ControllerPhase::Active)
            }
            Err(err) => {
                error!(session = %id, error = %err, "failed to load session");
                apply_phase(&mut self.phase, ControllerPhase::LoadFailed)?;
                Err(err)
            }
        }
    }

    /// Current totals, with elapsed time derived from the stored start
    /// timestamp
    pub fn totals(&self) -> SessionTotals {
        let elapsed = self
            .clock
            .as_ref()
            .map(|clock| clock.elapsed())
            .or_else(|| {
                self.session
                    .as_ref()
                    .map(|s| elapsed_seconds(s.started_at, Utc::now()))
            })
            .unwrap_or(0);
        SessionTotals::from_parts(&self.stats, self.targets.len() as u32, elapsed)
    }

    pub fn progress(&self) -> DrillProgress {
        let drill = self.session.as_ref().and_then(|s| s.drill.as_ref());
        DrillProgress::evaluate(&self.totals(), drill)
    }

    pub fn plan(&self) -> NextTargetPlan {
        let totals = self.totals();
        let drill = self.session.as_ref().and_then(|s| s.drill.as_ref());
        let progress = DrillProgress::evaluate(&totals, drill);
        NextTargetPlan::plan(&progress, drill, &totals, &self.config.capture)
    }

    pub fn score(&self) -> Option<ScoreBreakdown> {
        let drill = self.session.as_ref().and_then(|s| s.drill.as_ref());
        score(&self.totals(), drill, &self.config.scoring)
    }

    /// Subscribe to elapsed-seconds updates while the session is open
    pub fn elapsed_updates(&self) -> Option<watch::Receiver<u64>> {
        self.clock.as_ref().map(|clock| clock.subscribe())
    }

    /// Apply one completed target to the in-memory view. The durable copy is
    /// written by the capture flow, outside this engine.
    pub fn record_target(&mut self, target: CapturedTarget) -> Option<CompletionNotice> {
        self.stats.total_shots += target.shots_fired;
        self.stats.total_hits += target.hits;
        self.targets.push(target);

        let spreads: Vec<f64> = self
            .targets
            .iter()
            .filter_map(|t| t.dispersion_cm)
            .collect();
        self.stats.mean_dispersion_cm = if spreads.is_empty() {
            None
        } else {
            Some(spreads.iter().sum::<f64>() / spreads.len() as f64)
        };

        self.check_completion()
    }

    /// Raise the one-shot completion notice the first time every drill
    /// requirement holds. Safe to call on every tick or render.
    pub fn check_completion(&mut self) -> Option<CompletionNotice> {
        let progress = self.progress();
        if progress.requirements_met() && self.completion_shown.fire() {
            info!(
                accuracy = progress.accuracy_pct,
                rounds = progress.rounds_satisfied,
                "drill requirements met"
            );
            Some(CompletionNotice { progress })
        } else {
            None
        }
    }

    /// React to a device connection-state change. Only transitions into
    /// `Connected` can (re)issue the start command; the one-shot guard in the
    /// protocol keeps repeated flaps from re-triggering it.
    pub async fn on_connection_change(
        &mut self,
        state: ConnectionState,
    ) -> Result<Option<StartOutcome>> {
        match state {
            ConnectionState::Connected => self.ensure_watch_started().await,
            ConnectionState::Disconnected => Ok(None),
        }
    }

    /// Issue the watch start command once per session
    pub async fn ensure_watch_started(&mut self) -> Result<Option<StartOutcome>> {
        let session = self.session.as_ref().ok_or(EngineError::SessionNotLoaded)?;
        if self.phase != ControllerPhase::Active {
            return Ok(None);
        }

        let payload = SessionStartPayload {
            session_id: session.id.clone(),
            drill_config: session.drill.clone(),
            auto_detect_enabled: self.config.watch.auto_detect,
            shot_sensitivity: self.config.watch.shot_sensitivity,
        };
        let watch_controlled = session.watch_controlled;
        let abandoned = self.abandon.subscribe();

        Ok(self
            .watch
            .start(payload, watch_controlled, Some(abandoned))
            .await)
    }

    /// Explicit user retry after a failed start
    pub async fn retry_watch_start(&mut self) -> Result<Option<StartOutcome>> {
        self.watch.allow_retry();
        self.ensure_watch_started().await
    }

    /// Resolve a failed start by dropping to a session without watch capture.
    /// The flipped flag is persisted so subsequent renders never wait on an
    /// acknowledgement again.
    pub async fn continue_without_watch(&mut self) -> Result<()> {
        let id = self
            .session
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(EngineError::SessionNotLoaded)?;

        self.data
            .update_session(&id, SessionPatch::watch_controlled(false))
            .await?;
        if let Some(session) = self.session.as_mut() {
            session.watch_controlled = false;
        }
        self.watch.allow_retry();
        info!(session = %id, "continuing without watch");
        Ok(())
    }

    /// Ingest one telemetry delivery; returns true when it produced the
    /// results handoff
    pub fn handle_telemetry(&mut self, telemetry: WatchTelemetry) -> bool {
        match self.watch.ingest(telemetry) {
            Some(route) => {
                self.navigator.to_results(route);
                true
            }
            None => false,
        }
    }

    /// Validate and request navigation to the capture screen.
    ///
    /// The drill-limit guard keeps a satisfied drill from starting another
    /// round; the target-kind check rejects an incompatible capture with a
    /// user-facing error rather than silently substituting.
    pub fn request_capture(&mut self, requested: TargetKind) -> Result<CaptureRoute> {
        let session = self.session.as_ref().ok_or(EngineError::SessionNotLoaded)?;
        let plan = {
            let totals = self.totals();
            let drill = session.drill.as_ref();
            let progress = DrillProgress::evaluate(&totals, drill);
            NextTargetPlan::plan(&progress, drill, &totals, &self.config.capture)
        };

        if let Some(drill) = session.drill.as_ref() {
            if plan.drill_limit_reached {
                return Err(EngineError::DrillSatisfied);
            }
            if drill.target_kind != requested {
                return Err(EngineError::CaptureMismatch {
                    required: drill.target_kind,
                    requested,
                });
            }
        }

        let route = CaptureRoute {
            session_id: session.id.clone(),
            distance_m: session.distance_m,
            locked_by_drill: session.drill.is_some(),
            max_shots: session
                .drill
                .as_ref()
                .and_then(|d| d.shots_per_round.limit()),
            goal: session.drill.as_ref().map(|d| d.goal),
        };
        self.navigator.to_capture(route.clone());
        Ok(route)
    }

    /// End the session after explicit user confirmation.
    ///
    /// Returns false when the user declines. The confirmation phrasing
    /// switches to "end anyway" when the drill's requirements are not met.
    pub async fn end_session(&mut self) -> Result<bool> {
        if self.session.is_none() {
            return Err(EngineError::SessionNotLoaded);
        }
        let progress = self.progress();
        let totals = self.totals();

        let message = if progress.requirements_met() {
            format!(
                "End this session? {} targets captured in {}.",
                totals.targets_captured,
                format_elapsed(totals.elapsed_secs)
            )
        } else {
            "The drill requirements are not met yet. End this session anyway?".to_string()
        };

        if !self.prompter.confirm_end(&message).await? {
            debug!("end declined by user");
            return Ok(false);
        }

        self.complete_end().await?;
        Ok(true)
    }

    /// Resolve leaving the session screen without an explicit end.
    ///
    /// With captured targets the choices are end & save, leave active, or
    /// stay; with zero targets the session may instead be cancelled (hard
    /// delete). Leaving active never mutates durable state.
    pub async fn resolve_departure(&mut self) -> Result<DepartureChoice> {
        if self.session.is_none() {
            return Err(EngineError::SessionNotLoaded);
        }
        let has_targets = !self.targets.is_empty();
        let stale_hint = format_elapsed(self.config.capture.stale_session_after.as_secs());

        let (message, options) = if has_targets {
            (
                format!(
                    "Leave this session? You can end and save it now, or leave it \
                     active. Sessions left active longer than {stale_hint} will \
                     need to be resolved later."
                ),
                vec![
                    DepartureChoice::EndAndSave,
                    DepartureChoice::LeaveActive,
                    DepartureChoice::Stay,
                ],
            )
        } else {
            (
                format!(
                    "No targets captured yet. Cancel this session, or leave it \
                     active? Sessions left active longer than {stale_hint} will \
                     need to be resolved later."
                ),
                vec![
                    DepartureChoice::Cancel,
                    DepartureChoice::LeaveActive,
                    DepartureChoice::Stay,
                ],
            )
        };

        let choice = self.prompter.resolve_departure(&message, &options).await?;
        if !options.contains(&choice) {
            warn!(?choice, "prompter returned an option that was not offered");
            return Ok(DepartureChoice::Stay);
        }

        match choice {
            DepartureChoice::EndAndSave => self.complete_end().await?,
            DepartureChoice::Cancel => self.complete_cancel().await?,
            DepartureChoice::LeaveActive => {
                info!("leaving session active");
                self.teardown();
            }
            DepartureChoice::Stay => {}
        }
        Ok(choice)
    }

    /// Tear down per-session resources when the view leaves the session's
    /// scope: the ticker stops, any acknowledgement wait is abandoned, and
    /// the one-shot guards re-arm so a later re-entry starts clean.
    pub fn teardown(&mut self) {
        self.abandon.send_replace(true);
        self.stop_clock();
        self.watch.reset();
        self.completion_shown.reset();
    }

    async fn complete_end(&mut self) -> Result<()> {
        let (id, scope) = self.close_identifiers()?;
        apply_phase(&mut self.phase, ControllerPhase::Ending)?;

        if let Err(err) = self.data.end_session(&id).await {
            error!(session = %id, error = %err, "failed to end session");
            // The session is clearly still active
            apply_phase(&mut self.phase, ControllerPhase::Active)?;
            return Err(err);
        }

        let totals = self.totals();
        self.watch
            .notify_end(SessionEndPayload {
                session_id: id.clone(),
                duration_secs: totals.elapsed_secs,
                targets_count: totals.targets_captured,
                accuracy_pct: crate::progress::accuracy(totals.shots_fired, totals.hits),
            })
            .await;

        if let Err(err) = self.data.refresh_session_list(scope).await {
            // The close is already durable; a stale list is recoverable
            warn!(session = %id, error = %err, "session list refresh failed");
        }

        if let Some(session) = self.session.as_mut() {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
        }
        self.stop_clock();
        apply_phase(&mut self.phase, ControllerPhase::Closed)?;
        info!(session = %id, "session ended");
        Ok(())
    }

    async fn complete_cancel(&mut self) -> Result<()> {
        let (id, scope) = self.close_identifiers()?;
        apply_phase(&mut self.phase, ControllerPhase::Ending)?;

        if let Err(err) = self.data.cancel_session(&id).await {
            error!(session = %id, error = %err, "failed to cancel session");
            apply_phase(&mut self.phase, ControllerPhase::Active)?;
            return Err(err);
        }

        if let Err(err) = self.data.refresh_session_list(scope).await {
            warn!(session = %id, error = %err, "session list refresh failed");
        }

        if let Some(session) = self.session.as_mut() {
            session.status = SessionStatus::Cancelled;
            session.ended_at = Some(Utc::now());
        }
        self.stop_clock();
        apply_phase(&mut self.phase, ControllerPhase::Cancelled)?;
        info!(session = %id, "session cancelled");
        Ok(())
    }

    fn close_identifiers(&self) -> Result<(SessionId, ListScope)> {
        let session = self.session.as_ref().ok_or(EngineError::SessionNotLoaded)?;
        let scope = match session.team_id.as_ref() {
            Some(team) => ListScope::Team(team.clone()),
            None => ListScope::Personal(session.user_id.clone()),
        };
        Ok((session.id.clone(), scope))
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DrillConfig, DrillGoal, ShotQuota};
    use crate::testing::mocks::{
        MockDataService, MockDeviceChannel, MockNavigator, MockPrompter,
    };

    fn drill() -> DrillConfig {
        DrillConfig {
            goal: DrillGoal::Achievement,
            target_kind: TargetKind::Tactical,
            shots_per_round: ShotQuota::Limited(5),
            rounds_required: 3,
            time_limit_secs: None,
            min_accuracy_pct: Some(70),
            par_time_secs: None,
        }
    }

    fn target(sequence: u32, shots: u32, hits: u32) -> CapturedTarget {
        CapturedTarget {
            sequence,
            shots_fired: shots,
            hits,
            dispersion_cm: None,
        }
    }

    struct Harness {
        data: Arc<MockDataService>,
        channel: Arc<MockDeviceChannel>,
        navigator: Arc<MockNavigator>,
        prompter: Arc<MockPrompter>,
        controller: SessionController,
    }

    fn harness(session: Session) -> Harness {
        let data = Arc::new(MockDataService::new().with_session(session));
        let channel = Arc::new(MockDeviceChannel::new());
        let navigator = Arc::new(MockNavigator::new());
        let prompter = Arc::new(MockPrompter::new());
        let controller = SessionController::new(
            data.clone(),
            channel.clone(),
            navigator.clone(),
            prompter.clone(),
            EngineConfig::default(),
        );
        Harness {
            data,
            channel,
            navigator,
            prompter,
            controller,
        }
    }

    fn session_with_drill() -> Session {
        Session {
            drill: Some(drill()),
            ..Session::new("shooter-1")
        }
    }

    #[tokio::test]
    async fn load_failure_is_recoverable() {
        let session = session_with_drill();
        let id = session.id.clone();
        let h = harness(session);
        h.data.fail_next("session");

        let mut controller = h.controller;
        assert!(controller.load(&id).await.is_err());
        assert_eq!(controller.phase(), ControllerPhase::LoadFailed);

        // Retry succeeds once the service recovers
        controller.load(&id).await.unwrap();
        assert_eq!(controller.phase(), ControllerPhase::Active);
    }

    #[tokio::test]
    async fn completion_notice_fires_once() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        assert!(h.controller.record_target(target(1, 5, 4)).is_none());
        assert!(h.controller.record_target(target(2, 5, 3)).is_none());
        let notice = h.controller.record_target(target(3, 5, 4));
        assert!(notice.is_some());
        assert!(notice.unwrap().progress.requirements_met());

        // Re-checking does not re-fire
        assert!(h.controller.check_completion().is_none());
    }

    #[tokio::test]
    async fn capture_guards() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        // Wrong target kind rejected with a typed error
        let err = h
            .controller
            .request_capture(TargetKind::Paper)
            .unwrap_err();
        assert!(matches!(err, EngineError::CaptureMismatch { .. }));

        // Compatible kind navigates
        let route = h.controller.request_capture(TargetKind::Tactical).unwrap();
        assert_eq!(route.max_shots, Some(5));
        assert!(route.locked_by_drill);
        assert_eq!(h.navigator.capture_routes().len(), 1);

        // A satisfied drill blocks further captures
        for i in 1..=3 {
            h.controller.record_target(target(i, 5, 5));
        }
        let err = h
            .controller
            .request_capture(TargetKind::Tactical)
            .unwrap_err();
        assert!(matches!(err, EngineError::DrillSatisfied));
    }

    #[tokio::test]
    async fn end_prompt_uses_end_anyway_phrasing_when_unmet() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        // 6/15 hits: complete but under the accuracy floor
        for i in 1..=3 {
            h.controller.record_target(target(i, 5, 2));
        }
        h.prompter.push_confirmation(false);
        assert!(!h.controller.end_session().await.unwrap());

        let messages = h.prompter.messages();
        assert!(messages[0].contains("anyway"));
        // Declining leaves the session clearly active
        assert_eq!(h.controller.phase(), ControllerPhase::Active);
    }

    #[tokio::test]
    async fn declined_end_changes_nothing() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        h.prompter.push_confirmation(false);
        assert!(!h.controller.end_session().await.unwrap());
        assert!(h.data.ended_sessions().is_empty());
        assert_eq!(h.controller.phase(), ControllerPhase::Active);
    }

    #[tokio::test]
    async fn failed_end_returns_to_active() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        h.prompter.push_confirmation(true);
        h.data.fail_next("end_session");
        assert!(h.controller.end_session().await.is_err());
        assert_eq!(h.controller.phase(), ControllerPhase::Active);
        assert_eq!(
            h.controller.session().unwrap().status,
            SessionStatus::Active
        );
    }

    #[tokio::test]
    async fn team_session_refreshes_team_scope() {
        let session = Session {
            team_id: Some("team-7".to_string()),
            ..session_with_drill()
        };
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        h.prompter.push_confirmation(true);
        assert!(h.controller.end_session().await.unwrap());

        let scopes = h.data.refreshed_scopes();
        assert_eq!(scopes, vec![ListScope::Team("team-7".to_string())]);
        assert_eq!(h.controller.phase(), ControllerPhase::Closed);
        // Watch got the end notice while connected
        assert_eq!(h.channel.sent_commands().len(), 1);
    }

    #[tokio::test]
    async fn zero_target_departure_offers_cancel() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        h.prompter.push_departure(DepartureChoice::Cancel);
        let choice = h.controller.resolve_departure().await.unwrap();
        assert_eq!(choice, DepartureChoice::Cancel);
        assert_eq!(h.controller.phase(), ControllerPhase::Cancelled);
        assert_eq!(h.data.cancelled_sessions(), vec![id]);

        let (_, options) = h.prompter.last_departure_prompt().unwrap();
        assert!(options.contains(&DepartureChoice::Cancel));
        assert!(!options.contains(&DepartureChoice::EndAndSave));
    }

    #[tokio::test]
    async fn departure_with_targets_offers_end_and_save() {
        let session = session_with_drill();
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();
        h.controller.record_target(target(1, 5, 4));

        h.prompter.push_departure(DepartureChoice::LeaveActive);
        let choice = h.controller.resolve_departure().await.unwrap();
        assert_eq!(choice, DepartureChoice::LeaveActive);

        let (_, options) = h.prompter.last_departure_prompt().unwrap();
        assert!(options.contains(&DepartureChoice::EndAndSave));
        assert!(!options.contains(&DepartureChoice::Cancel));

        // Leaving active mutates nothing durable
        assert!(h.data.ended_sessions().is_empty());
        assert!(h.data.cancelled_sessions().is_empty());
    }

    #[tokio::test]
    async fn telemetry_routes_once() {
        let session = Session {
            watch_controlled: true,
            ..session_with_drill()
        };
        let id = session.id.clone();
        let mut h = harness(session);
        h.controller.load(&id).await.unwrap();

        let telemetry = WatchTelemetry {
            session_id: id,
            shots_recorded: 15,
            duration_ms: 60_000,
            distance_m: Some(15),
            completed: true,
        };
        assert!(h.controller.handle_telemetry(telemetry.clone()));
        assert!(!h.controller.handle_telemetry(telemetry));
        assert_eq!(h.navigator.results_routes().len(), 1);
    }
}
