//! Watch synchronization state machine
//!
//! One machine per session: starts capture on the paired device with bounded
//! retry, tracks acknowledgement, deduplicates inbound telemetry, and issues
//! the end-of-session notice. Binding a new session id resets the dedup set
//! and the one-shot start guard so nothing leaks between runs.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::retry::{RetryOutcome, RetryPolicy};
use super::{
    ConnectionState, DeviceChannel, SessionEndPayload, SessionStartPayload, TelemetryKey,
    WatchCommand, WatchTelemetry,
};
use crate::service::ResultsRoute;
use crate::session::{OneShot, SessionId};

/// Protocol state for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Starting,
    Acknowledged,
    /// Recoverable: resolve by retrying or by continuing without the watch
    Failed {
        attempts: u32,
    },
}

/// How a start request resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Device acknowledged within the attempt ceiling
    Acknowledged,
    /// Fire-and-forget send for a session that is not watch-controlled
    Sent,
    /// Attempt ceiling exhausted without acknowledgement
    Failed { attempts: u32 },
    /// The wait was abandoned (view left the session's scope)
    Abandoned,
}

/// Stateful watch-synchronization controller
pub struct WatchSync {
    channel: Arc<dyn DeviceChannel>,
    policy: RetryPolicy,
    state: SyncState,
    start_notified: OneShot,
    seen: HashSet<TelemetryKey>,
    session_id: Option<SessionId>,
}

impl WatchSync {
    pub fn new(channel: Arc<dyn DeviceChannel>, policy: RetryPolicy) -> Self {
        Self {
            channel,
            policy,
            state: SyncState::Idle,
            start_notified: OneShot::new(),
            seen: HashSet::new(),
            session_id: None,
        }
    }

    /// Bind the machine to a session. Switching ids resets the dedup set and
    /// guards so a previous run's telemetry keys cannot leak into this one.
    pub fn bind(&mut self, session_id: &SessionId) {
        if self.session_id.as_ref() == Some(session_id) {
            return;
        }
        debug!(session = %session_id, "binding watch sync to session");
        self.session_id = Some(session_id.clone());
        self.seen.clear();
        self.start_notified.reset();
        self.state = SyncState::Idle;
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.connection_state()
    }

    /// Start capture on the device, once per session.
    ///
    /// Returns `None` when the start was already issued for this session;
    /// connectivity flaps therefore cannot re-trigger it. With
    /// `watch_controlled` false the send is fire-and-forget and no failure
    /// state exists.
    pub async fn start(
        &mut self,
        payload: SessionStartPayload,
        watch_controlled: bool,
        abandoned: Option<watch::Receiver<bool>>,
    ) -> Option<StartOutcome> {
        if !self.start_notified.fire() {
            return None;
        }

        if !watch_controlled {
            if let Err(error) = self
                .channel
                .request(WatchCommand::SessionStart(payload))
                .await
            {
                warn!(%error, "fire-and-forget start send failed");
            }
            return Some(StartOutcome::Sent);
        }

        self.state = SyncState::Starting;
        let channel = Arc::clone(&self.channel);
        let outcome = self
            .policy
            .run(
                move |attempt| {
                    let channel = Arc::clone(&channel);
                    let payload = payload.clone();
                    async move {
                        debug!(attempt = attempt + 1, "requesting watch session start");
                        channel.request(WatchCommand::SessionStart(payload)).await
                    }
                },
                abandoned,
            )
            .await;

        match outcome {
            RetryOutcome::Ok(()) => {
                info!("watch acknowledged session start");
                self.state = SyncState::Acknowledged;
                Some(StartOutcome::Acknowledged)
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(attempts, %last_error, "watch start unacknowledged");
                self.state = SyncState::Failed { attempts };
                Some(StartOutcome::Failed { attempts })
            }
            RetryOutcome::Cancelled => {
                // Re-arm so a later re-entry can attempt a clean start
                self.state = SyncState::Idle;
                self.start_notified.reset();
                Some(StartOutcome::Abandoned)
            }
        }
    }

    /// Re-arm after a failed start so an explicit user retry can run again
    pub fn allow_retry(&mut self) {
        if matches!(self.state, SyncState::Failed { .. }) {
            self.state = SyncState::Idle;
            self.start_notified.reset();
        }
    }

    /// Ingest one telemetry delivery.
    ///
    /// Telemetry for another session is discarded, as is any delivery whose
    /// dedup key was already seen. A fresh key produces exactly one results
    /// handoff.
    pub fn ingest(&mut self, telemetry: WatchTelemetry) -> Option<ResultsRoute> {
        let open = match self.session_id.as_ref() {
            Some(id) => id,
            None => {
                debug!("telemetry arrived with no session bound, discarding");
                return None;
            }
        };
        if &telemetry.session_id != open {
            debug!(
                session = %telemetry.session_id,
                open = %open,
                "discarding telemetry for another session"
            );
            return None;
        }
        if !self.seen.insert(telemetry.key()) {
            debug!(session = %telemetry.session_id, "duplicate telemetry discarded");
            return None;
        }

        Some(ResultsRoute {
            session_id: telemetry.session_id,
            shots: telemetry.shots_recorded,
            duration_ms: telemetry.duration_ms,
            distance_m: telemetry.distance_m,
            completed: telemetry.completed,
        })
    }

    /// Send the end-of-session notice when the device is connected.
    /// Fire-and-forget: local session close never waits on delivery.
    pub async fn notify_end(&self, payload: SessionEndPayload) {
        if self.channel.connection_state() != ConnectionState::Connected {
            debug!("watch disconnected, skipping end notification");
            return;
        }
        if let Err(error) = self
            .channel
            .request(WatchCommand::SessionEnd(payload))
            .await
        {
            warn!(%error, "end notification failed");
        }
    }

    /// Tear down all per-session state so the next session starts from idle
    pub fn reset(&mut self) {
        self.state = SyncState::Idle;
        self.start_notified.reset();
        self.seen.clear();
        self.session_id = None;
    }
}
