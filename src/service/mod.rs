//! Trait boundaries for the engine's external collaborators
//!
//! Durable session state lives behind [`SessionDataService`]; navigation and
//! user confirmation are requests issued through [`Navigator`] and
//! [`SessionPrompter`]. Every method is independently failable and every
//! failure is treated as recoverable by the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{
    AggregateStats, CapturedTarget, DrillGoal, Session, SessionId, SessionPatch,
};

/// Scope of a session-list refresh; team and personal are mutually exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    Team(String),
    Personal(String),
}

/// Remote data service owning the durable copy of sessions
#[async_trait]
pub trait SessionDataService: Send + Sync {
    async fn session(&self, id: &SessionId) -> Result<Session>;

    async fn captured_targets(&self, id: &SessionId) -> Result<Vec<CapturedTarget>>;

    async fn aggregate_stats(&self, id: &SessionId) -> Result<AggregateStats>;

    /// Close the session as completed
    async fn end_session(&self, id: &SessionId) -> Result<()>;

    /// Hard-delete a session that captured nothing
    async fn cancel_session(&self, id: &SessionId) -> Result<()>;

    async fn update_session(&self, id: &SessionId, patch: SessionPatch) -> Result<()>;

    /// Invalidate the team- or personal-scoped session list after a close
    async fn refresh_session_list(&self, scope: ListScope) -> Result<()>;
}

/// Parameters for the capture screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRoute {
    pub session_id: SessionId,
    pub distance_m: Option<u32>,
    /// Whether an active drill locks the capture parameters
    pub locked_by_drill: bool,
    /// Shot ceiling for this capture, `None` when unconstrained
    pub max_shots: Option<u32>,
    pub goal: Option<DrillGoal>,
}

/// Parameters for the results-handoff screen after watch telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsRoute {
    pub session_id: SessionId,
    pub shots: u32,
    pub duration_ms: u64,
    pub distance_m: Option<u32>,
    pub completed: bool,
}

/// Navigation boundary. The engine requests navigation; it never performs it.
pub trait Navigator: Send + Sync {
    fn to_capture(&self, route: CaptureRoute);

    fn to_results(&self, route: ResultsRoute);
}

/// Resolution of the close-without-explicit-end dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureChoice {
    /// End and save the session (offered when targets were captured)
    EndAndSave,
    /// Hard-delete the session (offered when zero targets were captured)
    Cancel,
    /// Leave the session active and navigate away; mutates nothing
    LeaveActive,
    /// Remain on the session screen
    Stay,
}

/// User-confirmation boundary for the end/departure decisions
#[async_trait]
pub trait SessionPrompter: Send + Sync {
    /// Confirm ending the session. The message carries the "end anyway"
    /// phrasing when the drill's requirements are not met.
    async fn confirm_end(&self, message: &str) -> Result<bool>;

    /// Resolve leaving the session screen; `options` lists the choices the
    /// current state allows.
    async fn resolve_departure(
        &self,
        message: &str,
        options: &[DepartureChoice],
    ) -> Result<DepartureChoice>;
}
