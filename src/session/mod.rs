//! Session data model and lifecycle
//!
//! The data model mirrors what the external data service stores; the
//! controller owns a session only for as long as it is open in the UI.

pub mod clock;
mod controller;
mod lifecycle;
mod state;

pub use clock::{elapsed_seconds, format_elapsed, SessionClock};
pub use controller::{CompletionNotice, SessionController};
pub use lifecycle::{apply_phase, validate_transition, ControllerPhase, OneShot};
pub use state::{
    AggregateStats, CapturedTarget, DrillConfig, DrillGoal, Session, SessionId, SessionPatch,
    SessionStatus, SessionTotals, ShotQuota, TargetKind,
};
