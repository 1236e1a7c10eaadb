//! Controller lifecycle phases with pure transition logic

use serde::Serialize;

use crate::error::{EngineError, Result};

/// Phase of the in-UI session controller.
///
/// `Closed` is terminal; `Cancelled` is a variant terminal reached only when
/// zero targets have been captured. `LoadFailed` is recoverable by reloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Loading,
    LoadFailed,
    Active,
    Ending,
    Closed,
    Cancelled,
}

impl ControllerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerPhase::Closed | ControllerPhase::Cancelled)
    }
}

/// Validate a phase transition
pub fn validate_transition(from: ControllerPhase, to: ControllerPhase) -> Result<()> {
    use ControllerPhase::*;

    let valid = match (from, to) {
        (Loading, Active) => true,
        (Loading, LoadFailed) => true,

        // A failed load may be retried
        (LoadFailed, Loading) => true,

        (Active, Ending) => true,

        // Ending resolves to a terminal state, or back to Active when the
        // data-service call failed and the session must stay clearly open
        (Ending, Closed) => true,
        (Ending, Cancelled) => true,
        (Ending, Active) => true,

        // Same phase is always valid (idempotent)
        (a, b) if a == b => true,

        // Terminal phases never transition
        (Closed, _) => false,
        (Cancelled, _) => false,

        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}

/// Apply a validated phase transition in place
pub fn apply_phase(phase: &mut ControllerPhase, to: ControllerPhase) -> Result<()> {
    validate_transition(*phase, to)?;
    *phase = to;
    Ok(())
}

/// One-shot guard: `Armed -> Fired`, reset deterministically on session change.
///
/// Backs the "drill complete" banner and the "watch already notified" guard so
/// repeated renders or connectivity flaps cannot re-trigger either.
#[derive(Debug, Default, Clone)]
pub struct OneShot {
    fired: bool,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the guard. Returns true only on the first call since reset.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            false
        } else {
            self.fired = true;
            true
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Re-arm the guard
    pub fn reset(&mut self) {
        self.fired = false;
    }
}
