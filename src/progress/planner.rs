//! Next-target planning
//!
//! Computes how many targets and shots remain and the parameters for the next
//! capture action. `remaining_targets == Some(0)` is the explicit "drill
//! satisfied" signal the capture-route guards consume.

use serde::Serialize;

use super::DrillProgress;
use crate::config::CaptureConfig;
use crate::session::{DrillConfig, SessionTotals, ShotQuota};

/// Derived capture plan, recomputed on every render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextTargetPlan {
    /// Rounds left to capture; `None` when no drill constrains the session
    pub remaining_targets: Option<u32>,
    /// Shots left against the current round's quota; `None` when unconstrained
    pub remaining_shots: Option<u32>,
    /// Bullet count to request for the next capture action
    pub next_bullets: u32,
    /// Flow guard checked before a new capture action may start
    pub drill_limit_reached: bool,
}

impl NextTargetPlan {
    /// Plan the next capture from the current progress and totals.
    ///
    /// Must be fed the `DrillProgress` evaluated from the same totals; both
    /// views share the rounds-satisfied computation, which keeps
    /// `remaining_targets == Some(0)` equivalent to `is_complete`.
    pub fn plan(
        progress: &DrillProgress,
        drill: Option<&DrillConfig>,
        totals: &SessionTotals,
        capture: &CaptureConfig,
    ) -> Self {
        let Some(drill) = drill else {
            return Self {
                remaining_targets: None,
                remaining_shots: None,
                next_bullets: capture.default_bullets,
                drill_limit_reached: false,
            };
        };

        let remaining_targets = drill
            .rounds_required
            .saturating_sub(progress.rounds_satisfied);

        let remaining_shots = match drill.shots_per_round {
            ShotQuota::Infinite => None,
            ShotQuota::Limited(per_round) => {
                let consumed = progress.rounds_satisfied.saturating_mul(per_round);
                let in_round = totals.shots_fired.saturating_sub(consumed);
                Some(per_round.saturating_sub(in_round))
            }
        };

        let next_bullets = match drill.shots_per_round {
            ShotQuota::Limited(n) if n > 0 => n.min(capture.max_bullets_per_request),
            _ => capture.default_bullets,
        };

        Self {
            remaining_targets: Some(remaining_targets),
            remaining_shots,
            next_bullets,
            drill_limit_reached: remaining_targets == 0,
        }
    }
}
