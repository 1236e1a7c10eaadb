//! Pure progress calculation for drill sessions
//!
//! Everything in this module is referentially transparent: progress and plans
//! are functions of the current totals, never independently settable fields.
//! Missing or zero denominators are guarded, not raised.

mod planner;
mod score;

pub use planner::NextTargetPlan;
pub use score::{score, ScoreBreakdown};

use serde::Serialize;

use crate::session::{DrillConfig, SessionTotals, ShotQuota};

/// Hit percentage rounded to the nearest whole percent, `0` when no shots
/// have been fired.
pub fn accuracy(shots: u32, hits: u32) -> u8 {
    if shots == 0 {
        return 0;
    }
    let pct = (f64::from(hits) * 100.0 / f64::from(shots)).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Number of rounds the shooter has fully satisfied.
///
/// The captured-target count is further limited by whole quota multiples of
/// shots fired, so a round captured short of its quota does not count. Both
/// `DrillProgress::is_complete` and the planner's remaining-target count
/// derive from this single computation and therefore cannot disagree.
pub(crate) fn rounds_satisfied(totals: &SessionTotals, drill: &DrillConfig) -> u32 {
    match drill.shots_per_round {
        ShotQuota::Infinite => totals.targets_captured,
        ShotQuota::Limited(per_round) if per_round > 0 => {
            totals.targets_captured.min(totals.shots_fired / per_round)
        }
        ShotQuota::Limited(_) => totals.targets_captured,
    }
}

/// Derived completion view, recomputed on every update and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrillProgress {
    /// Shot/target quota reached
    pub is_complete: bool,
    /// Accuracy floor met (true when none is configured)
    pub meets_accuracy: bool,
    /// Elapsed time within the limit (informational; never blocks ending)
    pub meets_time: bool,
    pub accuracy_pct: u8,
    pub rounds_satisfied: u32,
    pub elapsed_secs: u64,
}

impl DrillProgress {
    /// Evaluate progress against an optional drill.
    ///
    /// Without a drill config nothing gates the session: only an explicit
    /// end-session action closes it, so `is_complete` stays false while the
    /// accuracy and time flags hold vacuously.
    pub fn evaluate(totals: &SessionTotals, drill: Option<&DrillConfig>) -> Self {
        let accuracy_pct = accuracy(totals.shots_fired, totals.hits);

        let Some(drill) = drill else {
            return Self {
                is_complete: false,
                meets_accuracy: true,
                meets_time: true,
                accuracy_pct,
                rounds_satisfied: totals.targets_captured,
                elapsed_secs: totals.elapsed_secs,
            };
        };

        let satisfied = rounds_satisfied(totals, drill);
        Self {
            is_complete: satisfied >= drill.rounds_required,
            meets_accuracy: drill
                .min_accuracy_pct
                .map_or(true, |floor| accuracy_pct >= floor),
            meets_time: drill
                .time_limit_secs
                .map_or(true, |limit| totals.elapsed_secs <= limit),
            accuracy_pct,
            rounds_satisfied: satisfied,
            elapsed_secs: totals.elapsed_secs,
        }
    }

    /// All three requirement flags hold
    pub fn requirements_met(&self) -> bool {
        self.is_complete && self.meets_accuracy && self.meets_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DrillGoal, TargetKind};

    fn drill(shots: ShotQuota, rounds: u32) -> DrillConfig {
        DrillConfig {
            goal: DrillGoal::Achievement,
            target_kind: TargetKind::Tactical,
            shots_per_round: shots,
            rounds_required: rounds,
            time_limit_secs: None,
            min_accuracy_pct: None,
            par_time_secs: None,
        }
    }

    fn totals(shots: u32, hits: u32, targets: u32, elapsed: u64) -> SessionTotals {
        SessionTotals {
            shots_fired: shots,
            hits,
            targets_captured: targets,
            elapsed_secs: elapsed,
            mean_dispersion_cm: None,
        }
    }

    #[test]
    fn accuracy_is_total_order_safe() {
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(accuracy(0, 7), 0);
        assert_eq!(accuracy(10, 0), 0);
        assert_eq!(accuracy(10, 10), 100);
        assert_eq!(accuracy(15, 12), 80);
        assert_eq!(accuracy(3, 2), 67);
        // Hits above shots still clamp into range
        assert_eq!(accuracy(5, 50), 100);
    }

    #[test]
    fn achievement_scenario_met() {
        // 3 rounds of 5 shots, hits [4, 3, 4] => 12/15 = 80%
        let d = DrillConfig {
            min_accuracy_pct: Some(70),
            ..drill(ShotQuota::Limited(5), 3)
        };
        let progress = DrillProgress::evaluate(&totals(15, 12, 3, 60), Some(&d));
        assert!(progress.is_complete);
        assert!(progress.meets_accuracy);
        assert!(progress.meets_time);
        assert_eq!(progress.accuracy_pct, 80);
        assert!(progress.requirements_met());
    }

    #[test]
    fn achievement_scenario_accuracy_unmet() {
        // Same drill, hits [2, 2, 2] => 6/15 = 40%
        let d = DrillConfig {
            min_accuracy_pct: Some(70),
            ..drill(ShotQuota::Limited(5), 3)
        };
        let progress = DrillProgress::evaluate(&totals(15, 6, 3, 60), Some(&d));
        assert!(progress.is_complete);
        assert!(!progress.meets_accuracy);
        assert!(!progress.requirements_met());
    }

    #[test]
    fn short_fired_round_does_not_count() {
        // 3 targets captured but only 9 shots against a 5-shot quota
        let d = drill(ShotQuota::Limited(5), 3);
        let progress = DrillProgress::evaluate(&totals(9, 9, 3, 60), Some(&d));
        assert_eq!(progress.rounds_satisfied, 1);
        assert!(!progress.is_complete);
    }

    #[test]
    fn infinite_quota_gates_on_rounds_only() {
        let d = drill(ShotQuota::Infinite, 2);
        let progress = DrillProgress::evaluate(&totals(137, 90, 2, 60), Some(&d));
        assert!(progress.is_complete);

        let progress = DrillProgress::evaluate(&totals(137, 90, 1, 60), Some(&d));
        assert!(!progress.is_complete);
    }

    #[test]
    fn no_drill_never_completes() {
        let progress = DrillProgress::evaluate(&totals(100, 80, 10, 600), None);
        assert!(!progress.is_complete);
        assert!(progress.meets_accuracy);
        assert!(progress.meets_time);
        assert_eq!(progress.accuracy_pct, 80);
    }

    #[test]
    fn over_time_flags_but_nothing_else() {
        let d = DrillConfig {
            time_limit_secs: Some(30),
            ..drill(ShotQuota::Limited(5), 1)
        };
        let progress = DrillProgress::evaluate(&totals(5, 5, 1, 45), Some(&d));
        assert!(progress.is_complete);
        assert!(!progress.meets_time);
    }

    #[test]
    fn completion_is_stable_under_noop_updates() {
        let d = DrillConfig {
            min_accuracy_pct: Some(50),
            ..drill(ShotQuota::Limited(5), 2)
        };
        let t = totals(10, 8, 2, 40);
        let first = DrillProgress::evaluate(&t, Some(&d));
        let second = DrillProgress::evaluate(&t, Some(&d));
        assert!(first.requirements_met());
        assert_eq!(first, second);
    }

    #[test]
    fn zero_quota_falls_back_to_capture_count() {
        let d = drill(ShotQuota::Limited(0), 2);
        let progress = DrillProgress::evaluate(&totals(0, 0, 2, 10), Some(&d));
        assert!(progress.is_complete);
    }
}
