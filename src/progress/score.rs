//! Normalized session scoring
//!
//! Combines accuracy, dispersion, and time performance into a single 0-100
//! composite. Weighting is goal-dependent: grouping drills weight dispersion
//! and accuracy, achievement drills weight accuracy and time against par.
//! Components without data contribute nothing; the remaining weights are
//! renormalized so the composite stays in range.

use serde::Serialize;

use super::accuracy;
use crate::config::{ScoringConfig, ScoringWeights};
use crate::session::{DrillConfig, DrillGoal, SessionTotals};

/// Composite score with its component values, all in 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub overall: f64,
    pub accuracy: f64,
    pub dispersion: Option<f64>,
    pub time: Option<f64>,
}

/// Score the session against its drill. `None` without a drill config.
pub fn score(
    totals: &SessionTotals,
    drill: Option<&DrillConfig>,
    config: &ScoringConfig,
) -> Option<ScoreBreakdown> {
    let drill = drill?;
    let weights: &ScoringWeights = match drill.goal {
        DrillGoal::Grouping => &config.grouping,
        DrillGoal::Achievement => &config.achievement,
    };

    let mut total_score = 0.0;
    let mut total_weight = 0.0;

    let accuracy_score = f64::from(accuracy(totals.shots_fired, totals.hits));
    if weights.accuracy > 0.0 {
        total_score += accuracy_score * weights.accuracy;
        total_weight += weights.accuracy;
    }

    let dispersion_score = if weights.dispersion > 0.0 {
        totals.mean_dispersion_cm.map(|spread| {
            let perf = (1.0 - spread / config.reference_spread_cm).clamp(0.0, 1.0);
            perf * 100.0
        })
    } else {
        None
    };
    if let Some(score) = dispersion_score {
        total_score += score * weights.dispersion;
        total_weight += weights.dispersion;
    }

    let time_score = if weights.time > 0.0 {
        drill.par_time_secs.map(|par| {
            let elapsed = totals.elapsed_secs.max(1) as f64;
            let perf = (par as f64 / elapsed).clamp(0.0, 1.0);
            perf * 100.0
        })
    } else {
        None
    };
    if let Some(score) = time_score {
        total_score += score * weights.time;
        total_weight += weights.time;
    }

    let overall = if total_weight > 0.0 {
        total_score / total_weight
    } else {
        accuracy_score
    };

    Some(ScoreBreakdown {
        overall,
        accuracy: accuracy_score,
        dispersion: dispersion_score,
        time: time_score,
    })
}
