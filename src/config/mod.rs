//! Engine configuration
//!
//! All tunable constants live here: the watch-start retry policy, capture
//! defaults, scoring weights, and the stale-session warning threshold.
//! Everything has a sensible default; a TOML file can override any subset.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::watch::retry::RetryPolicy;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub watch: WatchConfig,
    pub capture: CaptureConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, filling unset fields with
    /// defaults
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Wrist-device synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Retry policy for the start-command acknowledgement wait
    pub retry: RetryPolicy,
    /// Shot sensitivity forwarded in the start command (0.0 to 1.0)
    pub shot_sensitivity: f32,
    /// Whether the device should auto-detect shots
    pub auto_detect: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            shot_sensitivity: 0.7,
            auto_detect: true,
        }
    }
}

/// Capture-action defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Bullet count requested when no drill constrains the round
    pub default_bullets: u32,
    /// Device-imposed ceiling on bullets per capture request
    pub max_bullets_per_request: u32,
    /// Interval of the elapsed-time ticker
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Sessions left active beyond this threshold are flagged for resolution
    #[serde(with = "humantime_serde")]
    pub stale_session_after: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_bullets: 5,
            max_bullets_per_request: 10,
            tick_interval: Duration::from_secs(1),
            stale_session_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Component weights for one drill goal. Weights need not sum to one;
/// missing components renormalize against the weights that applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub accuracy: f64,
    pub dispersion: f64,
    pub time: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            accuracy: 1.0,
            dispersion: 0.0,
            time: 0.0,
        }
    }
}

/// Goal-dependent scoring weights and normalization references
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub grouping: ScoringWeights,
    pub achievement: ScoringWeights,
    /// Spread (cm) at or beyond which the dispersion component scores zero
    pub reference_spread_cm: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            grouping: ScoringWeights {
                accuracy: 0.4,
                dispersion: 0.5,
                time: 0.1,
            },
            achievement: ScoringWeights {
                accuracy: 0.6,
                dispersion: 0.0,
                time: 0.4,
            },
            reference_spread_cm: 30.0,
        }
    }
}
