//! Session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a practice session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    /// Create from an existing string (ids minted by the data service)
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable session status as the data service records it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

/// What the drill is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillGoal {
    /// Scored primarily on shot dispersion
    Grouping,
    /// Scored primarily on accuracy and time against a threshold
    Achievement,
}

/// Kind of target a capture records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Paper,
    Tactical,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Paper => write!(f, "paper"),
            TargetKind::Tactical => write!(f, "tactical"),
        }
    }
}

/// Shot ceiling per round; `Infinite` means shot count never gates completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotQuota {
    Limited(u32),
    Infinite,
}

impl ShotQuota {
    /// The per-round ceiling, `None` when unconstrained
    pub fn limit(&self) -> Option<u32> {
        match self {
            ShotQuota::Limited(n) => Some(*n),
            ShotQuota::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, ShotQuota::Infinite)
    }
}

/// Immutable description of the practice unit, supplied at session creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillConfig {
    pub goal: DrillGoal,
    pub target_kind: TargetKind,
    pub shots_per_round: ShotQuota,
    pub rounds_required: u32,
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    #[serde(default)]
    pub min_accuracy_pct: Option<u8>,
    #[serde(default)]
    pub par_time_secs: Option<u64>,
}

/// A practice session as the engine sees it while open in the UI.
/// The durable copy is owned by the external data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drill: Option<DrillConfig>,
    #[serde(default)]
    pub watch_controlled: bool,
    #[serde(default)]
    pub distance_m: Option<u32>,
}

impl Session {
    /// Create a fresh active session for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            team_id: None,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            drill: None,
            watch_controlled: false,
            distance_m: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// One completed target/round. Append-only for the life of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedTarget {
    pub sequence: u32,
    pub shots_fired: u32,
    pub hits: u32,
    /// Dispersion measurement, present for paper targets
    #[serde(default)]
    pub dispersion_cm: Option<f64>,
}

/// Aggregate shot statistics as the data service reports them
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_shots: u32,
    pub total_hits: u32,
    #[serde(default)]
    pub mean_dispersion_cm: Option<f64>,
}

/// Current totals the pure calculators consume. Derived from the aggregate
/// stats, the captured-target count, and the clock; never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionTotals {
    pub shots_fired: u32,
    pub hits: u32,
    pub targets_captured: u32,
    pub elapsed_secs: u64,
    pub mean_dispersion_cm: Option<f64>,
}

impl SessionTotals {
    pub fn from_parts(stats: &AggregateStats, targets_captured: u32, elapsed_secs: u64) -> Self {
        Self {
            shots_fired: stats.total_shots,
            hits: stats.total_hits,
            targets_captured,
            elapsed_secs,
            mean_dispersion_cm: stats.mean_dispersion_cm,
        }
    }
}

/// Partial update applied through `SessionDataService::update_session`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_controlled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn watch_controlled(value: bool) -> Self {
        Self {
            watch_controlled: Some(value),
            ..Self::default()
        }
    }
}
