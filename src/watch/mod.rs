//! Wrist-device channel boundary
//!
//! The engine assumes a request/response channel with a paired watch: named
//! outbound events with JSON-serializable payloads, a broadcast stream of
//! inbound telemetry, and an externally owned connection state. Pairing and
//! low-level framing live outside this crate.

pub mod retry;
pub mod sync;

pub use sync::{StartOutcome, SyncState, WatchSync};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::{DrillConfig, SessionId};

/// Connection state of the device channel, owned by the transport layer.
/// The engine only reacts to transitions into `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Failures the device channel can surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("watch is not connected")]
    Disconnected,

    #[error("start command was not acknowledged")]
    Unacknowledged,

    #[error("watch transport error: {0}")]
    Transport(String),
}

/// Outbound start command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    pub session_id: SessionId,
    pub drill_config: Option<DrillConfig>,
    pub auto_detect_enabled: bool,
    pub shot_sensitivity: f32,
}

/// Outbound end-of-session notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndPayload {
    pub session_id: SessionId,
    #[serde(rename = "duration")]
    pub duration_secs: u64,
    pub targets_count: u32,
    #[serde(rename = "accuracy")]
    pub accuracy_pct: u8,
}

/// Inbound telemetry from the device. Channels may redeliver; handling is
/// idempotent per [`TelemetryKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchTelemetry {
    pub session_id: SessionId,
    pub shots_recorded: u32,
    pub duration_ms: u64,
    #[serde(rename = "distance")]
    pub distance_m: Option<u32>,
    pub completed: bool,
}

impl WatchTelemetry {
    /// Dedup key for exactly-once handling
    pub fn key(&self) -> TelemetryKey {
        TelemetryKey {
            session_id: self.session_id.clone(),
            shots_recorded: self.shots_recorded,
            duration_ms: self.duration_ms,
        }
    }
}

/// Identity of one telemetry delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TelemetryKey {
    pub session_id: SessionId,
    pub shots_recorded: u32,
    pub duration_ms: u64,
}

/// Named outbound events as the wire sees them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WatchCommand {
    #[serde(rename = "SESSION_START")]
    SessionStart(SessionStartPayload),
    #[serde(rename = "SESSION_END")]
    SessionEnd(SessionEndPayload),
}

/// Request/response channel to the paired device.
///
/// For `SessionStart` an `Ok` return means the device acknowledged the
/// command; for `SessionEnd` delivery is best effort and implementations may
/// return immediately.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn request(&self, command: WatchCommand) -> Result<(), WatchError>;

    fn connection_state(&self) -> ConnectionState;

    /// Subscribe to inbound telemetry. Dropping the receiver unsubscribes.
    fn telemetry(&self) -> broadcast::Receiver<WatchTelemetry>;
}
