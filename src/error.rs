//! Unified error type for the session engine
//!
//! Every failure the engine can surface falls into one of the variants below.
//! Pure computation (progress, planning, scoring) never produces errors for
//! normal input ranges; these variants cover the side-effecting boundaries and
//! the controller's own guards.

use thiserror::Error;

use crate::session::{ControllerPhase, TargetKind};
use crate::watch::WatchError;

/// Convenience alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// The unified error type for the session engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("data service call '{op}' failed: {message}")]
    DataService {
        op: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("watch did not acknowledge session start after {attempts} attempts")]
    WatchStartFailed { attempts: u32 },

    #[error("watch channel error: {0}")]
    Watch(#[from] WatchError),

    #[error("this drill records {required} targets, a {requested} capture cannot be applied")]
    CaptureMismatch {
        required: TargetKind,
        requested: TargetKind,
    },

    #[error("drill target count is already satisfied")]
    DrillSatisfied,

    #[error("no session is loaded")]
    SessionNotLoaded,

    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ControllerPhase,
        to: ControllerPhase,
    },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl EngineError {
    /// Create a data-service error without an underlying cause
    pub fn data_service(op: &'static str, message: impl Into<String>) -> Self {
        Self::DataService {
            op,
            message: message.into(),
            source: None,
        }
    }

    /// Create a data-service error wrapping an underlying cause
    pub fn data_service_with(
        op: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataService {
            op,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// True when the failure is recoverable by retrying the same operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataService { .. } | Self::WatchStartFailed { .. } | Self::Watch(_)
        )
    }
}
