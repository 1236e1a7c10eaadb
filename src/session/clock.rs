//! Elapsed-time tracking for an open session
//!
//! Elapsed time is always derived from `now - started_at`, never accumulated
//! incrementally, so it self-corrects across app suspension and resume.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Seconds elapsed since `started_at`, clamped at zero for skewed clocks
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(started_at).num_seconds().max(0) as u64
}

/// Format a duration for session summaries
pub fn format_elapsed(elapsed_secs: u64) -> String {
    if elapsed_secs < 60 {
        format!("{elapsed_secs}s")
    } else if elapsed_secs < 3600 {
        let mins = elapsed_secs / 60;
        let secs = elapsed_secs % 60;
        if secs > 0 {
            format!("{mins}m {secs}s")
        } else {
            format!("{mins}m")
        }
    } else {
        let hours = elapsed_secs / 3600;
        let mins = (elapsed_secs % 3600) / 60;
        if mins > 0 {
            format!("{hours}h {mins}m")
        } else {
            format!("{hours}h")
        }
    }
}

/// Repeating ticker that republishes the derived elapsed seconds while a
/// session is open. Torn down when the session view loses focus.
#[derive(Debug)]
pub struct SessionClock {
    started_at: DateTime<Utc>,
    rx: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl SessionClock {
    /// Spawn the ticker task at a fixed interval
    pub fn spawn(started_at: DateTime<Utc>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(elapsed_seconds(started_at, Utc::now()));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(elapsed_seconds(started_at, Utc::now())).is_err() {
                    break;
                }
            }
        });
        Self {
            started_at,
            rx,
            handle,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Most recently published elapsed seconds
    pub fn elapsed(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Subscribe to elapsed-seconds updates
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }

    /// Stop ticking
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
