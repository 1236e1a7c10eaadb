//! Mock session data service

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::service::{ListScope, SessionDataService};
use crate::session::{AggregateStats, CapturedTarget, Session, SessionId, SessionPatch};

/// In-memory data service that records every mutation
#[derive(Default)]
pub struct MockDataService {
    sessions: Mutex<HashMap<SessionId, Session>>,
    targets: Mutex<Vec<CapturedTarget>>,
    stats: Mutex<AggregateStats>,
    fail_ops: Mutex<HashSet<&'static str>>,
    ended: Mutex<Vec<SessionId>>,
    cancelled: Mutex<Vec<SessionId>>,
    patches: Mutex<Vec<(SessionId, SessionPatch)>>,
    refreshed: Mutex<Vec<ListScope>>,
}

impl MockDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, session: Session) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
        self
    }

    pub fn with_targets(self, targets: Vec<CapturedTarget>) -> Self {
        *self.targets.lock().unwrap() = targets;
        self
    }

    pub fn with_stats(self, stats: AggregateStats) -> Self {
        *self.stats.lock().unwrap() = stats;
        self
    }

    /// Fail the next call to the named operation
    pub fn fail_next(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().insert(op);
    }

    pub fn ended_sessions(&self) -> Vec<SessionId> {
        self.ended.lock().unwrap().clone()
    }

    pub fn cancelled_sessions(&self) -> Vec<SessionId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn applied_patches(&self) -> Vec<(SessionId, SessionPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn refreshed_scopes(&self) -> Vec<ListScope> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn stored_session(&self, id: &SessionId) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    fn check_failure(&self, op: &'static str) -> Result<()> {
        if self.fail_ops.lock().unwrap().remove(op) {
            Err(EngineError::data_service(op, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionDataService for MockDataService {
    async fn session(&self, id: &SessionId) -> Result<Session> {
        self.check_failure("session")?;
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::data_service("session", format!("{id} not found")))
    }

    async fn captured_targets(&self, _id: &SessionId) -> Result<Vec<CapturedTarget>> {
        self.check_failure("captured_targets")?;
        Ok(self.targets.lock().unwrap().clone())
    }

    async fn aggregate_stats(&self, _id: &SessionId) -> Result<AggregateStats> {
        self.check_failure("aggregate_stats")?;
        Ok(*self.stats.lock().unwrap())
    }

    async fn end_session(&self, id: &SessionId) -> Result<()> {
        self.check_failure("end_session")?;
        self.ended.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn cancel_session(&self, id: &SessionId) -> Result<()> {
        self.check_failure("cancel_session")?;
        self.cancelled.lock().unwrap().push(id.clone());
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }

    async fn update_session(&self, id: &SessionId, patch: SessionPatch) -> Result<()> {
        self.check_failure("update_session")?;
        if let Some(session) = self.sessions.lock().unwrap().get_mut(id) {
            if let Some(watch_controlled) = patch.watch_controlled {
                session.watch_controlled = watch_controlled;
            }
            if let Some(status) = patch.status {
                session.status = status;
            }
            if patch.ended_at.is_some() {
                session.ended_at = patch.ended_at;
            }
        }
        self.patches.lock().unwrap().push((id.clone(), patch));
        Ok(())
    }

    async fn refresh_session_list(&self, scope: ListScope) -> Result<()> {
        self.check_failure("refresh_session_list")?;
        self.refreshed.lock().unwrap().push(scope);
        Ok(())
    }
}
