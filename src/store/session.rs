//! Recording completed sessions for the signed-in user.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::DocumentStore;
use crate::error::PulseError;
use crate::stats::compute_stats;
use crate::timer::CompletedSession;
use crate::types::{clamp_stress, MeditationSession, MeditationStats, TimeRange};

pub const SESSIONS_COLLECTION: &str = "meditationSessions";

const DEFAULT_RECENT_LIMIT: usize = 5;

/// Source of the current user's identity
pub trait IdentityProvider {
    fn current_user(&self) -> Option<String>;
}

/// Fixed identity, e.g. from a CLI flag
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Session persistence scoped to the current identity
#[derive(Debug)]
pub struct SessionStore<D: DocumentStore, I: IdentityProvider> {
    documents: D,
    identity: I,
}

impl<D: DocumentStore, I: IdentityProvider> SessionStore<D, I> {
    pub fn new(documents: D, identity: I) -> Self {
        Self {
            documents,
            identity,
        }
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    fn require_user(&self, action: &str) -> Result<String, PulseError> {
        self.identity.current_user().ok_or_else(|| {
            warn!(action, "no signed-in user");
            PulseError::AuthenticationRequired(format!("sign in to {action}"))
        })
    }

    /// Persist a finished session. `stress_level` is rounded for storage.
    pub fn record_session(
        &mut self,
        completed: &CompletedSession,
        stress_level: Option<f64>,
    ) -> Result<MeditationSession, PulseError> {
        let user_id = self.require_user("save a session")?;

        let session = MeditationSession {
            id: Uuid::new_v4().to_string(),
            user_id,
            session_type: completed.session_type,
            duration_minutes: completed.duration_minutes,
            completed: true,
            timestamp: completed.completed_at,
            stress_level: stress_level.map(|s| clamp_stress(s).round() as u8),
        };

        self.documents
            .append(SESSIONS_COLLECTION, &session)
            .map_err(persistence)?;
        info!(id = %session.id, session_type = ?session.session_type, "session recorded");
        Ok(session)
    }

    /// Latest sessions, newest first
    pub fn recent_sessions(&self, limit: Option<usize>) -> Result<Vec<MeditationSession>, PulseError> {
        let user_id = self.require_user("view sessions")?;
        self.documents
            .query_recent(
                SESSIONS_COLLECTION,
                &user_id,
                limit.unwrap_or(DEFAULT_RECENT_LIMIT),
            )
            .map_err(persistence)
    }

    pub fn stats(&self, range: TimeRange, now: DateTime<Utc>) -> Result<MeditationStats, PulseError> {
        let user_id = self.require_user("view statistics")?;
        let since = range.window_start(now);
        let sessions = self
            .documents
            .query_range(SESSIONS_COLLECTION, &user_id, since)
            .map_err(persistence)?;
        Ok(compute_stats(&sessions, since))
    }
}

fn persistence(err: PulseError) -> PulseError {
    match err {
        PulseError::PersistenceFailure(_) => err,
        other => PulseError::PersistenceFailure(other.to_string()),
    }
}
