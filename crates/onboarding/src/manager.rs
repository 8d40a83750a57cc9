//! Session manager for onboarding reconcilers (PRD-42).
//!
//! Keeps one [`ProgressReconciler`] per (user, role) so concurrent requests
//! for the same user share a session and its monotonic/lock guarantees.
//! Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
//! shared across the application.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use nutrisensia_core::onboarding::{steps_for_role, OnboardingProgress};
use nutrisensia_core::roles::CoachingRole;
use nutrisensia_core::types::DbId;

use crate::cache::{MemoryProgressCache, ProgressCache};
use crate::reconciler::ProgressReconciler;
use crate::store::{PgProgressStore, ProgressStore};

type SessionKey = (DbId, CoachingRole);

/// Holds the live onboarding sessions for this backend instance.
pub struct SessionManager {
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    sessions: RwLock<HashMap<SessionKey, ProgressReconciler>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ProgressStore>, cache: Arc<dyn ProgressCache>) -> Self {
        Self {
            store,
            cache,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Production wiring: database-backed store, in-process cache tier.
    pub fn with_postgres(pool: nutrisensia_db::DbPool) -> Self {
        Self::new(
            Arc::new(PgProgressStore::new(pool)),
            Arc::new(MemoryProgressCache::new()),
        )
    }

    /// Get or load the session for a user/role and return its progress
    /// snapshot.
    pub async fn load(&self, user_id: DbId, role: CoachingRole) -> OnboardingProgress {
        let mut sessions = self.sessions.write().await;
        let session = self.session_entry(&mut sessions, user_id, role).await;
        session.progress().clone()
    }

    /// Mark a step as in progress for a user and return the new snapshot.
    pub async fn advance(
        &self,
        user_id: DbId,
        role: CoachingRole,
        step_id: &str,
    ) -> OnboardingProgress {
        let mut sessions = self.sessions.write().await;
        let session = self.session_entry(&mut sessions, user_id, role).await;
        session.advance(step_id);
        session.progress().clone()
    }

    /// Mark a step as completed for a user and return the new snapshot.
    pub async fn complete_step(
        &self,
        user_id: DbId,
        role: CoachingRole,
        step_id: &str,
    ) -> OnboardingProgress {
        let mut sessions = self.sessions.write().await;
        let session = self.session_entry(&mut sessions, user_id, role).await;
        session.complete_step(step_id);
        session.progress().clone()
    }

    /// Mark a step as skipped for a user and return the new snapshot.
    pub async fn skip_step(
        &self,
        user_id: DbId,
        role: CoachingRole,
        step_id: &str,
    ) -> OnboardingProgress {
        let mut sessions = self.sessions.write().await;
        let session = self.session_entry(&mut sessions, user_id, role).await;
        session.skip_step(step_id);
        session.progress().clone()
    }

    /// Number of live sessions, used by monitoring.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session_entry<'a>(
        &self,
        sessions: &'a mut HashMap<SessionKey, ProgressReconciler>,
        user_id: DbId,
        role: CoachingRole,
    ) -> &'a mut ProgressReconciler {
        match sessions.entry((user_id, role)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let reconciler = ProgressReconciler::load(
                    Arc::clone(&self.store),
                    Arc::clone(&self.cache),
                    user_id,
                    role,
                    &steps_for_role(role),
                )
                .await;
                entry.insert(reconciler)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
