//! Device-local progress cache (PRD-42).
//!
//! A best-effort, synchronous tier in front of the authoritative record.
//! Entries are serialized `OnboardingProgress` blobs keyed by user + role;
//! anything that fails to parse, or that belongs to a different user or
//! role, reads as absent. The cache can never be a source of regression:
//! the reconciler only consults it through the monotonic merge.

use std::collections::HashMap;
use std::sync::RwLock;

use nutrisensia_core::onboarding::OnboardingProgress;
use nutrisensia_core::roles::CoachingRole;
use nutrisensia_core::types::DbId;

/// Synchronous get/put of serialized progress, keyed by user + role.
pub trait ProgressCache: Send + Sync {
    /// The cached progress for a user/role, or `None` when absent or
    /// malformed. Never fails.
    fn get(&self, user_id: DbId, role: CoachingRole) -> Option<OnboardingProgress>;

    /// Store a progress snapshot. Best-effort; failures are logged.
    fn put(&self, progress: &OnboardingProgress);
}

/// In-process cache holding JSON blobs, the per-device tier for a single
/// backend instance.
pub struct MemoryProgressCache {
    entries: RwLock<HashMap<(DbId, CoachingRole), String>>,
}

impl MemoryProgressCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProgressCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCache for MemoryProgressCache {
    fn get(&self, user_id: DbId, role: CoachingRole) -> Option<OnboardingProgress> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let blob = entries.get(&(user_id, role))?;

        let progress: OnboardingProgress = match serde_json::from_str(blob) {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Discarding malformed progress cache entry");
                return None;
            }
        };
        if progress.user_id != user_id || progress.role != role {
            tracing::warn!(user_id, "Discarding progress cache entry for wrong user or role");
            return None;
        }
        Some(progress)
    }

    fn put(&self, progress: &OnboardingProgress) {
        let blob = match serde_json::to_string(progress) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(user_id = progress.user_id, error = %e, "Failed to serialize progress for cache");
                return;
            }
        };
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert((progress.user_id, progress.role), blob);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
