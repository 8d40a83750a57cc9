//! The onboarding progress reconciler (PRD-42).
//!
//! One reconciler per user session. `load` merges the authoritative remote
//! record with the device-local cache into a non-regressing in-memory
//! progress; the step transitions mutate optimistically, write the cache
//! synchronously, and push the new maximum to the remote store on a
//! detached task. Storage failures never propagate to the caller: reads
//! degrade to the surviving tier, writes are logged and dropped.

use std::sync::Arc;

use chrono::Utc;

use nutrisensia_core::onboarding::{OnboardingProgress, StepDefinition};
use nutrisensia_core::progress;
use nutrisensia_core::roles::CoachingRole;
use nutrisensia_core::types::{DbId, Percent};

use crate::cache::ProgressCache;
use crate::store::ProgressStore;

/// Reconciles one user's onboarding progress across the cache and the
/// authoritative store for the life of a session.
pub struct ProgressReconciler {
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    progress: OnboardingProgress,
}

impl ProgressReconciler {
    /// Load the effective progress for a user.
    ///
    /// Reads the remote record first; a remote already at 100% locks the
    /// flow outright and the cache is not consulted. Otherwise the cached
    /// blob (if present and well-formed) merges with the remote percentage
    /// via the monotonic maximum. Read failures on either tier degrade to
    /// the other; both failing yields a fresh start. This is a pure read:
    /// nothing is persisted.
    pub async fn load(
        store: Arc<dyn ProgressStore>,
        cache: Arc<dyn ProgressCache>,
        user_id: DbId,
        role: CoachingRole,
        steps: &[StepDefinition],
    ) -> Self {
        let raw = match store.fetch_completion(user_id).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Remote completion read failed, falling back to cached progress"
                );
                None
            }
        };
        let remote = progress::coerce_completion(raw.as_ref());

        // A completed flow is permanent; skip the cache read entirely.
        let cached = if remote >= 100 {
            None
        } else {
            cache.get(user_id, role)
        };

        let progress = progress::reconcile(user_id, role, steps, cached, remote, Utc::now());
        Self {
            store,
            cache,
            progress,
        }
    }

    /// Current in-memory progress snapshot.
    pub fn progress(&self) -> &OnboardingProgress {
        &self.progress
    }

    /// Whether the flow is permanently completed.
    pub fn is_locked(&self) -> bool {
        self.progress.is_locked()
    }

    pub fn completion_percentage(&self) -> Percent {
        self.progress.completion_percentage
    }

    /// Mark a step as in progress and make it the current step.
    pub fn advance(&mut self, step_id: &str) {
        if self.progress.begin_step(step_id, Utc::now()) {
            self.persist();
        } else {
            self.log_ignored(step_id);
        }
    }

    /// Mark a step as completed. Reaching 100% locks the flow for the
    /// remainder of the session.
    pub fn complete_step(&mut self, step_id: &str) {
        if self.progress.complete_step(step_id, Utc::now()) {
            self.persist();
        } else {
            self.log_ignored(step_id);
        }
    }

    /// Mark a step as skipped.
    pub fn skip_step(&mut self, step_id: &str) {
        if self.progress.skip_step(step_id, Utc::now()) {
            self.persist();
        } else {
            self.log_ignored(step_id);
        }
    }

    /// Cache write first (synchronous, best-effort), then the remote upsert
    /// on a detached task. The value sent is the session's monotonic
    /// maximum, so a lost or late write can never regress the record.
    fn persist(&self) {
        self.cache.put(&self.progress);

        let store = Arc::clone(&self.store);
        let user_id = self.progress.user_id;
        let percent = self.progress.completion_percentage;
        let updated_at = self.progress.last_updated_at;
        tokio::spawn(async move {
            if let Err(e) = store.save_completion(user_id, percent, updated_at).await {
                tracing::warn!(
                    user_id,
                    percent,
                    error = %e,
                    "Failed to persist onboarding completion, will retry on next transition"
                );
            }
        });
    }

    fn log_ignored(&self, step_id: &str) {
        if self.progress.is_locked() {
            tracing::debug!(
                user_id = self.progress.user_id,
                step_id,
                "Ignoring step transition on completed flow"
            );
        } else {
            tracing::warn!(
                user_id = self.progress.user_id,
                step_id,
                "Ignoring transition for unknown step"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryProgressCache;
    use crate::store::StoreError;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use nutrisensia_core::onboarding::{steps_for_role, StepStatus, COMPLETION_STEP_ID};
    use nutrisensia_core::types::Timestamp;
    use std::sync::Mutex;

    /// In-memory stand-in for the database-backed store, with switchable
    /// failure injection.
    struct MockStore {
        value: Mutex<Option<serde_json::Value>>,
        fail_reads: Mutex<bool>,
        fail_writes: Mutex<bool>,
    }

    impl MockStore {
        fn new(value: Option<serde_json::Value>) -> Self {
            Self {
                value: Mutex::new(value),
                fail_reads: Mutex::new(false),
                fail_writes: Mutex::new(false),
            }
        }

        fn set_value(&self, value: Option<serde_json::Value>) {
            *self.value.lock().unwrap() = value;
        }

        fn set_fail_reads(&self, fail: bool) {
            *self.fail_reads.lock().unwrap() = fail;
        }

        fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }

        fn stored(&self) -> Option<serde_json::Value> {
            self.value.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProgressStore for MockStore {
        async fn fetch_completion(
            &self,
            _user_id: DbId,
        ) -> Result<Option<serde_json::Value>, StoreError> {
            if *self.fail_reads.lock().unwrap() {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            Ok(self.value.lock().unwrap().clone())
        }

        async fn save_completion(
            &self,
            _user_id: DbId,
            percent: Percent,
            _updated_at: Timestamp,
        ) -> Result<(), StoreError> {
            if *self.fail_writes.lock().unwrap() {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            *self.value.lock().unwrap() = Some(serde_json::Value::from(percent));
            Ok(())
        }
    }

    async fn load_nutritionist(
        store: &Arc<MockStore>,
        cache: &Arc<MemoryProgressCache>,
    ) -> ProgressReconciler {
        ProgressReconciler::load(
            Arc::clone(store) as Arc<dyn ProgressStore>,
            Arc::clone(cache) as Arc<dyn ProgressCache>,
            1,
            CoachingRole::Nutritionist,
            &steps_for_role(CoachingRole::Nutritionist),
        )
        .await
    }

    /// Let detached persistence tasks run to completion on the test
    /// runtime.
    async fn drain_tasks() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn fresh_load_starts_at_zero() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let reconciler = load_nutritionist(&store, &cache).await;
        assert_eq!(reconciler.completion_percentage(), 0);
        assert!(!reconciler.is_locked());
    }

    #[tokio::test]
    async fn remote_read_failure_degrades_to_cache() {
        let store = Arc::new(MockStore::new(Some(serde_json::Value::from(60))));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        reconciler.complete_step("welcome");
        drain_tasks().await;

        store.set_fail_reads(true);
        let reloaded = load_nutritionist(&store, &cache).await;
        // The cache still holds the session maximum.
        assert_eq!(reloaded.completion_percentage(), 60);
    }

    #[tokio::test]
    async fn legacy_boolean_remote_locks_the_flow() {
        let store = Arc::new(MockStore::new(Some(serde_json::Value::Bool(true))));
        let cache = Arc::new(MemoryProgressCache::new());

        let reconciler = load_nutritionist(&store, &cache).await;
        assert!(reconciler.is_locked());
        assert_eq!(reconciler.completion_percentage(), 100);
    }

    #[tokio::test]
    async fn mutation_writes_cache_and_store() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        reconciler.complete_step("welcome");
        drain_tasks().await;

        let cached = cache.get(1, CoachingRole::Nutritionist).unwrap();
        assert_eq!(cached.completion_percentage, 13);
        assert_eq!(store.stored(), Some(serde_json::Value::from(13)));
    }

    #[tokio::test]
    async fn failed_remote_write_keeps_local_state() {
        let store = Arc::new(MockStore::new(None));
        store.set_fail_writes(true);
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        reconciler.complete_step("welcome");
        drain_tasks().await;

        // In-memory and cached state advanced; the remote record did not.
        assert_eq!(reconciler.completion_percentage(), 13);
        let cached = cache.get(1, CoachingRole::Nutritionist).unwrap();
        assert_eq!(cached.completion_percentage, 13);
        assert_matches!(store.stored(), None);
    }

    #[tokio::test]
    async fn percentage_is_monotonic_under_external_regression() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        let mut observed = Vec::new();

        reconciler.complete_step("welcome");
        observed.push(reconciler.completion_percentage());
        reconciler.complete_step("profile");
        observed.push(reconciler.completion_percentage());
        drain_tasks().await;

        // Another writer lowers the remote record between calls.
        store.set_value(Some(serde_json::Value::from(5)));

        let reloaded = load_nutritionist(&store, &cache).await;
        observed.push(reloaded.completion_percentage());

        assert!(observed.windows(2).all(|w| w[0] <= w[1]), "observed: {observed:?}");
    }

    #[tokio::test]
    async fn terminal_step_forces_completion_and_locks() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        reconciler.complete_step("welcome");
        reconciler.advance(COMPLETION_STEP_ID);
        drain_tasks().await;

        assert!(reconciler.is_locked());
        assert_eq!(reconciler.completion_percentage(), 100);
        assert_eq!(store.stored(), Some(serde_json::Value::from(100)));

        // Every later mutation is a no-op.
        reconciler.skip_step("profile");
        assert_eq!(reconciler.completion_percentage(), 100);
        assert!(reconciler.is_locked());
    }

    #[tokio::test]
    async fn full_nutritionist_flow() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;

        reconciler.complete_step("welcome");
        assert_eq!(reconciler.completion_percentage(), 13);

        for step in [
            "profile",
            "specializations",
            "rates",
            "documents",
            "availability",
            "review",
        ] {
            reconciler.complete_step(step);
        }
        // All content steps done, terminal untouched: ceiling, not 100.
        assert_eq!(reconciler.completion_percentage(), 88);
        assert!(!reconciler.is_locked());

        reconciler.advance(COMPLETION_STEP_ID);
        assert_eq!(reconciler.completion_percentage(), 100);
        assert!(reconciler.is_locked());
    }

    #[tokio::test]
    async fn unknown_step_is_a_logged_noop() {
        let store = Arc::new(MockStore::new(None));
        let cache = Arc::new(MemoryProgressCache::new());

        let mut reconciler = load_nutritionist(&store, &cache).await;
        reconciler.complete_step("definitely_not_a_step");
        drain_tasks().await;

        assert_eq!(reconciler.completion_percentage(), 0);
        // Nothing was persisted for the ignored transition.
        assert_matches!(store.stored(), None);
        assert!(cache.get(1, CoachingRole::Nutritionist).is_none());
    }

    #[tokio::test]
    async fn locked_remote_skips_stale_cache() {
        let store = Arc::new(MockStore::new(Some(serde_json::Value::from(100))));
        let cache = Arc::new(MemoryProgressCache::new());

        // Stale cached state from before completion.
        let stale = OnboardingProgress::fresh(
            1,
            CoachingRole::Nutritionist,
            &steps_for_role(CoachingRole::Nutritionist),
            Utc::now(),
        );
        cache.put(&stale);

        let reconciler = load_nutritionist(&store, &cache).await;
        assert!(reconciler.is_locked());
        assert!(reconciler
            .progress()
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));
    }

    #[tokio::test]
    async fn numeric_string_remote_is_coerced() {
        let store = Arc::new(MockStore::new(Some(serde_json::Value::from("42.5"))));
        let cache = Arc::new(MemoryProgressCache::new());

        let reconciler = load_nutritionist(&store, &cache).await;
        assert_eq!(reconciler.completion_percentage(), 43);
    }
}
