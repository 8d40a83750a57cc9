//! Repository for the `user_profiles` table (PRD-08, PRD-41).

use sqlx::PgPool;

use nutrisensia_core::types::{DbId, Percent, Timestamp};

use crate::models::profile::UserProfile;

/// Column list for `user_profiles` queries.
const COLUMNS: &str = "\
    id, user_id, role, onboarding_completed, onboarding_completed_at, \
    created_at, updated_at";

/// Provides CRUD operations for user profiles and their onboarding
/// completion record.
pub struct ProfileRepo;

impl ProfileRepo {
    /// Get the profile for a user, creating one with defaults if it does
    /// not exist yet (upsert pattern).
    ///
    /// Uses a no-op `DO UPDATE` to guarantee `RETURNING` always produces a
    /// row. An existing row keeps its stored role.
    pub async fn get_or_create(
        pool: &PgPool,
        user_id: DbId,
        role: &str,
    ) -> Result<UserProfile, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_profiles (user_id, role) \
             VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = user_profiles.user_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(user_id)
            .bind(role)
            .fetch_one(pool)
            .await
    }

    /// Raw `onboarding_completed` value for a user, `None` when there is no
    /// row. The value is returned uncoerced; live rows carry numbers,
    /// booleans, and numeric strings.
    pub async fn fetch_completion(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT onboarding_completed FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Upsert the onboarding completion percentage.
    ///
    /// The caller is responsible for only ever sending its monotonic
    /// maximum; no ordering is enforced here. `onboarding_completed_at` is
    /// never touched by this write -- it belongs to [`ProfileRepo::finalize`].
    pub async fn update_completion(
        pool: &PgPool,
        user_id: DbId,
        percent: Percent,
        updated_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, onboarding_completed, updated_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET onboarding_completed = EXCLUDED.onboarding_completed, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(user_id)
        .bind(serde_json::Value::from(percent))
        .bind(updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stamp `onboarding_completed_at` for a user.
    ///
    /// Fired by the explicit finalize action, never by step progress.
    /// Idempotent: an already-finalized profile keeps its original
    /// timestamp.
    pub async fn finalize(pool: &PgPool, user_id: DbId) -> Result<UserProfile, sqlx::Error> {
        let query = format!(
            "UPDATE user_profiles \
             SET onboarding_completed_at = COALESCE(onboarding_completed_at, NOW()), \
                 updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
