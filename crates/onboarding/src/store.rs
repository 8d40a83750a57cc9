//! Storage seam for the authoritative onboarding record (PRD-42).
//!
//! The reconciler only ever reads the raw completion value and writes back
//! its monotonic maximum; everything else about the profile row is out of
//! its reach. The trait keeps the reconciler testable without a database.

use async_trait::async_trait;

use nutrisensia_core::types::{DbId, Percent, Timestamp};
use nutrisensia_db::repositories::ProfileRepo;
use nutrisensia_db::DbPool;

/// Errors from the remote progress store.
///
/// The reconciler absorbs these (read failures degrade to cache-only
/// behavior, write failures are logged and dropped); they surface only in
/// logs.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the authoritative completion record.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Raw completion value for a user, `None` when no record exists.
    /// Legacy encodings (boolean, numeric string) are returned as-is.
    async fn fetch_completion(
        &self,
        user_id: DbId,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Upsert the completion percentage.
    ///
    /// Implementations must never touch the finalize timestamp; that field
    /// belongs to the explicit finalize action.
    async fn save_completion(
        &self,
        user_id: DbId,
        percent: Percent,
        updated_at: Timestamp,
    ) -> Result<(), StoreError>;
}

/// PostgreSQL-backed progress store over [`ProfileRepo`].
pub struct PgProgressStore {
    pool: DbPool,
}

impl PgProgressStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn fetch_completion(
        &self,
        user_id: DbId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(ProfileRepo::fetch_completion(&self.pool, user_id).await?)
    }

    async fn save_completion(
        &self,
        user_id: DbId,
        percent: Percent,
        updated_at: Timestamp,
    ) -> Result<(), StoreError> {
        Ok(ProfileRepo::update_completion(&self.pool, user_id, percent, updated_at).await?)
    }
}
