//! User profile entity model (PRD-08).

use serde::Serialize;
use sqlx::FromRow;

use nutrisensia_core::types::{DbId, Timestamp};

/// A row from the `user_profiles` table.
///
/// `onboarding_completed` is JSONB rather than a numeric column: the field
/// predates the percentage model and live rows still carry booleans and
/// numeric strings. Coercion happens in `nutrisensia_core::progress`, not
/// here.
///
/// `onboarding_completed_at` is written only by the explicit finalize
/// action; step progress never touches it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProfile {
    pub id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub onboarding_completed: serde_json::Value,
    pub onboarding_completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
