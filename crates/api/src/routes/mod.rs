pub mod health;
pub mod onboarding;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /users/{user_id}/onboarding            get progress (get or create)
/// /users/{user_id}/onboarding/advance    mark step in progress (POST)
/// /users/{user_id}/onboarding/complete   mark step completed (POST)
/// /users/{user_id}/onboarding/skip       mark step skipped (POST)
/// /users/{user_id}/onboarding/finalize   stamp completion timestamp (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/users/{user_id}/onboarding", onboarding::router())
}
