//! Route definitions for onboarding progress (PRD-41).
//!
//! Mounted at `/users/{user_id}/onboarding` by `api_routes()`. All routes
//! take a `?role=` query parameter selecting the step catalog.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::onboarding;
use crate::state::AppState;

/// Onboarding progress routes.
///
/// ```text
/// GET    /           -> get_progress (get or create)
/// POST   /advance    -> advance_step
/// POST   /complete   -> complete_step
/// POST   /skip       -> skip_step
/// POST   /finalize   -> finalize (explicit confirmatory action)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(onboarding::get_progress))
        .route("/advance", post(onboarding::advance_step))
        .route("/complete", post(onboarding::complete_step))
        .route("/skip", post(onboarding::skip_step))
        .route("/finalize", post(onboarding::finalize))
}
