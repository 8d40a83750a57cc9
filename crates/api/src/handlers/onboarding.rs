//! Handlers for onboarding progress (PRD-41).
//!
//! All endpoints are keyed by user id and role; the role selects the step
//! catalog and namespaces the progress session. The profile row is created
//! lazily on first access via `get_or_create`. Step transitions return the
//! updated progress snapshot so the client can render without a follow-up
//! read.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use nutrisensia_core::error::CoreError;
use nutrisensia_core::onboarding::validate_step_id;
use nutrisensia_core::roles::CoachingRole;
use nutrisensia_core::types::DbId;
use nutrisensia_db::repositories::ProfileRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Role selector, common to all onboarding endpoints.
#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: CoachingRole,
}

/// Body of the step-transition endpoints.
#[derive(Debug, Deserialize)]
pub struct StepTransition {
    pub step_id: String,
}

// ---------------------------------------------------------------------------
// GET /users/{user_id}/onboarding
// ---------------------------------------------------------------------------

/// Get the user's onboarding progress, creating the profile record and the
/// reconciler session if this is their first access.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<RoleQuery>,
) -> AppResult<impl IntoResponse> {
    ProfileRepo::get_or_create(&state.pool, user_id, query.role.as_str()).await?;

    let progress = state.onboarding.load(user_id, query.role).await;

    tracing::debug!(user_id, role = query.role.as_str(), "Fetched onboarding progress");

    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// POST /users/{user_id}/onboarding/advance
// ---------------------------------------------------------------------------

/// Mark a step as in progress and make it the current step.
pub async fn advance_step(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<RoleQuery>,
    Json(input): Json<StepTransition>,
) -> AppResult<impl IntoResponse> {
    validate_step_id(query.role, &input.step_id)?;

    let progress = state
        .onboarding
        .advance(user_id, query.role, &input.step_id)
        .await;

    tracing::info!(
        user_id,
        step_id = %input.step_id,
        percent = progress.completion_percentage,
        "Onboarding step advanced"
    );

    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// POST /users/{user_id}/onboarding/complete
// ---------------------------------------------------------------------------

/// Mark a step as completed.
pub async fn complete_step(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<RoleQuery>,
    Json(input): Json<StepTransition>,
) -> AppResult<impl IntoResponse> {
    validate_step_id(query.role, &input.step_id)?;

    let progress = state
        .onboarding
        .complete_step(user_id, query.role, &input.step_id)
        .await;

    tracing::info!(
        user_id,
        step_id = %input.step_id,
        percent = progress.completion_percentage,
        "Onboarding step completed"
    );

    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// POST /users/{user_id}/onboarding/skip
// ---------------------------------------------------------------------------

/// Mark a step as skipped. Skipped steps count toward the percentage but
/// stay distinguishable for reporting.
pub async fn skip_step(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<RoleQuery>,
    Json(input): Json<StepTransition>,
) -> AppResult<impl IntoResponse> {
    validate_step_id(query.role, &input.step_id)?;

    let progress = state
        .onboarding
        .skip_step(user_id, query.role, &input.step_id)
        .await;

    tracing::info!(
        user_id,
        step_id = %input.step_id,
        percent = progress.completion_percentage,
        "Onboarding step skipped"
    );

    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// POST /users/{user_id}/onboarding/finalize
// ---------------------------------------------------------------------------

/// Stamp the profile's `onboarding_completed_at` timestamp.
///
/// This is the explicit confirmatory action, separate from step progress:
/// it requires the session at 100% and is idempotent on repeat calls.
pub async fn finalize(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Query(query): Query<RoleQuery>,
) -> AppResult<impl IntoResponse> {
    let progress = state.onboarding.load(user_id, query.role).await;
    if !progress.is_completed {
        return Err(CoreError::Validation(format!(
            "Cannot finalize onboarding at {}%. The flow must be fully completed first.",
            progress.completion_percentage
        ))
        .into());
    }

    let profile = ProfileRepo::finalize(&state.pool, user_id).await?;

    tracing::info!(user_id, "Onboarding finalized");

    Ok(Json(DataResponse { data: profile }))
}
