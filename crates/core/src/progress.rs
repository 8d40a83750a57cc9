//! Progress reconciliation math (PRD-42).
//!
//! Pure functions behind the onboarding progress reconciler: legacy value
//! coercion at the storage boundary, the percentage formula, the monotonic
//! combine rule, and the merge of a cached progress blob with the
//! authoritative remote percentage. No I/O here; the reconciler in the
//! `nutrisensia-onboarding` crate supplies the inputs.

use crate::onboarding::{
    current_step_for, OnboardingProgress, StepDefinition, StepState, StepStatus, COMPLETION_STEP_ID,
};
use crate::roles::CoachingRole;
use crate::types::{DbId, Percent, Timestamp};

/// Percentage ceiling reachable through content steps alone. The remaining
/// points belong to the terminal step, so the bar never reads 100% until the
/// user actually reaches the final screen.
pub const CONTENT_STEP_CEILING: f64 = 87.5;

// ---------------------------------------------------------------------------
// Boundary coercion
// ---------------------------------------------------------------------------

/// Coerce the raw remote completion value to a percentage.
///
/// The `onboarding_completed` column predates the percentage model and has
/// carried several encodings: a number, a boolean (fully done / untouched),
/// or a numeric string. Anything unparseable, any other JSON shape, and a
/// missing record all read as 0.
pub fn coerce_completion(raw: Option<&serde_json::Value>) -> Percent {
    let Some(value) = raw else { return 0 };
    let percent = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::Bool(true) => 100.0,
        serde_json::Value::Bool(false) => 0.0,
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    (percent.round() as Percent).clamp(0, 100)
}

// ---------------------------------------------------------------------------
// Percentage formula
// ---------------------------------------------------------------------------

/// Compute the completion percentage for a step list.
///
/// Reaching the terminal step (in progress or completed) is unconditionally
/// 100%. Otherwise the resolved share of content steps is scaled to the
/// [`CONTENT_STEP_CEILING`].
pub fn completion_percentage(steps: &[StepState]) -> Percent {
    if let Some(terminal) = steps.iter().find(|s| s.id == COMPLETION_STEP_ID) {
        if matches!(terminal.status, StepStatus::InProgress | StepStatus::Completed) {
            return 100;
        }
    }

    let content: Vec<&StepState> = steps.iter().filter(|s| s.id != COMPLETION_STEP_ID).collect();
    if content.is_empty() {
        return 0;
    }
    let resolved = content.iter().filter(|s| s.status.is_resolved()).count();

    ((resolved as f64 / content.len() as f64) * CONTENT_STEP_CEILING).round() as Percent
}

/// Monotonic combine: a candidate value never lowers the observed maximum.
pub fn combine(candidate: Percent, observed: Percent) -> Percent {
    candidate.max(observed)
}

// ---------------------------------------------------------------------------
// Reconstruction from a bare percentage
// ---------------------------------------------------------------------------

/// Reconstruct a plausible step list from a bare percentage, for when the
/// cache is absent or behind the authoritative record.
///
/// With `n` content steps and `k = round(p/100 × n)`, the first `k` steps
/// are completed and the step after them is in progress.
pub fn derive_step_statuses(defs: &[StepDefinition], percentage: Percent) -> Vec<StepState> {
    let mut steps: Vec<StepState> = defs.iter().map(StepState::from_definition).collect();
    if percentage <= 0 {
        return steps;
    }
    let content = defs.iter().filter(|d| d.id != COMPLETION_STEP_ID).count();
    if content == 0 {
        return steps;
    }

    let k = ((percentage as f64 / 100.0) * content as f64).round() as usize;
    for step in steps.iter_mut().take(k) {
        step.status = StepStatus::Completed;
    }
    if let Some(step) = steps.get_mut(k) {
        step.status = StepStatus::InProgress;
    }
    steps
}

// ---------------------------------------------------------------------------
// Dual-store merge
// ---------------------------------------------------------------------------

/// Merge an optionally cached progress blob with the authoritative remote
/// percentage into the effective in-memory progress.
///
/// - Remote at 100 wins outright: the flow is locked and the cache is
///   irrelevant.
/// - A cached blob for the wrong user or role, or whose step ids no longer
///   match the catalog, is discarded as malformed.
/// - Otherwise the effective percentage is `max(cached, remote)`; step
///   states come from the cache when it is current, or are re-derived from
///   the merged percentage when the cache was absent or behind.
pub fn reconcile(
    user_id: DbId,
    role: CoachingRole,
    defs: &[StepDefinition],
    cached: Option<OnboardingProgress>,
    remote: Percent,
    now: Timestamp,
) -> OnboardingProgress {
    if remote >= 100 {
        return OnboardingProgress::locked(user_id, role, defs, now);
    }

    let cached = cached.filter(|p| {
        p.user_id == user_id && p.role == role && step_ids_match(&p.steps, defs)
    });

    match cached {
        Some(mut progress) => {
            let merged = combine(progress.completion_percentage, remote);
            if remote > progress.completion_percentage {
                // The remote record saw progress this device never did;
                // reconstruct step states to match it.
                progress.steps = derive_step_statuses(defs, merged);
                progress.current_step = current_step_for(&progress.steps);
            }
            progress.completion_percentage = merged;
            if merged >= 100 {
                progress.lock();
            }
            progress
        }
        None if remote > 0 => {
            let steps = derive_step_statuses(defs, remote);
            let current_step = current_step_for(&steps);
            OnboardingProgress {
                user_id,
                role,
                steps,
                current_step,
                completion_percentage: remote,
                is_completed: false,
                started_at: now,
                last_updated_at: now,
            }
        }
        None => OnboardingProgress::fresh(user_id, role, defs, now),
    }
}

/// Whether a cached step list covers exactly the catalog's step ids, in
/// order. A stale catalog cannot be mapped safely, so it reads as malformed.
fn step_ids_match(steps: &[StepState], defs: &[StepDefinition]) -> bool {
    steps.len() == defs.len() && steps.iter().zip(defs).all(|(s, d)| s.id == d.id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
