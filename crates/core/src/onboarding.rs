//! Onboarding flow domain model (PRD-41).
//!
//! Defines the step catalog types, the per-session [`OnboardingProgress`]
//! state, and the step-transition rules. The completion percentage is
//! monotonic for the life of a progress value: transitions combine the newly
//! computed percentage with the previously observed maximum, and reaching
//! 100% locks the flow permanently (all steps forced to `completed`, further
//! transitions ignored).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress;
use crate::roles::CoachingRole;
use crate::types::{DbId, Percent, Timestamp};

/// Step id of the distinguished terminal step. Reaching it (in progress or
/// completed) always reads as 100%, regardless of prior content steps.
pub const COMPLETION_STEP_ID: &str = "completion";

// ---------------------------------------------------------------------------
// Step status
// ---------------------------------------------------------------------------

/// Status values for a single onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl StepStatus {
    /// Parse a status string from a serialized progress blob.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(CoreError::Validation(format!(
                "Invalid step status '{s}'. Must be one of: not_started, in_progress, completed, skipped"
            ))),
        }
    }

    /// Convert to a serialization-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the step counts toward the completion percentage.
    /// Skipped steps count the same as completed ones.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

// ---------------------------------------------------------------------------
// Step definitions and per-session step state
// ---------------------------------------------------------------------------

/// Static definition of one onboarding step, supplied per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_required: bool,
    pub estimated_minutes: i32,
}

impl StepDefinition {
    pub fn new(
        id: &str,
        title: &str,
        description: &str,
        is_required: bool,
        estimated_minutes: i32,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            is_required,
            estimated_minutes,
        }
    }
}

/// A step definition plus its per-session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_required: bool,
    pub estimated_minutes: i32,
    pub status: StepStatus,
}

impl StepState {
    /// Build the initial (not started) state for a definition.
    pub fn from_definition(def: &StepDefinition) -> Self {
        Self {
            id: def.id.clone(),
            title: def.title.clone(),
            description: def.description.clone(),
            is_required: def.is_required,
            estimated_minutes: def.estimated_minutes,
            status: StepStatus::NotStarted,
        }
    }
}

// ---------------------------------------------------------------------------
// Onboarding progress
// ---------------------------------------------------------------------------

/// Per-session onboarding state for one user in one role.
///
/// `completion_percentage` never decreases for the life of a value, and
/// `is_completed == true` is terminal: all further transitions are no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub user_id: DbId,
    pub role: CoachingRole,
    pub steps: Vec<StepState>,
    pub current_step: String,
    pub completion_percentage: Percent,
    pub is_completed: bool,
    pub started_at: Timestamp,
    pub last_updated_at: Timestamp,
}

impl OnboardingProgress {
    /// Fresh progress: all steps not started, percentage zero.
    pub fn fresh(
        user_id: DbId,
        role: CoachingRole,
        defs: &[StepDefinition],
        now: Timestamp,
    ) -> Self {
        let steps: Vec<StepState> = defs.iter().map(StepState::from_definition).collect();
        let current_step = steps.first().map(|s| s.id.clone()).unwrap_or_default();
        Self {
            user_id,
            role,
            steps,
            current_step,
            completion_percentage: 0,
            is_completed: false,
            started_at: now,
            last_updated_at: now,
        }
    }

    /// Fully locked progress: every step completed, percentage 100.
    ///
    /// Used when the authoritative record already says the user is done, so
    /// no cached state is consulted.
    pub fn locked(
        user_id: DbId,
        role: CoachingRole,
        defs: &[StepDefinition],
        now: Timestamp,
    ) -> Self {
        let mut progress = Self::fresh(user_id, role, defs, now);
        progress.lock();
        progress
    }

    /// Whether the flow accepts further transitions.
    pub fn is_locked(&self) -> bool {
        self.is_completed
    }

    /// Look up a step by id.
    pub fn step(&self, step_id: &str) -> Option<&StepState> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Mark a step as in progress and make it the current step.
    ///
    /// Returns `false` (no state change) when the flow is locked or the step
    /// id is unknown.
    pub fn begin_step(&mut self, step_id: &str, now: Timestamp) -> bool {
        self.apply_status(step_id, StepStatus::InProgress, true, now)
    }

    /// Mark a step as completed.
    ///
    /// Returns `false` when the flow is locked or the step id is unknown.
    pub fn complete_step(&mut self, step_id: &str, now: Timestamp) -> bool {
        self.apply_status(step_id, StepStatus::Completed, false, now)
    }

    /// Mark a step as skipped. Skipped steps count toward the percentage the
    /// same as completed ones but stay distinguishable for reporting.
    ///
    /// Returns `false` when the flow is locked or the step id is unknown.
    pub fn skip_step(&mut self, step_id: &str, now: Timestamp) -> bool {
        self.apply_status(step_id, StepStatus::Skipped, false, now)
    }

    fn apply_status(
        &mut self,
        step_id: &str,
        status: StepStatus,
        make_current: bool,
        now: Timestamp,
    ) -> bool {
        if self.is_locked() {
            return false;
        }
        let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) else {
            return false;
        };
        step.status = status;
        if make_current {
            self.current_step = step_id.to_string();
        }
        self.recompute(now);
        true
    }

    /// Recompute the percentage from step states, combining with the
    /// previously observed maximum so the visible value never regresses.
    fn recompute(&mut self, now: Timestamp) {
        let computed = progress::completion_percentage(&self.steps);
        self.completion_percentage =
            progress::combine(computed, self.completion_percentage);
        self.last_updated_at = now;
        if self.completion_percentage >= 100 {
            self.lock();
        }
    }

    /// Force the terminal state: all steps completed, percentage 100.
    pub(crate) fn lock(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Completed;
        }
        self.completion_percentage = 100;
        self.is_completed = true;
        if let Some(last) = self.steps.last() {
            self.current_step = last.id.clone();
        }
    }
}

/// Pick the current step for a freshly derived step list: the in-progress
/// step if any, else the first untouched step, else the last step.
pub(crate) fn current_step_for(steps: &[StepState]) -> String {
    steps
        .iter()
        .find(|s| s.status == StepStatus::InProgress)
        .or_else(|| steps.iter().find(|s| s.status == StepStatus::NotStarted))
        .or_else(|| steps.last())
        .map(|s| s.id.clone())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Step catalogs
// ---------------------------------------------------------------------------

/// The canonical step catalog for a role. The terminal `completion` step is
/// always last.
pub fn steps_for_role(role: CoachingRole) -> Vec<StepDefinition> {
    match role {
        CoachingRole::Nutritionist => nutritionist_steps(),
        CoachingRole::Patient => patient_steps(),
    }
}

fn nutritionist_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("welcome", "Welcome", "Tour of the practice dashboard", true, 2),
        StepDefinition::new("profile", "Professional profile", "Name, photo, and bio", true, 5),
        StepDefinition::new(
            "specializations",
            "Specializations",
            "Areas of practice and patient focus",
            true,
            3,
        ),
        StepDefinition::new("rates", "Consultation rates", "Pricing for sessions and packages", true, 4),
        StepDefinition::new(
            "documents",
            "Credentials",
            "Diplomas and certification uploads",
            false,
            6,
        ),
        StepDefinition::new(
            "availability",
            "Availability",
            "Weekly consultation schedule",
            true,
            4,
        ),
        StepDefinition::new("review", "Review", "Check your public listing", true, 2),
        StepDefinition::new(
            COMPLETION_STEP_ID,
            "All set",
            "Your practice is ready for patients",
            true,
            1,
        ),
    ]
}

fn patient_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("welcome", "Welcome", "Tour of your coaching space", true, 2),
        StepDefinition::new("profile", "Your profile", "Basic personal details", true, 3),
        StepDefinition::new(
            "health_history",
            "Health history",
            "Conditions, allergies, and medication",
            false,
            5,
        ),
        StepDefinition::new("goals", "Goals", "What you want to achieve", true, 3),
        StepDefinition::new(
            "preferences",
            "Food preferences",
            "Diet style and restrictions",
            false,
            3,
        ),
        StepDefinition::new(
            COMPLETION_STEP_ID,
            "All set",
            "You are ready for your first consultation",
            true,
            1,
        ),
    ]
}

/// Validate that a step id exists in the role's catalog.
pub fn validate_step_id(role: CoachingRole, step_id: &str) -> Result<(), CoreError> {
    let catalog = steps_for_role(role);
    if catalog.iter().any(|d| d.id == step_id) {
        Ok(())
    } else {
        let known: Vec<&str> = catalog.iter().map(|d| d.id.as_str()).collect();
        Err(CoreError::Validation(format!(
            "Invalid step id '{step_id}' for role '{}'. Must be one of: {known:?}",
            role.as_str()
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn nutritionist_progress() -> OnboardingProgress {
        OnboardingProgress::fresh(
            1,
            CoachingRole::Nutritionist,
            &steps_for_role(CoachingRole::Nutritionist),
            Utc::now(),
        )
    }

    // -- StepStatus --

    #[test]
    fn status_as_str_roundtrip() {
        for status in [
            StepStatus::NotStarted,
            StepStatus::InProgress,
            StepStatus::Completed,
            StepStatus::Skipped,
        ] {
            assert_eq!(StepStatus::from_str_db(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn status_from_str_invalid() {
        assert!(StepStatus::from_str_db("done").is_err());
        assert!(StepStatus::from_str_db("").is_err());
    }

    #[test]
    fn skipped_and_completed_are_resolved() {
        assert!(StepStatus::Completed.is_resolved());
        assert!(StepStatus::Skipped.is_resolved());
        assert!(!StepStatus::NotStarted.is_resolved());
        assert!(!StepStatus::InProgress.is_resolved());
    }

    // -- Catalogs --

    #[test]
    fn catalogs_end_with_completion_step() {
        for role in [CoachingRole::Patient, CoachingRole::Nutritionist] {
            let steps = steps_for_role(role);
            assert_eq!(steps.last().unwrap().id, COMPLETION_STEP_ID);
        }
    }

    #[test]
    fn catalog_step_ids_are_unique() {
        for role in [CoachingRole::Patient, CoachingRole::Nutritionist] {
            let steps = steps_for_role(role);
            let mut ids: Vec<&str> = steps.iter().map(|d| d.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), steps.len());
        }
    }

    #[test]
    fn nutritionist_catalog_has_seven_content_steps() {
        let steps = steps_for_role(CoachingRole::Nutritionist);
        let content = steps.iter().filter(|d| d.id != COMPLETION_STEP_ID).count();
        assert_eq!(content, 7);
    }

    #[test]
    fn validate_step_id_accepts_catalog_entries() {
        for role in [CoachingRole::Patient, CoachingRole::Nutritionist] {
            for def in steps_for_role(role) {
                assert!(validate_step_id(role, &def.id).is_ok());
            }
        }
    }

    #[test]
    fn validate_step_id_rejects_unknown() {
        assert!(validate_step_id(CoachingRole::Patient, "rates").is_err());
        assert!(validate_step_id(CoachingRole::Nutritionist, "").is_err());
    }

    // -- Fresh state --

    #[test]
    fn fresh_progress_starts_at_zero() {
        let progress = nutritionist_progress();
        assert_eq!(progress.completion_percentage, 0);
        assert!(!progress.is_completed);
        assert_eq!(progress.current_step, "welcome");
        assert!(progress
            .steps
            .iter()
            .all(|s| s.status == StepStatus::NotStarted));
    }

    // -- Transitions --

    #[test]
    fn begin_step_sets_current_and_status() {
        let mut progress = nutritionist_progress();
        assert!(progress.begin_step("profile", Utc::now()));
        assert_eq!(progress.current_step, "profile");
        assert_eq!(progress.step("profile").unwrap().status, StepStatus::InProgress);
    }

    #[test]
    fn complete_step_raises_percentage() {
        let mut progress = nutritionist_progress();
        assert!(progress.complete_step("welcome", Utc::now()));
        // round(1/7 * 87.5) = 13
        assert_eq!(progress.completion_percentage, 13);
    }

    #[test]
    fn skip_counts_like_complete_but_stays_distinguishable() {
        let mut progress = nutritionist_progress();
        assert!(progress.skip_step("welcome", Utc::now()));
        assert_eq!(progress.completion_percentage, 13);
        assert_eq!(progress.step("welcome").unwrap().status, StepStatus::Skipped);
    }

    #[test]
    fn unknown_step_is_ignored() {
        let mut progress = nutritionist_progress();
        assert!(!progress.complete_step("no_such_step", Utc::now()));
        assert_eq!(progress.completion_percentage, 0);
    }

    #[test]
    fn unmarking_can_never_lower_percentage() {
        let mut progress = nutritionist_progress();
        progress.complete_step("welcome", Utc::now());
        progress.complete_step("profile", Utc::now());
        let observed = progress.completion_percentage;
        // Re-opening a completed step recomputes a smaller raw value, but the
        // observed maximum wins.
        progress.begin_step("profile", Utc::now());
        assert!(progress.completion_percentage >= observed);
    }

    #[test]
    fn reaching_completion_step_locks_the_flow() {
        let mut progress = nutritionist_progress();
        progress.complete_step("welcome", Utc::now());
        assert!(progress.begin_step(COMPLETION_STEP_ID, Utc::now()));
        assert_eq!(progress.completion_percentage, 100);
        assert!(progress.is_completed);
        assert!(progress
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));
    }

    #[test]
    fn locked_flow_ignores_all_transitions() {
        let mut progress = nutritionist_progress();
        progress.begin_step(COMPLETION_STEP_ID, Utc::now());
        assert!(progress.is_locked());

        assert!(!progress.skip_step("profile", Utc::now()));
        assert!(!progress.begin_step("welcome", Utc::now()));
        assert!(!progress.complete_step("rates", Utc::now()));
        assert_eq!(progress.completion_percentage, 100);
        assert!(progress.is_completed);
    }

    #[test]
    fn locked_constructor_matches_locked_state() {
        let locked = OnboardingProgress::locked(
            7,
            CoachingRole::Patient,
            &steps_for_role(CoachingRole::Patient),
            Utc::now(),
        );
        assert_eq!(locked.completion_percentage, 100);
        assert!(locked.is_completed);
        assert!(locked.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(locked.current_step, COMPLETION_STEP_ID);
    }
}
