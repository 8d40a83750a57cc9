//! Coaching roles (PRD-08).
//!
//! A user is onboarded either as a patient or as a nutritionist; the role
//! selects the onboarding step catalog and namespaces the progress cache.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The two user roles on the coaching platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingRole {
    Patient,
    Nutritionist,
}

impl CoachingRole {
    /// Parse a role string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "patient" => Ok(Self::Patient),
            "nutritionist" => Ok(Self::Nutritionist),
            _ => Err(CoreError::Validation(format!(
                "Invalid coaching role '{s}'. Must be one of: patient, nutritionist"
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Nutritionist => "nutritionist",
        }
    }

    /// Human-readable label for the role.
    pub fn label(self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Nutritionist => "Nutritionist",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
