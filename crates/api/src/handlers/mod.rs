//! Request handlers.
//!
//! Handlers delegate to the reconciler session manager and the repositories
//! in `nutrisensia_db`, and map errors via [`AppError`](crate::error::AppError).

pub mod onboarding;
