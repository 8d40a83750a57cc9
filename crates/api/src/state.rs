use std::sync::Arc;

use nutrisensia_onboarding::SessionManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: nutrisensia_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live onboarding reconciler sessions.
    pub onboarding: Arc<SessionManager>,
}
