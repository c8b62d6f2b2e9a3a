//! Portal - the HTTP surface of the range
//!
//! Provides:
//! - Module pages, each behind the access guard
//! - Flag submission and progress reporting
//! - The monitoring-function relay (module 3)
//! - The admin console and impersonation check (module 4)

pub mod content;
pub mod routes;

use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::broker::IdentityBroker;
use crate::config::Config;
use crate::flags::FlagValidator;
use crate::guard::{AccessGuard, Guarded};
use crate::impersonation::CapabilityTable;
use crate::progress::ProgressStore;

/// Portal state shared across handlers. Immutable after startup; all
/// mutable state lives in the progress store.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProgressStore>,
    pub validator: FlagValidator,
    pub guard: AccessGuard,
    pub broker: IdentityBroker,
    pub capabilities: CapabilityTable,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            validator: FlagValidator::new(config.flags.secrets.clone(), store.clone()),
            guard: AccessGuard::new(store.clone()),
            broker: IdentityBroker::from_config(&config.broker),
            capabilities: CapabilityTable::for_project(&config.server.project_id),
            store,
            config,
        }
    }
}

impl<T: IntoResponse> IntoResponse for Guarded<T> {
    fn into_response(self) -> Response {
        match self {
            Guarded::Locked(locked) => Json(locked).into_response(),
            Guarded::Unlocked(inner) => inner.into_response(),
        }
    }
}

/// Create the portal router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Pages
        .route("/", get(routes::index))
        .route("/docs", get(routes::docs))
        .route("/status", get(routes::status_page))
        .route("/monitoring", get(routes::monitoring_page))
        .route("/admin", get(routes::admin_console))
        // Developer API
        .route("/api/v1/models", get(routes::list_models))
        .route("/api/v1/predict", post(routes::predict))
        // Progress
        .route("/submit-flag", post(routes::submit_flag))
        .route("/progress", get(routes::progress))
        // Escalation chain
        .route("/monitoring/check", post(routes::monitoring_check))
        .route("/admin/test-permissions", post(routes::check_permissions))
        // Health check
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
