//! Application setup and server configuration.

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::dispatch::DispatchEngine;
use crate::kernel::ServerDeps;
use crate::server::routes::{
    health_handler, request_created_handler, request_updated_handler, partner_created_handler,
    simulate_high_demand_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
    pub engine: DispatchEngine,
}

impl AppState {
    pub fn new(deps: ServerDeps) -> Self {
        Self {
            engine: DispatchEngine::new(deps.clone()),
            deps,
        }
    }
}

/// Build the Axum application router
///
/// Change events for requests arrive on `/events/{collection}/...` where the
/// collection is `rides`, `service-requests` or `emergency-cases`.
pub fn build_app(deps: ServerDeps) -> Router {
    let app_state = AppState::new(deps);

    Router::new()
        .route("/events/:collection/created", post(request_created_handler))
        .route("/events/:collection/updated", post(request_updated_handler))
        .route("/partners/created", post(partner_created_handler))
        .route("/admin/simulate-high-demand", post(simulate_high_demand_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
