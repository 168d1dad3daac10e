//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health_check))
        // Definitions and runs
        .route("/workflows", get(handlers::workflow::list_workflows))
        .route("/workflows/{name}/run", post(handlers::workflow::run_workflow))
        // Executions
        .route("/executions", get(handlers::execution::list_executions))
        .route("/executions/{id}", get(handlers::execution::get_execution))
        .route(
            "/executions/{id}/cancel",
            post(handlers::execution::cancel_execution),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/v1/health
async fn health_check() -> ApiResponse<serde_json::Value> {
    RequestTimer::start().respond(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
