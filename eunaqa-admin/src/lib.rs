//! eunaqa-admin library - QA admin REST surface
//!
//! Thin read/update surface over the QA sweep data consumed by the admin
//! frontend: review queue decisions, control-panel listings and reports.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        // Review queue
        .route("/api/qa-sweep/review-queue", get(api::review_queue::list_queue))
        .route(
            "/api/qa-sweep/review-queue/:id/approve",
            post(api::review_queue::approve_item),
        )
        .route(
            "/api/qa-sweep/review-queue/:id/reject",
            post(api::review_queue::reject_item),
        )
        // QA control panel
        .route(
            "/api/admin/qa-control/variations",
            get(api::qa_control::list_variations).delete(api::qa_control::delete_variations),
        )
        .route("/api/admin/qa-control/runs", get(api::qa_control::list_runs))
        .route(
            "/api/admin/qa-control/confidence-distribution",
            get(api::qa_control::confidence_distribution),
        )
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
