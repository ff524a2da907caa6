use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{batch, combinations, handlers, middleware::metrics_middleware, reports};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Discovery and registration
        .route("/discovery", post(batch::discover))
        .route("/registrations", post(batch::register))
        // Ticks
        .route("/scheduler/tick", post(batch::scheduler_tick))
        .route("/reconciler/tick", post(batch::reconciler_tick))
        // Reporting
        .route("/summary", get(reports::get_summary))
        .route("/status-document", get(reports::get_status_document))
        .route("/capacity", get(reports::get_capacity))
        .route("/capacity/recount", post(reports::recount_capacity))
        // Combinations
        .route("/combinations", get(combinations::list_combinations))
        .route(
            "/combinations/{enterprise}/{contract}/{version}",
            get(combinations::get_combination),
        )
        .route(
            "/combinations/{enterprise}/{contract}/{version}/reset",
            post(combinations::reset_combination),
        )
        .route("/reset-failed", post(batch::reset_failed));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
