use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/catalog/:kind/discover", get(handlers::discover))
        .route("/catalog/:kind/search", get(handlers::search))
        .route("/catalog/:kind/categories/:category", get(handlers::category))
        .route("/catalog/:kind/genres", get(handlers::genres))
        // Collections
        .route(
            "/collections",
            get(handlers::list_memberships)
                .post(handlers::add_membership)
                .delete(handlers::remove_membership),
        )
        .route("/collections/check", get(handlers::check_membership))
        // Cache
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache", delete(handlers::clear_cache))
}
