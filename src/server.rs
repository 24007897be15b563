use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::endpoint;
use crate::middleware::instrument;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        // ── Auth endpoints ──────────────────────────────────────
        .route(
            "/api/auth",
            post(handlers::auth::register)
                .put(handlers::auth::login)
                .delete(handlers::auth::logout),
        )
        // ── Order endpoints ─────────────────────────────────────
        .route("/api/order/menu", get(handlers::order::get_menu))
        .route("/api/order", post(handlers::order::create_order))
        // ── Local metrics view ──────────────────────────────────
        .route("/api/metrics", get(endpoint::get_metrics))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(metrics, instrument::track_requests))
        .layer(CorsLayer::permissive())
}
