//! HTTP Router

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::ApiState;

/// Create the API router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/discover", post(handlers::discover))
        .route(
            "/api/devices",
            get(handlers::list_devices).post(handlers::add_device),
        )
        .route(
            "/api/devices/{id}",
            get(handlers::get_device).delete(handlers::delete_device),
        )
        .route("/api/devices/{id}/power", post(handlers::set_power))
        .route("/api/devices/{id}/toggle", post(handlers::toggle_power))
        .route("/api/devices/{id}/brightness", post(handlers::set_brightness))
        .route("/api/devices/{id}/color", post(handlers::set_color))
        .route("/api/devices/{id}/colortemp", post(handlers::set_color_temp))
        .route("/api/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
