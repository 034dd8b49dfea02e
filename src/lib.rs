//! D4 Media Reservation Server
//!
//! Reservation core for D4 Media: equipment inventory, checkouts, rentals
//! and studio bookings behind a REST JSON API.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Equipment
        .route(
            "/equipment",
            get(api::equipment::list_equipment).post(api::equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(api::equipment::get_equipment)
                .put(api::equipment::update_equipment)
                .delete(api::equipment::delete_equipment),
        )
        .route("/equipment/:id/maintenance", post(api::equipment::record_maintenance))
        .route("/equipment/:id/in-out", post(api::equipment::record_in_out))
        // Studios
        .route(
            "/studios",
            get(api::studios::list_studios).post(api::studios::create_studio),
        )
        // Availability & pricing
        .route("/availability", get(api::availability::check_availability))
        .route("/pricing/estimate", post(api::pricing::estimate))
        // Reservations
        .route(
            "/reservations",
            get(api::reservations::list_reservations).post(api::reservations::create_reservation),
        )
        .route(
            "/reservations/:id",
            get(api::reservations::get_reservation)
                .patch(api::reservations::amend_reservation)
                .delete(api::reservations::delete_reservation),
        )
        .route("/reservations/:id/approve", post(api::reservations::approve_reservation))
        .route("/reservations/:id/status", put(api::reservations::update_status))
        .route("/reservations/:id/return", post(api::reservations::return_items))
        .route("/reservations/:id/invoice", get(api::reservations::get_invoice))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
