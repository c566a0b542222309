//! Route configuration for the sensor node

use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Sensor endpoints
        .route("/api/sensor", get(handlers::sensor_handler))
        .route("/api/measurement", get(handlers::measurement_handler))
        .route("/ws", get(handlers::ws_handler))

        // Health check
        .route("/health", get(handlers::health_handler))
        .with_state(state)
}
