// src/handlers/mod.rs
use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{errors::RideResult, state::AppState};

pub mod auth;
pub mod dispatch_handler;
pub mod driver_handler;
pub mod ride_handler;

pub async fn health(State(state): State<Arc<AppState>>) -> RideResult<Json<Value>> {
    state.store_service.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Rides
        .route("/rides", post(ride_handler::submit_ride))
        .route("/rides/estimate", post(ride_handler::estimate_ride))
        .route("/rides/mine", get(ride_handler::list_my_rides))
        .route("/rides/public", get(ride_handler::list_public_rides))
        .route("/rides/:id", get(ride_handler::get_ride))
        .route("/rides/:id/status", put(ride_handler::update_status))
        .route("/rides/:id/rating", post(ride_handler::rate_ride))
        .route("/rides/:id/participants", post(ride_handler::join_split_fare))
        .route("/rides/:id/split/close", post(ride_handler::close_split_fare))
        .route("/rides/:id/sharing", get(ride_handler::sharing_candidates))
        // Dispatch
        .route("/dispatch/pending", get(dispatch_handler::list_pending))
        .route("/dispatch/drivers/available", get(dispatch_handler::list_available_drivers))
        .route("/dispatch/assign", post(dispatch_handler::assign_driver))
        .route("/dispatch/rides/:id/confirm", post(dispatch_handler::confirm_booking))
        .route("/dispatch/stats", get(dispatch_handler::stats))
        // Drivers
        .route("/drivers", post(driver_handler::register_driver))
        .route("/drivers/:id", get(driver_handler::get_driver))
        .route("/drivers/:id/availability", put(driver_handler::update_availability))
        .route("/drivers/:id/status", put(driver_handler::update_status))
        .route("/drivers/:id/rides", get(driver_handler::list_driver_rides))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
