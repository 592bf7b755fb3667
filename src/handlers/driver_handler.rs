// src/handlers/driver_handler.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::{RideError, RideResult},
    handlers::auth::{AuthUser, Operator},
    models::{
        driver::{Driver, DriverAvailabilityUpdate, DriverRegistration, DriverStatusUpdate},
        ride::RideRequest,
    },
    services::{driver_service::DriverOperations, ride_service::RideOperations},
    state::AppState,
};

pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Json(registration): Json<DriverRegistration>,
) -> RideResult<(StatusCode, Json<Driver>)> {
    let driver = state.driver_service.register_driver(registration).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Path(driver_id): Path<String>,
) -> RideResult<Json<Driver>> {
    Ok(Json(state.driver_service.get_driver(&driver_id).await?))
}

pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Path(driver_id): Path<String>,
    Json(update): Json<DriverAvailabilityUpdate>,
) -> RideResult<Json<Driver>> {
    Ok(Json(state.driver_service.update_availability(&driver_id, update).await?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Path(driver_id): Path<String>,
    Json(update): Json<DriverStatusUpdate>,
) -> RideResult<Json<Driver>> {
    Ok(Json(state.driver_service.update_driver_status(&driver_id, update).await?))
}

/// The driver's own rides, or any driver's for an operator.
pub async fn list_driver_rides(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(driver_id): Path<String>,
) -> RideResult<Json<Vec<RideRequest>>> {
    if !caller.is_operator() && caller.id != driver_id {
        return Err(RideError::InsufficientPermissions);
    }
    Ok(Json(state.ride_service.list_driver_rides(&driver_id).await?))
}
