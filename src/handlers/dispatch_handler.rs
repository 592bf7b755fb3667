// src/handlers/dispatch_handler.rs
//
// Operator-only routes.
use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    errors::RideResult,
    handlers::auth::Operator,
    models::{
        dispatch::{AssignmentRequest, ConfirmationRequest, DispatchStats, PendingFilter},
        driver::Driver,
        ride::RideRequest,
    },
    services::dispatch_service::DispatchOperations,
    state::AppState,
};

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Query(filter): Query<PendingFilter>,
) -> RideResult<Json<Vec<RideRequest>>> {
    Ok(Json(state.dispatch_service.list_pending(&filter).await?))
}

pub async fn list_available_drivers(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
) -> RideResult<Json<Vec<Driver>>> {
    Ok(Json(state.dispatch_service.list_available_drivers().await?))
}

pub async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Operator(operator): Operator,
    Json(assignment): Json<AssignmentRequest>,
) -> RideResult<Json<RideRequest>> {
    tracing::info!(
        "Operator {} assigning {} to {}",
        operator.id,
        assignment.driver_id,
        assignment.ride_id
    );
    let ride = state
        .dispatch_service
        .assign_driver(&assignment.ride_id, &assignment.driver_id)
        .await?;
    Ok(Json(ride))
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
    Path(ride_id): Path<String>,
    body: Option<Json<ConfirmationRequest>>,
) -> RideResult<Json<RideRequest>> {
    let notes = body.and_then(|Json(confirmation)| confirmation.notes);
    let ride = state.dispatch_service.confirm_booking(&ride_id, notes).await?;
    Ok(Json(ride))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Operator(_operator): Operator,
) -> RideResult<Json<DispatchStats>> {
    Ok(Json(state.dispatch_service.stats().await?))
}
