// src/handlers/ride_handler.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::RideResult,
    handlers::auth::AuthUser,
    models::ride::{
        EstimateRequest, MatchGroups, PublicRidesQuery, RatingRequest, RideEstimate, RideMatch, RideRequest,
        RideStatusUpdate, RideSubmission,
    },
    services::ride_service::RideOperations,
    state::AppState,
};

pub async fn estimate_ride(
    State(state): State<Arc<AppState>>,
    AuthUser(_caller): AuthUser,
    Json(request): Json<EstimateRequest>,
) -> RideResult<Json<RideEstimate>> {
    let estimate = state.ride_service.estimate_ride(request).await?;
    Ok(Json(estimate))
}

pub async fn submit_ride(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(submission): Json<RideSubmission>,
) -> RideResult<(StatusCode, Json<RideRequest>)> {
    let ride = state.ride_service.submit_ride(&caller, submission).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn get_ride(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
) -> RideResult<Json<RideRequest>> {
    Ok(Json(state.ride_service.get_ride(&caller, &ride_id).await?))
}

pub async fn list_my_rides(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> RideResult<Json<Vec<RideRequest>>> {
    Ok(Json(state.ride_service.list_my_rides(&caller.id).await?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
    Json(update): Json<RideStatusUpdate>,
) -> RideResult<Json<RideRequest>> {
    Ok(Json(state.ride_service.update_status(&caller, &ride_id, update).await?))
}

pub async fn rate_ride(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
    Json(rating): Json<RatingRequest>,
) -> RideResult<Json<RideRequest>> {
    Ok(Json(state.ride_service.rate_ride(&caller, &ride_id, rating).await?))
}

pub async fn join_split_fare(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
) -> RideResult<Json<RideRequest>> {
    Ok(Json(state.ride_service.join_split_fare(&caller, &ride_id).await?))
}

pub async fn close_split_fare(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
) -> RideResult<Json<RideRequest>> {
    Ok(Json(state.ride_service.close_split_fare(&caller, &ride_id).await?))
}

pub async fn sharing_candidates(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(ride_id): Path<String>,
) -> RideResult<Json<Vec<RideMatch>>> {
    Ok(Json(state.ride_service.sharing_candidates(&caller, &ride_id).await?))
}

// Public: no credentials required.
pub async fn list_public_rides(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicRidesQuery>,
) -> RideResult<Json<MatchGroups>> {
    Ok(Json(state.ride_service.list_public_rides(query).await?))
}
