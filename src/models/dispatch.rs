// src/models/dispatch.rs
use serde::{Deserialize, Serialize};

use crate::models::money::Money;
use crate::models::ride::BookingType;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub ride_id: String,
    pub driver_id: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfirmationRequest {
    pub notes: Option<String>,
}

/// Filters for the operator's pending queue.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct PendingFilter {
    pub confirmed: Option<bool>,
    pub booking_type: Option<BookingType>,
    #[serde(default)]
    pub advanced_only: bool,
}

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct DispatchStats {
    pub total_rides: u64,
    pub pending: u64,
    pub accepted: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub unconfirmed_advanced: u64,
    pub shared_rides: u64,
    pub split_fare_rides: u64,
    pub completed_revenue: Money,
    pub average_rating: Option<f32>,
}
