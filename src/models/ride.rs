// src/models/ride.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{RideError, RideResult, ValidationError};
use crate::models::money::Money;

/// How far in the past a requested pickup time may lie before it is rejected.
pub const SCHEDULE_GRACE_MINUTES: i64 = 5;
pub const MIN_SPLIT_PARTICIPANTS: u8 = 2;
pub const MAX_SPLIT_PARTICIPANTS: u8 = 6;
/// Upper bound on a fare reported at completion.
pub const MAX_FARE: Money = Money::from_cents(1_000_000_00);

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,    // Submitted, waiting for a driver
    Accepted,   // Driver bound by dispatch
    InProgress, // Driver started the trip
    Completed,
    Cancelled,
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    #[default]
    Regular,
    SemesterMoveIn,
    SemesterMoveOut,
    HolidayTransport,
    GroupBooking,
}

impl BookingType {
    /// Advanced bookings need operator sign-off before an assignment is final.
    pub const fn is_advanced(&self) -> bool {
        !matches!(self, BookingType::Regular)
    }

    pub const fn is_semester_move(&self) -> bool {
        matches!(self, BookingType::SemesterMoveIn | BookingType::SemesterMoveOut)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Mapping,  // External routing service
    Fallback, // Straight-line estimate
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, address: None }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Auxiliary fields carried by advanced booking types.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BookingDetails {
    pub semester: Option<String>,
    pub academic_year: Option<String>,
    pub holiday_type: Option<String>,
    pub group_size: Option<u8>,
    pub luggage_count: Option<u32>,
    #[serde(default)]
    pub furniture_items: Vec<String>,
    pub special_requirements: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SplitFare {
    pub enabled: bool,
    pub total_participants: u8,
    pub participants: Vec<String>,
    pub is_open: bool,
    /// Current allocation, one share per allocated seat, first share takes the remainder.
    pub shares: Vec<Money>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRequest {
    pub id: String,
    pub requester_id: String,
    pub assigned_driver: Option<String>,

    // Geometry and computed estimate
    pub pickup: Location,
    pub dropoff: Location,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub estimate_source: EstimateSource,
    pub estimated_price: Money,
    pub actual_price: Option<Money>,
    pub currency: String,

    // Scheduling
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Classification
    pub booking_type: BookingType,
    pub booking_details: BookingDetails,
    pub split_fare: Option<SplitFare>,
    pub is_shared_ride: bool,
    pub max_shared_passengers: u8,

    // Lifecycle
    pub status: RideStatus,
    pub is_confirmed: bool,
    pub confirmation_notes: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Driver that held the ride when it was cancelled.
    #[serde(default)]
    pub cancelled_driver: Option<String>,

    // Feedback
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SplitFareRequest {
    pub total_participants: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideSubmission {
    pub pickup: Location,
    pub dropoff: Location,
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub booking_type: BookingType,
    #[serde(default)]
    pub booking_details: BookingDetails,
    pub split_fare: Option<SplitFareRequest>,
    #[serde(default)]
    pub is_shared_ride: bool,
    pub max_shared_passengers: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EstimateRequest {
    pub pickup: Location,
    pub dropoff: Location,
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub booking_type: BookingType,
    #[serde(default)]
    pub booking_details: BookingDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FareQuote {
    pub base_fare: Money,
    pub distance_fare: Money,
    pub booking_multiplier: f64,
    pub surcharges: Money,
    pub minimum_applied: bool,
    pub total: Money,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub source: EstimateSource,
    pub estimated_price: Money,
    pub fare: FareQuote,
    pub similar_rides: Vec<RideMatch>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideStatusUpdate {
    pub status: RideStatus,
    pub actual_price: Option<Money>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RatingRequest {
    pub rating: u8,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublicRidesQuery {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    pub date: Option<NaiveDate>,
}

impl PublicRidesQuery {
    pub fn pickup(&self) -> Location {
        Location::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn dropoff(&self) -> Location {
        Location::new(self.dropoff_lat, self.dropoff_lng)
    }
}

/// Public view of a comparable ride. Carries no requester identity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RideMatch {
    pub ride_id: String,
    pub pickup: Location,
    pub dropoff: Location,
    pub scheduled_time: DateTime<Utc>,
    pub status: RideStatus,
    pub booking_type: BookingType,
    pub is_shared_ride: bool,
    pub max_shared_passengers: u8,
    pub pickup_offset_m: f64,
    pub dropoff_offset_m: f64,
}

/// Matches keyed by calendar day (`YYYY-MM-DD`), each group ordered by scheduled time.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct MatchGroups {
    pub groups: BTreeMap<String, Vec<RideMatch>>,
}

impl MatchGroups {
    pub fn date_key(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn for_date(&self, date: NaiveDate) -> &[RideMatch] {
        self.groups
            .get(&Self::date_key(date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn into_date(mut self, date: NaiveDate) -> Vec<RideMatch> {
        self.groups.remove(&Self::date_key(date)).unwrap_or_default()
    }
}

// Helper implementations
impl RideSubmission {
    /// Collects every field problem instead of stopping at the first one.
    pub fn validate(&self, now: DateTime<Utc>) -> RideResult<()> {
        let mut errors = Vec::new();
        let mut fail = |field: &str, message: &str| {
            errors.push(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if !self.pickup.is_valid() {
            fail("pickup", "coordinates out of range");
        }
        if !self.dropoff.is_valid() {
            fail("dropoff", "coordinates out of range");
        }

        if let Some(at) = self.scheduled_time {
            if at < now - Duration::minutes(SCHEDULE_GRACE_MINUTES) {
                fail("scheduled_time", "must not be in the past");
            }
        }

        let details = &self.booking_details;
        match self.booking_type {
            BookingType::SemesterMoveIn | BookingType::SemesterMoveOut => {
                if details.semester.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    fail("booking_details.semester", "required for semester moves");
                }
                if details.academic_year.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    fail("booking_details.academic_year", "required for semester moves");
                }
            }
            BookingType::HolidayTransport => {
                if details.holiday_type.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    fail("booking_details.holiday_type", "required for holiday transport");
                }
            }
            BookingType::GroupBooking => {
                if details.group_size.is_none_or(|n| n < 2) {
                    fail("booking_details.group_size", "group bookings need at least 2 people");
                }
            }
            BookingType::Regular => {}
        }

        if let Some(split) = &self.split_fare {
            if !(MIN_SPLIT_PARTICIPANTS..=MAX_SPLIT_PARTICIPANTS).contains(&split.total_participants) {
                fail("split_fare.total_participants", "must be between 2 and 6");
            }
        }

        if self.is_shared_ride && self.max_shared_passengers.is_some_and(|n| n < 1) {
            fail("max_shared_passengers", "must be at least 1");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RideError::ValidationFailed(errors))
        }
    }
}

impl EstimateRequest {
    pub fn validate(&self) -> RideResult<()> {
        if !self.pickup.is_valid() {
            return Err(RideError::validation_error("pickup", "coordinates out of range"));
        }
        if !self.dropoff.is_valid() {
            return Err(RideError::validation_error("dropoff", "coordinates out of range"));
        }
        Ok(())
    }
}

impl RideRequest {
    pub fn to_match(&self, pickup_offset_m: f64, dropoff_offset_m: f64) -> RideMatch {
        RideMatch {
            ride_id: self.id.clone(),
            pickup: self.pickup.clone(),
            dropoff: self.dropoff.clone(),
            scheduled_time: self.scheduled_time,
            status: self.status,
            booking_type: self.booking_type,
            is_shared_ride: self.is_shared_ride,
            max_shared_passengers: self.max_shared_passengers,
            pickup_offset_m,
            dropoff_offset_m,
        }
    }

    /// Rides that may still be matched or shown as public rides.
    pub fn is_matchable(&self) -> bool {
        matches!(self.status, RideStatus::Pending | RideStatus::Accepted)
    }

    /// Assignment counts as final once a driver is bound and, for advanced
    /// bookings, the operator has signed off.
    pub fn is_assignment_final(&self) -> bool {
        self.assigned_driver.is_some() && (!self.booking_type.is_advanced() || self.is_confirmed)
    }
}
