// src/models/driver.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,   // Employed and allowed to take rides
    Inactive, // Suspended, off the roster
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Hatchback,
    Minibus,
    Van,
    Bakkie, // Light truck for furniture moves
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub make: String,
    pub model: String,
    pub color: String,
    pub seats: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Driver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub vehicle: Vehicle,
    pub is_available: bool,
    pub status: DriverStatus,
    pub current_ride_id: Option<String>, // Ride reserved by dispatch
    pub total_rides: u32,                // Completed rides
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Drivers dispatch may bind to a pending ride.
    pub fn is_dispatchable(&self) -> bool {
        self.is_available && self.status == DriverStatus::Active
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverRegistration {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_color: String,
    pub seats: u8,
}

impl DriverRegistration {
    pub fn validate(&self) -> crate::RideResult<()> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone_number", &self.phone_number),
            ("license_plate", &self.license_plate),
        ] {
            if value.trim().is_empty() {
                errors.push(crate::ValidationError {
                    field: field.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        if self.seats == 0 {
            errors.push(crate::ValidationError {
                field: "seats".to_string(),
                message: "vehicle needs at least one passenger seat".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::RideError::ValidationFailed(errors))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverStatusUpdate {
    pub status: DriverStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverAvailabilityUpdate {
    pub is_available: bool,
}
