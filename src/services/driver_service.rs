// src/services/driver_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::driver::{
        Driver, DriverAvailabilityUpdate, DriverRegistration, DriverStatus, DriverStatusUpdate, Vehicle,
    },
    services::store_service::StoreService,
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

#[async_trait]
pub trait DriverOperations: Send + Sync {
    async fn register_driver(&self, registration: DriverRegistration) -> RideResult<Driver>;
    async fn get_driver(&self, driver_id: &str) -> RideResult<Driver>;
    async fn update_driver_status(&self, driver_id: &str, update: DriverStatusUpdate) -> RideResult<Driver>;
    async fn update_availability(&self, driver_id: &str, update: DriverAvailabilityUpdate) -> RideResult<Driver>;
}

pub struct DriverService {
    store: Arc<StoreService>,
}

impl DriverService {
    pub fn new(store: Arc<StoreService>) -> Self {
        Self { store }
    }

    /// Drops a reservation whose ride has already closed or no longer exists.
    /// Such leftovers come from a release that failed after the ride ended.
    async fn clear_stale_reservation(&self, driver_id: &str) -> RideResult<()> {
        let Some(driver) = self.store.get_driver(driver_id).await? else {
            return Ok(());
        };
        let Some(ride_id) = driver.current_ride_id else {
            return Ok(());
        };

        let stale = match self.store.get_ride(&ride_id).await? {
            Some(ride) => ride.status.is_terminal(),
            None => true,
        };
        if !stale {
            return Ok(());
        }

        let now = Utc::now();
        self.store
            .mutate_driver(driver_id, |driver| {
                if driver.current_ride_id.as_deref() == Some(ride_id.as_str()) {
                    driver.current_ride_id = None;
                    driver.updated_at = now;
                }
                Ok(())
            })
            .await?;
        tracing::warn!("Cleared stale reservation of driver {} on ride {}", driver_id, ride_id);
        Ok(())
    }
}

#[async_trait]
impl DriverOperations for DriverService {
    async fn register_driver(&self, registration: DriverRegistration) -> RideResult<Driver> {
        registration.validate()?;
        tracing::info!("Registering driver: {} {}", registration.first_name, registration.last_name);

        let vehicle = Vehicle {
            license_plate: registration.license_plate.trim().to_uppercase(),
            vehicle_type: registration.vehicle_type,
            make: registration.vehicle_make,
            model: registration.vehicle_model,
            color: registration.vehicle_color,
            seats: registration.seats,
        };

        let now = Utc::now();
        let driver = Driver {
            id: String::new(),
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            phone_number: registration.phone_number.trim().to_string(),
            email: registration.email,
            vehicle,
            // New drivers go on the roster only once an operator makes them available.
            is_available: false,
            status: DriverStatus::Active,
            current_ride_id: None,
            total_rides: 0,
            created_at: now,
            updated_at: now,
        }
        .with_generated_id(IdType::Driver);

        self.store.insert_driver(&driver).await?;

        tracing::info!("Driver registered successfully: {}", driver.id);
        Ok(driver)
    }

    async fn get_driver(&self, driver_id: &str) -> RideResult<Driver> {
        IdGenerator::check_driver_id(driver_id)?;
        tracing::debug!("Getting driver: {}", driver_id);

        self.store
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| RideError::driver_not_found(driver_id))
    }

    async fn update_driver_status(&self, driver_id: &str, update: DriverStatusUpdate) -> RideResult<Driver> {
        IdGenerator::check_driver_id(driver_id)?;
        tracing::info!("Updating driver status: {} to {:?}", driver_id, update.status);
        self.clear_stale_reservation(driver_id).await?;

        let now = Utc::now();
        self.store
            .mutate_driver(driver_id, |driver| {
                if update.status == DriverStatus::Inactive && driver.current_ride_id.is_some() {
                    return Err(RideError::conflict("driver has an active ride"));
                }
                driver.status = update.status;
                if update.status == DriverStatus::Inactive {
                    driver.is_available = false;
                }
                driver.updated_at = now;
                Ok(())
            })
            .await
    }

    async fn update_availability(&self, driver_id: &str, update: DriverAvailabilityUpdate) -> RideResult<Driver> {
        IdGenerator::check_driver_id(driver_id)?;
        tracing::info!("Updating driver availability: {} to {}", driver_id, update.is_available);
        self.clear_stale_reservation(driver_id).await?;

        let now = Utc::now();
        self.store
            .mutate_driver(driver_id, |driver| {
                if update.is_available {
                    if driver.status != DriverStatus::Active {
                        return Err(RideError::conflict("inactive drivers cannot be made available"));
                    }
                    if driver.current_ride_id.is_some() {
                        return Err(RideError::conflict("driver has an active ride"));
                    }
                }
                driver.is_available = update.is_available;
                driver.updated_at = now;
                Ok(())
            })
            .await
    }
}
