// src/services/dispatch_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::{
        dispatch::{DispatchStats, PendingFilter},
        driver::Driver,
        money::Money,
        ride::{RideRequest, RideStatus},
    },
    services::store_service::StoreService,
    utils::id_generator::IdGenerator,
};

#[async_trait]
pub trait DispatchOperations: Send + Sync {
    async fn list_pending(&self, filter: &PendingFilter) -> RideResult<Vec<RideRequest>>;
    async fn list_available_drivers(&self) -> RideResult<Vec<Driver>>;
    async fn assign_driver(&self, ride_id: &str, driver_id: &str) -> RideResult<RideRequest>;
    async fn confirm_booking(&self, ride_id: &str, notes: Option<String>) -> RideResult<RideRequest>;
    async fn stats(&self) -> RideResult<DispatchStats>;
    async fn release_driver(&self, driver_id: &str, ride_id: &str, completed: bool) -> RideResult<()>;
}

pub struct DispatchService {
    store: Arc<StoreService>,
    auto_toggle_availability: bool,
}

impl DispatchService {
    pub fn new(store: Arc<StoreService>, auto_toggle_availability: bool) -> Self {
        Self {
            store,
            auto_toggle_availability,
        }
    }

    /// Takes the driver off the available roster for `ride_id`. Fails with
    /// `DriverUnavailable` if someone else reserved them first.
    async fn reserve_driver(&self, driver_id: &str, ride_id: &str) -> RideResult<Driver> {
        let now = Utc::now();
        self.store
            .mutate_driver(driver_id, |driver| {
                if !driver.is_dispatchable() {
                    return Err(RideError::DriverUnavailable(driver.id.clone()));
                }
                driver.is_available = false;
                driver.current_ride_id = Some(ride_id.to_string());
                driver.updated_at = now;
                Ok(())
            })
            .await
    }

    async fn cancel_reservation(&self, driver_id: &str, ride_id: &str) {
        let now = Utc::now();
        let released = self
            .store
            .mutate_driver(driver_id, |driver| {
                if driver.current_ride_id.as_deref() == Some(ride_id) {
                    driver.current_ride_id = None;
                    driver.is_available = true;
                    driver.updated_at = now;
                }
                Ok(())
            })
            .await;

        if let Err(err) = released {
            tracing::warn!(driver_id, ride_id, error = %err, "failed to release driver reservation");
        }
    }
}

fn matches_filter(ride: &RideRequest, filter: &PendingFilter) -> bool {
    if filter.advanced_only && !ride.booking_type.is_advanced() {
        return false;
    }
    if filter.booking_type.is_some_and(|wanted| wanted != ride.booking_type) {
        return false;
    }
    if filter.confirmed.is_some_and(|wanted| wanted != ride.is_confirmed) {
        return false;
    }
    true
}

pub(crate) fn summarize(rides: &[RideRequest]) -> DispatchStats {
    let mut stats = DispatchStats {
        total_rides: rides.len() as u64,
        ..Default::default()
    };
    let mut rating_sum = 0u64;
    let mut rated = 0u64;

    for ride in rides {
        match ride.status {
            RideStatus::Pending => stats.pending += 1,
            RideStatus::Accepted => stats.accepted += 1,
            RideStatus::InProgress => stats.in_progress += 1,
            RideStatus::Completed => {
                stats.completed += 1;
                stats.completed_revenue = stats.completed_revenue + ride.actual_price.unwrap_or(Money::ZERO);
            }
            RideStatus::Cancelled => stats.cancelled += 1,
        }

        if ride.booking_type.is_advanced() && !ride.is_confirmed && !ride.status.is_terminal() {
            stats.unconfirmed_advanced += 1;
        }
        if ride.is_shared_ride {
            stats.shared_rides += 1;
        }
        if ride.split_fare.as_ref().is_some_and(|split| split.enabled) {
            stats.split_fare_rides += 1;
        }
        if let Some(rating) = ride.rating {
            rating_sum += u64::from(rating);
            rated += 1;
        }
    }

    if rated > 0 {
        stats.average_rating = Some(rating_sum as f32 / rated as f32);
    }
    stats
}

#[async_trait]
impl DispatchOperations for DispatchService {
    async fn list_pending(&self, filter: &PendingFilter) -> RideResult<Vec<RideRequest>> {
        let mut pending: Vec<RideRequest> = self
            .store
            .all_rides()
            .await?
            .into_iter()
            .filter(|ride| ride.status == RideStatus::Pending && matches_filter(ride, filter))
            .collect();

        pending.sort_by_key(|ride| ride.scheduled_time);
        tracing::debug!("Pending queue holds {} rides", pending.len());
        Ok(pending)
    }

    async fn list_available_drivers(&self) -> RideResult<Vec<Driver>> {
        let mut drivers: Vec<Driver> = self
            .store
            .all_drivers()
            .await?
            .into_iter()
            .filter(Driver::is_dispatchable)
            .collect();

        drivers.sort_by_key(|driver| driver.created_at);
        Ok(drivers)
    }

    async fn assign_driver(&self, ride_id: &str, driver_id: &str) -> RideResult<RideRequest> {
        IdGenerator::check_ride_id(ride_id)?;
        IdGenerator::check_driver_id(driver_id)?;

        let ride = self
            .store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| RideError::ride_not_found(ride_id))?;
        if ride.status != RideStatus::Pending || ride.assigned_driver.is_some() {
            return Err(RideError::RequestNotPending(ride.status));
        }

        let driver = self
            .store
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| RideError::driver_not_found(driver_id))?;
        if !driver.is_dispatchable() {
            return Err(RideError::DriverUnavailable(driver_id.to_string()));
        }

        if self.auto_toggle_availability {
            self.reserve_driver(driver_id, ride_id).await?;
        }

        // Index first: listings check the ride's driver of record, so a stale entry is harmless.
        let committed = match self.store.index_driver_ride(driver_id, ride_id).await {
            Ok(()) => {
                let now = Utc::now();
                self.store
                    .mutate_ride(ride_id, |ride| ride.assign_driver(driver_id, now))
                    .await
            }
            Err(err) => Err(err),
        };

        match committed {
            Ok(ride) => {
                tracing::info!("Driver {} assigned to ride {}", driver_id, ride_id);
                if ride.booking_type.is_advanced() && !ride.is_confirmed {
                    tracing::info!("Ride {} still awaits operator confirmation", ride_id);
                }
                Ok(ride)
            }
            Err(err) => {
                if self.auto_toggle_availability {
                    self.cancel_reservation(driver_id, ride_id).await;
                }
                tracing::warn!("Assignment of {} to {} rejected: {}", driver_id, ride_id, err);
                Err(err)
            }
        }
    }

    async fn confirm_booking(&self, ride_id: &str, notes: Option<String>) -> RideResult<RideRequest> {
        IdGenerator::check_ride_id(ride_id)?;
        let notes = notes.filter(|text| !text.trim().is_empty());

        let now = Utc::now();
        let ride = self
            .store
            .mutate_ride(ride_id, |ride| ride.confirm(notes.clone(), now))
            .await?;

        tracing::info!("Ride {} confirmed by operator", ride_id);
        Ok(ride)
    }

    async fn stats(&self) -> RideResult<DispatchStats> {
        let rides = self.store.all_rides().await?;
        Ok(summarize(&rides))
    }

    /// Called once a ride reaches a terminal state.
    async fn release_driver(&self, driver_id: &str, ride_id: &str, completed: bool) -> RideResult<()> {
        let now = Utc::now();
        let auto_toggle = self.auto_toggle_availability;

        self.store
            .mutate_driver(driver_id, |driver| {
                if completed {
                    driver.total_rides += 1;
                }
                if driver.current_ride_id.as_deref() == Some(ride_id) {
                    driver.current_ride_id = None;
                    if auto_toggle {
                        driver.is_available = true;
                    }
                }
                driver.updated_at = now;
                Ok(())
            })
            .await?;

        tracing::info!("Driver {} released from ride {}", driver_id, ride_id);
        Ok(())
    }
}
