// src/services/ride_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::{
        identity::{Identity, Role},
        ride::{
            EstimateRequest, MatchGroups, PublicRidesQuery, RatingRequest, RideEstimate, RideMatch, RideRequest,
            RideStatus, RideStatusUpdate, RideSubmission, SplitFare,
        },
    },
    services::{
        dispatch_service::{DispatchOperations, DispatchService},
        fare_service::FareCalculator,
        geo_service::RouteEstimator,
        route_matcher::RouteMatcher,
        store_service::StoreService,
    },
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

#[async_trait]
pub trait RideOperations: Send + Sync {
    async fn estimate_ride(&self, request: EstimateRequest) -> RideResult<RideEstimate>;
    async fn submit_ride(&self, requester: &Identity, submission: RideSubmission) -> RideResult<RideRequest>;
    async fn get_ride(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest>;
    async fn list_my_rides(&self, requester_id: &str) -> RideResult<Vec<RideRequest>>;
    async fn list_driver_rides(&self, driver_id: &str) -> RideResult<Vec<RideRequest>>;
    async fn update_status(&self, caller: &Identity, ride_id: &str, update: RideStatusUpdate) -> RideResult<RideRequest>;
    async fn rate_ride(&self, caller: &Identity, ride_id: &str, rating: RatingRequest) -> RideResult<RideRequest>;
    async fn join_split_fare(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest>;
    async fn close_split_fare(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest>;
    async fn list_public_rides(&self, query: PublicRidesQuery) -> RideResult<MatchGroups>;
    async fn sharing_candidates(&self, caller: &Identity, ride_id: &str) -> RideResult<Vec<RideMatch>>;
}

pub struct RideService {
    store: Arc<StoreService>,
    estimator: Arc<RouteEstimator>,
    fares: Arc<FareCalculator>,
    matcher: Arc<RouteMatcher>,
    dispatch: Arc<DispatchService>,
}

impl RideService {
    pub fn new(
        store: Arc<StoreService>,
        estimator: Arc<RouteEstimator>,
        fares: Arc<FareCalculator>,
        matcher: Arc<RouteMatcher>,
        dispatch: Arc<DispatchService>,
    ) -> Self {
        Self {
            store,
            estimator,
            fares,
            matcher,
            dispatch,
        }
    }

    async fn load(&self, ride_id: &str) -> RideResult<RideRequest> {
        IdGenerator::check_ride_id(ride_id)?;
        self.store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| RideError::ride_not_found(ride_id))
    }

    async fn mutate(
        &self,
        ride_id: &str,
        apply: impl FnMut(&mut RideRequest) -> RideResult<()> + Send,
    ) -> RideResult<RideRequest> {
        IdGenerator::check_ride_id(ride_id)?;
        self.store.mutate_ride(ride_id, apply).await
    }
}

fn can_view(caller: &Identity, ride: &RideRequest) -> bool {
    caller.is_operator()
        || ride.requester_id == caller.id
        || ride.driver_of_record() == Some(caller.id.as_str())
        || ride
            .split_fare
            .as_ref()
            .is_some_and(|split| split.participants.iter().any(|p| *p == caller.id))
}

/// Who may drive a ride to `target`. Pending and accepted targets are left to
/// the transition check, which rejects them.
fn authorize_status_change(caller: &Identity, ride: &RideRequest, target: RideStatus) -> RideResult<()> {
    let allowed = match target {
        RideStatus::Cancelled => caller.is_operator() || ride.requester_id == caller.id,
        RideStatus::InProgress | RideStatus::Completed => {
            caller.is_operator()
                || (caller.role == Role::Driver && ride.assigned_driver.as_deref() == Some(caller.id.as_str()))
        }
        RideStatus::Pending | RideStatus::Accepted => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(RideError::InsufficientPermissions)
    }
}

#[async_trait]
impl RideOperations for RideService {
    async fn estimate_ride(&self, request: EstimateRequest) -> RideResult<RideEstimate> {
        request.validate()?;

        let route = self.estimator.estimate(&request.pickup, &request.dropoff).await;
        let fare = self
            .fares
            .quote(route.distance_km, request.booking_type, &request.booking_details);

        let day = request.scheduled_date.unwrap_or_else(|| self.matcher.today());
        let rides = self.store.all_rides().await?;
        let similar_rides = self
            .matcher
            .find_matches(&request.pickup, &request.dropoff, Some(day), &rides, None)
            .into_date(day);

        tracing::debug!(
            "Estimated {:.2} km ({:?}) at {} with {} similar rides",
            route.distance_km,
            route.source,
            fare.total,
            similar_rides.len()
        );

        Ok(RideEstimate {
            distance_km: route.distance_km,
            eta_minutes: route.eta_minutes,
            source: route.source,
            estimated_price: fare.total,
            fare,
            similar_rides,
        })
    }

    async fn submit_ride(&self, requester: &Identity, submission: RideSubmission) -> RideResult<RideRequest> {
        let now = Utc::now();
        submission.validate(now)?;
        tracing::info!("Submitting {:?} ride for {}", submission.booking_type, requester.id);

        let route = self.estimator.estimate(&submission.pickup, &submission.dropoff).await;
        let estimated_price = self.fares.price(
            route.distance_km,
            submission.booking_type,
            &submission.booking_details,
        );
        let split_fare = submission
            .split_fare
            .as_ref()
            .map(|split| SplitFare::new(&requester.id, split.total_participants, estimated_price));
        let max_shared_passengers = if submission.is_shared_ride {
            submission.max_shared_passengers.unwrap_or(1).max(1)
        } else {
            1
        };

        let ride = RideRequest {
            id: String::new(),
            requester_id: requester.id.clone(),
            assigned_driver: None,
            pickup: submission.pickup,
            dropoff: submission.dropoff,
            distance_km: route.distance_km,
            eta_minutes: route.eta_minutes,
            estimate_source: route.source,
            estimated_price,
            actual_price: None,
            currency: self.fares.config().currency.clone(),
            scheduled_time: submission.scheduled_time.unwrap_or(now),
            created_at: now,
            updated_at: now,
            booking_type: submission.booking_type,
            booking_details: submission.booking_details,
            split_fare,
            is_shared_ride: submission.is_shared_ride,
            max_shared_passengers,
            status: RideStatus::Pending,
            is_confirmed: false,
            confirmation_notes: None,
            confirmed_at: None,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_driver: None,
            rating: None,
            feedback: None,
            rated_at: None,
        }
        .with_generated_id(IdType::Ride);

        self.store.insert_ride(&ride).await?;

        tracing::info!("Ride {} created at {} {}", ride.id, ride.estimated_price, ride.currency);
        Ok(ride)
    }

    async fn get_ride(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest> {
        let ride = self.load(ride_id).await?;
        if !can_view(caller, &ride) {
            return Err(RideError::forbidden("ride belongs to another requester"));
        }
        Ok(ride)
    }

    async fn list_my_rides(&self, requester_id: &str) -> RideResult<Vec<RideRequest>> {
        let ids = self.store.ride_ids_for_requester(requester_id).await?;
        let mut rides = self.store.load_rides(&ids).await?;
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }

    async fn list_driver_rides(&self, driver_id: &str) -> RideResult<Vec<RideRequest>> {
        IdGenerator::check_driver_id(driver_id)?;
        let ids = self.store.ride_ids_for_driver(driver_id).await?;
        let mut rides: Vec<RideRequest> = self
            .store
            .load_rides(&ids)
            .await?
            .into_iter()
            .filter(|ride| ride.driver_of_record() == Some(driver_id))
            .collect();
        rides.sort_by_key(|ride| ride.scheduled_time);
        Ok(rides)
    }

    async fn update_status(&self, caller: &Identity, ride_id: &str, update: RideStatusUpdate) -> RideResult<RideRequest> {
        let target = update.status;
        let now = Utc::now();

        let result = self
            .mutate(ride_id, |ride| {
                authorize_status_change(caller, ride, target)?;
                ride.apply_status(target, update.actual_price, update.reason.clone(), now)
            })
            .await;

        let ride = match result {
            Ok(ride) => ride,
            Err(err) => {
                tracing::warn!("Status change of {} to {} rejected: {}", ride_id, target, err);
                return Err(err);
            }
        };
        tracing::info!("Ride {} is now {}", ride.id, ride.status);

        if ride.status.is_terminal() {
            if let Some(driver_id) = ride.driver_of_record() {
                let completed = ride.status == RideStatus::Completed;
                if let Err(err) = self.dispatch.release_driver(driver_id, &ride.id, completed).await {
                    tracing::warn!("Ride {} closed but driver {} was not released: {}", ride.id, driver_id, err);
                }
            }
        }
        Ok(ride)
    }

    async fn rate_ride(&self, caller: &Identity, ride_id: &str, rating: RatingRequest) -> RideResult<RideRequest> {
        let now = Utc::now();
        let ride = self
            .mutate(ride_id, |ride| {
                ride.rate(&caller.id, rating.rating, rating.feedback.clone(), now)
            })
            .await?;

        tracing::info!("Ride {} rated {}", ride.id, rating.rating);
        Ok(ride)
    }

    async fn join_split_fare(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest> {
        let now = Utc::now();
        let ride = self
            .mutate(ride_id, |ride| ride.join_split_fare(&caller.id, now))
            .await?;

        if let Some(split) = &ride.split_fare {
            tracing::info!(
                "{} joined split fare on {} ({}/{})",
                caller.id,
                ride.id,
                split.participants.len(),
                split.total_participants
            );
        }
        Ok(ride)
    }

    async fn close_split_fare(&self, caller: &Identity, ride_id: &str) -> RideResult<RideRequest> {
        let now = Utc::now();
        let ride = self
            .mutate(ride_id, |ride| {
                if !caller.is_operator() && ride.requester_id != caller.id {
                    return Err(RideError::InsufficientPermissions);
                }
                ride.close_split_fare(now)
            })
            .await?;

        tracing::info!("Split fare collection closed on {}", ride.id);
        Ok(ride)
    }

    async fn list_public_rides(&self, query: PublicRidesQuery) -> RideResult<MatchGroups> {
        let (pickup, dropoff) = (query.pickup(), query.dropoff());
        if !pickup.is_valid() || !dropoff.is_valid() {
            return Err(RideError::validation_error("coordinates", "coordinates out of range"));
        }

        let rides = self.store.all_rides().await?;
        Ok(self.matcher.find_matches(&pickup, &dropoff, query.date, &rides, None))
    }

    async fn sharing_candidates(&self, caller: &Identity, ride_id: &str) -> RideResult<Vec<RideMatch>> {
        let ride = self.get_ride(caller, ride_id).await?;
        let rides = self.store.all_rides().await?;
        Ok(self.matcher.sharing_candidates(&ride, &rides))
    }
}
