use std::sync::Arc;

use async_trait::async_trait;
use campus_rides::{
    models::{
        BookingDetails, BookingType, DriverAvailabilityUpdate, DriverRegistration, EstimateRequest, EstimateSource,
        Identity, Location, Money, PublicRidesQuery, RatingRequest, RideStatus, RideStatusUpdate, RideSubmission,
        Role, SplitFareRequest, VehicleType, MAX_FARE,
    },
    services::{
        geo_service::{MappingError, TravelEstimate},
        store_service::Store,
        DispatchOperations, DriverOperations, FareCalculator, MappingService, PricingConfig, RideOperations,
        StaticIdentityProvider, StoreService,
    },
    AppConfig, AppState, RideError,
};

fn state() -> Arc<AppState> {
    Arc::new(AppState::in_memory(
        AppConfig::default(),
        Arc::new(StaticIdentityProvider::new()),
    ))
}

fn student(id: &str) -> Identity {
    Identity::new(id, Role::Student)
}

fn operator() -> Identity {
    Identity::new("ops-1", Role::Operator)
}

fn pickup() -> Location {
    Location::new(-23.8962, 29.4473)
}

fn dropoff() -> Location {
    Location::new(-23.8803, 29.7385)
}

fn submission() -> RideSubmission {
    RideSubmission {
        pickup: pickup(),
        dropoff: dropoff(),
        scheduled_time: None,
        booking_type: BookingType::Regular,
        booking_details: BookingDetails::default(),
        split_fare: None,
        is_shared_ride: false,
        max_shared_passengers: None,
    }
}

fn status(status: RideStatus) -> RideStatusUpdate {
    RideStatusUpdate {
        status,
        actual_price: None,
        reason: None,
    }
}

async fn available_driver(state: &AppState, name: &str) -> String {
    let driver = state
        .driver_service
        .register_driver(DriverRegistration {
            first_name: name.to_string(),
            last_name: "Driver".to_string(),
            phone_number: "+27 15 555 0100".to_string(),
            email: None,
            license_plate: format!("{} GP", name),
            vehicle_type: VehicleType::Sedan,
            vehicle_make: "VW".to_string(),
            vehicle_model: "Polo".to_string(),
            vehicle_color: "Silver".to_string(),
            seats: 4,
        })
        .await
        .unwrap();
    state
        .driver_service
        .update_availability(&driver.id, DriverAvailabilityUpdate { is_available: true })
        .await
        .unwrap();
    driver.id
}

#[tokio::test]
async fn estimate_is_positive_and_reproducible() {
    let state = state();
    let request = EstimateRequest {
        pickup: pickup(),
        dropoff: dropoff(),
        scheduled_date: None,
        booking_type: BookingType::Regular,
        booking_details: BookingDetails::default(),
    };

    let first = state.ride_service.estimate_ride(request.clone()).await.unwrap();
    let second = state.ride_service.estimate_ride(request).await.unwrap();

    assert!(first.distance_km > 0.0);
    assert!(first.estimated_price > Money::ZERO);
    assert_eq!(first.estimated_price, second.estimated_price);
    assert_eq!(first.source, EstimateSource::Fallback);
    assert!(first.similar_rides.is_empty());
}

#[test]
fn split_allocations_are_exact() {
    let fares = FareCalculator::new(PricingConfig::default());
    assert_eq!(
        fares.split(Money::from_major(150.0), 3),
        vec![Money::from_major(50.0); 3]
    );

    let shares = fares.split(Money::from_major(100.0), 3);
    assert_eq!(shares[0], Money::from_major(33.34));
    assert_eq!(shares.iter().sum::<Money>(), Money::from_major(100.0));
}

#[tokio::test]
async fn split_fare_ride_collects_until_full() {
    let state = state();
    let mut request = submission();
    request.split_fare = Some(SplitFareRequest { total_participants: 3 });

    let ride = state.ride_service.submit_ride(&student("s1"), request).await.unwrap();
    let split = ride.split_fare.as_ref().unwrap();
    assert_eq!(split.shares.len(), 3);
    assert_eq!(split.shares.iter().sum::<Money>(), ride.estimated_price);

    state.ride_service.join_split_fare(&student("s2"), &ride.id).await.unwrap();
    let full = state.ride_service.join_split_fare(&student("s3"), &ride.id).await.unwrap();
    assert!(!full.split_fare.as_ref().unwrap().is_open);

    let late = state.ride_service.join_split_fare(&student("s4"), &ride.id).await;
    assert!(matches!(late, Err(RideError::SplitFareClosed)));
}

#[tokio::test]
async fn rating_requires_completion_and_happens_once() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    let rating = || RatingRequest {
        rating: 5,
        feedback: Some("On time".to_string()),
    };

    let early = state.ride_service.rate_ride(&student("s1"), &ride.id, rating()).await;
    assert!(matches!(early, Err(RideError::NotCompleted(RideStatus::Pending))));

    let driver_id = available_driver(&state, "Lerato").await;
    state.dispatch_service.assign_driver(&ride.id, &driver_id).await.unwrap();
    let driver = Identity::new(driver_id.clone(), Role::Driver);
    state
        .ride_service
        .update_status(&driver, &ride.id, status(RideStatus::InProgress))
        .await
        .unwrap();
    let done = state
        .ride_service
        .update_status(&driver, &ride.id, status(RideStatus::Completed))
        .await
        .unwrap();
    assert_eq!(done.actual_price, Some(done.estimated_price));

    let rated = state.ride_service.rate_ride(&student("s1"), &ride.id, rating()).await.unwrap();
    assert_eq!(rated.rating, Some(5));

    let again = state.ride_service.rate_ride(&student("s1"), &ride.id, rating()).await;
    assert!(matches!(again, Err(RideError::AlreadyRated)));

    // Completion hands the driver back to the roster.
    let driver = state.driver_service.get_driver(&driver_id).await.unwrap();
    assert!(driver.is_available);
    assert_eq!(driver.total_rides, 1);
    assert!(driver.current_ride_id.is_none());

    let history = state.ride_service.list_driver_rides(&driver_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn public_rides_without_matches_is_empty() {
    let state = state();
    let groups = state
        .ride_service
        .list_public_rides(PublicRidesQuery {
            pickup_lat: -25.7479,
            pickup_lng: 28.2293,
            dropoff_lat: -25.7545,
            dropoff_lng: 28.2314,
            date: None,
        })
        .await
        .unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn public_rides_list_nearby_requests() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();

    let groups = state
        .ride_service
        .list_public_rides(PublicRidesQuery {
            pickup_lat: pickup().lat + 0.001,
            pickup_lng: pickup().lng,
            dropoff_lat: dropoff().lat,
            dropoff_lng: dropoff().lng,
            date: None,
        })
        .await
        .unwrap();

    assert_eq!(groups.total(), 1);
    let matched = groups.groups.values().next().unwrap();
    assert_eq!(matched[0].ride_id, ride.id);
}

#[tokio::test]
async fn illegal_transition_leaves_ride_untouched() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();

    let result = state
        .ride_service
        .update_status(&operator(), &ride.id, status(RideStatus::Completed))
        .await;
    assert!(matches!(
        result,
        Err(RideError::InvalidStateTransition {
            from: RideStatus::Pending,
            to: RideStatus::Completed
        })
    ));

    let stored = state.ride_service.get_ride(&student("s1"), &ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Pending);
    assert_eq!(stored.updated_at, ride.updated_at);
}

#[tokio::test]
async fn cancelled_ride_cannot_be_assigned() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    let driver_id = available_driver(&state, "Sipho").await;

    state
        .ride_service
        .update_status(&student("s1"), &ride.id, status(RideStatus::Cancelled))
        .await
        .unwrap();

    let result = state.dispatch_service.assign_driver(&ride.id, &driver_id).await;
    assert!(matches!(result, Err(RideError::RequestNotPending(RideStatus::Cancelled))));

    let again = state
        .ride_service
        .update_status(&student("s1"), &ride.id, status(RideStatus::Cancelled))
        .await;
    assert!(matches!(again, Err(RideError::InvalidStateTransition { .. })));
}

#[tokio::test]
async fn unavailable_driver_is_rejected() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    let driver_id = available_driver(&state, "Naledi").await;
    state
        .driver_service
        .update_availability(&driver_id, DriverAvailabilityUpdate { is_available: false })
        .await
        .unwrap();

    let result = state.dispatch_service.assign_driver(&ride.id, &driver_id).await;
    assert!(matches!(result, Err(RideError::DriverUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_have_one_winner() {
    for _ in 0..10 {
        let state = state();
        let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
        let first = available_driver(&state, "Kagiso").await;
        let second = available_driver(&state, "Palesa").await;

        let attempts: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|driver_id| {
                let state = state.clone();
                let ride_id = ride.id.clone();
                tokio::spawn(async move { state.dispatch_service.assign_driver(&ride_id, &driver_id).await })
            })
            .collect();

        let mut winners = Vec::new();
        let mut losers = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(ride) => winners.push(ride),
                Err(RideError::RequestNotPending(RideStatus::Accepted)) => losers += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(losers, 1);

        let stored = state.ride_service.get_ride(&operator(), &ride.id).await.unwrap();
        assert_eq!(stored.status, RideStatus::Accepted);
        assert_eq!(stored.assigned_driver, winners[0].assigned_driver);

        // The losing driver's reservation is released.
        let available = state.dispatch_service.list_available_drivers().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_ne!(Some(&available[0].id), stored.assigned_driver.as_ref());
    }
}

#[tokio::test]
async fn cancelling_an_accepted_ride_frees_the_driver() {
    let state = state();
    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    let driver_id = available_driver(&state, "Zanele").await;
    state.dispatch_service.assign_driver(&ride.id, &driver_id).await.unwrap();

    let mut update = status(RideStatus::Cancelled);
    update.reason = Some("exam moved".to_string());
    let cancelled = state
        .ride_service
        .update_status(&student("s1"), &ride.id, update)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);
    assert!(cancelled.assigned_driver.is_none());
    assert_eq!(cancelled.cancelled_driver.as_deref(), Some(driver_id.as_str()));

    let driver = state.driver_service.get_driver(&driver_id).await.unwrap();
    assert!(driver.is_available);
    assert!(driver.current_ride_id.is_none());
    assert_eq!(driver.total_rides, 0);

    // The cancelled trip stays in the driver's history.
    let history = state.ride_service.list_driver_rides(&driver_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, ride.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_racing_assignment_never_loses_an_update() {
    for _ in 0..10 {
        let state = state();
        let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
        let driver_id = available_driver(&state, "Thandi").await;

        let assign = {
            let state = state.clone();
            let ride_id = ride.id.clone();
            let driver_id = driver_id.clone();
            tokio::spawn(async move { state.dispatch_service.assign_driver(&ride_id, &driver_id).await })
        };
        let cancel = {
            let state = state.clone();
            let ride_id = ride.id.clone();
            tokio::spawn(async move {
                state
                    .ride_service
                    .update_status(&student("s1"), &ride_id, status(RideStatus::Cancelled))
                    .await
            })
        };

        let assigned = assign.await.unwrap();
        let cancelled = cancel.await.unwrap().unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        assert!(cancelled.assigned_driver.is_none());

        match assigned {
            // Cancellation landed first: the assignment must not resurrect the ride.
            Err(RideError::RequestNotPending(RideStatus::Cancelled)) => {
                assert!(cancelled.cancelled_driver.is_none());
            }
            // Assignment landed first: the cancellation applied on top of it.
            Ok(accepted) => {
                assert_eq!(accepted.status, RideStatus::Accepted);
                assert_eq!(cancelled.cancelled_driver.as_deref(), Some(driver_id.as_str()));
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }

        let stored = state.ride_service.get_ride(&operator(), &ride.id).await.unwrap();
        assert_eq!(stored.status, RideStatus::Cancelled);
        assert!(stored.assigned_driver.is_none());

        let driver = state.driver_service.get_driver(&driver_id).await.unwrap();
        assert!(driver.is_available);
        assert!(driver.current_ride_id.is_none());
    }
}

#[tokio::test]
async fn completion_price_is_bounded_and_revenue_cannot_overflow() {
    let state = state();
    let driver_id = available_driver(&state, "Mpho").await;
    let driver = Identity::new(driver_id.clone(), Role::Driver);

    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    state.dispatch_service.assign_driver(&ride.id, &driver_id).await.unwrap();
    state
        .ride_service
        .update_status(&driver, &ride.id, status(RideStatus::InProgress))
        .await
        .unwrap();

    let mut inflated = status(RideStatus::Completed);
    inflated.actual_price = Some(Money::from_cents(i64::MAX));
    let result = state.ride_service.update_status(&driver, &ride.id, inflated).await;
    assert!(matches!(result, Err(RideError::ValidationFailed(_))));

    let mut capped = status(RideStatus::Completed);
    capped.actual_price = Some(MAX_FARE);
    state.ride_service.update_status(&driver, &ride.id, capped).await.unwrap();

    let stats = state.dispatch_service.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.completed_revenue, MAX_FARE);
}

#[tokio::test]
async fn failed_index_write_leaves_no_hidden_ride() {
    let state = state();
    if let Store::Memory(memory) = state.store_service.backend() {
        memory.set_index_writes_failing(true);
    }

    let result = state.ride_service.submit_ride(&student("s1"), submission()).await;
    assert!(matches!(result, Err(RideError::UpstreamUnavailable(_))));

    if let Store::Memory(memory) = state.store_service.backend() {
        memory.set_index_writes_failing(false);
        assert_eq!(memory.document_count().await, 0);
    }

    let retried = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    let mine = state.ride_service.list_my_rides("s1").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, retried.id);
}

#[tokio::test]
async fn store_outage_surfaces_as_upstream_unavailable() {
    let state = state();
    if let Store::Memory(memory) = state.store_service.backend() {
        memory.set_unavailable(true);
    }

    let result = state.ride_service.submit_ride(&student("s1"), submission()).await;
    assert!(matches!(result, Err(RideError::UpstreamUnavailable(_))));

    let stats = state.dispatch_service.stats().await;
    assert!(matches!(stats, Err(RideError::UpstreamUnavailable(_))));
}

struct BillingDisabledMapping;

#[async_trait]
impl MappingService for BillingDisabledMapping {
    async fn route(&self, _: &Location, _: &Location) -> Result<TravelEstimate, MappingError> {
        Err(MappingError::Api {
            code: "REQUEST_DENIED".to_string(),
            message: "billing not enabled".to_string(),
        })
    }
}

#[tokio::test]
async fn submission_survives_mapping_outage() {
    let config = AppConfig::default();
    let store = Arc::new(StoreService::new_memory(config.retry_policy()));
    let state = AppState::assemble(
        config,
        store,
        Some(Arc::new(BillingDisabledMapping)),
        Arc::new(StaticIdentityProvider::new()),
    );

    let ride = state.ride_service.submit_ride(&student("s1"), submission()).await.unwrap();
    assert_eq!(ride.estimate_source, EstimateSource::Fallback);
    assert!(ride.distance_km > 0.0);
    assert_eq!(ride.status, RideStatus::Pending);
}

#[tokio::test]
async fn advanced_booking_confirmation_and_stats() {
    let state = state();
    let mut request = submission();
    request.booking_type = BookingType::SemesterMoveIn;
    request.booking_details = BookingDetails {
        semester: Some("Semester 1".to_string()),
        academic_year: Some("2027".to_string()),
        furniture_items: vec!["mattress".to_string()],
        ..Default::default()
    };
    let ride = state.ride_service.submit_ride(&student("s1"), request).await.unwrap();

    let stats = state.dispatch_service.stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.unconfirmed_advanced, 1);

    let confirmed = state
        .dispatch_service
        .confirm_booking(&ride.id, Some("Bakkie needed".to_string()))
        .await
        .unwrap();
    assert!(confirmed.is_confirmed);
    assert_eq!(confirmed.status, RideStatus::Pending);
    assert_eq!(confirmed.confirmation_notes.as_deref(), Some("Bakkie needed"));

    let stats = state.dispatch_service.stats().await.unwrap();
    assert_eq!(stats.unconfirmed_advanced, 0);
}
