// src/services/geo_service.rs
//
// Travel distance and time between two points. The external routing service
// is tried first; the straight-line estimator below is the fallback and
// cannot fail.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::errors::{RideError, RideResult};
use crate::models::ride::{EstimateSource, Location};
use crate::utils::retry::RetryPolicy;

const EARTH_RADIUS_KM: f64 = 6371.0;
/// Assumed average urban speed for straight-line ETAs.
const AVERAGE_SPEED_KMH: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutedEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub source: EstimateSource,
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn distance_m(a: &Location, b: &Location) -> f64 {
    haversine_km(a, b) * 1000.0
}

pub fn is_within_radius(a: &Location, b: &Location, radius_m: f64) -> bool {
    distance_m(a, b) <= radius_m
}

fn minutes(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

pub fn straight_line_estimate(a: &Location, b: &Location) -> TravelEstimate {
    let distance_km = haversine_km(a, b);
    TravelEstimate {
        distance_km,
        eta_minutes: minutes(distance_km / AVERAGE_SPEED_KMH * 60.0),
    }
}

// ------------------------------
// External mapping service
// ------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("mapping request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mapping service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("mapping service answered {code}: {message}")]
    Api { code: String, message: String },

    #[error("mapping service returned no route")]
    NoRoute,

    #[error("invalid mapping URL: {0}")]
    Url(String),
}

impl From<MappingError> for RideError {
    fn from(err: MappingError) -> Self {
        RideError::UpstreamUnavailable(err.to_string())
    }
}

#[async_trait]
pub trait MappingService: Send + Sync {
    async fn route(&self, origin: &Location, destination: &Location) -> Result<TravelEstimate, MappingError>;
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

fn parse_route_response(response: OsrmRouteResponse) -> Result<TravelEstimate, MappingError> {
    if response.code != "Ok" {
        return Err(MappingError::Api {
            message: response.message.unwrap_or_default(),
            code: response.code,
        });
    }
    let route = response.routes.first().ok_or(MappingError::NoRoute)?;
    if !route.distance.is_finite() || route.distance < 0.0 {
        return Err(MappingError::NoRoute);
    }

    Ok(TravelEstimate {
        distance_km: route.distance / 1000.0,
        eta_minutes: minutes(route.duration / 60.0),
    })
}

/// OSRM-compatible `/route` client.
#[derive(Debug, Clone)]
pub struct OsrmMapping {
    client: Client,
    endpoint: String,
    profile: String,
}

impl OsrmMapping {
    pub fn new(endpoint: &str, profile: &str, timeout: Duration) -> RideResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RideError::ConfigurationError(format!("failed to build mapping client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
        })
    }

    fn route_url(&self, origin: &Location, destination: &Location) -> Result<Url, MappingError> {
        let base = format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            self.endpoint, self.profile, origin.lng, origin.lat, destination.lng, destination.lat
        );
        let mut url = Url::parse(&base).map_err(|e| MappingError::Url(e.to_string()))?;
        url.query_pairs_mut().append_pair("overview", "false");
        Ok(url)
    }
}

#[async_trait]
impl MappingService for OsrmMapping {
    async fn route(&self, origin: &Location, destination: &Location) -> Result<TravelEstimate, MappingError> {
        let url = self.route_url(origin, destination)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MappingError::Status(status));
        }

        let parsed: OsrmRouteResponse = response.json().await?;
        parse_route_response(parsed)
    }
}

// ------------------------------
// Estimator with fallback
// ------------------------------

pub struct RouteEstimator {
    mapping: Option<Arc<dyn MappingService>>,
    retry: RetryPolicy,
}

impl RouteEstimator {
    pub fn new(mapping: Option<Arc<dyn MappingService>>, retry: RetryPolicy) -> Self {
        Self { mapping, retry }
    }

    pub fn straight_line(retry: RetryPolicy) -> Self {
        Self::new(None, retry)
    }

    /// Never fails. Mapping errors and timeouts are logged and replaced by the
    /// straight-line estimate, tagged as [`EstimateSource::Fallback`].
    pub async fn estimate(&self, origin: &Location, destination: &Location) -> RoutedEstimate {
        if let Some(mapping) = &self.mapping {
            let mapping = mapping.as_ref();
            let routed = self
                .retry
                .run("mapping.route", move || async move {
                    mapping.route(origin, destination).await.map_err(RideError::from)
                })
                .await;

            match routed {
                Ok(estimate) => {
                    return RoutedEstimate {
                        distance_km: estimate.distance_km,
                        eta_minutes: estimate.eta_minutes,
                        source: EstimateSource::Mapping,
                    };
                }
                Err(err) => {
                    tracing::warn!(error = %err, "mapping service unavailable, using straight-line estimate");
                }
            }
        }

        let fallback = straight_line_estimate(origin, destination);
        RoutedEstimate {
            distance_km: fallback.distance_km,
            eta_minutes: fallback.eta_minutes,
            source: EstimateSource::Fallback,
        }
    }
}
