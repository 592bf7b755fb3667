// src/state.rs
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{RideError, RideResult};
use crate::models::money::Money;
use crate::services::{
    dispatch_service::DispatchService,
    driver_service::DriverService,
    fare_service::{FareCalculator, PricingConfig},
    geo_service::{MappingService, OsrmMapping, RouteEstimator},
    identity_service::{HttpIdentityProvider, IdentityProvider, StaticIdentityProvider},
    ride_service::RideService,
    route_matcher::{MatchConfig, RouteMatcher},
    store_service::{StoreConfig, StoreService},
};
use crate::utils::retry::RetryPolicy;

pub struct AppState {
    pub ride_service: Arc<RideService>,
    pub dispatch_service: Arc<DispatchService>,
    pub driver_service: Arc<DriverService>,
    pub store_service: Arc<StoreService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub mapping_url: Option<String>,
    pub mapping_profile: String,
    pub mapping_timeout: Duration,
    pub store_timeout: Duration,
    pub upstream_retries: usize,
    pub retry_backoff_ms: u64,
    pub matching: MatchConfig,
    pub pricing: PricingConfig,
    pub auto_toggle_driver_availability: bool,
    pub identity_url: Option<String>,
    pub static_tokens: String,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            redis_url: None,
            mapping_url: None,
            mapping_profile: "driving".to_string(),
            mapping_timeout: Duration::from_millis(3000),
            store_timeout: Duration::from_millis(2000),
            upstream_retries: 1,
            retry_backoff_ms: 100,
            matching: MatchConfig::default(),
            pricing: PricingConfig::default(),
            auto_toggle_driver_availability: true,
            identity_url: None,
            static_tokens: String::new(),
            log_json: false,
        }
    }
}

fn invalid(variable: &str, reason: impl Into<String>) -> RideError {
    RideError::InvalidConfiguration {
        variable: variable.to_string(),
        reason: reason.into(),
    }
}

fn parse_bool(variable: &str, value: &str) -> RideResult<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        other => Err(invalid(variable, format!("expected a boolean, got '{}'", other))),
    }
}

fn parse_number<T: std::str::FromStr>(variable: &str, value: &str) -> RideResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(variable, format!("expected a number, got '{}'", value)))
}

impl AppConfig {
    pub fn from_env() -> RideResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Unset or blank
    /// variables keep their defaults; malformed ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> RideResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.redis_url = get("REDIS_URL");
        config.mapping_url = get("MAPPING_URL");
        if let Some(profile) = get("MAPPING_PROFILE") {
            config.mapping_profile = profile;
        }
        if let Some(ms) = get("MAPPING_TIMEOUT_MS") {
            config.mapping_timeout = Duration::from_millis(parse_number("MAPPING_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = get("STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::from_millis(parse_number("STORE_TIMEOUT_MS", &ms)?);
        }
        if let Some(retries) = get("UPSTREAM_RETRIES") {
            config.upstream_retries = parse_number("UPSTREAM_RETRIES", &retries)?;
        }
        if let Some(ms) = get("RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = parse_number("RETRY_BACKOFF_MS", &ms)?;
        }

        if let Some(radius) = get("MATCH_RADIUS_M") {
            config.matching.radius_m = parse_number("MATCH_RADIUS_M", &radius)?;
        }
        if let Some(offset) = get("MATCH_UTC_OFFSET_MINUTES") {
            config.matching.utc_offset_minutes = parse_number("MATCH_UTC_OFFSET_MINUTES", &offset)?;
        }

        for (variable, target) in [
            ("FARE_BASE", &mut config.pricing.base_fare),
            ("FARE_PER_KM", &mut config.pricing.per_km),
            ("FARE_MINIMUM", &mut config.pricing.minimum_fare),
        ] {
            if let Some(amount) = get(variable) {
                *target = Money::try_from_major(parse_number(variable, &amount)?)
                    .ok_or_else(|| invalid(variable, "amount out of range"))?;
            }
        }
        if let Some(currency) = get("FARE_CURRENCY") {
            config.pricing.currency = currency.trim().to_uppercase();
        }

        if let Some(flag) = get("AUTO_TOGGLE_DRIVER_AVAILABILITY") {
            config.auto_toggle_driver_availability = parse_bool("AUTO_TOGGLE_DRIVER_AVAILABILITY", &flag)?;
        }
        config.identity_url = get("IDENTITY_URL");
        config.static_tokens = get("STATIC_TOKENS").unwrap_or_default();
        if let Some(flag) = get("LOG_JSON") {
            config.log_json = parse_bool("LOG_JSON", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RideResult<()> {
        if self.mapping_timeout.is_zero() {
            return Err(invalid("MAPPING_TIMEOUT_MS", "must be greater than zero"));
        }
        if self.store_timeout.is_zero() {
            return Err(invalid("STORE_TIMEOUT_MS", "must be greater than zero"));
        }
        self.matching.validate()?;
        self.pricing.validate()
    }

    /// Base policy; retries are clamped to at most one.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.upstream_retries, self.store_timeout, self.retry_backoff_ms)
    }
}

impl AppState {
    pub async fn new(config: AppConfig) -> RideResult<Self> {
        let retry = config.retry_policy();

        let store = StoreService::new(
            StoreConfig {
                redis_url: config.redis_url.clone(),
                ..Default::default()
            },
            retry.clone(),
        )
        .await?;

        let mapping: Option<Arc<dyn MappingService>> = match config.mapping_url.as_deref() {
            Some(url) => {
                tracing::info!("Using mapping service at {}", url);
                Some(Arc::new(OsrmMapping::new(url, &config.mapping_profile, config.mapping_timeout)?))
            }
            None => {
                tracing::warn!("MAPPING_URL not set, distances are straight-line estimates");
                None
            }
        };

        let identity: Arc<dyn IdentityProvider> = match config.identity_url.as_deref() {
            Some(url) => Arc::new(HttpIdentityProvider::new(url, config.mapping_timeout, retry)?),
            None => {
                let table = StaticIdentityProvider::parse(&config.static_tokens)?;
                tracing::warn!("IDENTITY_URL not set, using {} static tokens", table.len());
                Arc::new(table)
            }
        };

        Ok(Self::assemble(config, Arc::new(store), mapping, identity))
    }

    /// Memory-backed state for development and tests.
    pub fn in_memory(config: AppConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let store = Arc::new(StoreService::new_memory(config.retry_policy()));
        Self::assemble(config, store, None, identity)
    }

    pub fn assemble(
        config: AppConfig,
        store: Arc<StoreService>,
        mapping: Option<Arc<dyn MappingService>>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let mapping_retry = config.retry_policy().with_timeout(config.mapping_timeout);
        let estimator = Arc::new(RouteEstimator::new(mapping, mapping_retry));
        let fares = Arc::new(FareCalculator::new(config.pricing.clone()));
        let matcher = Arc::new(RouteMatcher::new(&config.matching));

        let dispatch_service = Arc::new(DispatchService::new(
            store.clone(),
            config.auto_toggle_driver_availability,
        ));
        let driver_service = Arc::new(DriverService::new(store.clone()));
        let ride_service = Arc::new(RideService::new(
            store.clone(),
            estimator,
            fares,
            matcher,
            dispatch_service.clone(),
        ));

        Self {
            ride_service,
            dispatch_service,
            driver_service,
            store_service: store,
            identity,
            config,
        }
    }
}
