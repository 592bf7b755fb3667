pub mod dispatch_service;
pub mod driver_service;
pub mod fare_service;
pub mod geo_service;
pub mod identity_service;
pub mod ride_service;
pub mod route_matcher;
pub mod store_service;

pub use dispatch_service::{DispatchOperations, DispatchService};
pub use driver_service::{DriverOperations, DriverService};
pub use fare_service::{FareCalculator, PricingConfig};
pub use geo_service::{MappingService, OsrmMapping, RouteEstimator};
pub use identity_service::{HttpIdentityProvider, IdentityProvider, StaticIdentityProvider};
pub use ride_service::{RideOperations, RideService};
pub use route_matcher::{MatchConfig, RouteMatcher};
pub use store_service::{StoreConfig, StoreService};
