use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ride::RideStatus;

/// Main error type for the campus-rides service
#[derive(Debug)]
pub enum RideError {
    // HTTP and API errors
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),

    // Store and upstream I/O
    UpstreamUnavailable(String),
    ConcurrentModification(String),
    StoreSerialization(String),

    // Parsing errors
    InvalidFormat(String),

    // Ride lifecycle errors
    InvalidRideId(String),
    InvalidDriverId(String),
    RideNotFound(String),
    DriverNotFound(String),
    InvalidStateTransition { from: RideStatus, to: RideStatus },
    RequestNotPending(RideStatus),
    DriverUnavailable(String),
    NotCompleted(RideStatus),
    AlreadyRated,
    RideClosed(RideStatus),
    SplitFareClosed,

    // Validation errors
    ValidationFailed(Vec<ValidationError>),

    // Configuration and setup errors
    ConfigurationError(String),
    InvalidConfiguration { variable: String, reason: String },

    // Security and authentication errors
    TokenInvalid,
    InsufficientPermissions,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for RideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            RideError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            RideError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            RideError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RideError::Conflict(msg) => write!(f, "Conflict: {}", msg),

            RideError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            RideError::ConcurrentModification(msg) => write!(f, "Concurrent modification: {}", msg),
            RideError::StoreSerialization(msg) => write!(f, "Store serialization error: {}", msg),

            RideError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),

            RideError::InvalidRideId(id) => write!(f, "Invalid ride ID: {}", id),
            RideError::InvalidDriverId(id) => write!(f, "Invalid driver ID: {}", id),
            RideError::RideNotFound(id) => write!(f, "Ride not found: {}", id),
            RideError::DriverNotFound(id) => write!(f, "Driver not found: {}", id),
            RideError::InvalidStateTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            RideError::RequestNotPending(status) => write!(f, "Ride is not pending (status: {})", status),
            RideError::DriverUnavailable(id) => write!(f, "Driver is not available: {}", id),
            RideError::NotCompleted(status) => write!(f, "Ride is not completed (status: {})", status),
            RideError::AlreadyRated => write!(f, "Ride has already been rated"),
            RideError::RideClosed(status) => write!(f, "Ride is already {}", status),
            RideError::SplitFareClosed => write!(f, "Split fare is no longer collecting participants"),

            RideError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }

            RideError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            RideError::InvalidConfiguration { variable, reason } => {
                write!(f, "Invalid configuration for {}: {}", variable, reason)
            }

            RideError::TokenInvalid => write!(f, "Authentication token is invalid"),
            RideError::InsufficientPermissions => write!(f, "Insufficient permissions for this operation"),
        }
    }
}

impl std::error::Error for RideError {}

impl IntoResponse for RideError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type, details) = match &self {
            RideError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            RideError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            RideError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),
            RideError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            RideError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),

            RideError::UpstreamUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", None),
            RideError::ConcurrentModification(_) => (StatusCode::CONFLICT, "concurrent_modification", None),

            RideError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "invalid_format", None),
            RideError::InvalidRideId(_) => (StatusCode::BAD_REQUEST, "invalid_ride_id", None),
            RideError::InvalidDriverId(_) => (StatusCode::BAD_REQUEST, "invalid_driver_id", None),
            RideError::RideNotFound(_) => (StatusCode::NOT_FOUND, "ride_not_found", None),
            RideError::DriverNotFound(_) => (StatusCode::NOT_FOUND, "driver_not_found", None),

            RideError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, "invalid_state_transition", None),
            RideError::RequestNotPending(_) => (StatusCode::CONFLICT, "request_not_pending", None),
            RideError::DriverUnavailable(_) => (StatusCode::CONFLICT, "driver_unavailable", None),
            RideError::NotCompleted(_) => (StatusCode::CONFLICT, "not_completed", None),
            RideError::AlreadyRated => (StatusCode::CONFLICT, "already_rated", None),
            RideError::RideClosed(_) => (StatusCode::CONFLICT, "ride_closed", None),
            RideError::SplitFareClosed => (StatusCode::CONFLICT, "split_fare_closed", None),

            RideError::ValidationFailed(errors) => {
                (StatusCode::BAD_REQUEST, "validation_failed", serde_json::to_value(errors).ok())
            }

            RideError::TokenInvalid => (StatusCode::UNAUTHORIZED, "token_invalid", None),
            RideError::InsufficientPermissions => (StatusCode::FORBIDDEN, "insufficient_permissions", None),

            // All other errors are treated as internal server errors
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type RideResult<T> = Result<T, RideError>;

// Conversion implementations for common error types
impl From<reqwest::Error> for RideError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RideError::UpstreamUnavailable("request timed out".to_string())
        } else {
            RideError::UpstreamUnavailable(err.to_string())
        }
    }
}

// Helper functions for creating common errors
impl RideError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        RideError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        RideError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        RideError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RideError::Conflict(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        RideError::UpstreamUnavailable(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        RideError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn ride_not_found(ride_id: impl Into<String>) -> Self {
        RideError::RideNotFound(ride_id.into())
    }

    pub fn driver_not_found(driver_id: impl Into<String>) -> Self {
        RideError::DriverNotFound(driver_id.into())
    }

    /// Failures worth retrying: upstream I/O only. Business-rule failures never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, RideError::UpstreamUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RideError::RideNotFound("rid-260101-abc12".to_string());
        assert_eq!(error.to_string(), "Ride not found: rid-260101-abc12");

        let error = RideError::InvalidStateTransition {
            from: RideStatus::Pending,
            to: RideStatus::Completed,
        };
        assert_eq!(error.to_string(), "Invalid state transition: pending -> completed");
    }

    #[test]
    fn test_validation_error() {
        let error = RideError::validation_error("rating", "must be between 1 and 5");
        match error {
            RideError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "rating");
                assert_eq!(errors[0].message, "must be between 1 and 5");
            }
            _ => panic!("Expected ValidationFailed error"),
        }
    }

    #[test]
    fn test_only_upstream_errors_are_transient() {
        assert!(RideError::upstream("redis down").is_transient());
        assert!(!RideError::RequestNotPending(RideStatus::Accepted).is_transient());
        assert!(!RideError::DriverUnavailable("drv-260101-abc12".to_string()).is_transient());
        assert!(!RideError::AlreadyRated.is_transient());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (RideError::RequestNotPending(RideStatus::Accepted), StatusCode::CONFLICT),
            (RideError::NotCompleted(RideStatus::Pending), StatusCode::CONFLICT),
            (RideError::upstream("timeout"), StatusCode::SERVICE_UNAVAILABLE),
            (RideError::ride_not_found("x"), StatusCode::NOT_FOUND),
            (RideError::TokenInvalid, StatusCode::UNAUTHORIZED),
            (RideError::InsufficientPermissions, StatusCode::FORBIDDEN),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
