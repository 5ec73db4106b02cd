use thiserror::Error;

use crate::ProviderId;

/// Validation and contract errors exposed by `locus-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("provider id cannot be empty")]
    EmptyProviderId,
    #[error("provider id length {len} exceeds max {max}")]
    ProviderIdTooLong { len: usize, max: usize },
    #[error("provider id contains invalid character '{ch}' at index {index}")]
    ProviderIdInvalidChar { ch: char, index: usize },

    #[error("latitude {value} is outside [-90, 90]")]
    InvalidLatitude { value: f64 },
    #[error("longitude {value} is outside [-180, 180]")]
    InvalidLongitude { value: f64 },
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("invalid coordinate pair '{value}', expected '<lat>,<lon>'")]
    InvalidCoordinates { value: String },

    #[error("invalid accuracy '{value}', expected one of lowest, low, medium, high")]
    InvalidAccuracy { value: String },
    #[error("update interval must be greater than zero")]
    ZeroInterval,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("max_results must be greater than zero")]
    ZeroMaxResults,
    #[error("geocoding query must not be empty")]
    EmptyQuery,
    #[error("reverse lookup radius must be a positive number of metres, got {value}")]
    InvalidSearchRadius { value: f64 },

    #[error("geofence id cannot be empty")]
    EmptyGeofenceId,
    #[error("geofence radius must be greater than zero, got {value}")]
    InvalidRadius { value: f32 },
    #[error("geofence '{id}' has no transition types")]
    NoGeofenceTransitions { id: String },
    #[error("geofence request must contain at least one geofence")]
    EmptyGeofenceList,
    #[error("duplicate geofence id '{id}'")]
    DuplicateGeofenceId { id: String },
    #[error("geofence removal requires at least one id")]
    EmptyGeofenceIds,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("provider priority list must contain at least one provider")]
    EmptyProviderList,
    #[error("invalid value '{value}' for '{key}'")]
    InvalidSetting { key: &'static str, value: String },
    #[error("a timeout is configured but no scheduler was supplied and no tokio runtime is running")]
    MissingScheduler,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcomes surfaced by the async controller adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FallbackError {
    #[error("all providers failed (attempted: {})", format_chain(.attempted))]
    AllProvidersFailed { attempted: Vec<ProviderId> },

    #[error("controller was released before a value arrived")]
    Released,

    #[error("controller was already started")]
    AlreadyStarted,
}

fn format_chain(chain: &[ProviderId]) -> String {
    if chain.is_empty() {
        return String::from("none");
    }
    chain
        .iter()
        .map(ProviderId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
