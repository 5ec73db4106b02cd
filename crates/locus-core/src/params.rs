//! Operation parameters handed to providers on `start`.
//!
//! Parameters are fixed for the lifetime of a controller; build a new
//! controller to change them.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Location, ValidationError};

/// Requested accuracy tier. Providers map it onto their own power/accuracy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationAccuracy {
    Lowest,
    Low,
    Medium,
    High,
}

impl LocationAccuracy {
    pub const ALL: [Self; 4] = [Self::Lowest, Self::Low, Self::Medium, Self::High];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Display for LocationAccuracy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationAccuracy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::Lowest),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ValidationError::InvalidAccuracy {
                value: other.to_owned(),
            }),
        }
    }
}

/// Whether a location request wants a single fix or a continuous stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Once,
    #[default]
    Continuous,
}

/// Parameters for continuous or one-shot location requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationParams {
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    pub min_distance_m: f32,
    pub accuracy: LocationAccuracy,
    #[serde(default)]
    pub mode: RunMode,
}

impl Default for LocationParams {
    fn default() -> Self {
        Self::best_effort()
    }
}

impl LocationParams {
    pub fn new(
        interval: Duration,
        min_distance_m: f32,
        accuracy: LocationAccuracy,
    ) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::ZeroInterval);
        }
        if !min_distance_m.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "min_distance_m",
            });
        }
        if min_distance_m < 0.0 {
            return Err(ValidationError::NegativeValue {
                field: "min_distance_m",
            });
        }

        Ok(Self {
            interval,
            min_distance_m,
            accuracy,
            mode: RunMode::Continuous,
        })
    }

    /// Fast, precise updates for turn-by-turn style use.
    pub fn navigation() -> Self {
        Self {
            interval: Duration::from_millis(500),
            min_distance_m: 0.0,
            accuracy: LocationAccuracy::High,
            mode: RunMode::Continuous,
        }
    }

    pub fn best_effort() -> Self {
        Self {
            interval: Duration::from_millis(2_500),
            min_distance_m: 150.0,
            accuracy: LocationAccuracy::Medium,
            mode: RunMode::Continuous,
        }
    }

    /// Infrequent, coarse updates.
    pub fn lazy() -> Self {
        Self {
            interval: Duration::from_millis(5_000),
            min_distance_m: 200.0,
            accuracy: LocationAccuracy::Low,
            mode: RunMode::Continuous,
        }
    }

    pub fn once(mut self) -> Self {
        self.mode = RunMode::Once;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_accuracy(mut self, accuracy: LocationAccuracy) -> Self {
        self.accuracy = accuracy;
        self
    }
}

/// Forward geocoding request: place name to positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodingQuery {
    pub name: String,
    pub max_results: usize,
}

impl GeocodingQuery {
    pub fn new(name: impl Into<String>, max_results: usize) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if max_results == 0 {
            return Err(ValidationError::ZeroMaxResults);
        }
        Ok(Self {
            name: name.trim().to_owned(),
            max_results,
        })
    }
}

/// Reverse geocoding request: position to addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocodingQuery {
    pub location: Location,
    pub max_results: usize,
}

impl ReverseGeocodingQuery {
    pub fn new(location: Location, max_results: usize) -> Result<Self, ValidationError> {
        if max_results == 0 {
            return Err(ValidationError::ZeroMaxResults);
        }
        Ok(Self {
            location,
            max_results,
        })
    }
}

pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
