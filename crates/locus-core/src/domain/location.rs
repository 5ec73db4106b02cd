use serde::{Deserialize, Serialize};

use crate::{ProviderId, UtcDateTime, ValidationError};

/// Mean Earth radius used by the approximate distance helpers.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A single position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing_deg: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f32>,
    pub timestamp: UtcDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        validate_latitude(latitude)?;
        validate_longitude(longitude)?;

        Ok(Self {
            latitude,
            longitude,
            accuracy_m: 0.0,
            altitude_m: None,
            bearing_deg: None,
            speed_mps: None,
            timestamp: UtcDateTime::now(),
            provider: None,
        })
    }

    /// Parses `"<lat>,<lon>"`.
    pub fn parse_pair(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidCoordinates {
            value: input.to_owned(),
        };
        let (lat, lon) = input.split_once(',').ok_or_else(invalid)?;
        let latitude = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let longitude = lon.trim().parse::<f64>().map_err(|_| invalid())?;
        Self::new(latitude, longitude)
    }

    pub fn with_accuracy(mut self, accuracy_m: f32) -> Result<Self, ValidationError> {
        if !accuracy_m.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "accuracy_m",
            });
        }
        if accuracy_m < 0.0 {
            return Err(ValidationError::NegativeValue {
                field: "accuracy_m",
            });
        }
        self.accuracy_m = accuracy_m;
        Ok(self)
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Result<Self, ValidationError> {
        if !altitude_m.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "altitude_m",
            });
        }
        self.altitude_m = Some(altitude_m);
        Ok(self)
    }

    pub fn with_bearing(mut self, bearing_deg: f32) -> Result<Self, ValidationError> {
        if !bearing_deg.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "bearing_deg",
            });
        }
        self.bearing_deg = Some(bearing_deg.rem_euclid(360.0));
        Ok(self)
    }

    pub fn with_speed(mut self, speed_mps: f32) -> Result<Self, ValidationError> {
        if !speed_mps.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "speed_mps" });
        }
        if speed_mps < 0.0 {
            return Err(ValidationError::NegativeValue { field: "speed_mps" });
        }
        self.speed_mps = Some(speed_mps);
        Ok(self)
    }

    pub fn with_timestamp(mut self, timestamp: UtcDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Approximate surface distance in meters (equirectangular projection).
    ///
    /// Good to well under 1% for the short ranges used by reverse geocoding and
    /// geofence checks; not suitable for long-haul distances.
    pub fn distance_to(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let mut dlon = (other.longitude - self.longitude).to_radians();
        if dlon > std::f64::consts::PI {
            dlon -= 2.0 * std::f64::consts::PI;
        } else if dlon < -std::f64::consts::PI {
            dlon += 2.0 * std::f64::consts::PI;
        }

        let x = dlon * ((lat1 + lat2) / 2.0).cos();
        let y = lat2 - lat1;
        (x * x + y * y).sqrt() * EARTH_RADIUS_M
    }
}

pub(crate) fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field: "latitude" });
    }
    if !(-90.0..=90.0).contains(&value) {
        return Err(ValidationError::InvalidLatitude { value });
    }
    Ok(())
}

pub(crate) fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field: "longitude" });
    }
    if !(-180.0..=180.0).contains(&value) {
        return Err(ValidationError::InvalidLongitude { value });
    }
    Ok(())
}
