//! Operation kinds served by the fallback controller.
//!
//! One controller implementation serves every kind; an [`Operation`] names the
//! parameter and value types and whether the value stream is finite.

use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::params::{GeocodingQuery, LocationParams, ReverseGeocodingQuery, RunMode};
use crate::{
    AddressBatch, GeocodingBatch, GeofenceEvent, GeofenceRemoval, GeofenceRemoved,
    GeofenceRequest, Location,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Location,
    Geocoding,
    ReverseGeocoding,
    GeofenceAdd,
    GeofenceRemove,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Geocoding => "geocoding",
            Self::ReverseGeocoding => "reverse_geocoding",
            Self::GeofenceAdd => "geofence_add",
            Self::GeofenceRemove => "geofence_remove",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the value stream a provider produces after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Exactly one value completes the operation.
    Once,
    /// Values keep coming until the caller stops or releases the controller.
    Stream,
}

pub trait Operation: Send + Sync + 'static {
    type Params: Clone + Debug + Send + Sync + 'static;
    type Value: Debug + Send + 'static;

    const KIND: OperationKind;

    fn delivery(params: &Self::Params) -> Delivery;
}

/// Continuous or one-shot position fixes.
#[derive(Debug, Clone, Copy)]
pub enum LocationUpdates {}

impl Operation for LocationUpdates {
    type Params = LocationParams;
    type Value = Location;

    const KIND: OperationKind = OperationKind::Location;

    fn delivery(params: &Self::Params) -> Delivery {
        match params.mode {
            RunMode::Once => Delivery::Once,
            RunMode::Continuous => Delivery::Stream,
        }
    }
}

/// Place name to positions.
#[derive(Debug, Clone, Copy)]
pub enum Geocoding {}

impl Operation for Geocoding {
    type Params = GeocodingQuery;
    type Value = GeocodingBatch;

    const KIND: OperationKind = OperationKind::Geocoding;

    fn delivery(_: &Self::Params) -> Delivery {
        Delivery::Once
    }
}

/// Position to addresses.
#[derive(Debug, Clone, Copy)]
pub enum ReverseGeocoding {}

impl Operation for ReverseGeocoding {
    type Params = ReverseGeocodingQuery;
    type Value = AddressBatch;

    const KIND: OperationKind = OperationKind::ReverseGeocoding;

    fn delivery(_: &Self::Params) -> Delivery {
        Delivery::Once
    }
}

/// Geofence registration followed by transition events.
#[derive(Debug, Clone, Copy)]
pub enum GeofenceAdd {}

impl Operation for GeofenceAdd {
    type Params = GeofenceRequest;
    type Value = GeofenceEvent;

    const KIND: OperationKind = OperationKind::GeofenceAdd;

    fn delivery(_: &Self::Params) -> Delivery {
        Delivery::Stream
    }
}

#[derive(Debug, Clone, Copy)]
pub enum GeofenceRemove {}

impl Operation for GeofenceRemove {
    type Params = GeofenceRemoval;
    type Value = GeofenceRemoved;

    const KIND: OperationKind = OperationKind::GeofenceRemove;

    fn delivery(_: &Self::Params) -> Delivery {
        Delivery::Once
    }
}
