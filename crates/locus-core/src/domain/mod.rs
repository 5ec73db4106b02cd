//! # Domain Models
//!
//! Values produced and consumed by providers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Location`] | Position fix with accuracy, optional motion data and timestamp |
//! | [`Address`] | Reverse-geocoded postal address |
//! | [`GeocodingBatch`] | Forward geocoding results for a query |
//! | [`AddressBatch`] | Reverse geocoding results for a position |
//! | [`Geofence`] | Circular monitored region |
//! | [`GeofenceEvent`] | Registration or transition reported by a geofence provider |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Constructors validate coordinates, radii and ids and return
//! [`ValidationError`](crate::ValidationError) on bad input.

mod address;
mod geofence;
mod location;
mod results;
mod timestamp;

pub use address::Address;
pub use geofence::{
    Geofence, GeofenceEvent, GeofenceHandle, GeofenceRemoval, GeofenceRemoved, GeofenceRequest,
    GeofenceTransition, TransitionSet,
};
pub use location::Location;
pub use results::{AddressBatch, GeocodingBatch};
pub use timestamp::UtcDateTime;
