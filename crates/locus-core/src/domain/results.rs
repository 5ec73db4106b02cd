use serde::{Deserialize, Serialize};

use crate::{Address, Location};

/// Forward geocoding result set for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingBatch {
    pub query: String,
    pub results: Vec<Location>,
}

/// Reverse geocoding result set for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBatch {
    pub location: Location,
    pub addresses: Vec<Address>,
}
