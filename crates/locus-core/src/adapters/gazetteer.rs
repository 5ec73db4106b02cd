//! Offline forward and reverse geocoding over a small place table.
//!
//! A [`Gazetteer`] is a factory for both [`Geocoding`] and
//! [`ReverseGeocoding`] providers. Lookups are answered synchronously inside
//! `start`; an empty table reports failure so the next provider is tried.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::operation::{Geocoding, ReverseGeocoding};
use crate::params::{GeocodingQuery, ReverseGeocodingQuery};
use crate::provider::{FailureSink, Lifecycle, Provider, ProviderContext, ProviderFactory, ValueSink};
use crate::{Address, AddressBatch, CoreError, GeocodingBatch, Location, ProviderId, ValidationError};

/// Default reverse lookup radius.
pub const DEFAULT_REVERSE_RADIUS_M: f64 = 50_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub admin_area: Option<String>,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn location(&self) -> Result<Location, ValidationError> {
        Location::new(self.latitude, self.longitude)
            .map(|location| location.with_provider(ProviderId::GAZETTEER))
    }

    pub fn address(&self) -> Result<Address, ValidationError> {
        let mut address = Address::new(self.location()?)
            .with_feature_name(self.name.clone())
            .with_locality(self.name.clone())
            .with_country_code(self.country_code.clone());
        if let Some(admin_area) = &self.admin_area {
            address = address.with_admin_area(admin_area.clone());
        }
        Ok(address)
    }
}

const BUILTIN: &[(&str, Option<&str>, &str, f64, f64)] = &[
    ("Amsterdam", Some("North Holland"), "NL", 52.3676, 4.9041),
    ("Berlin", None, "DE", 52.52, 13.405),
    ("Buenos Aires", None, "AR", -34.6037, -58.3816),
    ("Cairo", None, "EG", 30.0444, 31.2357),
    ("Lisbon", None, "PT", 38.7223, -9.1393),
    ("London", Some("England"), "GB", 51.5074, -0.1278),
    ("Lyon", Some("Auvergne-Rhone-Alpes"), "FR", 45.764, 4.8357),
    ("Nairobi", None, "KE", -1.2921, 36.8219),
    ("New York", Some("New York"), "US", 40.7128, -74.006),
    ("Paris", Some("Ile-de-France"), "FR", 48.8566, 2.3522),
    ("Porto", None, "PT", 41.1579, -8.6291),
    ("San Francisco", Some("California"), "US", 37.7749, -122.4194),
    ("Sydney", Some("New South Wales"), "AU", -33.8688, 151.2093),
    ("Tokyo", None, "JP", 35.6762, 139.6503),
    ("York", Some("England"), "GB", 53.959, -1.0815),
];

/// Shared, immutable place table.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    places: Arc<Vec<Place>>,
    reverse_radius_m: f64,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Gazetteer {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places: Arc::new(places),
            reverse_radius_m: DEFAULT_REVERSE_RADIUS_M,
        }
    }

    /// A small world-cities sample.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, admin_area, country_code, latitude, longitude)| Place {
                    name: (*name).to_owned(),
                    admin_area: admin_area.map(str::to_owned),
                    country_code: (*country_code).to_owned(),
                    latitude: *latitude,
                    longitude: *longitude,
                })
                .collect(),
        )
    }

    /// Loads a JSON array of [`Place`]s.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)?;
        let places: Vec<Place> = serde_json::from_str(&raw)?;
        for place in &places {
            place.location()?;
        }
        Ok(Self::new(places))
    }

    /// How far from a place a reverse lookup still matches it.
    pub fn with_reverse_radius(mut self, radius_m: f64) -> Result<Self, ValidationError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ValidationError::InvalidSearchRadius { value: radius_m });
        }
        self.reverse_radius_m = radius_m;
        Ok(self)
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Case-insensitive name search: exact matches, then prefixes, then
    /// substrings, each group alphabetical.
    pub fn search(&self, name: &str, max_results: usize) -> Vec<&Place> {
        let needle = name.trim().to_lowercase();
        let mut ranked: Vec<(u8, &Place)> = self
            .places
            .iter()
            .filter_map(|place| {
                let candidate = place.name.to_lowercase();
                if candidate == needle {
                    Some((0, place))
                } else if candidate.starts_with(&needle) {
                    Some((1, place))
                } else if candidate.contains(&needle) {
                    Some((2, place))
                } else {
                    None
                }
            })
            .collect();
        ranked.sort_by(|(left_rank, left), (right_rank, right)| {
            left_rank
                .cmp(right_rank)
                .then_with(|| left.name.cmp(&right.name))
        });
        ranked
            .into_iter()
            .take(max_results)
            .map(|(_, place)| place)
            .collect()
    }

    /// Places within the reverse radius, nearest first.
    pub fn nearest(&self, location: &Location, max_results: usize) -> Vec<&Place> {
        let mut candidates: Vec<(f64, &Place)> = self
            .places
            .iter()
            .filter_map(|place| {
                let center = place.location().ok()?;
                let distance = location.distance_to(&center);
                (distance <= self.reverse_radius_m).then_some((distance, place))
            })
            .collect();
        candidates.sort_by(|(left, _), (right, _)| left.partial_cmp(right).unwrap_or(Ordering::Equal));
        candidates
            .into_iter()
            .take(max_results)
            .map(|(_, place)| place)
            .collect()
    }
}

impl ProviderFactory<Geocoding> for Gazetteer {
    fn create(&self, _context: &ProviderContext, failures: FailureSink) -> Arc<dyn Provider<Geocoding>> {
        Arc::new(GazetteerGeocoder {
            gazetteer: self.clone(),
            failures,
            lifecycle: Lifecycle::new(),
        })
    }
}

impl ProviderFactory<ReverseGeocoding> for Gazetteer {
    fn create(
        &self,
        _context: &ProviderContext,
        failures: FailureSink,
    ) -> Arc<dyn Provider<ReverseGeocoding>> {
        Arc::new(GazetteerReverseGeocoder {
            gazetteer: self.clone(),
            failures,
            lifecycle: Lifecycle::new(),
        })
    }
}

pub struct GazetteerGeocoder {
    gazetteer: Gazetteer,
    failures: FailureSink,
    lifecycle: Lifecycle,
}

impl Provider<Geocoding> for GazetteerGeocoder {
    fn id(&self) -> ProviderId {
        ProviderId::GAZETTEER
    }

    fn start(&self, sink: ValueSink<GeocodingBatch>, params: &GeocodingQuery) {
        if !self.lifecycle.start() {
            return;
        }
        if self.gazetteer.is_empty() {
            self.failures.provider_failed();
            return;
        }

        let results = self
            .gazetteer
            .search(&params.name, params.max_results)
            .into_iter()
            .filter_map(|place| place.location().ok())
            .collect();
        sink.deliver(GeocodingBatch {
            query: params.name.clone(),
            results,
        });
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    fn last_known_value(&self) -> Option<GeocodingBatch> {
        None
    }

    fn release(&self) {
        self.lifecycle.release();
    }
}

pub struct GazetteerReverseGeocoder {
    gazetteer: Gazetteer,
    failures: FailureSink,
    lifecycle: Lifecycle,
}

impl Provider<ReverseGeocoding> for GazetteerReverseGeocoder {
    fn id(&self) -> ProviderId {
        ProviderId::GAZETTEER
    }

    fn start(&self, sink: ValueSink<AddressBatch>, params: &ReverseGeocodingQuery) {
        if !self.lifecycle.start() {
            return;
        }
        if self.gazetteer.is_empty() {
            self.failures.provider_failed();
            return;
        }

        let addresses = self
            .gazetteer
            .nearest(&params.location, params.max_results)
            .into_iter()
            .filter_map(|place| place.address().ok())
            .collect();
        sink.deliver(AddressBatch {
            location: params.location.clone(),
            addresses,
        });
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    fn last_known_value(&self) -> Option<AddressBatch> {
        None
    }

    fn release(&self) {
        self.lifecycle.release();
    }
}
