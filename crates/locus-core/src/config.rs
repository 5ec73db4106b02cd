//! Layered configuration: defaults, JSON file, `LOCUS_*` environment.
//!
//! | Key | Env var | Meaning |
//! |-----|---------|---------|
//! | `accuracy` | `LOCUS_ACCURACY` | `lowest`, `low`, `medium`, `high` |
//! | `interval_ms` | `LOCUS_INTERVAL_MS` | Update interval |
//! | `min_distance_m` | `LOCUS_MIN_DISTANCE_M` | Minimum displacement between fixes |
//! | `run_once` | `LOCUS_RUN_ONCE` | Single fix instead of a stream |
//! | `timeout_ms` | `LOCUS_TIMEOUT_MS` | Per-provider timeout; `0` or `none` disables |
//! | `max_results` | `LOCUS_MAX_RESULTS` | Geocoding result cap |
//! | `providers` | `LOCUS_PROVIDERS` | Comma-separated priority list |

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::params::{GeocodingQuery, LocationAccuracy, LocationParams, ReverseGeocodingQuery, RunMode};
use crate::{CoreError, Location, ProviderId, ValidationError};

const ENV_PREFIX: &str = "LOCUS_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocusConfig {
    pub accuracy: LocationAccuracy,
    pub interval_ms: u64,
    pub min_distance_m: f32,
    pub run_once: bool,
    pub timeout_ms: Option<u64>,
    pub max_results: usize,
    pub providers: Vec<ProviderId>,
}

impl Default for LocusConfig {
    fn default() -> Self {
        let params = LocationParams::best_effort();
        Self {
            accuracy: params.accuracy,
            interval_ms: params.interval.as_millis() as u64,
            min_distance_m: params.min_distance_m,
            run_once: false,
            timeout_ms: Some(10_000),
            max_results: 5,
            providers: vec![ProviderId::FUSED, ProviderId::MANAGER],
        }
    }
}

impl LocusConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ValidationError> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self.apply_vars(&vars)
    }

    /// Applies `LOCUS_*` overrides from an explicit map.
    pub fn apply_vars(&mut self, vars: &HashMap<String, String>) -> Result<(), ValidationError> {
        let lookup = |suffix: &str| {
            vars.get(&format!("{ENV_PREFIX}{suffix}"))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = lookup("ACCURACY") {
            self.accuracy = value.parse()?;
        }
        if let Some(value) = lookup("INTERVAL_MS") {
            self.interval_ms = parse_setting("interval_ms", value)?;
        }
        if let Some(value) = lookup("MIN_DISTANCE_M") {
            self.min_distance_m = parse_setting("min_distance_m", value)?;
        }
        if let Some(value) = lookup("RUN_ONCE") {
            self.run_once = parse_bool("run_once", value)?;
        }
        if let Some(value) = lookup("TIMEOUT_MS") {
            self.timeout_ms = parse_timeout(value)?;
        }
        if let Some(value) = lookup("MAX_RESULTS") {
            self.max_results = parse_setting("max_results", value)?;
        }
        if let Some(value) = lookup("PROVIDERS") {
            self.providers = parse_provider_list(value)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.location_params()?;
        if self.max_results == 0 {
            return Err(ValidationError::ZeroMaxResults);
        }
        if self.providers.is_empty() {
            return Err(ValidationError::EmptyProviderList);
        }
        Ok(())
    }

    pub fn location_params(&self) -> Result<LocationParams, ValidationError> {
        let mode = if self.run_once {
            RunMode::Once
        } else {
            RunMode::Continuous
        };
        LocationParams::new(
            Duration::from_millis(self.interval_ms),
            self.min_distance_m,
            self.accuracy,
        )
        .map(|params| params.with_mode(mode))
    }

    /// `None` means no timeout; `Some(0)` is normalised to `None`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }

    pub fn geocoding_query(&self, name: &str) -> Result<GeocodingQuery, ValidationError> {
        GeocodingQuery::new(name, self.max_results)
    }

    pub fn reverse_query(&self, location: Location) -> Result<ReverseGeocodingQuery, ValidationError> {
        ReverseGeocodingQuery::new(location, self.max_results)
    }
}

fn parse_setting<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ValidationError> {
    value.parse().map_err(|_| ValidationError::InvalidSetting {
        key,
        value: value.to_owned(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::InvalidSetting {
            key,
            value: value.to_owned(),
        }),
    }
}

fn parse_timeout(value: &str) -> Result<Option<u64>, ValidationError> {
    if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let millis: u64 = parse_setting("timeout_ms", value)?;
    Ok((millis > 0).then_some(millis))
}

/// Parses a comma-separated priority list such as `fused, manager`.
pub fn parse_provider_list(value: &str) -> Result<Vec<ProviderId>, ValidationError> {
    let providers = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ProviderId::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if providers.is_empty() {
        return Err(ValidationError::EmptyProviderList);
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let config = LocusConfig::default();
        config.validate().expect("valid defaults");
        assert_eq!(config.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.location_params().expect("params"), LocationParams::best_effort());
    }

    #[test]
    fn env_overrides_every_key() {
        let mut config = LocusConfig::default();
        config
            .apply_vars(&vars(&[
                ("LOCUS_ACCURACY", "high"),
                ("LOCUS_INTERVAL_MS", "750"),
                ("LOCUS_MIN_DISTANCE_M", "12.5"),
                ("LOCUS_RUN_ONCE", "yes"),
                ("LOCUS_TIMEOUT_MS", "none"),
                ("LOCUS_MAX_RESULTS", "3"),
                ("LOCUS_PROVIDERS", "vendor, fused"),
            ]))
            .expect("apply");

        let params = config.location_params().expect("params");
        assert_eq!(params.accuracy, LocationAccuracy::High);
        assert_eq!(params.interval, Duration::from_millis(750));
        assert_eq!(params.mode, RunMode::Once);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.max_results, 3);
        assert_eq!(config.providers, vec![ProviderId::VENDOR, ProviderId::FUSED]);
    }

    #[test]
    fn zero_timeout_disables() {
        let mut config = LocusConfig::default();
        config
            .apply_vars(&vars(&[("LOCUS_TIMEOUT_MS", "0")]))
            .expect("apply");
        assert_eq!(config.timeout_ms, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = LocusConfig::default();
        let err = config
            .apply_vars(&vars(&[("LOCUS_INTERVAL_MS", "soon")]))
            .expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::InvalidSetting {
                key: "interval_ms",
                value: String::from("soon"),
            }
        );

        let err = LocusConfig::default()
            .apply_vars(&vars(&[("LOCUS_PROVIDERS", " , ")]))
            .expect_err("must fail");
        assert_eq!(err, ValidationError::EmptyProviderList);
    }

    #[test]
    fn file_layer_fills_missing_keys_from_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"accuracy": "low", "providers": ["manager"]}}"#).expect("write");

        let config = LocusConfig::from_file(file.path()).expect("load");
        assert_eq!(config.accuracy, LocationAccuracy::Low);
        assert_eq!(config.providers, vec![ProviderId::MANAGER]);
        assert_eq!(config.max_results, LocusConfig::default().max_results);
    }

    #[test]
    fn file_with_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"accuracy": "low", "retries": 3}}"#).expect("write");
        assert!(matches!(
            LocusConfig::from_file(file.path()),
            Err(CoreError::Serialization(_))
        ));
    }
}
