//! Provider specs for the simulator: `<id>[:<behaviour>[@<delay-ms>]]`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use locus_core::{Location, LocationAccuracy, ProviderId, Script};

use crate::error::CliError;

/// Script behaviour named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// The provider's natural behaviour: offline lookup for `gazetteer`,
    /// store lookup for `last-known`, success for everything else.
    Default,
    Succeed,
    Fail,
    Silent,
    /// Delivers, then reports failure.
    Flaky,
}

impl Behaviour {
    pub const ALL: [Self; 4] = [Self::Succeed, Self::Fail, Self::Silent, Self::Flaky];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Succeed => "succeed",
            Self::Fail => "fail",
            Self::Silent => "silent",
            Self::Flaky => "flaky",
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::Default => "provider's own behaviour",
            Self::Succeed => "delivers values, optionally after @<ms>",
            Self::Fail => "reports failure, optionally after @<ms>",
            Self::Silent => "never calls back; only a timeout moves on",
            Self::Flaky => "delivers values, then reports failure",
        }
    }
}

impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub behaviour: Behaviour,
    pub delay: Option<Duration>,
}

impl ProviderSpec {
    pub fn natural(id: ProviderId) -> Self {
        Self {
            id,
            behaviour: Behaviour::Default,
            delay: None,
        }
    }

    /// Builds the script for this spec over `values`.
    pub fn script<V>(&self, values: Vec<V>) -> Script<V> {
        match (self.behaviour, self.delay) {
            (Behaviour::Default | Behaviour::Succeed, None) => Script::Succeed(values),
            (Behaviour::Default | Behaviour::Succeed, Some(delay)) => {
                Script::SucceedAfter(delay, values)
            }
            (Behaviour::Fail, None) => Script::Fail,
            (Behaviour::Fail, Some(delay)) => Script::FailAfter(delay),
            (Behaviour::Silent, _) => Script::Silent,
            (Behaviour::Flaky, _) => Script::SucceedThenFail(values),
        }
    }
}

impl FromStr for ProviderSpec {
    type Err = CliError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CliError::ProviderSpec {
            spec: spec.to_owned(),
            reason: reason.to_owned(),
        };

        let (id, rest) = match spec.split_once(':') {
            Some((id, rest)) => (id, Some(rest)),
            None => (spec, None),
        };
        let id = ProviderId::parse(id).map_err(|error| invalid(&error.to_string()))?;

        let Some(rest) = rest else {
            return Ok(Self::natural(id));
        };
        let (behaviour, delay) = match rest.split_once('@') {
            Some((behaviour, delay)) => {
                let millis: u64 = delay
                    .trim()
                    .parse()
                    .map_err(|_| invalid("delay must be whole milliseconds"))?;
                (behaviour, Some(Duration::from_millis(millis)))
            }
            None => (rest, None),
        };

        let behaviour = match behaviour.trim().to_ascii_lowercase().as_str() {
            "succeed" | "ok" => Behaviour::Succeed,
            "fail" => Behaviour::Fail,
            "silent" | "hang" => Behaviour::Silent,
            "flaky" => Behaviour::Flaky,
            _ => return Err(invalid("behaviour must be succeed, fail, silent or flaky")),
        };

        Ok(Self {
            id,
            behaviour,
            delay,
        })
    }
}

/// Parses explicit specs, or falls back to the configured priority list.
pub fn resolve_chain(specs: &[String], configured: &[ProviderId]) -> Result<Vec<ProviderSpec>, CliError> {
    if specs.is_empty() {
        return Ok(configured.iter().cloned().map(ProviderSpec::natural).collect());
    }
    specs.iter().map(|spec| spec.parse()).collect()
}

/// Horizontal accuracy a simulated provider reports for each tier.
pub fn simulated_accuracy_m(accuracy: LocationAccuracy) -> f32 {
    match accuracy {
        LocationAccuracy::High => 5.0,
        LocationAccuracy::Medium => 30.0,
        LocationAccuracy::Low => 150.0,
        LocationAccuracy::Lowest => 1_000.0,
    }
}

/// `count` fixes walking north from `origin`, about 11 m apart.
pub fn simulated_fixes(
    origin: &Location,
    count: usize,
    provider: &ProviderId,
    accuracy: LocationAccuracy,
) -> Result<Vec<Location>, CliError> {
    (0..count)
        .map(|step| {
            let latitude = (origin.latitude + step as f64 * 0.0001).min(90.0);
            let fix = Location::new(latitude, origin.longitude)?
                .with_accuracy(simulated_accuracy_m(accuracy))?
                .with_provider(provider.clone());
            Ok(fix)
        })
        .collect()
}
