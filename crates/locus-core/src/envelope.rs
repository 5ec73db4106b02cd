//! The JSON document `locus` prints for every command.

use serde::{Deserialize, Serialize};

use crate::{ProviderId, UtcDateTime};

/// Bumped when a field changes meaning or disappears.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn new(meta: EnvelopeMeta, data: T, errors: Vec<EnvelopeError>) -> Self {
        Self { meta, data, errors }
    }

    /// Whether a fallback chain ran out of providers.
    pub fn is_exhausted(&self) -> bool {
        self.errors
            .iter()
            .any(|error| error.code == EnvelopeError::ALL_PROVIDERS_FAILED)
    }
}

/// Request bookkeeping plus what the fallback chain did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub schema_version: u32,
    pub generated_at: UtcDateTime,
    pub operation: String,
    /// Providers the controller constructed, in order. Empty when the
    /// priority list was.
    pub source_chain: Vec<ProviderId>,
    /// Provider whose value ended up in `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ProviderId>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(request_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            schema_version: SCHEMA_VERSION,
            generated_at: UtcDateTime::now(),
            operation: operation.into(),
            source_chain: Vec::new(),
            winner: None,
            latency_ms: 0,
            warnings: Vec::new(),
        }
    }

    pub fn with_chain(mut self, source_chain: Vec<ProviderId>, winner: Option<ProviderId>) -> Self {
        self.source_chain = source_chain;
        self.winner = winner;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    /// The provider tried last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
}

impl EnvelopeError {
    pub const ALL_PROVIDERS_FAILED: &'static str = "all_providers_failed";

    /// Exhaustion of a chain that constructed `attempted`, in order.
    pub fn all_providers_failed(attempted: &[ProviderId]) -> Self {
        let chain = if attempted.is_empty() {
            String::from("none")
        } else {
            attempted
                .iter()
                .map(ProviderId::as_str)
                .collect::<Vec<_>>()
                .join(" -> ")
        };
        Self {
            code: String::from(Self::ALL_PROVIDERS_FAILED),
            message: format!("all providers failed (attempted: {chain})"),
            source: attempted.last().cloned(),
        }
    }
}
