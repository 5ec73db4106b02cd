//! Location provider answering from the last-known store.

use std::sync::Arc;

use tracing::debug;

use crate::operation::LocationUpdates;
use crate::params::LocationParams;
use crate::provider::{FailureSink, Lifecycle, Provider, ProviderContext, ProviderFactory, ValueSink};
use crate::store::LastKnownStore;
use crate::{Location, ProviderId};

/// Builds [`LastKnownProvider`]s reading the store entry of `key`.
#[derive(Debug, Clone)]
pub struct LastKnownFactory {
    key: ProviderId,
}

impl LastKnownFactory {
    pub fn new(key: ProviderId) -> Self {
        Self { key }
    }
}

impl ProviderFactory<LocationUpdates> for LastKnownFactory {
    fn create(
        &self,
        context: &ProviderContext,
        failures: FailureSink,
    ) -> Arc<dyn Provider<LocationUpdates>> {
        Arc::new(LastKnownProvider {
            key: self.key.clone(),
            store: Arc::clone(context.store()),
            failures,
            lifecycle: Lifecycle::new(),
        })
    }
}

/// Delivers the stored fix once, or fails when the store has none.
pub struct LastKnownProvider {
    key: ProviderId,
    store: Arc<dyn LastKnownStore>,
    failures: FailureSink,
    lifecycle: Lifecycle,
}

impl LastKnownProvider {
    fn stored(&self) -> Option<Location> {
        self.store
            .get(&self.key)
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

impl Provider<LocationUpdates> for LastKnownProvider {
    fn id(&self) -> ProviderId {
        ProviderId::LAST_KNOWN
    }

    fn start(&self, sink: ValueSink<Location>, _params: &LocationParams) {
        if !self.lifecycle.start() {
            return;
        }
        match self.stored() {
            Some(location) => sink.deliver(location.with_provider(ProviderId::LAST_KNOWN)),
            None => {
                debug!(key = %self.key, "no stored fix");
                self.failures.provider_failed();
            }
        }
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    fn last_known_value(&self) -> Option<Location> {
        self.stored()
    }

    fn release(&self) {
        self.lifecycle.release();
    }
}
