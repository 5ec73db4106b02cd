//! Maps provider ids to factories so a configured priority list can be turned
//! into a factory chain.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::operation::Operation;
use crate::provider::ProviderFactory;
use crate::ProviderId;

pub struct ProviderRegistry<Op: Operation> {
    factories: HashMap<ProviderId, Arc<dyn ProviderFactory<Op>>>,
    order: Vec<ProviderId>,
}

impl<Op: Operation> Default for ProviderRegistry<Op> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<Op: Operation> fmt::Debug for ProviderRegistry<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("operation", &Op::KIND)
            .field("providers", &self.order)
            .finish()
    }
}

impl<Op: Operation> ProviderRegistry<Op> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `id`, replacing any previous entry.
    pub fn register<F>(&mut self, id: ProviderId, factory: F) -> &mut Self
    where
        F: ProviderFactory<Op> + 'static,
    {
        self.register_shared(id, Arc::new(factory))
    }

    pub fn register_shared(
        &mut self,
        id: ProviderId,
        factory: Arc<dyn ProviderFactory<Op>>,
    ) -> &mut Self {
        if self.factories.insert(id.clone(), factory).is_none() {
            self.order.push(id);
        }
        self
    }

    pub fn with<F>(mut self, id: ProviderId, factory: F) -> Self
    where
        F: ProviderFactory<Op> + 'static,
    {
        self.register(id, factory);
        self
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> &[ProviderId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Factories for `priority`, in order. Duplicates keep their first
    /// position; unknown ids are skipped.
    pub fn chain(&self, priority: &[ProviderId]) -> Vec<Arc<dyn ProviderFactory<Op>>> {
        dedupe_chain(priority)
            .into_iter()
            .filter_map(|id| match self.factories.get(&id) {
                Some(factory) => Some(Arc::clone(factory)),
                None => {
                    warn!(
                        operation = Op::KIND.as_str(),
                        provider = %id,
                        "provider not registered; skipping"
                    );
                    None
                }
            })
            .collect()
    }

    /// Every registered factory in registration order.
    pub fn default_chain(&self) -> Vec<Arc<dyn ProviderFactory<Op>>> {
        self.chain(&self.order)
    }
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(chain.len());

    for id in chain {
        if seen.insert(id.clone()) {
            deduped.push(id.clone());
        }
    }

    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::LocationUpdates;
    use crate::provider::{FailureSink, Provider, ProviderContext};

    fn unreachable_factory() -> impl ProviderFactory<LocationUpdates> {
        |_: &ProviderContext, _: FailureSink| -> Arc<dyn Provider<LocationUpdates>> {
            unreachable!("registry tests never build providers")
        }
    }

    #[test]
    fn chain_follows_priority_and_skips_unknown() {
        let registry = ProviderRegistry::<LocationUpdates>::new()
            .with(ProviderId::FUSED, unreachable_factory())
            .with(ProviderId::MANAGER, unreachable_factory());

        let chain = registry.chain(&[
            ProviderId::MANAGER,
            ProviderId::VENDOR,
            ProviderId::FUSED,
            ProviderId::MANAGER,
        ]);

        assert_eq!(chain.len(), 2);
        assert_eq!(registry.ids(), &[ProviderId::FUSED, ProviderId::MANAGER]);
    }

    #[test]
    fn re_registering_keeps_original_position() {
        let mut registry = ProviderRegistry::<LocationUpdates>::new();
        registry
            .register(ProviderId::VENDOR, unreachable_factory())
            .register(ProviderId::FUSED, unreachable_factory())
            .register(ProviderId::VENDOR, unreachable_factory());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids()[0], ProviderId::VENDOR);
        assert_eq!(registry.default_chain().len(), 2);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let deduped = dedupe_chain(&[
            ProviderId::FUSED,
            ProviderId::FUSED,
            ProviderId::MANAGER,
        ]);
        assert_eq!(deduped, vec![ProviderId::FUSED, ProviderId::MANAGER]);
    }
}
