//! Provider and factory contracts.
//!
//! A provider is one backing source (fused client, OS location manager,
//! vendor SDK, geocoder) for one [`Operation`]. Controllers never construct
//! providers directly; they ask a [`ProviderFactory`] for a fresh instance and
//! hand it a [`FailureSink`] bound to that instance.
//!
//! # Provider obligations
//!
//! | Method | Contract |
//! |--------|----------|
//! | [`start`](Provider::start) | Must eventually deliver at least one value to the sink **or** report failure. A provider that does neither stalls its controller unless a timeout is configured. |
//! | [`stop`](Provider::stop) | Idempotent; stopping a stopped or never-started provider is a no-op. |
//! | [`last_known_value`](Provider::last_known_value) | Synchronous, best effort, may return `None`. |
//! | [`release`](Provider::release) | Idempotent and terminal; must not panic on a never-started provider. |
//!
//! [`Lifecycle`] implements the state rules above for provider authors.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use crate::operation::Operation;
use crate::scheduler::Scheduler;
use crate::store::{LastKnownStore, MemoryStore};
use crate::ticket::ProviderTicket;
use crate::ProviderId;

/// A source of values for one operation kind.
///
/// Implementations must be `Send + Sync`; callbacks may arrive on any thread.
pub trait Provider<Op: Operation>: Send + Sync {
    fn id(&self) -> ProviderId;

    fn start(&self, sink: ValueSink<Op::Value>, params: &Op::Params);

    fn stop(&self);

    fn last_known_value(&self) -> Option<Op::Value>;

    fn release(&self);
}

/// Builds a fresh, independent provider per call.
pub trait ProviderFactory<Op: Operation>: Send + Sync {
    fn create(&self, context: &ProviderContext, failures: FailureSink) -> Arc<dyn Provider<Op>>;
}

impl<Op, F> ProviderFactory<Op> for F
where
    Op: Operation,
    F: Fn(&ProviderContext, FailureSink) -> Arc<dyn Provider<Op>> + Send + Sync,
{
    fn create(&self, context: &ProviderContext, failures: FailureSink) -> Arc<dyn Provider<Op>> {
        self(context, failures)
    }
}

/// Execution context handed to factories.
#[derive(Clone)]
pub struct ProviderContext {
    scheduler: Option<Arc<dyn Scheduler>>,
    store: Arc<dyn LastKnownStore>,
}

impl ProviderContext {
    pub fn new(scheduler: Option<Arc<dyn Scheduler>>, store: Arc<dyn LastKnownStore>) -> Self {
        Self { scheduler, store }
    }

    pub fn scheduler(&self) -> Option<&Arc<dyn Scheduler>> {
        self.scheduler.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn LastKnownStore> {
        &self.store
    }
}

impl Default for ProviderContext {
    fn default() -> Self {
        Self::new(None, Arc::new(MemoryStore::new()))
    }
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) trait FailurePort: Send + Sync {
    fn provider_failed(&self, ticket: ProviderTicket);
}

pub(crate) trait ValuePort<V>: Send + Sync {
    fn value_delivered(&self, ticket: ProviderTicket, value: V);
}

#[derive(Clone)]
enum FailureTarget {
    Controller {
        port: Weak<dyn FailurePort>,
        ticket: ProviderTicket,
    },
    Callback(Arc<dyn Fn() + Send + Sync>),
}

/// One-directional channel a provider uses to report its own failure.
///
/// Reporting more than once, or after the controller moved on, is harmless.
#[derive(Clone)]
pub struct FailureSink {
    target: FailureTarget,
}

impl FailureSink {
    pub(crate) fn for_controller(port: Weak<dyn FailurePort>, ticket: ProviderTicket) -> Self {
        Self {
            target: FailureTarget::Controller { port, ticket },
        }
    }

    /// Sink that runs `callback`; for driving providers outside a controller.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            target: FailureTarget::Callback(Arc::new(callback)),
        }
    }

    /// Sink that drops every report.
    pub fn detached() -> Self {
        Self::from_fn(|| {})
    }

    pub fn ticket(&self) -> Option<ProviderTicket> {
        match &self.target {
            FailureTarget::Controller { ticket, .. } => Some(*ticket),
            FailureTarget::Callback(_) => None,
        }
    }

    pub fn provider_failed(&self) {
        match &self.target {
            FailureTarget::Controller { port, ticket } => {
                if let Some(port) = port.upgrade() {
                    port.provider_failed(*ticket);
                }
            }
            FailureTarget::Callback(callback) => callback(),
        }
    }
}

impl fmt::Debug for FailureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureSink")
            .field("ticket", &self.ticket())
            .finish()
    }
}

enum ValueTarget<V> {
    Controller {
        port: Weak<dyn ValuePort<V>>,
        ticket: ProviderTicket,
    },
    Callback(Arc<dyn Fn(V) + Send + Sync>),
}

impl<V> Clone for ValueTarget<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Controller { port, ticket } => Self::Controller {
                port: Weak::clone(port),
                ticket: *ticket,
            },
            Self::Callback(callback) => Self::Callback(Arc::clone(callback)),
        }
    }
}

/// The wrapped listener a provider pushes values into.
pub struct ValueSink<V> {
    target: ValueTarget<V>,
}

impl<V> Clone for ValueSink<V> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<V: Send + 'static> ValueSink<V> {
    pub(crate) fn for_controller(port: Weak<dyn ValuePort<V>>, ticket: ProviderTicket) -> Self {
        Self {
            target: ValueTarget::Controller { port, ticket },
        }
    }

    /// Sink that runs `callback` for each value; for driving providers outside a controller.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        Self {
            target: ValueTarget::Callback(Arc::new(callback)),
        }
    }

    pub fn ticket(&self) -> Option<ProviderTicket> {
        match &self.target {
            ValueTarget::Controller { ticket, .. } => Some(*ticket),
            ValueTarget::Callback(_) => None,
        }
    }

    pub fn deliver(&self, value: V) {
        match &self.target {
            ValueTarget::Controller { port, ticket } => {
                if let Some(port) = port.upgrade() {
                    port.value_delivered(*ticket, value);
                }
            }
            ValueTarget::Callback(callback) => callback(value),
        }
    }
}

impl<V> fmt::Debug for ValueSink<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ticket = match &self.target {
            ValueTarget::Controller { ticket, .. } => Some(*ticket),
            ValueTarget::Callback(_) => None,
        };
        f.debug_struct("ValueSink").field("ticket", &ticket).finish()
    }
}

/// Provider lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Started,
    Stopped,
    Released,
}

impl ProviderState {
    const fn encode(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Started => 1,
            Self::Stopped => 2,
            Self::Released => 3,
        }
    }

    const fn decode(value: u8) -> Self {
        match value {
            1 => Self::Started,
            2 => Self::Stopped,
            3 => Self::Released,
            _ => Self::Uninitialized,
        }
    }
}

/// Thread-safe lifecycle state machine for provider implementations.
///
/// Each transition method returns `true` only when it actually changed the
/// state, so callers can skip side effects on repeated or out-of-order calls.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(0),
        }
    }

    pub fn state(&self) -> ProviderState {
        ProviderState::decode(self.state.load(Ordering::SeqCst))
    }

    /// `Uninitialized -> Started`.
    pub fn start(&self) -> bool {
        self.transition(ProviderState::Uninitialized, ProviderState::Started)
    }

    /// `Started -> Stopped`.
    pub fn stop(&self) -> bool {
        self.transition(ProviderState::Started, ProviderState::Stopped)
    }

    /// Any state `-> Released`; `false` if already released.
    pub fn release(&self) -> bool {
        self.state.swap(ProviderState::Released.encode(), Ordering::SeqCst)
            != ProviderState::Released.encode()
    }

    pub fn is_started(&self) -> bool {
        self.state() == ProviderState::Started
    }

    fn transition(&self, from: ProviderState, to: ProviderState) -> bool {
        self.state
            .compare_exchange(from.encode(), to.encode(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn lifecycle_transitions_are_idempotent() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ProviderState::Uninitialized);

        assert!(!lifecycle.stop(), "stop before start is a no-op");
        assert!(lifecycle.start());
        assert!(!lifecycle.start());
        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(lifecycle.release());
        assert!(!lifecycle.release());
        assert!(!lifecycle.start(), "released is terminal");
        assert_eq!(lifecycle.state(), ProviderState::Released);
    }

    #[test]
    fn release_is_allowed_before_start() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.release());
        assert_eq!(lifecycle.state(), ProviderState::Released);
    }

    #[test]
    fn callback_sinks_forward_directly() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let sink = FailureSink::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sink.provider_failed();
        sink.clone().provider_failed();
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(sink.ticket(), None);

        let values = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&values);
        let sink = ValueSink::from_fn(move |value: u32| {
            collected.lock().expect("lock").push(value);
        });
        sink.deliver(7);
        sink.deliver(9);
        assert_eq!(*values.lock().expect("lock"), vec![7, 9]);
    }

    #[test]
    fn detached_sink_ignores_reports() {
        FailureSink::detached().provider_failed();
    }
}
