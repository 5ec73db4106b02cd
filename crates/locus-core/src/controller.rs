//! The provider-fallback controller.
//!
//! A [`FallbackController`] owns an ordered queue of [`ProviderFactory`]
//! handles and keeps at most one provider alive at a time:
//!
//! ```text
//! start ─► pop factory ─► create provider ─► arm timeout ─► provider.start
//!              ▲                                                 │
//!              │            failure / timeout (current ticket)   │
//!              └──────────── release provider ◄──────────────────┘
//!
//! queue empty ─► on_all_providers_failed (once) ─► Exhausted
//! ```
//!
//! Every callback path (failure sink, value sink, timeout action, `stop`,
//! `release`) is turned into a signal on a per-controller inbox. Whichever
//! thread finds the inbox idle drains it, so controller state is only ever
//! mutated by one thread at a time and no lock is held while a provider or a
//! listener runs. `stop` and `release` called from any other thread wait
//! until their signal has been handled. Each signal carries the [`ProviderTicket`] of the provider it
//! originated from; a signal whose ticket is not the current one is dropped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::listener::{FailureListener, ResultListener};
use crate::operation::{
    Delivery, GeofenceAdd, GeofenceRemove, Geocoding, LocationUpdates, Operation,
    ReverseGeocoding,
};
use crate::provider::{
    FailurePort, FailureSink, Provider, ProviderContext, ProviderFactory, ValuePort, ValueSink,
};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::store::{LastKnownStore, MemoryStore};
use crate::ticket::{ProviderTicket, TicketIssuer};
use crate::timeout::TimeoutSupervisor;
use crate::{ProviderId, ValidationError};

pub type LocationController = FallbackController<LocationUpdates>;
pub type GeocodingController = FallbackController<Geocoding>;
pub type ReverseGeocodingController = FallbackController<ReverseGeocoding>;
pub type GeofenceAddController = FallbackController<GeofenceAdd>;
pub type GeofenceRemoveController = FallbackController<GeofenceRemove>;

/// Coarse controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Built, not started yet.
    Idle,
    /// A provider is active and fallback is armed.
    Running,
    /// A one-shot operation delivered its value.
    Completed,
    Stopped,
    /// Every provider failed; no provider will be created again.
    Exhausted,
    Released,
}

impl ControllerPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Exhausted => "exhausted",
            Self::Released => "released",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Released)
    }
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider a controller currently holds.
pub struct ActiveProvider<Op: Operation> {
    ticket: ProviderTicket,
    id: ProviderId,
    provider: Arc<dyn Provider<Op>>,
}

impl<Op: Operation> ActiveProvider<Op> {
    pub fn ticket(&self) -> ProviderTicket {
        self.ticket
    }

    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    pub fn provider(&self) -> &Arc<dyn Provider<Op>> {
        &self.provider
    }

    /// Whether both handles point at the same provider instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        self.ticket == other.ticket && Arc::ptr_eq(&self.provider, &other.provider)
    }
}

impl<Op: Operation> Clone for ActiveProvider<Op> {
    fn clone(&self) -> Self {
        Self {
            ticket: self.ticket,
            id: self.id.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<Op: Operation> fmt::Debug for ActiveProvider<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveProvider")
            .field("ticket", &self.ticket)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FallbackController`].
///
/// # Example
///
/// ```rust,ignore
/// let controller = FallbackControllerBuilder::<LocationUpdates>::new(LocationParams::navigation())
///     .with_factory(fused)
///     .with_factory(manager)
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct FallbackControllerBuilder<Op: Operation> {
    params: Op::Params,
    factories: Vec<Arc<dyn ProviderFactory<Op>>>,
    timeout: Option<Duration>,
    scheduler: Option<Arc<dyn Scheduler>>,
    store: Option<Arc<dyn LastKnownStore>>,
}

impl<Op: Operation> FallbackControllerBuilder<Op> {
    pub fn new(params: Op::Params) -> Self {
        Self {
            params,
            factories: Vec::new(),
            timeout: None,
            scheduler: None,
            store: None,
        }
    }

    /// Appends a factory; priority is insertion order.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: ProviderFactory<Op> + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn with_shared_factory(mut self, factory: Arc<dyn ProviderFactory<Op>>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn with_factories<I>(mut self, factories: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ProviderFactory<Op>>>,
    {
        self.factories.extend(factories);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets or clears the timeout in one call.
    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn LastKnownStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the controller.
    ///
    /// Without an explicit scheduler the builder captures the current tokio
    /// runtime, if there is one.
    pub fn build(self) -> Result<FallbackController<Op>, ValidationError> {
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ValidationError::ZeroTimeout);
        }

        let scheduler = self.scheduler.or_else(|| {
            TokioScheduler::try_current().map(|scheduler| Arc::new(scheduler) as Arc<dyn Scheduler>)
        });
        if self.timeout.is_some() && scheduler.is_none() {
            return Err(ValidationError::MissingScheduler);
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn LastKnownStore>);
        let context = ProviderContext::new(scheduler.clone(), store);
        let delivery = Op::delivery(&self.params);

        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            params: self.params,
            delivery,
            timeout: self.timeout,
            scheduler,
            context,
            tickets: TicketIssuer::default(),
            state: Mutex::new(State {
                phase: ControllerPhase::Idle,
                queue: self.factories.into_iter().collect(),
                current: None,
                supervisor: None,
                delivered: false,
                listener: None,
                on_all_failed: None,
                attempts: Vec::new(),
            }),
            inbox: Mutex::new(Inbox {
                pending: VecDeque::new(),
                drainer: None,
                queued: 0,
                processed: 0,
            }),
            settled: Condvar::new(),
        });

        Ok(FallbackController { shared })
    }
}

/// Ordered provider fallback for one operation kind.
///
/// Cloning yields another handle to the same controller. When the last handle
/// is dropped the active provider, if any, is released.
pub struct FallbackController<Op: Operation> {
    shared: Arc<Shared<Op>>,
}

impl<Op: Operation> Clone for FallbackController<Op> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Op: Operation> fmt::Debug for FallbackController<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("FallbackController")
            .field("operation", &Op::KIND)
            .field("phase", &state.phase)
            .field("remaining", &state.queue.len())
            .field("current", &state.current)
            .field("timeout", &self.shared.timeout)
            .finish()
    }
}

impl<Op: Operation> FallbackController<Op> {
    pub fn builder(params: Op::Params) -> FallbackControllerBuilder<Op> {
        FallbackControllerBuilder::new(params)
    }

    /// Begins the fallback sequence.
    ///
    /// May complete synchronously when providers fail inside `start`. Calling
    /// it again, or after `release`, is ignored.
    pub fn start<L, F>(&self, listener: L, on_all_failed: F) -> &Self
    where
        L: ResultListener<Op::Value> + 'static,
        F: FailureListener + 'static,
    {
        self.try_start(Arc::new(listener), Arc::new(on_all_failed));
        self
    }

    pub(crate) fn try_start(
        &self,
        listener: Arc<dyn ResultListener<Op::Value>>,
        on_all_failed: Arc<dyn FailureListener>,
    ) -> bool {
        {
            let mut state = self.shared.lock_state();
            if state.phase != ControllerPhase::Idle || state.listener.is_some() {
                warn!(
                    operation = Op::KIND.as_str(),
                    phase = state.phase.as_str(),
                    "start ignored; controllers are single-use"
                );
                return false;
            }
            state.listener = Some(listener);
            state.on_all_failed = Some(on_all_failed);
        }
        self.shared.submit(Signal::Start);
        true
    }

    /// Failure entry point keyed by ticket. Tickets other than the current
    /// provider's are ignored.
    pub fn provider_failed(&self, ticket: ProviderTicket) {
        self.shared.submit(Signal::Failed(ticket));
    }

    /// Stops the current provider. Fallback does not resume afterwards.
    ///
    /// Returns once the provider has been stopped, even when another thread
    /// is busy delivering to the listener. Called from inside a listener or a
    /// provider callback, the stop is queued and runs as soon as that
    /// callback returns.
    pub fn stop(&self) {
        self.shared.submit_and_wait(Signal::Stop);
    }

    /// Releases the current provider and drops the caller's listeners.
    /// Safe in every phase, including before `start`.
    ///
    /// Waits like [`stop`](Self::stop): `current_provider` is `None` on
    /// return unless the call came from inside a callback.
    pub fn release(&self) {
        self.shared.submit_and_wait(Signal::Release);
    }

    /// `None` before `start`, after exhaustion and after `release`.
    pub fn current_provider(&self) -> Option<ActiveProvider<Op>> {
        self.shared.lock_state().current.clone()
    }

    pub fn last_known_value(&self) -> Option<Op::Value> {
        let provider = self
            .shared
            .lock_state()
            .current
            .as_ref()
            .map(|active| Arc::clone(&active.provider))?;
        provider.last_known_value()
    }

    /// Provider ids constructed so far, in order.
    pub fn attempts(&self) -> Vec<ProviderId> {
        self.shared.lock_state().attempts.clone()
    }

    pub fn remaining(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    pub fn phase(&self) -> ControllerPhase {
        self.shared.lock_state().phase
    }

    pub fn params(&self) -> &Op::Params {
        &self.shared.params
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout
    }

    pub fn delivery(&self) -> Delivery {
        self.shared.delivery
    }
}

enum Signal<V> {
    Start,
    Failed(ProviderTicket),
    TimedOut(ProviderTicket),
    Value(ProviderTicket, V),
    Stop,
    Release,
}

struct Inbox<V> {
    pending: VecDeque<Signal<V>>,
    drainer: Option<ThreadId>,
    /// Signals ever queued and ever handled. The queue is FIFO, so a signal's
    /// position in `queued` tells when it is done.
    queued: u64,
    processed: u64,
}

struct State<Op: Operation> {
    phase: ControllerPhase,
    queue: VecDeque<Arc<dyn ProviderFactory<Op>>>,
    current: Option<ActiveProvider<Op>>,
    supervisor: Option<Arc<TimeoutSupervisor>>,
    delivered: bool,
    listener: Option<Arc<dyn ResultListener<Op::Value>>>,
    on_all_failed: Option<Arc<dyn FailureListener>>,
    attempts: Vec<ProviderId>,
}

impl<Op: Operation> State<Op> {
    fn is_current(&self, ticket: ProviderTicket) -> bool {
        self.phase == ControllerPhase::Running
            && self
                .current
                .as_ref()
                .is_some_and(|active| active.ticket == ticket)
    }
}

struct Shared<Op: Operation> {
    this: Weak<Shared<Op>>,
    params: Op::Params,
    delivery: Delivery,
    timeout: Option<Duration>,
    scheduler: Option<Arc<dyn Scheduler>>,
    context: ProviderContext,
    tickets: TicketIssuer,
    state: Mutex<State<Op>>,
    inbox: Mutex<Inbox<Op::Value>>,
    settled: Condvar,
}

/// Hands the inbox back if a provider or listener panics mid-drain, so the
/// controller is not wedged for other threads. The signal in flight counts as
/// handled.
struct DrainGuard<'a, V> {
    inbox: &'a Mutex<Inbox<V>>,
    settled: &'a Condvar,
}

impl<V> Drop for DrainGuard<'_, V> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut inbox = self.inbox.lock().unwrap_or_else(|p| p.into_inner());
            inbox.drainer = None;
            inbox.processed += 1;
            self.settled.notify_all();
        }
    }
}

impl<Op: Operation> Shared<Op> {
    fn lock_state(&self) -> MutexGuard<'_, State<Op>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_inbox(&self) -> MutexGuard<'_, Inbox<Op::Value>> {
        self.inbox.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queues `signal`; drains the inbox unless another call already is.
    fn submit(&self, signal: Signal<Op::Value>) {
        let mut inbox = self.lock_inbox();
        inbox.pending.push_back(signal);
        inbox.queued += 1;
        if inbox.drainer.is_some() {
            return;
        }
        self.drain(inbox);
    }

    /// Queues `signal` and returns once it has been handled, draining if no
    /// one else is. On the draining thread itself it only queues.
    fn submit_and_wait(&self, signal: Signal<Op::Value>) {
        let mut inbox = self.lock_inbox();
        inbox.pending.push_back(signal);
        inbox.queued += 1;
        let sequence = inbox.queued;
        let caller = thread::current().id();

        loop {
            if inbox.processed >= sequence {
                return;
            }
            let drainer = inbox.drainer;
            match drainer {
                None => break,
                Some(drainer) if drainer == caller => return,
                Some(_) => {
                    inbox = self
                        .settled
                        .wait(inbox)
                        .unwrap_or_else(|p| p.into_inner());
                }
            }
        }
        self.drain(inbox);
    }

    fn drain<'a>(&'a self, mut inbox: MutexGuard<'a, Inbox<Op::Value>>) {
        inbox.drainer = Some(thread::current().id());
        let _guard = DrainGuard {
            inbox: &self.inbox,
            settled: &self.settled,
        };
        loop {
            let Some(next) = inbox.pending.pop_front() else {
                inbox.drainer = None;
                drop(inbox);
                self.settled.notify_all();
                return;
            };
            drop(inbox);
            self.process(next);

            inbox = self.lock_inbox();
            inbox.processed += 1;
            self.settled.notify_all();
        }
    }

    fn process(&self, signal: Signal<Op::Value>) {
        match signal {
            Signal::Start => self.handle_start(),
            Signal::Failed(ticket) => self.handle_failure(ticket, false),
            Signal::TimedOut(ticket) => self.handle_failure(ticket, true),
            Signal::Value(ticket, value) => self.handle_value(ticket, value),
            Signal::Stop => self.handle_stop(),
            Signal::Release => self.handle_release(),
        }
    }

    fn handle_start(&self) {
        {
            let mut state = self.lock_state();
            if state.phase != ControllerPhase::Idle {
                debug!(
                    operation = Op::KIND.as_str(),
                    phase = state.phase.as_str(),
                    "start signal dropped"
                );
                return;
            }
            state.phase = ControllerPhase::Running;
            debug!(
                operation = Op::KIND.as_str(),
                providers = state.queue.len(),
                timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
                "fallback sequence started"
            );
        }
        self.start_next();
    }

    fn start_next(&self) {
        let factory = {
            let mut state = self.lock_state();
            if state.phase != ControllerPhase::Running {
                return;
            }
            match state.queue.pop_front() {
                Some(factory) => factory,
                None => {
                    state.phase = ControllerPhase::Exhausted;
                    state.current = None;
                    state.supervisor = None;
                    let listener = state.on_all_failed.clone();
                    let attempted = state
                        .attempts
                        .iter()
                        .map(ProviderId::as_str)
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    drop(state);

                    warn!(
                        operation = Op::KIND.as_str(),
                        attempted = %attempted,
                        "all providers failed"
                    );
                    if let Some(listener) = listener {
                        listener.on_all_providers_failed();
                    }
                    return;
                }
            }
        };

        let ticket = self.tickets.issue();
        let failure_port: Weak<dyn FailurePort> = self.this.clone();
        let provider = factory.create(
            &self.context,
            FailureSink::for_controller(failure_port, ticket),
        );
        let id = provider.id();

        let supervisor = self
            .timeout
            .map(|deadline| Arc::new(TimeoutSupervisor::new(ticket, deadline)));
        {
            let mut state = self.lock_state();
            state.current = Some(ActiveProvider {
                ticket,
                id: id.clone(),
                provider: Arc::clone(&provider),
            });
            state.supervisor = supervisor.clone();
            state.delivered = false;
            state.attempts.push(id.clone());
        }

        info!(
            operation = Op::KIND.as_str(),
            provider = %id,
            ticket = %ticket,
            "starting provider"
        );

        if let (Some(supervisor), Some(scheduler)) = (&supervisor, &self.scheduler) {
            let this = self.this.clone();
            supervisor.on_started(scheduler.as_ref(), move |ticket| {
                if let Some(shared) = this.upgrade() {
                    shared.submit(Signal::TimedOut(ticket));
                }
            });
        }

        let value_port: Weak<dyn ValuePort<Op::Value>> = self.this.clone();
        provider.start(ValueSink::for_controller(value_port, ticket), &self.params);
    }

    fn handle_failure(&self, ticket: ProviderTicket, timed_out: bool) {
        let (active, supervisor) = {
            let mut state = self.lock_state();
            if !state.is_current(ticket) {
                debug!(
                    operation = Op::KIND.as_str(),
                    ticket = %ticket,
                    timed_out,
                    "stale failure ignored"
                );
                return;
            }
            (state.current.take(), state.supervisor.take())
        };

        if let Some(supervisor) = supervisor {
            supervisor.cancel();
        }
        if let Some(active) = active {
            if timed_out {
                warn!(
                    operation = Op::KIND.as_str(),
                    provider = %active.id,
                    ticket = %ticket,
                    timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
                    "provider timed out"
                );
            } else {
                warn!(
                    operation = Op::KIND.as_str(),
                    provider = %active.id,
                    ticket = %ticket,
                    "provider failed"
                );
            }
            active.provider.release();
        }

        self.start_next();
    }

    fn handle_value(&self, ticket: ProviderTicket, value: Op::Value) {
        let (listener, first, finished) = {
            let mut state = self.lock_state();
            if !state.is_current(ticket) {
                debug!(
                    operation = Op::KIND.as_str(),
                    ticket = %ticket,
                    "stale value dropped"
                );
                return;
            }
            let first = !state.delivered;
            state.delivered = true;
            let finished = match self.delivery {
                Delivery::Once => {
                    state.phase = ControllerPhase::Completed;
                    state.supervisor = None;
                    state.current.as_ref().map(|active| Arc::clone(&active.provider))
                }
                Delivery::Stream => None,
            };
            (state.listener.clone(), first, finished)
        };

        if first {
            info!(
                operation = Op::KIND.as_str(),
                ticket = %ticket,
                "provider delivered first value"
            );
        }
        if let Some(listener) = listener {
            listener.on_value(value);
        }
        if let Some(provider) = finished {
            provider.stop();
        }
    }

    fn handle_stop(&self) {
        let (provider, supervisor) = {
            let mut state = self.lock_state();
            match state.phase {
                ControllerPhase::Running => {
                    state.phase = ControllerPhase::Stopped;
                    (
                        state.current.as_ref().map(|active| Arc::clone(&active.provider)),
                        state.supervisor.take(),
                    )
                }
                ControllerPhase::Completed => {
                    state.phase = ControllerPhase::Stopped;
                    (None, None)
                }
                phase => {
                    debug!(
                        operation = Op::KIND.as_str(),
                        phase = phase.as_str(),
                        "stop ignored"
                    );
                    return;
                }
            }
        };

        if let Some(supervisor) = supervisor {
            supervisor.cancel();
        }
        if let Some(provider) = provider {
            debug!(operation = Op::KIND.as_str(), "stopping provider");
            provider.stop();
        }
    }

    fn handle_release(&self) {
        let (active, supervisor, listener, on_all_failed) = {
            let mut state = self.lock_state();
            if state.phase == ControllerPhase::Released {
                return;
            }
            state.phase = ControllerPhase::Released;
            state.queue.clear();
            (
                state.current.take(),
                state.supervisor.take(),
                state.listener.take(),
                state.on_all_failed.take(),
            )
        };

        if let Some(supervisor) = supervisor {
            supervisor.cancel();
        }
        if let Some(active) = active {
            debug!(
                operation = Op::KIND.as_str(),
                provider = %active.id,
                ticket = %active.ticket,
                "releasing provider"
            );
            active.provider.release();
        }
        // Listeners may own channel senders; dropping them closes the channels.
        drop(listener);
        drop(on_all_failed);
    }
}

impl<Op: Operation> FailurePort for Shared<Op> {
    fn provider_failed(&self, ticket: ProviderTicket) {
        self.submit(Signal::Failed(ticket));
    }
}

impl<Op: Operation> ValuePort<Op::Value> for Shared<Op> {
    fn value_delivered(&self, ticket: ProviderTicket, value: Op::Value) {
        {
            let state = self.lock_state();
            if let Some(supervisor) = state
                .supervisor
                .as_ref()
                .filter(|supervisor| supervisor.ticket() == ticket)
            {
                if !supervisor.on_value() {
                    debug!(
                        operation = Op::KIND.as_str(),
                        ticket = %ticket,
                        "value after timeout dropped"
                    );
                    return;
                }
            }
        }
        self.submit(Signal::Value(ticket, value));
    }
}

impl<Op: Operation> Drop for Shared<Op> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(supervisor) = state.supervisor.take() {
            supervisor.cancel();
        }
        if let Some(active) = state.current.take() {
            if state.phase != ControllerPhase::Released {
                debug!(
                    operation = Op::KIND.as_str(),
                    provider = %active.id,
                    "controller dropped; releasing provider"
                );
                active.provider.release();
            }
        }
    }
}
