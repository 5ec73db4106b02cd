//! Providers that play back a fixed script.
//!
//! Used by the integration tests and by the CLI simulator. Delays are run on
//! the scheduler from the [`ProviderContext`]; without one they happen
//! immediately.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::operation::Operation;
use crate::provider::{FailureSink, Lifecycle, Provider, ProviderContext, ProviderFactory, ValueSink};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::ticket::ProviderTicket;
use crate::ProviderId;

/// What a scripted provider does once started.
#[derive(Debug, Clone, PartialEq)]
pub enum Script<V> {
    /// Delivers every value synchronously inside `start`.
    Succeed(Vec<V>),
    SucceedAfter(Duration, Vec<V>),
    /// Reports failure synchronously inside `start`.
    Fail,
    FailAfter(Duration),
    /// Never calls back.
    Silent,
    /// Delivers the values, then reports failure.
    SucceedThenFail(Vec<V>),
}

impl<V> Script<V> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeed(_) => "succeed",
            Self::SucceedAfter(..) => "succeed-after",
            Self::Fail => "fail",
            Self::FailAfter(_) => "fail-after",
            Self::Silent => "silent",
            Self::SucceedThenFail(_) => "succeed-then-fail",
        }
    }
}

/// Provider method observed by a [`CallLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Created,
    Started,
    Stopped,
    LastKnown,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub provider: ProviderId,
    pub ticket: Option<ProviderTicket>,
    pub call: Call,
}

/// Shared, ordered record of provider calls across every scripted provider
/// that logs into it.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CallRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, provider: &ProviderId, ticket: Option<ProviderTicket>, call: Call) {
        self.lock().push(CallRecord {
            provider: provider.clone(),
            ticket,
            call,
        });
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.lock().clone()
    }

    /// `(provider, call)` pairs in order, for compact assertions.
    pub fn calls(&self) -> Vec<(String, Call)> {
        self.lock()
            .iter()
            .map(|record| (record.provider.to_string(), record.call))
            .collect()
    }

    pub fn count(&self, provider: &ProviderId, call: Call) -> usize {
        self.lock()
            .iter()
            .filter(|record| &record.provider == provider && record.call == call)
            .count()
    }

    /// Providers in the order they were constructed.
    pub fn created(&self) -> Vec<ProviderId> {
        self.providers_with(Call::Created)
    }

    pub fn started(&self) -> Vec<ProviderId> {
        self.providers_with(Call::Started)
    }

    fn providers_with(&self, call: Call) -> Vec<ProviderId> {
        self.lock()
            .iter()
            .filter(|record| record.call == call)
            .map(|record| record.provider.clone())
            .collect()
    }
}

/// Factory producing a fresh [`ScriptedProvider`] per call.
pub struct ScriptedFactory<Op: Operation> {
    id: ProviderId,
    script: Script<Op::Value>,
    log: CallLog,
    last_known: Option<Op::Value>,
    misbehaving: bool,
}

impl<Op: Operation> ScriptedFactory<Op>
where
    Op::Value: Clone + Sync,
{
    pub fn new(id: ProviderId, script: Script<Op::Value>, log: CallLog) -> Self {
        Self {
            id,
            script,
            log,
            last_known: None,
            misbehaving: false,
        }
    }

    /// Seeds the value reported by `last_known_value` before any delivery.
    pub fn with_last_known(mut self, value: Op::Value) -> Self {
        self.last_known = Some(value);
        self
    }

    /// Keeps delayed deliveries running after `stop` and `release`, like an
    /// SDK that calls back late.
    pub fn misbehaving(mut self) -> Self {
        self.misbehaving = true;
        self
    }

    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    pub fn script(&self) -> &Script<Op::Value> {
        &self.script
    }
}

impl<Op: Operation> fmt::Debug for ScriptedFactory<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedFactory")
            .field("id", &self.id)
            .field("script", &self.script.label())
            .finish()
    }
}

impl<Op: Operation> ProviderFactory<Op> for ScriptedFactory<Op>
where
    Op::Value: Clone + Sync,
{
    fn create(&self, context: &ProviderContext, failures: FailureSink) -> Arc<dyn Provider<Op>> {
        self.log.record(&self.id, failures.ticket(), Call::Created);
        Arc::new(ScriptedProvider::<Op> {
            id: self.id.clone(),
            script: self.script.clone(),
            log: self.log.clone(),
            scheduler: context.scheduler().cloned(),
            misbehaving: self.misbehaving,
            ticket: failures.ticket(),
            failures,
            state: Arc::new(ScriptState {
                lifecycle: Lifecycle::new(),
                last_known: Mutex::new(self.last_known.clone()),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

struct ScriptState<V> {
    lifecycle: Lifecycle,
    last_known: Mutex<Option<V>>,
}

impl<V: Clone> ScriptState<V> {
    fn remember(&self, value: &V) {
        let mut slot = self.last_known.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(value.clone());
    }
}

pub struct ScriptedProvider<Op: Operation> {
    id: ProviderId,
    script: Script<Op::Value>,
    log: CallLog,
    scheduler: Option<Arc<dyn Scheduler>>,
    misbehaving: bool,
    ticket: Option<ProviderTicket>,
    failures: FailureSink,
    state: Arc<ScriptState<Op::Value>>,
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl<Op: Operation> ScriptedProvider<Op>
where
    Op::Value: Clone + Sync,
{
    fn deliver_all(state: &ScriptState<Op::Value>, sink: &ValueSink<Op::Value>, values: &[Op::Value]) {
        for value in values {
            state.remember(value);
            sink.deliver(value.clone());
        }
    }

    fn after<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.scheduler {
            Some(scheduler) => {
                let task = scheduler.schedule(delay, Box::new(action));
                self.tasks
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(task);
            }
            None => {
                debug!(provider = %self.id, "no scheduler; running delayed script step now");
                action();
            }
        }
    }

    fn cancel_tasks(&self) {
        if self.misbehaving {
            return;
        }
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
        {
            task.cancel();
        }
    }
}

impl<Op: Operation> Provider<Op> for ScriptedProvider<Op>
where
    Op::Value: Clone + Sync,
{
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn start(&self, sink: ValueSink<Op::Value>, _params: &Op::Params) {
        self.log.record(&self.id, self.ticket, Call::Started);
        if !self.state.lifecycle.start() {
            return;
        }

        match &self.script {
            Script::Succeed(values) => Self::deliver_all(&self.state, &sink, values),
            Script::SucceedAfter(delay, values) => {
                let state = Arc::clone(&self.state);
                let values = values.clone();
                let misbehaving = self.misbehaving;
                self.after(*delay, move || {
                    if misbehaving || state.lifecycle.is_started() {
                        Self::deliver_all(&state, &sink, &values);
                    }
                });
            }
            Script::Fail => self.failures.provider_failed(),
            Script::FailAfter(delay) => {
                let state = Arc::clone(&self.state);
                let failures = self.failures.clone();
                let misbehaving = self.misbehaving;
                self.after(*delay, move || {
                    if misbehaving || state.lifecycle.is_started() {
                        failures.provider_failed();
                    }
                });
            }
            Script::Silent => {}
            Script::SucceedThenFail(values) => {
                Self::deliver_all(&self.state, &sink, values);
                self.failures.provider_failed();
            }
        }
    }

    fn stop(&self) {
        self.log.record(&self.id, self.ticket, Call::Stopped);
        if self.state.lifecycle.stop() {
            self.cancel_tasks();
        }
    }

    fn last_known_value(&self) -> Option<Op::Value> {
        self.log.record(&self.id, self.ticket, Call::LastKnown);
        self.state
            .last_known
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn release(&self) {
        self.log.record(&self.id, self.ticket, Call::Released);
        if self.state.lifecycle.release() {
            self.cancel_tasks();
        }
    }
}

impl<Op: Operation> fmt::Debug for ScriptedProvider<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("id", &self.id)
            .field("ticket", &self.ticket)
            .field("script", &self.script.label())
            .field("state", &self.state.lifecycle.state())
            .finish()
    }
}
