//! Per-start timeout supervision.
//!
//! A [`TimeoutSupervisor`] is armed when a provider is started and races the
//! provider's first value against a deadline. Exactly one side wins:
//!
//! - value first: the deadline action becomes a no-op and is cancelled
//! - deadline first: the timeout callback runs with the provider's ticket and
//!   every later value from that provider is dropped
//!
//! Controllers without a configured timeout simply do not create a supervisor.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::scheduler::{ScheduledTask, Scheduler};
use crate::ticket::ProviderTicket;

const PENDING: u8 = 0;
const VALUE_RECEIVED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Outcome of the value/deadline race, as seen from the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Pending,
    ValueReceived,
    TimedOut,
}

pub struct TimeoutSupervisor {
    ticket: ProviderTicket,
    deadline: Duration,
    state: Arc<AtomicU8>,
    task: Mutex<Option<ScheduledTask>>,
}

impl TimeoutSupervisor {
    pub fn new(ticket: ProviderTicket, deadline: Duration) -> Self {
        Self {
            ticket,
            deadline,
            state: Arc::new(AtomicU8::new(PENDING)),
            task: Mutex::new(None),
        }
    }

    pub fn ticket(&self) -> ProviderTicket {
        self.ticket
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Schedules the deadline action. `on_timeout` runs at most once, and only
    /// if no value was recorded before the deadline.
    pub fn on_started<F>(&self, scheduler: &dyn Scheduler, on_timeout: F)
    where
        F: FnOnce(ProviderTicket) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let ticket = self.ticket;
        let task = scheduler.schedule(
            self.deadline,
            Box::new(move || {
                if state
                    .compare_exchange(PENDING, TIMED_OUT, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    on_timeout(ticket);
                }
            }),
        );

        let mut slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.cancel();
        }
    }

    /// Records a value. Returns `false` when the deadline already passed and the
    /// value must not be forwarded.
    pub fn on_value(&self) -> bool {
        match self.state.compare_exchange(
            PENDING,
            VALUE_RECEIVED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                self.cancel();
                true
            }
            Err(current) => current == VALUE_RECEIVED,
        }
    }

    /// Cancels the pending deadline action, if any.
    pub fn cancel(&self) {
        let slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(task) = slot.as_ref() {
            task.cancel();
        }
    }

    pub fn state(&self) -> SupervisorState {
        match self.state.load(Ordering::SeqCst) {
            VALUE_RECEIVED => SupervisorState::ValueReceived,
            TIMED_OUT => SupervisorState::TimedOut,
            _ => SupervisorState::Pending,
        }
    }

    pub fn has_timed_out(&self) -> bool {
        self.state() == SupervisorState::TimedOut
    }
}

impl std::fmt::Debug for TimeoutSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutSupervisor")
            .field("ticket", &self.ticket)
            .field("deadline", &self.deadline)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::ticket::TicketIssuer;
    use std::sync::atomic::AtomicUsize;

    fn supervisor(deadline_ms: u64) -> TimeoutSupervisor {
        let issuer = TicketIssuer::default();
        TimeoutSupervisor::new(issuer.issue(), Duration::from_millis(deadline_ms))
    }

    #[test]
    fn fires_when_no_value_arrives() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let supervisor = supervisor(1_000);
        let counter = Arc::clone(&fired);
        supervisor.on_started(&scheduler, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.advance(Duration::from_millis(1_000));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(supervisor.has_timed_out());
        assert!(!supervisor.on_value(), "late value must be dropped");
    }

    #[test]
    fn value_before_deadline_disarms_timeout() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let supervisor = supervisor(1_000);
        let counter = Arc::clone(&fired);
        supervisor.on_started(&scheduler, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.advance(Duration::from_millis(400));
        assert!(supervisor.on_value());
        assert!(supervisor.on_value(), "later values keep flowing");
        assert_eq!(scheduler.pending(), 0);

        scheduler.advance(Duration::from_secs(5));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.state(), SupervisorState::ValueReceived);
    }

    #[test]
    fn cancel_keeps_state_pending() {
        let scheduler = ManualScheduler::new();
        let supervisor = supervisor(50);
        supervisor.on_started(&scheduler, |_| panic!("cancelled timeout fired"));

        supervisor.cancel();
        scheduler.advance(Duration::from_millis(100));

        assert_eq!(supervisor.state(), SupervisorState::Pending);
    }

    #[test]
    fn callback_receives_supervised_ticket() {
        let scheduler = ManualScheduler::new();
        let supervisor = supervisor(10);
        let expected = supervisor.ticket();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        supervisor.on_started(&scheduler, move |ticket| {
            *slot.lock().expect("lock") = Some(ticket);
        });

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*seen.lock().expect("lock"), Some(expected));
    }
}
