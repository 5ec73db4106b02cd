//! Provider identity tickets.
//!
//! Every provider a controller constructs gets a fresh ticket. Every sink and
//! scheduled action handed out for that provider carries the same ticket, and
//! the controller only acts on a signal whose ticket matches the provider that
//! is current at the moment the signal is processed. Late, duplicate and
//! post-release callbacks therefore fall through as no-ops.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one constructed provider within one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderTicket(u64);

impl ProviderTicket {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for ProviderTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic ticket source, one per controller.
#[derive(Debug, Default)]
pub(crate) struct TicketIssuer {
    next: AtomicU64,
}

impl TicketIssuer {
    pub(crate) fn issue(&self) -> ProviderTicket {
        ProviderTicket(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_unique_and_increasing() {
        let issuer = TicketIssuer::default();
        let first = issuer.issue();
        let second = issuer.issue();

        assert_ne!(first, second);
        assert!(second > first);
        assert_eq!(first.to_string(), "#1");
    }
}
