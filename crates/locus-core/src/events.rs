//! Channel and future adapters over the callback interface.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::controller::FallbackController;
use crate::listener::{FailureListener, ResultListener};
use crate::operation::Operation;
use crate::FallbackError;

/// Item produced by [`FallbackController::start_channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackEvent<V> {
    Value(V),
    /// Every provider failed. Always the last event.
    Exhausted,
}

struct ChannelListener<V> {
    tx: mpsc::UnboundedSender<FallbackEvent<V>>,
}

impl<V: Send> ResultListener<V> for ChannelListener<V> {
    fn on_value(&self, value: V) {
        let _ = self.tx.send(FallbackEvent::Value(value));
    }
}

impl<V: Send> FailureListener for ChannelListener<V> {
    fn on_all_providers_failed(&self) {
        let _ = self.tx.send(FallbackEvent::Exhausted);
    }
}

impl<Op: Operation> FallbackController<Op> {
    /// Starts the controller and streams its outcomes.
    ///
    /// The channel closes after `Exhausted`, or when the controller is
    /// released. If the controller was already started the receiver is closed
    /// immediately.
    pub fn start_channel(&self) -> mpsc::UnboundedReceiver<FallbackEvent<Op::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(ChannelListener { tx });
        self.try_start(
            Arc::clone(&listener) as Arc<dyn ResultListener<Op::Value>>,
            listener,
        );
        rx
    }

    /// Starts the controller and resolves with the first forwarded value.
    ///
    /// The controller is stopped once the value arrives, so streaming
    /// operations deliver exactly one item through this call.
    pub async fn first_value(&self) -> Result<Op::Value, FallbackError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = Arc::new(ChannelListener { tx });
        if !self.try_start(
            Arc::clone(&listener) as Arc<dyn ResultListener<Op::Value>>,
            listener,
        ) {
            return Err(FallbackError::AlreadyStarted);
        }

        match rx.recv().await {
            Some(FallbackEvent::Value(value)) => {
                self.stop();
                Ok(value)
            }
            Some(FallbackEvent::Exhausted) => Err(FallbackError::AllProvidersFailed {
                attempted: self.attempts(),
            }),
            None => Err(FallbackError::Released),
        }
    }
}
