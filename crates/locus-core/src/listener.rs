//! Caller-facing listener contracts.
//!
//! Both traits are implemented for plain closures, so callers can pass
//! `|location| ...` and `|| ...` directly.

/// Receives values forwarded from the provider that is currently winning.
pub trait ResultListener<V>: Send + Sync {
    fn on_value(&self, value: V);
}

impl<V, F> ResultListener<V> for F
where
    F: Fn(V) + Send + Sync,
{
    fn on_value(&self, value: V) {
        self(value)
    }
}

/// Notified once when every provider in the chain has failed.
pub trait FailureListener: Send + Sync {
    fn on_all_providers_failed(&self);
}

impl<F> FailureListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_all_providers_failed(&self) {
        self()
    }
}
