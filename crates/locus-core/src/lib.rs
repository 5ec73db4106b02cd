//! Core contracts for locus.
//!
//! This crate contains:
//! - The generic provider-fallback controller and its timeout supervision
//! - Provider and factory contracts, with identity tickets for stale-callback filtering
//! - Domain models, operation parameters and validation
//! - Layered configuration, a last-known store and a response envelope
//! - Bundled scripted and offline providers
//!
//! # Operation kinds
//!
//! | Operation | Params | Value | Delivery |
//! |-----------|--------|-------|----------|
//! | [`LocationUpdates`] | [`LocationParams`] | [`Location`] | stream, or once with [`RunMode::Once`] |
//! | [`Geocoding`] | [`GeocodingQuery`] | [`GeocodingBatch`] | once |
//! | [`ReverseGeocoding`] | [`ReverseGeocodingQuery`] | [`AddressBatch`] | once |
//! | [`GeofenceAdd`] | [`GeofenceRequest`] | [`GeofenceEvent`] | stream |
//! | [`GeofenceRemove`] | [`GeofenceRemoval`] | [`GeofenceRemoved`] | once |
//!
//! # Architecture
//!
//! A caller builds a [`FallbackController`] from an ordered list of
//! [`ProviderFactory`] handles and starts it. The controller creates one
//! provider at a time. A failure report or a timeout for the current provider
//! releases it and promotes the next factory; reports from any other provider
//! are dropped. When the list runs out the failure listener fires once.
//!
//! ```rust,ignore
//! let log = CallLog::new();
//! let controller = LocationController::builder(LocationParams::navigation())
//!     .with_factory(ScriptedFactory::new(ProviderId::FUSED, Script::Fail, log.clone()))
//!     .with_factory(ScriptedFactory::new(ProviderId::MANAGER, Script::Succeed(vec![fix]), log))
//!     .with_timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let location = controller.first_value().await?;
//! ```

pub mod adapters;
pub mod config;
pub mod controller;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod events;
pub mod listener;
pub mod operation;
pub mod params;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod ticket;
pub mod timeout;

pub use adapters::{
    Call, CallLog, CallRecord, Gazetteer, GazetteerGeocoder, GazetteerReverseGeocoder,
    LastKnownFactory, LastKnownProvider, Place, Script, ScriptedFactory, ScriptedProvider,
};
pub use config::LocusConfig;
pub use controller::{
    ActiveProvider, ControllerPhase, FallbackController, FallbackControllerBuilder,
    GeofenceAddController, GeofenceRemoveController, GeocodingController, LocationController,
    ReverseGeocodingController,
};
pub use domain::{
    Address, AddressBatch, Geofence, GeofenceEvent, GeofenceHandle, GeofenceRemoval,
    GeofenceRemoved, GeofenceRequest, GeofenceTransition, GeocodingBatch, Location,
    TransitionSet, UtcDateTime,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{CoreError, FallbackError, ValidationError};
pub use events::FallbackEvent;
pub use listener::{FailureListener, ResultListener};
pub use operation::{
    Delivery, GeofenceAdd, GeofenceRemove, Geocoding, LocationUpdates, Operation, OperationKind,
    ReverseGeocoding,
};
pub use params::{
    GeocodingQuery, LocationAccuracy, LocationParams, ReverseGeocodingQuery, RunMode,
};
pub use provider::{
    FailureSink, Lifecycle, Provider, ProviderContext, ProviderFactory, ProviderState, ValueSink,
};
pub use registry::ProviderRegistry;
pub use scheduler::{ManualScheduler, ScheduledAction, ScheduledTask, Scheduler, TokioScheduler};
pub use source::ProviderId;
pub use store::{LastKnownStore, MemoryStore};
pub use ticket::ProviderTicket;
pub use timeout::{SupervisorState, TimeoutSupervisor};
