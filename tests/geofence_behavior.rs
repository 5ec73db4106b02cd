//! Behaviour tests for geofence registration and removal chains.

use std::sync::{Arc, Mutex};

use locus_core::{
    FailureSink, Geofence, GeofenceAdd, GeofenceAddController, GeofenceEvent, GeofenceHandle,
    GeofenceRemoval, GeofenceRemove, GeofenceRemoveController, GeofenceRemoved, GeofenceRequest,
    GeofenceTransition, Lifecycle, Provider, ProviderContext, ValidationError, ValueSink,
};
use locus_tests::*;

fn westminster() -> Location {
    Location::new(51.5007, -0.1246).expect("valid")
}

fn request() -> GeofenceRequest {
    GeofenceRequest::new(vec![
        Geofence::new("parliament", &westminster(), 150.0).expect("valid geofence"),
        Geofence::new("abbey", &Location::new(51.4994, -0.1273).expect("valid"), 80.0)
            .expect("valid geofence"),
    ])
    .expect("valid request")
}

/// Geofencer fed by a shared position feed: registers, then reports an enter
/// transition for every region containing a pushed position.
struct FeedGeofencer {
    sink: Arc<Mutex<Option<ValueSink<GeofenceEvent>>>>,
    lifecycle: Lifecycle,
}

impl Provider<GeofenceAdd> for FeedGeofencer {
    fn id(&self) -> ProviderId {
        ProviderId::MANAGER
    }

    fn start(&self, sink: ValueSink<GeofenceEvent>, params: &GeofenceRequest) {
        if !self.lifecycle.start() {
            return;
        }
        sink.deliver(GeofenceEvent::Registered {
            handle: GeofenceHandle(String::from("feed-1")),
            ids: params.ids(),
        });
        *self.sink.lock().expect("lock") = Some(sink);
    }

    fn stop(&self) {
        if self.lifecycle.stop() {
            self.sink.lock().expect("lock").take();
        }
    }

    fn last_known_value(&self) -> Option<GeofenceEvent> {
        None
    }

    fn release(&self) {
        self.lifecycle.release();
        self.sink.lock().expect("lock").take();
    }
}

fn push_position(
    feed: &Arc<Mutex<Option<ValueSink<GeofenceEvent>>>>,
    request: &GeofenceRequest,
    position: &Location,
) {
    let sink = feed.lock().expect("lock").clone();
    let Some(sink) = sink else {
        return;
    };
    for geofence in request.geofences() {
        if geofence.contains(position) {
            sink.deliver(GeofenceEvent::Transition {
                geofence_id: geofence.id.clone(),
                transition: GeofenceTransition::Enter,
                location: position.clone(),
            });
        }
    }
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn registration_falls_back_and_streams_transitions() {
    // Given: the fused geofencer is unavailable and the manager is fed positions
    let log = CallLog::new();
    let feed = Arc::new(Mutex::new(None));
    let factory_feed = Arc::clone(&feed);
    let controller = GeofenceAddController::builder(request())
        .with_factory(ScriptedFactory::<GeofenceAdd>::new(
            ProviderId::FUSED,
            Script::Fail,
            log.clone(),
        ))
        .with_factory(
            move |_context: &ProviderContext, _failures: FailureSink| -> Arc<dyn Provider<GeofenceAdd>> {
                Arc::new(FeedGeofencer {
                    sink: Arc::clone(&factory_feed),
                    lifecycle: Lifecycle::new(),
                })
            },
        )
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    // When: registration runs and a position inside the parliament fence arrives
    start_recording(&controller, &recorder);
    push_position(&feed, &request(), &westminster());

    // Then: the caller sees the registration, then the transition
    let events = recorder.values();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        GeofenceEvent::Registered { ids, .. } if ids == &vec![String::from("parliament"), String::from("abbey")]
    ));
    assert!(matches!(
        &events[1],
        GeofenceEvent::Transition { geofence_id, transition: GeofenceTransition::Enter, .. }
            if geofence_id == "parliament"
    ));
    assert_eq!(controller.phase(), ControllerPhase::Running);

    // When: the caller stops monitoring
    controller.stop();
    push_position(&feed, &request(), &westminster());

    // Then: no further transitions arrive
    assert_eq!(recorder.values().len(), 2);
}

#[test]
fn registration_failure_everywhere_is_reported_once() {
    let log = CallLog::new();
    let controller = GeofenceAddController::builder(request())
        .with_factory(ScriptedFactory::<GeofenceAdd>::new(
            ProviderId::FUSED,
            Script::Fail,
            log.clone(),
        ))
        .with_factory(ScriptedFactory::<GeofenceAdd>::new(
            ProviderId::MANAGER,
            Script::Fail,
            log.clone(),
        ))
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    start_recording(&controller, &recorder);

    assert_eq!(recorder.exhausted(), 1);
    assert!(recorder.values().is_empty());
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn removal_by_handle_completes_with_one_result() {
    let handle = GeofenceHandle(String::from("feed-1"));
    let removal = GeofenceRemoval::by_handle(handle.clone());
    let log = CallLog::new();
    let controller = GeofenceRemoveController::builder(removal.clone())
        .with_factory(ScriptedFactory::<GeofenceRemove>::new(
            ProviderId::FUSED,
            Script::Fail,
            log.clone(),
        ))
        .with_factory(ScriptedFactory::<GeofenceRemove>::new(
            ProviderId::MANAGER,
            Script::Succeed(vec![GeofenceRemoved {
                removal: removal.clone(),
            }]),
            log.clone(),
        ))
        .build()
        .expect("controller");

    let removed = controller.first_value().await.expect("manager removes");

    assert_eq!(removed.removal, GeofenceRemoval::Handle(handle));
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
}

#[test]
fn removal_without_ids_fails_fast() {
    let none: Vec<String> = Vec::new();
    assert_eq!(
        GeofenceRemoval::by_ids(none),
        Err(ValidationError::EmptyGeofenceIds)
    );
    assert_eq!(
        GeofenceRemoval::by_ids(["home", " "]),
        Err(ValidationError::EmptyGeofenceId)
    );
}

#[test]
fn duplicate_geofence_ids_are_rejected() {
    let fence = Geofence::new("home", &westminster(), 50.0).expect("valid geofence");
    assert_eq!(
        GeofenceRequest::new(vec![fence.clone(), fence]),
        Err(ValidationError::DuplicateGeofenceId {
            id: String::from("home"),
        })
    );
}
