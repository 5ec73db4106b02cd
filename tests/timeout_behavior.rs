//! Behaviour tests for per-provider timeouts, on a virtual clock and on a
//! paused tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use locus_core::{FallbackError, LocationController, ValidationError};
use locus_tests::*;

const TIMEOUT: Duration = Duration::from_millis(1_000);

fn controller_on(
    scheduler: &ManualScheduler,
    factories: Vec<ScriptedFactory<LocationUpdates>>,
) -> FallbackController<LocationUpdates> {
    factories
        .into_iter()
        .fold(
            LocationController::builder(LocationParams::navigation())
                .with_scheduler(Arc::new(scheduler.clone()))
                .with_timeout(TIMEOUT),
            |builder, factory| builder.with_factory(factory),
        )
        .build()
        .expect("controller")
}

// =============================================================================
// Deadline Expiry
// =============================================================================

#[test]
fn silent_provider_is_released_at_the_deadline() {
    // Given: a single provider that never calls back
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = controller_on(
        &scheduler,
        vec![scripted(ProviderId::FUSED, Script::Silent, &log)],
    );
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    // When: the clock stops just short of the deadline
    scheduler.advance(Duration::from_millis(999));

    // Then: nothing has happened yet
    assert_eq!(log.count(&ProviderId::FUSED, Call::Released), 0);
    assert_eq!(recorder.exhausted(), 0);

    // When: the deadline passes
    scheduler.advance(Duration::from_millis(1));

    // Then: the provider is released and the chain is exhausted
    assert_eq!(log.count(&ProviderId::FUSED, Call::Released), 1);
    assert_eq!(recorder.exhausted(), 1);
    assert!(controller.current_provider().is_none());
}

#[test]
fn timeout_promotes_the_next_provider_and_drops_late_values() {
    // Given: fused answers only after the deadline and keeps its timer alive
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = controller_on(
        &scheduler,
        vec![
            scripted(
                ProviderId::FUSED,
                Script::SucceedAfter(Duration::from_millis(1_500), vec![fix(ProviderId::FUSED, 1.0)]),
                &log,
            )
            .misbehaving(),
            scripted(
                ProviderId::MANAGER,
                Script::SucceedAfter(Duration::from_millis(100), vec![fix(ProviderId::MANAGER, 2.0)]),
                &log,
            ),
        ],
    );
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    // When: fused times out and manager answers
    scheduler.advance(TIMEOUT);
    assert_eq!(log.created(), vec![ProviderId::FUSED, ProviderId::MANAGER]);
    assert_eq!(log.count(&ProviderId::FUSED, Call::Released), 1);
    scheduler.advance(Duration::from_millis(100));

    // And: fused's late value fires afterwards
    scheduler.advance(Duration::from_millis(400));

    // Then: only manager's value reached the caller
    assert_eq!(recorder.values(), vec![fix(ProviderId::MANAGER, 2.0)]);
    assert_eq!(recorder.exhausted(), 0);
}

#[test]
fn each_promoted_provider_gets_a_fresh_deadline() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = controller_on(
        &scheduler,
        vec![
            scripted(ProviderId::FUSED, Script::Silent, &log),
            scripted(ProviderId::MANAGER, Script::Silent, &log),
        ],
    );
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    scheduler.advance(TIMEOUT);
    scheduler.advance(Duration::from_millis(999));
    assert_eq!(
        controller.current_provider().map(|active| active.id().clone()),
        Some(ProviderId::MANAGER)
    );
    assert_eq!(recorder.exhausted(), 0);

    scheduler.advance(Duration::from_millis(1));
    assert_eq!(recorder.exhausted(), 1);
    assert_eq!(controller.attempts(), vec![ProviderId::FUSED, ProviderId::MANAGER]);
}

// =============================================================================
// Deadline Cancellation
// =============================================================================

#[test]
fn value_before_the_deadline_disarms_the_timeout() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = controller_on(
        &scheduler,
        vec![
            scripted(
                ProviderId::FUSED,
                Script::SucceedAfter(Duration::from_millis(200), vec![fix(ProviderId::FUSED, 1.0)]),
                &log,
            ),
            scripted(ProviderId::MANAGER, Script::Silent, &log),
        ],
    );
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    scheduler.advance(Duration::from_millis(200));
    assert_eq!(scheduler.pending(), 0);

    scheduler.advance(Duration::from_secs(60));
    assert_eq!(log.created(), vec![ProviderId::FUSED]);
    assert_eq!(recorder.values().len(), 1);
    assert_eq!(controller.phase(), ControllerPhase::Running);
}

#[test]
fn stop_and_release_cancel_the_pending_deadline() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = controller_on(
        &scheduler,
        vec![
            scripted(ProviderId::FUSED, Script::Silent, &log),
            scripted(ProviderId::MANAGER, Script::Silent, &log),
        ],
    );
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);
    assert_eq!(scheduler.pending(), 1);

    controller.stop();
    assert_eq!(scheduler.pending(), 0);

    scheduler.advance(TIMEOUT * 3);
    controller.release();
    assert_eq!(log.created(), vec![ProviderId::FUSED]);
    assert_eq!(recorder.exhausted(), 0);
}

#[test]
fn controllers_without_a_timeout_wait_indefinitely() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let controller = LocationController::builder(LocationParams::navigation())
        .with_scheduler(Arc::new(scheduler.clone()))
        .with_factory(scripted(ProviderId::FUSED, Script::Silent, &log))
        .build()
        .expect("controller");
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    assert_eq!(scheduler.pending(), 0);
    scheduler.advance(Duration::from_secs(3_600));

    assert_eq!(controller.phase(), ControllerPhase::Running);
    assert_eq!(recorder.exhausted(), 0);
}

// =============================================================================
// Builder Validation
// =============================================================================

#[test]
fn zero_timeout_is_rejected() {
    let result = LocationController::builder(LocationParams::navigation())
        .with_scheduler(Arc::new(ManualScheduler::new()))
        .with_timeout(Duration::ZERO)
        .build();
    assert!(matches!(result, Err(ValidationError::ZeroTimeout)));
}

#[test]
fn timeout_without_any_scheduler_is_rejected() {
    // Plain #[test]: no tokio runtime to fall back on.
    let result = LocationController::builder(LocationParams::navigation())
        .with_timeout(TIMEOUT)
        .build();
    assert!(matches!(result, Err(ValidationError::MissingScheduler)));
}

// =============================================================================
// Tokio Runtime
// =============================================================================

#[tokio::test(start_paused = true)]
async fn first_value_survives_a_hanging_provider() {
    let log = CallLog::new();
    let controller = LocationController::builder(LocationParams::navigation())
        .with_timeout(TIMEOUT)
        .with_factory(scripted(ProviderId::VENDOR, Script::Silent, &log))
        .with_factory(scripted(
            ProviderId::MANAGER,
            Script::SucceedAfter(Duration::from_millis(50), vec![fix(ProviderId::MANAGER, 3.0)]),
            &log,
        ))
        .build()
        .expect("runtime scheduler is captured");

    let location = controller.first_value().await.expect("manager answers");

    assert_eq!(location, fix(ProviderId::MANAGER, 3.0));
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
    assert_eq!(log.count(&ProviderId::VENDOR, Call::Released), 1);
}

#[tokio::test(start_paused = true)]
async fn first_value_reports_the_attempted_chain_on_exhaustion() {
    let log = CallLog::new();
    let controller = LocationController::builder(LocationParams::navigation())
        .with_timeout(TIMEOUT)
        .with_factory(scripted(ProviderId::FUSED, Script::Silent, &log))
        .with_factory(scripted(
            ProviderId::MANAGER,
            Script::FailAfter(Duration::from_millis(10)),
            &log,
        ))
        .build()
        .expect("controller");

    let error = controller.first_value().await.expect_err("every provider fails");

    assert_eq!(
        error,
        FallbackError::AllProvidersFailed {
            attempted: vec![ProviderId::FUSED, ProviderId::MANAGER],
        }
    );
    assert!(controller.first_value().await == Err(FallbackError::AlreadyStarted));
}
