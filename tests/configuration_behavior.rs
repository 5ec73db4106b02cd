//! Behaviour tests for configuring controllers from files, environment
//! overrides and a persisted last-known store.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use locus_core::{
    CoreError, LastKnownFactory, LastKnownStore, LocationAccuracy, LocationController, LocusConfig,
    MemoryStore, ProviderRegistry, RunMode, ValidationError,
};
use locus_tests::*;
use tempfile::{tempdir, NamedTempFile};

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

// =============================================================================
// Layered Configuration
// =============================================================================

#[test]
fn file_then_environment_shape_the_controller() {
    // Given: a file asking for high accuracy single fixes from the manager first
    let file = config_file(
        r#"{"accuracy": "high", "run_once": true, "timeout_ms": 2500, "providers": ["manager", "fused"]}"#,
    );
    let mut config = LocusConfig::from_file(file.path()).expect("valid config");

    // And: an environment override that disables the timeout
    let vars: HashMap<String, String> =
        HashMap::from([(String::from("LOCUS_TIMEOUT_MS"), String::from("none"))]);
    config.apply_vars(&vars).expect("valid overrides");

    // When: a controller is assembled from a registry and the configured order
    let log = CallLog::new();
    let registry = ProviderRegistry::<LocationUpdates>::new()
        .with(
            ProviderId::FUSED,
            scripted(ProviderId::FUSED, Script::Succeed(vec![fix(ProviderId::FUSED, 1.0)]), &log),
        )
        .with(
            ProviderId::MANAGER,
            scripted(ProviderId::MANAGER, Script::Fail, &log),
        );
    let params = config.location_params().expect("valid params");
    let controller = LocationController::builder(params)
        .with_factories(registry.chain(&config.providers))
        .with_optional_timeout(config.timeout())
        .build()
        .expect("no scheduler needed without a timeout");
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    // Then: the configured order and mode were honoured
    assert_eq!(controller.params().accuracy, LocationAccuracy::High);
    assert_eq!(controller.params().mode, RunMode::Once);
    assert_eq!(controller.timeout(), None);
    assert_eq!(log.created(), vec![ProviderId::MANAGER, ProviderId::FUSED]);
    assert_eq!(recorder.values(), vec![fix(ProviderId::FUSED, 1.0)]);
    assert_eq!(controller.phase(), ControllerPhase::Completed);
}

#[test]
fn configured_timeout_needs_a_scheduler_outside_a_runtime() {
    let config = LocusConfig::default();
    assert_eq!(config.timeout(), Some(Duration::from_millis(10_000)));

    let result = LocationController::builder(config.location_params().expect("params"))
        .with_optional_timeout(config.timeout())
        .build();
    assert!(matches!(result, Err(ValidationError::MissingScheduler)));

    let controller = LocationController::builder(config.location_params().expect("params"))
        .with_optional_timeout(config.timeout())
        .with_scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .expect("explicit scheduler");
    assert_eq!(controller.timeout(), Some(Duration::from_millis(10_000)));
}

#[test]
fn invalid_configuration_is_rejected_with_context() {
    let unknown_key = config_file(r#"{"providers": ["fused"], "retries": 3}"#);
    assert!(matches!(
        LocusConfig::from_file(unknown_key.path()),
        Err(CoreError::Serialization(_))
    ));

    let empty_chain = config_file(r#"{"providers": []}"#);
    assert!(matches!(
        LocusConfig::from_file(empty_chain.path()),
        Err(CoreError::Validation(ValidationError::EmptyProviderList))
    ));

    let mut config = LocusConfig::default();
    let vars = HashMap::from([(String::from("LOCUS_ACCURACY"), String::from("extreme"))]);
    assert!(matches!(
        config.apply_vars(&vars),
        Err(ValidationError::InvalidAccuracy { .. })
    ));
}

// =============================================================================
// Persisted Last-Known Store
// =============================================================================

#[test]
fn fix_saved_in_one_session_answers_the_next() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("last-known.json");

    // Given: a first session that got a fix from fused and saved it
    {
        let store = MemoryStore::load(&path).expect("missing file is an empty store");
        assert!(store.is_empty());
        store
            .put_as(ProviderId::LAST_KNOWN, &fix(ProviderId::FUSED, 35.0))
            .expect("store fix");
        store.save(&path).expect("save store");
    }

    // When: the next session has no live provider that works
    let store = MemoryStore::load(&path).expect("load store");
    let log = CallLog::new();
    let controller = LocationController::builder(LocationParams::navigation().once())
        .with_store(Arc::new(store) as Arc<dyn LastKnownStore>)
        .with_factory(scripted(ProviderId::FUSED, Script::Fail, &log))
        .with_factory(LastKnownFactory::new(ProviderId::LAST_KNOWN))
        .build()
        .expect("controller");
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    // Then: the saved fix is served
    let values = recorder.values();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].latitude, 35.0);
    assert_eq!(controller.attempts(), vec![ProviderId::FUSED, ProviderId::LAST_KNOWN]);
}
