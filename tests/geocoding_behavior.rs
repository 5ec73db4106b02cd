//! Behaviour tests for forward and reverse geocoding chains.

use locus_core::{
    AddressBatch, Gazetteer, Geocoding, GeocodingBatch, GeocodingController, GeocodingQuery,
    Place, ProviderRegistry, ReverseGeocoding, ReverseGeocodingController, ReverseGeocodingQuery,
};
use locus_tests::*;

fn query(name: &str) -> GeocodingQuery {
    GeocodingQuery::new(name, 3).expect("valid query")
}

fn vendor_batch(name: &str) -> GeocodingBatch {
    GeocodingBatch {
        query: name.to_owned(),
        results: vec![fix(ProviderId::VENDOR, 40.0)],
    }
}

// =============================================================================
// Forward Geocoding
// =============================================================================

#[test]
fn gazetteer_answers_when_the_vendor_geocoder_fails() {
    // Given: a vendor geocoder that fails, then the offline gazetteer
    let log = CallLog::new();
    let controller = GeocodingController::builder(query("Lisbon"))
        .with_factory(ScriptedFactory::<Geocoding>::new(
            ProviderId::VENDOR,
            Script::Fail,
            log.clone(),
        ))
        .with_factory(Gazetteer::builtin())
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    // When: the lookup runs
    start_recording(&controller, &recorder);

    // Then: exactly one batch arrives, resolved by the gazetteer
    let batches = recorder.values();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].query, "Lisbon");
    let lisbon = &batches[0].results[0];
    assert!((lisbon.latitude - 38.7223).abs() < 1e-6);
    assert_eq!(lisbon.provider, Some(ProviderId::GAZETTEER));
    // And: the chain records both attempts, and one-shot delivery completed it
    assert_eq!(
        controller.attempts(),
        vec![ProviderId::VENDOR, ProviderId::GAZETTEER]
    );
    assert_eq!(controller.phase(), ControllerPhase::Completed);
}

#[test]
fn no_matches_is_a_successful_empty_batch() {
    let log = CallLog::new();
    let controller = GeocodingController::builder(query("Atlantis"))
        .with_factory(Gazetteer::builtin())
        .with_factory(ScriptedFactory::<Geocoding>::new(
            ProviderId::VENDOR,
            Script::Succeed(vec![vendor_batch("Atlantis")]),
            log.clone(),
        ))
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    start_recording(&controller, &recorder);

    assert_eq!(recorder.exhausted(), 0);
    assert_eq!(recorder.values().len(), 1);
    assert!(recorder.values()[0].results.is_empty());
    assert!(log.created().is_empty(), "vendor is never consulted");
}

#[test]
fn empty_place_table_fails_over_to_the_next_geocoder() {
    let log = CallLog::new();
    let controller = GeocodingController::builder(query("Porto"))
        .with_factory(Gazetteer::new(Vec::new()))
        .with_factory(ScriptedFactory::<Geocoding>::new(
            ProviderId::VENDOR,
            Script::Succeed(vec![vendor_batch("Porto")]),
            log.clone(),
        ))
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    start_recording(&controller, &recorder);

    assert_eq!(recorder.values(), vec![vendor_batch("Porto")]);
}

#[test]
fn one_shot_geocoding_ignores_extra_batches() {
    let log = CallLog::new();
    let controller = GeocodingController::builder(query("Paris"))
        .with_factory(ScriptedFactory::<Geocoding>::new(
            ProviderId::VENDOR,
            Script::Succeed(vec![vendor_batch("first"), vendor_batch("second")]),
            log.clone(),
        ))
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    start_recording(&controller, &recorder);

    assert_eq!(recorder.values(), vec![vendor_batch("first")]);
    assert_eq!(log.count(&ProviderId::VENDOR, Call::Stopped), 1);
}

#[test]
fn custom_place_table_is_searched() {
    let places = vec![Place {
        name: String::from("Springfield"),
        admin_area: Some(String::from("Illinois")),
        country_code: String::from("US"),
        latitude: 39.7817,
        longitude: -89.6501,
    }];
    let controller = GeocodingController::builder(query("spring"))
        .with_factory(Gazetteer::new(places))
        .build()
        .expect("controller");
    let recorder = Recorder::new();

    start_recording(&controller, &recorder);

    assert_eq!(recorder.values()[0].results.len(), 1);
}

// =============================================================================
// Reverse Geocoding
// =============================================================================

#[tokio::test]
async fn reverse_lookup_resolves_the_nearest_city() {
    let louvre = Location::new(48.8606, 2.3376).expect("valid");
    let log = CallLog::new();
    let controller = ReverseGeocodingController::builder(
        ReverseGeocodingQuery::new(louvre.clone(), 2).expect("valid query"),
    )
    .with_factory(ScriptedFactory::<ReverseGeocoding>::new(
        ProviderId::FUSED,
        Script::Fail,
        log.clone(),
    ))
    .with_factory(Gazetteer::builtin())
    .build()
    .expect("controller");

    let batch: AddressBatch = controller.first_value().await.expect("gazetteer answers");

    assert_eq!(batch.location, louvre);
    assert_eq!(batch.addresses.len(), 1);
    assert_eq!(batch.addresses[0].locality.as_deref(), Some("Paris"));
    assert_eq!(batch.addresses[0].country_code.as_deref(), Some("FR"));
}

#[tokio::test]
async fn reverse_lookup_in_open_ocean_returns_no_addresses() {
    let mid_atlantic = Location::new(30.0, -40.0).expect("valid");
    let controller = ReverseGeocodingController::builder(
        ReverseGeocodingQuery::new(mid_atlantic, 5).expect("valid query"),
    )
    .with_factory(Gazetteer::builtin())
    .build()
    .expect("controller");

    let batch = controller.first_value().await.expect("empty batch is a success");

    assert!(batch.addresses.is_empty());
}

// =============================================================================
// Registry-Built Chains
// =============================================================================

#[test]
fn registry_builds_the_configured_priority_chain() {
    let log = CallLog::new();
    let registry = ProviderRegistry::<Geocoding>::new()
        .with(ProviderId::GAZETTEER, Gazetteer::builtin())
        .with(
            ProviderId::VENDOR,
            ScriptedFactory::<Geocoding>::new(ProviderId::VENDOR, Script::Fail, log.clone()),
        );

    // Duplicates keep their first position; unregistered ids are skipped.
    let chain = registry.chain(&[
        ProviderId::VENDOR,
        ProviderId::FUSED,
        ProviderId::GAZETTEER,
        ProviderId::VENDOR,
    ]);
    assert_eq!(chain.len(), 2);

    let controller = GeocodingController::builder(query("Tokyo"))
        .with_factories(chain)
        .build()
        .expect("controller");
    let recorder = Recorder::new();
    start_recording(&controller, &recorder);

    assert_eq!(
        controller.attempts(),
        vec![ProviderId::VENDOR, ProviderId::GAZETTEER]
    );
    assert_eq!(recorder.values()[0].results.len(), 1);
}
