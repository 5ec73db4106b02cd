use std::sync::Arc;
use std::time::Duration;

use locus_core::{
    CallLog, Gazetteer, Geocoding, GeocodingBatch, GeocodingController, GeocodingQuery,
    LocusConfig, ProviderFactory, ProviderId, ScriptedFactory,
};

use crate::cli::GeocodeArgs;
use crate::error::CliError;
use crate::simulate::{resolve_chain, Behaviour, ProviderSpec};

use super::{drive, load_gazetteer, CommandResult};

pub async fn run(args: &GeocodeArgs, config: &LocusConfig) -> Result<CommandResult, CliError> {
    let query = GeocodingQuery::new(
        args.query.as_str(),
        args.max_results.unwrap_or(config.max_results),
    )?;
    let gazetteer = load_gazetteer(args.gazetteer.as_deref())?;

    let log = CallLog::new();
    let factories = resolve_chain(&args.chain.providers, &config.providers)?
        .iter()
        .map(|spec| factory_for(spec, &gazetteer, &query, &log))
        .collect::<Vec<_>>();

    let controller = GeocodingController::builder(query.clone())
        .with_factories(factories)
        .with_optional_timeout(config.timeout())
        .build()?;

    let wait = Duration::from_millis(args.chain.wait_ms);
    let outcome = drive(&controller, 1, wait).await;

    let data = match outcome.values.first() {
        Some(batch) => serde_json::to_value(batch)?,
        None => serde_json::Value::Null,
    };

    Ok(CommandResult::from_outcome("geocoding", data, &outcome, wait))
}

fn factory_for(
    spec: &ProviderSpec,
    gazetteer: &Gazetteer,
    query: &GeocodingQuery,
    log: &CallLog,
) -> Arc<dyn ProviderFactory<Geocoding>> {
    if spec.id == ProviderId::GAZETTEER && spec.behaviour == Behaviour::Default {
        return Arc::new(gazetteer.clone());
    }

    let results = gazetteer
        .search(&query.name, query.max_results)
        .into_iter()
        .filter_map(|place| place.location().ok())
        .map(|location| location.with_provider(spec.id.clone()))
        .collect();
    let batch = GeocodingBatch {
        query: query.name.clone(),
        results,
    };
    Arc::new(ScriptedFactory::<Geocoding>::new(
        spec.id.clone(),
        spec.script(vec![batch]),
        log.clone(),
    ))
}
