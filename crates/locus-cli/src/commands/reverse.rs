use std::sync::Arc;
use std::time::Duration;

use locus_core::{
    AddressBatch, CallLog, Gazetteer, Location, LocusConfig, ProviderFactory, ProviderId,
    ReverseGeocoding, ReverseGeocodingController, ReverseGeocodingQuery, ScriptedFactory,
};

use crate::cli::ReverseArgs;
use crate::error::CliError;
use crate::simulate::{resolve_chain, Behaviour, ProviderSpec};

use super::{drive, load_gazetteer, CommandResult};

pub async fn run(args: &ReverseArgs, config: &LocusConfig) -> Result<CommandResult, CliError> {
    let location = Location::new(args.latitude, args.longitude)?;
    let query = ReverseGeocodingQuery::new(location, args.max_results.unwrap_or(config.max_results))?;
    let gazetteer = load_gazetteer(args.gazetteer.as_deref())?;

    let log = CallLog::new();
    let factories = resolve_chain(&args.chain.providers, &config.providers)?
        .iter()
        .map(|spec| factory_for(spec, &gazetteer, &query, &log))
        .collect::<Vec<_>>();

    let controller = ReverseGeocodingController::builder(query)
        .with_factories(factories)
        .with_optional_timeout(config.timeout())
        .build()?;

    let wait = Duration::from_millis(args.chain.wait_ms);
    let outcome = drive(&controller, 1, wait).await;

    let data = match outcome.values.first() {
        Some(batch) => serde_json::to_value(batch)?,
        None => serde_json::Value::Null,
    };

    Ok(CommandResult::from_outcome("reverse_geocoding", data, &outcome, wait))
}

fn factory_for(
    spec: &ProviderSpec,
    gazetteer: &Gazetteer,
    query: &ReverseGeocodingQuery,
    log: &CallLog,
) -> Arc<dyn ProviderFactory<ReverseGeocoding>> {
    if spec.id == ProviderId::GAZETTEER && spec.behaviour == Behaviour::Default {
        return Arc::new(gazetteer.clone());
    }

    let addresses = gazetteer
        .nearest(&query.location, query.max_results)
        .into_iter()
        .filter_map(|place| place.address().ok())
        .collect();
    let batch = AddressBatch {
        location: query.location.clone(),
        addresses,
    };
    Arc::new(ScriptedFactory::<ReverseGeocoding>::new(
        spec.id.clone(),
        spec.script(vec![batch]),
        log.clone(),
    ))
}
