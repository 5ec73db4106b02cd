use std::sync::Arc;
use std::time::Duration;

use locus_core::{
    CallLog, LastKnownFactory, Location, LocationController, LocationUpdates, LocusConfig,
    MemoryStore, ProviderFactory, ProviderId, RunMode, ScriptedFactory,
};
use serde::Serialize;

use crate::cli::LocateArgs;
use crate::error::CliError;
use crate::simulate::{resolve_chain, simulated_fixes, Behaviour, ProviderSpec};

use super::{drive, CommandResult};

#[derive(Debug, Serialize)]
struct LocateResponseData {
    mode: RunMode,
    provider: Option<ProviderId>,
    fixes: Vec<Location>,
}

pub async fn run(args: &LocateArgs, config: &LocusConfig) -> Result<CommandResult, CliError> {
    let mut params = config.location_params()?;
    if args.once {
        params = params.once();
    }
    let want = match params.mode {
        RunMode::Once => 1,
        RunMode::Continuous => args.fixes.max(1),
    };

    let origin = Location::parse_pair(&args.at)?;
    let store = match &args.store {
        Some(path) => MemoryStore::load(path)?,
        None => MemoryStore::new(),
    };

    let log = CallLog::new();
    let factories = resolve_chain(&args.chain.providers, &config.providers)?
        .iter()
        .map(|spec| factory_for(spec, &origin, want, config, &log))
        .collect::<Result<Vec<_>, _>>()?;

    let controller = LocationController::builder(params.clone())
        .with_factories(factories)
        .with_optional_timeout(config.timeout())
        .with_store(Arc::new(store.clone()))
        .build()?;

    let wait = Duration::from_millis(args.chain.wait_ms);
    let outcome = drive(&controller, want, wait).await;

    if let (Some(path), Some(fix)) = (&args.store, outcome.values.last()) {
        store.put_as(ProviderId::LAST_KNOWN, fix)?;
        if let Some(winner) = &outcome.winner {
            store.put_as(winner.clone(), fix)?;
        }
        store.save(path)?;
    }

    let data = serde_json::to_value(LocateResponseData {
        mode: params.mode,
        provider: outcome.winner.clone(),
        fixes: outcome.values.clone(),
    })?;

    Ok(CommandResult::from_outcome("location", data, &outcome, wait))
}

fn factory_for(
    spec: &ProviderSpec,
    origin: &Location,
    want: usize,
    config: &LocusConfig,
    log: &CallLog,
) -> Result<Arc<dyn ProviderFactory<LocationUpdates>>, CliError> {
    if spec.id == ProviderId::LAST_KNOWN && spec.behaviour == Behaviour::Default {
        return Ok(Arc::new(LastKnownFactory::new(ProviderId::LAST_KNOWN)));
    }

    let fixes = simulated_fixes(origin, want, &spec.id, config.accuracy)?;
    Ok(Arc::new(ScriptedFactory::<LocationUpdates>::new(
        spec.id.clone(),
        spec.script(fixes),
        log.clone(),
    )))
}
