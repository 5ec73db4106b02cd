use locus_core::{OperationKind, ProviderId};
use serde::Serialize;

use crate::error::CliError;
use crate::simulate::Behaviour;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ProviderEntry {
    id: ProviderId,
    operations: Vec<OperationKind>,
    default_behaviour: &'static str,
}

#[derive(Debug, Serialize)]
struct BehaviourEntry {
    name: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct ProvidersResponseData {
    providers: Vec<ProviderEntry>,
    behaviours: Vec<BehaviourEntry>,
    spec_format: &'static str,
}

pub fn run() -> Result<CommandResult, CliError> {
    let providers = ProviderId::BUILTIN
        .into_iter()
        .map(|id| {
            let (operations, default_behaviour) = if id == ProviderId::GAZETTEER {
                (
                    vec![OperationKind::Geocoding, OperationKind::ReverseGeocoding],
                    "offline place-table lookup",
                )
            } else if id == ProviderId::LAST_KNOWN {
                (vec![OperationKind::Location], "answers from the last-known store")
            } else {
                (
                    vec![
                        OperationKind::Location,
                        OperationKind::Geocoding,
                        OperationKind::ReverseGeocoding,
                    ],
                    "simulated success",
                )
            };
            ProviderEntry {
                id,
                operations,
                default_behaviour,
            }
        })
        .collect();

    let behaviours = Behaviour::ALL
        .into_iter()
        .map(|behaviour| BehaviourEntry {
            name: behaviour.as_str(),
            description: behaviour.describe(),
        })
        .collect();

    let data = serde_json::to_value(ProvidersResponseData {
        providers,
        behaviours,
        spec_format: "<id>[:<behaviour>[@<delay-ms>]]",
    })?;

    Ok(CommandResult::ok("providers", data, Vec::new()))
}
