mod geocode;
mod locate;
mod providers;
mod reverse;

use std::time::{Duration, Instant};

use locus_core::{
    Envelope, EnvelopeError, EnvelopeMeta, FallbackController, FallbackEvent, Gazetteer,
    LocusConfig, Operation, ProviderId,
};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub operation: &'static str,
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub source_chain: Vec<ProviderId>,
    pub winner: Option<ProviderId>,
}

impl CommandResult {
    pub fn ok(operation: &'static str, data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            operation,
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            source_chain,
            winner: None,
        }
    }

    /// Chain, winner, warnings, errors and latency taken from a driven controller.
    pub fn from_outcome<V>(
        operation: &'static str,
        data: Value,
        outcome: &Outcome<V>,
        wait: Duration,
    ) -> Self {
        Self {
            operation,
            data,
            warnings: outcome.warnings(wait),
            errors: outcome.errors(),
            latency_ms: outcome.latency_ms,
            source_chain: outcome.attempts.clone(),
            winner: outcome.winner.clone(),
        }
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let config = load_config(cli)?;

    let command_result = match &cli.command {
        Command::Locate(args) => locate::run(args, &config).await?,
        Command::Geocode(args) => geocode::run(args, &config).await?,
        Command::Reverse(args) => reverse::run(args, &config).await?,
        Command::Providers => providers::run()?,
    };

    let CommandResult {
        operation,
        data,
        warnings,
        errors,
        latency_ms,
        source_chain,
        winner,
    } = command_result;

    let mut meta = EnvelopeMeta::new(Uuid::new_v4().to_string(), operation)
        .with_chain(source_chain, winner)
        .with_latency(latency_ms);
    for warning in warnings {
        meta.push_warning(warning);
    }

    Ok(Envelope::new(meta, data, errors))
}

/// Defaults, then `--config`, then `LOCUS_*`, then global flags.
fn load_config(cli: &Cli) -> Result<LocusConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => LocusConfig::from_file(path)?,
        None => LocusConfig::default(),
    };
    config.apply_env()?;

    if let Some(accuracy) = cli.accuracy {
        config.accuracy = accuracy;
    }
    if cli.no_timeout {
        config.timeout_ms = None;
    } else if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = Some(timeout_ms);
    }

    config.validate()?;
    debug!(?config, "configuration resolved");
    Ok(config)
}

fn load_gazetteer(path: Option<&std::path::Path>) -> Result<Gazetteer, CliError> {
    match path {
        Some(path) => Ok(Gazetteer::from_file(path)?),
        None => Ok(Gazetteer::builtin()),
    }
}

/// What a controller produced before the command stopped waiting.
pub struct Outcome<V> {
    pub values: Vec<V>,
    pub exhausted: bool,
    pub gave_up: bool,
    pub winner: Option<ProviderId>,
    pub attempts: Vec<ProviderId>,
    pub latency_ms: u64,
}

impl<V> Outcome<V> {
    /// One warning per abandoned provider, plus one if the wait ran out.
    pub fn warnings(&self, wait: Duration) -> Vec<String> {
        // Promotion is sequential: every attempt but the last was abandoned.
        let abandoned = if self.exhausted {
            self.attempts.len()
        } else {
            self.attempts.len().saturating_sub(1)
        };
        let mut warnings: Vec<String> = self
            .attempts
            .iter()
            .take(abandoned)
            .map(|id| format!("provider '{id}' failed or timed out"))
            .collect();
        if self.gave_up {
            warnings.push(format!(
                "stopped waiting after {} ms with {} value(s)",
                wait.as_millis(),
                self.values.len()
            ));
        }
        warnings
    }

    pub fn errors(&self) -> Vec<EnvelopeError> {
        if self.exhausted {
            vec![EnvelopeError::all_providers_failed(&self.attempts)]
        } else {
            Vec::new()
        }
    }
}

/// Starts `controller`, collects up to `want` values, then releases it.
pub async fn drive<Op: Operation>(
    controller: &FallbackController<Op>,
    want: usize,
    wait: Duration,
) -> Outcome<Op::Value> {
    let started = Instant::now();
    let mut events = controller.start_channel();
    let mut values = Vec::new();
    let mut exhausted = false;
    let mut gave_up = false;

    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    while values.len() < want {
        tokio::select! {
            event = events.recv() => match event {
                Some(FallbackEvent::Value(value)) => values.push(value),
                Some(FallbackEvent::Exhausted) => {
                    exhausted = true;
                    break;
                }
                None => break,
            },
            _ = &mut deadline => {
                warn!(operation = Op::KIND.as_str(), wait_ms = wait.as_millis() as u64, "gave up waiting");
                gave_up = true;
                break;
            }
        }
    }

    let winner = if values.is_empty() {
        None
    } else {
        controller
            .current_provider()
            .map(|active| active.id().clone())
    };
    let attempts = controller.attempts();
    controller.release();

    Outcome {
        values,
        exhausted,
        gave_up,
        winner,
        attempts,
        latency_ms: started.elapsed().as_millis() as u64,
    }
}
