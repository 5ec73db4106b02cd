//! CLI argument definitions for locus.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `locate` | Run a location controller over simulated providers |
//! | `geocode` | Resolve a place name through the geocoding fallback chain |
//! | `reverse` | Resolve a coordinate pair to addresses |
//! | `providers` | List built-in provider ids and script behaviours |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON configuration file |
//! | `--timeout-ms` | `10000` | Per-provider timeout |
//! | `--no-timeout` | `false` | Disable the per-provider timeout |
//! | `--accuracy` | `medium` | Accuracy tier |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `-v` / `-q` | | Log verbosity on stderr |
//!
//! # Examples
//!
//! ```bash
//! # Fused client fails, OS manager answers after 200 ms
//! locus locate --provider fused:fail --provider manager:succeed@200 --once
//!
//! # Vendor SDK hangs; the timeout promotes the gazetteer
//! locus geocode Lisbon --provider vendor:silent --provider gazetteer --timeout-ms 500
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use locus_core::LocationAccuracy;

/// Location provider fallback harness.
#[derive(Debug, Parser)]
#[command(
    name = "locus",
    author,
    version,
    about = "Location provider fallback harness",
    long_about = "Drives locus fallback controllers over scripted and offline providers and \
prints a JSON envelope with the result and the provider chain that produced it.\n\
\n\
Use 'locus <command> --help' for command-specific help."
)]
pub struct Cli {
    /// JSON configuration file; `LOCUS_*` environment variables override it.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-provider timeout in milliseconds.
    #[arg(long, global = true, value_name = "MS", conflicts_with = "no_timeout")]
    pub timeout_ms: Option<u64>,

    /// Wait on each provider indefinitely.
    #[arg(long, global = true)]
    pub no_timeout: bool,

    /// Accuracy tier: lowest, low, medium or high.
    #[arg(long, global = true, value_parser = parse_accuracy)]
    pub accuracy: Option<LocationAccuracy>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire location fixes through the fallback chain.
    Locate(LocateArgs),
    /// Forward geocode a place name.
    Geocode(GeocodeArgs),
    /// Reverse geocode a coordinate pair.
    Reverse(ReverseArgs),
    /// List built-in provider ids and behaviours.
    Providers,
}

/// Provider chain shared by every controller-driving command.
#[derive(Debug, Args)]
pub struct ChainArgs {
    /// Provider in priority order, as `<id>[:<behaviour>[@<delay-ms>]]`.
    /// Repeat for each provider; defaults to the configured priority list.
    #[arg(long = "provider", value_name = "SPEC")]
    pub providers: Vec<String>,

    /// Give up waiting after this many milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    pub wait_ms: u64,
}

#[derive(Debug, Args)]
pub struct LocateArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Position reported by simulated providers, as `<lat>,<lon>`.
    #[arg(long, value_name = "LAT,LON", default_value = "51.5074,-0.1278", allow_hyphen_values = true)]
    pub at: String,

    /// Request a single fix.
    #[arg(long)]
    pub once: bool,

    /// Number of fixes to collect in streaming mode.
    #[arg(long, default_value_t = 3)]
    pub fixes: usize,

    /// Last-known store file, read by `last-known` and updated with the final fix.
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GeocodeArgs {
    /// Place name to resolve.
    pub query: String,

    #[arg(long)]
    pub max_results: Option<usize>,

    /// JSON place table replacing the built-in gazetteer.
    #[arg(long, value_name = "PATH")]
    pub gazetteer: Option<PathBuf>,

    #[command(flatten)]
    pub chain: ChainArgs,
}

#[derive(Debug, Args)]
pub struct ReverseArgs {
    #[arg(allow_negative_numbers = true)]
    pub latitude: f64,

    #[arg(allow_negative_numbers = true)]
    pub longitude: f64,

    #[arg(long)]
    pub max_results: Option<usize>,

    /// JSON place table replacing the built-in gazetteer.
    #[arg(long, value_name = "PATH")]
    pub gazetteer: Option<PathBuf>,

    #[command(flatten)]
    pub chain: ChainArgs,
}

fn parse_accuracy(value: &str) -> Result<LocationAccuracy, locus_core::ValidationError> {
    value.parse()
}
