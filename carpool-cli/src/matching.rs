//! `match` command: rank ride candidates for one opt-in.

use std::io::Write;

use camino::Utf8PathBuf;
use carpool_core::OptInId;
use carpool_matcher::{DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_CONFIDENCE, MatchConfig, MatchOutcome};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineCommand, EngineConfig, EngineOptions, StoreAccess};
use crate::{
    ARG_DATABASE, ARG_DESTINATION_LAT, ARG_DESTINATION_LNG, ARG_MAX_CANDIDATES,
    ARG_MIN_CONFIDENCE, ARG_OPT_IN, ARG_PRIMARY_ROUTING_URL, ARG_ROUTING_TIMEOUT_SECS,
    ARG_SECONDARY_ROUTING_URL, CliError, ENV_MATCH_OPT_IN, write_json,
};

/// CLI arguments for the `match` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Evaluate one pending opt-in against everyone else waiting \
                 on the same commute date and print the ranked candidates as \
                 JSON. Nothing is written to the datastore.",
    about = "Rank ride candidates for one opt-in"
)]
#[ortho_config(prefix = "CARPOOL")]
pub(crate) struct MatchArgs {
    /// Identifier of the pending opt-in to match.
    #[arg(value_name = "opt-in")]
    #[serde(default)]
    pub(crate) opt_in_id: Option<OptInId>,
    /// Path to the SQLite datastore.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Longitude of the shared destination.
    #[arg(long = ARG_DESTINATION_LNG, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) destination_lng: Option<f64>,
    /// Latitude of the shared destination.
    #[arg(long = ARG_DESTINATION_LAT, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) destination_lat: Option<f64>,
    /// OSRM endpoint queried with the trip service first.
    #[arg(long = ARG_PRIMARY_ROUTING_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) primary_routing_url: Option<String>,
    /// OSRM endpoint queried with the route service second.
    #[arg(long = ARG_SECONDARY_ROUTING_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) secondary_routing_url: Option<String>,
    /// Per-request routing timeout in seconds.
    #[arg(long = ARG_ROUTING_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) routing_timeout_secs: Option<u64>,
    /// Candidates scoring below this are dropped (0-100).
    #[arg(long = ARG_MIN_CONFIDENCE, value_name = "score")]
    #[serde(default)]
    pub(crate) min_confidence: Option<u8>,
    /// Maximum number of candidates to print.
    #[arg(long = ARG_MAX_CANDIDATES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_candidates: Option<usize>,
}

impl MatchArgs {
    pub(crate) fn into_config(self) -> Result<MatchCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MatchCommandConfig::try_from(merged)
    }
}

/// Resolved `match` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MatchCommandConfig {
    pub(crate) opt_in_id: OptInId,
    pub(crate) engine: EngineConfig,
    pub(crate) min_confidence: u8,
    pub(crate) max_candidates: usize,
}

impl MatchCommandConfig {
    pub(crate) fn match_config(&self) -> MatchConfig {
        MatchConfig::new(self.engine.destination)
            .with_min_confidence(self.min_confidence)
            .with_max_candidates(self.max_candidates)
    }
}

impl TryFrom<MatchArgs> for MatchCommandConfig {
    type Error = CliError;

    fn try_from(args: MatchArgs) -> Result<Self, Self::Error> {
        let opt_in_id = args.opt_in_id.ok_or(CliError::MissingArgument {
            field: ARG_OPT_IN,
            env: ENV_MATCH_OPT_IN,
        })?;
        let engine = EngineConfig::resolve(
            EngineOptions {
                database: args.database,
                destination_lng: args.destination_lng,
                destination_lat: args.destination_lat,
                primary_routing_url: args.primary_routing_url,
                secondary_routing_url: args.secondary_routing_url,
                routing_timeout_secs: args.routing_timeout_secs,
            },
            EngineCommand::Match,
        )?;
        Ok(Self {
            opt_in_id,
            engine,
            min_confidence: args.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            max_candidates: args.max_candidates.unwrap_or(DEFAULT_MAX_CANDIDATES),
        })
    }
}

pub(crate) fn run_match_with(args: MatchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let outcome = execute_match(&config)?;
    write_json(writer, &outcome)
}

pub(crate) fn execute_match(config: &MatchCommandConfig) -> Result<MatchOutcome, CliError> {
    let matcher = config
        .engine
        .matcher(config.match_config(), StoreAccess::ReadOnly)?;
    Ok(matcher.find_matches(config.opt_in_id)?)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<MatchCommandConfig, CliError> {
    let merged = MatchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    MatchCommandConfig::try_from(merged)
}
