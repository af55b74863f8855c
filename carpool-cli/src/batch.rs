//! `batch` command: auto-create rides for one commute date.

use std::io::Write;

use camino::Utf8PathBuf;
use carpool_matcher::{
    BatchOptions, BatchReport, DEFAULT_AUTO_CREATE_CONFIDENCE, DEFAULT_MIN_CONFIDENCE, MatchConfig,
};
use chrono::NaiveDate;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineCommand, EngineConfig, EngineOptions, StoreAccess};
use crate::{
    ARG_AUTO_CREATE_CONFIDENCE, ARG_DATABASE, ARG_DATE, ARG_DESTINATION_LAT, ARG_DESTINATION_LNG,
    ARG_DRY_RUN, ARG_MIN_CONFIDENCE, ARG_PRIMARY_ROUTING_URL, ARG_ROUTING_TIMEOUT_SECS,
    ARG_SECONDARY_ROUTING_URL, CliError, ENV_BATCH_DATE, write_json,
};

/// CLI arguments for the `batch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Match every pending opt-in on a commute date and persist \
                 each candidate scoring above the auto-create threshold as a \
                 proposed ride. An opt-in joins at most one ride per run. \
                 With --dry-run the decisions are printed and nothing is \
                 written.",
    about = "Auto-create rides for a commute date"
)]
#[ortho_config(prefix = "CARPOOL")]
pub(crate) struct BatchArgs {
    /// Commute date to process (YYYY-MM-DD).
    #[arg(long = ARG_DATE, value_name = "date")]
    #[serde(default)]
    pub(crate) date: Option<NaiveDate>,
    /// Compute decisions without writing rides or opt-in statuses.
    #[arg(long = ARG_DRY_RUN)]
    #[serde(default)]
    pub(crate) dry_run: bool,
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
    /// Candidates scoring below this are never considered (0-100).
    #[arg(long = ARG_MIN_CONFIDENCE, value_name = "score")]
    #[serde(default)]
    pub(crate) min_confidence: Option<u8>,
    /// Only candidates scoring strictly above this become rides (0-100).
    #[arg(long = ARG_AUTO_CREATE_CONFIDENCE, value_name = "score")]
    #[serde(default)]
    pub(crate) auto_create_confidence: Option<u8>,
}

impl BatchArgs {
    pub(crate) fn into_config(self) -> Result<BatchCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BatchCommandConfig::try_from(merged)
    }
}

/// Resolved `batch` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BatchCommandConfig {
    pub(crate) date: NaiveDate,
    pub(crate) dry_run: bool,
    pub(crate) engine: EngineConfig,
    pub(crate) min_confidence: u8,
    pub(crate) auto_create_confidence: u8,
}

impl BatchCommandConfig {
    pub(crate) fn match_config(&self) -> MatchConfig {
        MatchConfig::new(self.engine.destination)
            .with_min_confidence(self.min_confidence)
            .with_auto_create_confidence(self.auto_create_confidence)
    }
}

impl TryFrom<BatchArgs> for BatchCommandConfig {
    type Error = CliError;

    fn try_from(args: BatchArgs) -> Result<Self, Self::Error> {
        let date = args.date.ok_or(CliError::MissingArgument {
            field: ARG_DATE,
            env: ENV_BATCH_DATE,
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
            EngineCommand::Batch,
        )?;
        Ok(Self {
            date,
            dry_run: args.dry_run,
            engine,
            min_confidence: args.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            auto_create_confidence: args
                .auto_create_confidence
                .unwrap_or(DEFAULT_AUTO_CREATE_CONFIDENCE),
        })
    }
}

pub(crate) fn run_batch_with(args: BatchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let report = execute_batch(&config)?;
    write_json(writer, &report)
}

pub(crate) fn execute_batch(config: &BatchCommandConfig) -> Result<BatchReport, CliError> {
    let access = if config.dry_run {
        StoreAccess::ReadOnly
    } else {
        StoreAccess::ReadWrite
    };
    let matcher = config.engine.matcher(config.match_config(), access)?;
    let report = matcher.run_batch(
        config.date,
        BatchOptions {
            dry_run: config.dry_run,
        },
    )?;
    info!(
        "batch for {} finished: {} rides created, {} errors",
        report.date,
        report.rides_created,
        report.errors.len()
    );
    Ok(report)
}
