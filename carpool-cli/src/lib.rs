//! Command-line entry point used by the scheduler to drive the carpool
//! engine.
//!
//! Three subcommands are exposed: `match` ranks candidates for one opt-in,
//! `batch` auto-creates rides for a commute date, and `respond` records a
//! participant's answer. Every command writes its result to stdout as
//! pretty-printed JSON. Options are layered by `ortho_config`: defaults,
//! then configuration files, then `CARPOOL_*` environment variables, then
//! flags.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod batch;
mod engine;
mod error;
mod fs;
mod matching;
mod respond;

pub use error::CliError;

use batch::BatchArgs;
use matching::MatchArgs;
use respond::RespondArgs;

const ARG_DATABASE: &str = "database";
const ARG_DESTINATION_LNG: &str = "destination-lng";
const ARG_DESTINATION_LAT: &str = "destination-lat";
const ARG_PRIMARY_ROUTING_URL: &str = "primary-routing-url";
const ARG_SECONDARY_ROUTING_URL: &str = "secondary-routing-url";
const ARG_ROUTING_TIMEOUT_SECS: &str = "routing-timeout-secs";
const ARG_MIN_CONFIDENCE: &str = "min-confidence";
const ARG_MAX_CANDIDATES: &str = "max-candidates";
const ARG_AUTO_CREATE_CONFIDENCE: &str = "auto-create-confidence";
const ARG_OPT_IN: &str = "opt-in";
const ARG_DATE: &str = "date";
const ARG_DRY_RUN: &str = "dry-run";
const ARG_RIDE: &str = "ride";
const ARG_USER: &str = "user";
const ARG_ANSWER: &str = "answer";
const ARG_REASON: &str = "reason";

const ENV_MATCH_DATABASE: &str = "CARPOOL_CMDS_MATCH_DATABASE";
const ENV_MATCH_DESTINATION_LNG: &str = "CARPOOL_CMDS_MATCH_DESTINATION_LNG";
const ENV_MATCH_DESTINATION_LAT: &str = "CARPOOL_CMDS_MATCH_DESTINATION_LAT";
const ENV_MATCH_OPT_IN: &str = "CARPOOL_CMDS_MATCH_OPT_IN_ID";
const ENV_BATCH_DATABASE: &str = "CARPOOL_CMDS_BATCH_DATABASE";
const ENV_BATCH_DESTINATION_LNG: &str = "CARPOOL_CMDS_BATCH_DESTINATION_LNG";
const ENV_BATCH_DESTINATION_LAT: &str = "CARPOOL_CMDS_BATCH_DESTINATION_LAT";
const ENV_BATCH_DATE: &str = "CARPOOL_CMDS_BATCH_DATE";
const ENV_RESPOND_DATABASE: &str = "CARPOOL_CMDS_RESPOND_DATABASE";
const ENV_RESPOND_RIDE: &str = "CARPOOL_CMDS_RESPOND_RIDE_ID";
const ENV_RESPOND_USER: &str = "CARPOOL_CMDS_RESPOND_USER_ID";
const ENV_RESPOND_ANSWER: &str = "CARPOOL_CMDS_RESPOND_ANSWER";

/// Run the carpool CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, the
/// datastore cannot be opened, the engine rejects the request, or the JSON
/// result cannot be written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Match(args) => matching::run_match_with(args, writer),
        Command::Batch(args) => batch::run_batch_with(args, writer),
        Command::Respond(args) => respond::run_respond_with(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "carpool",
    about = "Match commuters into shared rides and track their confirmations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank ride candidates for one pending opt-in.
    Match(MatchArgs),
    /// Auto-create rides for every pending opt-in on a commute date.
    Batch(BatchArgs),
    /// Record a participant's answer to a proposed ride.
    Respond(RespondArgs),
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
