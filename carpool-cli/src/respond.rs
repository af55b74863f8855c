//! `respond` command: record a participant's answer to a proposed ride.

use std::io::Write;

use camino::Utf8PathBuf;
use carpool_core::{LogNotifier, RideId, SystemClock, UserId};
use carpool_matcher::{ParticipantResponse, RideLifecycle, RideUpdate};
use clap::{Parser, ValueEnum};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::engine::{StoreAccess, open_store};
use crate::{
    ARG_ANSWER, ARG_DATABASE, ARG_REASON, ARG_RIDE, ARG_USER, CliError, ENV_RESPOND_ANSWER,
    ENV_RESPOND_DATABASE, ENV_RESPOND_RIDE, ENV_RESPOND_USER, write_json,
};

/// A participant's answer as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Answer {
    /// Accept the ride.
    Confirm,
    /// Refuse the ride; cancels it for everyone.
    Decline,
    /// The confirmation deadline passed without an answer.
    NoResponse,
}

/// CLI arguments for the `respond` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Record a participant's answer and re-evaluate the ride. \
                 One decline cancels the ride and returns the other opt-ins \
                 to the pool; unanimous confirmation confirms it. The \
                 deadline scheduler records missed deadlines with \
                 `--answer no-response`.",
    about = "Record a participant's answer to a proposed ride"
)]
#[ortho_config(prefix = "CARPOOL")]
pub(crate) struct RespondArgs {
    /// Ride being answered.
    #[arg(value_name = "ride")]
    #[serde(default)]
    pub(crate) ride_id: Option<RideId>,
    /// Participant answering.
    #[arg(value_name = "user")]
    #[serde(default)]
    pub(crate) user_id: Option<UserId>,
    /// The participant's answer.
    #[arg(long = ARG_ANSWER, value_enum, value_name = "answer")]
    #[serde(default)]
    pub(crate) answer: Option<Answer>,
    /// Why the participant declined.
    #[arg(long = ARG_REASON, value_name = "text")]
    #[serde(default)]
    pub(crate) reason: Option<String>,
    /// Path to the SQLite datastore.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl RespondArgs {
    pub(crate) fn into_config(self) -> Result<RespondConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RespondConfig::try_from(merged)
    }
}

/// What to record for the participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recorded {
    Response(ParticipantResponse),
    NoResponse,
}

/// Resolved `respond` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RespondConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) ride_id: RideId,
    pub(crate) user_id: UserId,
    pub(crate) recorded: Recorded,
}

impl TryFrom<RespondArgs> for RespondConfig {
    type Error = CliError;

    fn try_from(args: RespondArgs) -> Result<Self, Self::Error> {
        let ride_id = args.ride_id.ok_or(CliError::MissingArgument {
            field: ARG_RIDE,
            env: ENV_RESPOND_RIDE,
        })?;
        let user_id = args.user_id.ok_or(CliError::MissingArgument {
            field: ARG_USER,
            env: ENV_RESPOND_USER,
        })?;
        let answer = args.answer.ok_or(CliError::MissingArgument {
            field: ARG_ANSWER,
            env: ENV_RESPOND_ANSWER,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_RESPOND_DATABASE,
        })?;

        let recorded = match (answer, args.reason) {
            (Answer::Decline, reason) => Recorded::Response(ParticipantResponse::Decline { reason }),
            (_, Some(_)) => return Err(CliError::ReasonWithoutDecline),
            (Answer::Confirm, None) => Recorded::Response(ParticipantResponse::Confirm),
            (Answer::NoResponse, None) => Recorded::NoResponse,
        };
        Ok(Self {
            database,
            ride_id,
            user_id,
            recorded,
        })
    }
}

pub(crate) fn run_respond_with(args: RespondArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let update = execute_respond(config)?;
    write_json(writer, &update)
}

pub(crate) fn execute_respond(config: RespondConfig) -> Result<RideUpdate, CliError> {
    let store = open_store(&config.database, StoreAccess::ReadWrite)?;
    let lifecycle = RideLifecycle::new(store, LogNotifier, SystemClock);
    let update = match config.recorded {
        Recorded::Response(response) => lifecycle.respond(config.ride_id, config.user_id, response),
        Recorded::NoResponse => lifecycle.mark_no_response(config.ride_id, config.user_id),
    }?;
    Ok(update)
}
