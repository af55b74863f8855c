//! Unit tests for the `respond` command.

use super::helpers::{SeededDatabase, destination, rider_and_driver};
use super::*;
use crate::batch::{BatchCommandConfig, execute_batch};
use crate::engine::{EngineCommand, EngineConfig, EngineOptions};
use crate::respond::{Answer, Recorded, RespondArgs, RespondConfig, execute_respond};
use camino::Utf8PathBuf;
use carpool_core::test_support::OptInBuilder;
use carpool_core::{OptInStatus, RideStatus, RideStore};
use carpool_matcher::{LifecycleError, ParticipantResponse};
use rstest::rstest;

fn args(answer: Option<Answer>, reason: Option<&str>) -> RespondArgs {
    RespondArgs {
        ride_id: Some(1),
        user_id: Some(2),
        answer,
        reason: reason.map(str::to_owned),
        database: Some(Utf8PathBuf::from("carpool.db")),
    }
}

#[rstest]
#[case(Answer::Confirm, None, Recorded::Response(ParticipantResponse::Confirm))]
#[case(
    Answer::Decline,
    Some("train strike"),
    Recorded::Response(ParticipantResponse::Decline { reason: Some("train strike".to_owned()) })
)]
#[case(
    Answer::Decline,
    None,
    Recorded::Response(ParticipantResponse::Decline { reason: None })
)]
#[case(Answer::NoResponse, None, Recorded::NoResponse)]
fn answers_map_to_lifecycle_calls(
    #[case] answer: Answer,
    #[case] reason: Option<&str>,
    #[case] expected: Recorded,
) {
    let config = RespondConfig::try_from(args(Some(answer), reason)).expect("config");
    assert_eq!(config.recorded, expected);
    assert_eq!((config.ride_id, config.user_id), (1, 2));
}

#[rstest]
#[case(Answer::Confirm)]
#[case(Answer::NoResponse)]
fn reason_requires_a_decline(#[case] answer: Answer) {
    let err = RespondConfig::try_from(args(Some(answer), Some("why not")))
        .expect_err("reason without decline");
    assert!(matches!(err, CliError::ReasonWithoutDecline));
}

#[rstest]
fn missing_answer_names_its_flag() {
    let err = RespondConfig::try_from(args(None, None)).expect_err("answer required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_ANSWER);
            assert_eq!(env, ENV_RESPOND_ANSWER);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn answer_parses_in_kebab_case() {
    let cli = Cli::try_parse_from([
        "carpool",
        "respond",
        "4",
        "9",
        "--answer",
        "no-response",
        "--database",
        "carpool.db",
    ])
    .expect("arguments parse");
    let Command::Respond(parsed) = cli.command else {
        panic!("expected respond command");
    };
    assert_eq!(parsed.ride_id, Some(4));
    assert_eq!(parsed.user_id, Some(9));
    assert_eq!(parsed.answer, Some(Answer::NoResponse));
}

fn seeded_ride() -> SeededDatabase {
    let database = SeededDatabase::with_opt_ins(&rider_and_driver());
    let destination = destination();
    let config = BatchCommandConfig {
        date: OptInBuilder::default_date(),
        dry_run: false,
        engine: EngineConfig::resolve(
            EngineOptions {
                database: Some(database.path().clone()),
                destination_lng: Some(destination.x),
                destination_lat: Some(destination.y),
                ..EngineOptions::default()
            },
            EngineCommand::Batch,
        )
        .expect("engine"),
        min_confidence: 40,
        auto_create_confidence: 70,
    };
    let report = execute_batch(&config).expect("batch ran");
    assert_eq!(report.rides_created, 1);
    database
}

fn respond(database: &SeededDatabase, user_id: u64, recorded: Recorded) -> RespondConfig {
    RespondConfig {
        database: database.path().clone(),
        ride_id: 1,
        user_id,
        recorded,
    }
}

#[rstest]
fn decline_cancels_the_stored_ride() {
    let database = seeded_ride();

    let update = execute_respond(respond(
        &database,
        1,
        Recorded::Response(ParticipantResponse::Decline {
            reason: Some("train strike".to_owned()),
        }),
    ))
    .expect("declined");

    assert_eq!(update.transition, Some(RideStatus::Cancelled));
    let store = database.store();
    let ride = store.ride(1).expect("read").expect("ride kept");
    assert_eq!(ride.status, RideStatus::Cancelled);
    assert_eq!(ride.cancellation_reason.as_deref(), Some("train strike"));
    let driver = store.opt_in(2).expect("read").expect("driver opt-in");
    assert_eq!(driver.status, OptInStatus::Pending);
}

#[rstest]
fn confirmations_accumulate_across_invocations() {
    let database = seeded_ride();

    let first = execute_respond(respond(
        &database,
        2,
        Recorded::Response(ParticipantResponse::Confirm),
    ))
    .expect("driver confirmed");
    assert_eq!(first.transition, None);

    let second = execute_respond(respond(
        &database,
        1,
        Recorded::Response(ParticipantResponse::Confirm),
    ))
    .expect("rider confirmed");
    assert_eq!(second.transition, Some(RideStatus::Confirmed));
}

#[rstest]
fn no_response_leaves_the_ride_proposed() {
    let database = seeded_ride();

    let update =
        execute_respond(respond(&database, 1, Recorded::NoResponse)).expect("recorded");

    assert_eq!(update.transition, None);
    assert_eq!(update.ride.status, RideStatus::Proposed);
}

#[rstest]
fn strangers_are_rejected() {
    let database = seeded_ride();

    let err = execute_respond(respond(
        &database,
        99,
        Recorded::Response(ParticipantResponse::Confirm),
    ))
    .expect_err("not a participant");

    assert!(matches!(
        err,
        CliError::Lifecycle(LifecycleError::NotParticipant { user_id: 99, .. })
    ));
}
