//! Focused unit tests covering `match` and `batch` configuration.

use super::helpers::{SeededDatabase, destination, destination_flags, rider_and_driver};
use super::*;
use crate::batch::{BatchArgs, BatchCommandConfig, execute_batch};
use crate::engine::{EngineCommand, EngineConfig, EngineOptions, StoreAccess, open_store};
use crate::matching::{MatchArgs, MatchCommandConfig, config_from_layers_for_test, execute_match};
use camino::Utf8PathBuf;
use carpool_core::RideStore;
use carpool_core::route::LOCAL_PROVIDER_NAME;
use carpool_core::test_support::OptInBuilder;
use carpool_matcher::MatchConfig;
use rstest::rstest;
use std::time::Duration;
use tempfile::TempDir;

fn engine_options(database: &str) -> EngineOptions {
    let destination = destination();
    EngineOptions {
        database: Some(Utf8PathBuf::from(database)),
        destination_lng: Some(destination.x),
        destination_lat: Some(destination.y),
        ..EngineOptions::default()
    }
}

fn match_args(opt_in_id: Option<u64>) -> MatchArgs {
    let destination = destination();
    MatchArgs {
        opt_in_id,
        database: Some(Utf8PathBuf::from("carpool.db")),
        destination_lng: Some(destination.x),
        destination_lat: Some(destination.y),
        ..MatchArgs::default()
    }
}

#[rstest]
fn converting_match_without_opt_in_errors() {
    let err = MatchCommandConfig::try_from(match_args(None)).expect_err("opt-in is required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_OPT_IN);
            assert_eq!(env, ENV_MATCH_OPT_IN);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case::database(EngineCommand::Match, ARG_DATABASE, ENV_MATCH_DATABASE)]
#[case::longitude(EngineCommand::Match, ARG_DESTINATION_LNG, ENV_MATCH_DESTINATION_LNG)]
#[case::latitude(EngineCommand::Batch, ARG_DESTINATION_LAT, ENV_BATCH_DESTINATION_LAT)]
#[case::batch_database(EngineCommand::Batch, ARG_DATABASE, ENV_BATCH_DATABASE)]
fn missing_engine_options_name_their_flag_and_env(
    #[case] command: EngineCommand,
    #[case] missing: &'static str,
    #[case] expected_env: &'static str,
) {
    let mut options = engine_options("carpool.db");
    match missing {
        ARG_DATABASE => options.database = None,
        ARG_DESTINATION_LNG => options.destination_lng = None,
        _ => options.destination_lat = None,
    }

    let err = EngineConfig::resolve(options, command).expect_err("missing option");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, missing);
            assert_eq!(env, expected_env);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(181.0, 51.5)]
#[case(-0.1, -90.5)]
#[case(f64::NAN, 51.5)]
fn out_of_range_destination_is_rejected(#[case] lng: f64, #[case] lat: f64) {
    let options = EngineOptions {
        destination_lng: Some(lng),
        destination_lat: Some(lat),
        ..engine_options("carpool.db")
    };
    let err = EngineConfig::resolve(options, EngineCommand::Match).expect_err("invalid");
    assert!(matches!(err, CliError::InvalidDestination { .. }));
}

#[rstest]
fn match_config_applies_defaults() {
    let config = MatchCommandConfig::try_from(MatchArgs {
        primary_routing_url: Some("  ".to_owned()),
        ..match_args(Some(7))
    })
    .expect("config should build");

    assert_eq!(config.opt_in_id, 7);
    assert_eq!(config.min_confidence, 40);
    assert_eq!(config.max_candidates, 3);
    assert_eq!(config.engine.destination, destination());
    assert_eq!(config.engine.primary_routing_url, None);
    assert_eq!(config.engine.secondary_routing_url, None);
    assert_eq!(config.engine.routing_timeout, Duration::from_secs(5));
}

#[rstest]
fn batch_requires_a_date() {
    let destination = destination();
    let args = BatchArgs {
        database: Some(Utf8PathBuf::from("carpool.db")),
        destination_lng: Some(destination.x),
        destination_lat: Some(destination.y),
        ..BatchArgs::default()
    };
    let err = BatchCommandConfig::try_from(args).expect_err("date is required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_DATE);
            assert_eq!(env, ENV_BATCH_DATE);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn batch_flags_parse_from_the_command_line() {
    let mut argv = vec![
        "carpool".to_owned(),
        "batch".to_owned(),
        format!("--{ARG_DATE}"),
        "2026-10-16".to_owned(),
        format!("--{ARG_DRY_RUN}"),
        format!("--{ARG_AUTO_CREATE_CONFIDENCE}"),
        "80".to_owned(),
        format!("--{ARG_DATABASE}"),
        "carpool.db".to_owned(),
    ];
    argv.extend(destination_flags());

    let cli = Cli::try_parse_from(argv).expect("arguments parse");
    let Command::Batch(args) = cli.command else {
        panic!("expected batch command");
    };
    let config = BatchCommandConfig::try_from(args).expect("config should build");

    assert_eq!(config.date, OptInBuilder::default_date());
    assert!(config.dry_run);
    assert_eq!(config.auto_create_confidence, 80);
    assert_eq!(config.min_confidence, 40);
    assert_eq!(config.engine.destination, destination());
}

#[rstest]
fn route_optimizer_tries_configured_endpoints_in_order() {
    let options = EngineOptions {
        primary_routing_url: Some("http://primary:5000".to_owned()),
        secondary_routing_url: Some("http://secondary:5000".to_owned()),
        routing_timeout_secs: Some(2),
        ..engine_options("carpool.db")
    };
    let config = EngineConfig::resolve(options, EngineCommand::Batch).expect("config");
    assert_eq!(config.routing_timeout, Duration::from_secs(2));

    let optimizer = config
        .route_optimizer(&MatchConfig::new(config.destination))
        .expect("providers build");

    assert_eq!(
        optimizer.provider_names(),
        vec!["osrm-trip", "osrm-route", LOCAL_PROVIDER_NAME]
    );
}

#[rstest]
fn route_optimizer_skips_absent_endpoints() {
    let options = EngineOptions {
        secondary_routing_url: Some("http://secondary:5000".to_owned()),
        ..engine_options("carpool.db")
    };
    let config = EngineConfig::resolve(options, EngineCommand::Match).expect("config");

    let optimizer = config
        .route_optimizer(&MatchConfig::new(config.destination))
        .expect("providers build");

    assert_eq!(
        optimizer.provider_names(),
        vec!["osrm-route", LOCAL_PROVIDER_NAME]
    );
}

#[rstest]
fn missing_database_is_not_created() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    let path = root.join("absent.db");

    let err = open_store(&path, StoreAccess::ReadWrite).expect_err("missing database");

    match err {
        CliError::MissingDatabase { path: reported } => assert_eq!(reported, path),
        other => panic!("expected MissingDatabase, found {other:?}"),
    }
    assert!(!path.exists());
}

#[rstest]
fn directory_is_not_a_database() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");

    let err = open_store(&root, StoreAccess::ReadOnly).expect_err("directory");

    assert!(matches!(err, CliError::DatabaseNotFile { .. }));
}

#[rstest]
fn database_under_a_missing_directory_is_reported_missing() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    let path = root.join("absent").join("carpool.db");

    let err = open_store(&path, StoreAccess::ReadWrite).expect_err("missing parent");

    assert!(matches!(err, CliError::MissingDatabase { .. }));
    assert!(!root.join("absent").exists());
}

#[rstest]
fn file_checks_distinguish_files_from_directories() {
    let database = SeededDatabase::with_opt_ins(&rider_and_driver());
    let directory = database
        .path()
        .parent()
        .expect("database lives in a directory")
        .to_path_buf();

    assert!(crate::fs::file_is_file(database.path()).expect("inspect file"));
    assert!(!crate::fs::file_is_file(&directory).expect("inspect directory"));
}

#[rstest]
fn match_reads_the_seeded_datastore() {
    let database = SeededDatabase::with_opt_ins(&rider_and_driver());
    let config = MatchCommandConfig::try_from(MatchArgs {
        database: Some(database.path().clone()),
        ..match_args(Some(1))
    })
    .expect("config");

    let outcome = execute_match(&config).expect("matched");

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].score(), 75);
    assert_eq!(outcome.candidates[0].route.source, LOCAL_PROVIDER_NAME);
}

#[rstest]
fn batch_persists_rides_above_the_threshold() {
    let database = SeededDatabase::with_opt_ins(&rider_and_driver());
    let config = BatchCommandConfig {
        date: OptInBuilder::default_date(),
        dry_run: false,
        engine: EngineConfig::resolve(
            engine_options(database.path().as_str()),
            EngineCommand::Batch,
        )
        .expect("engine"),
        min_confidence: 40,
        auto_create_confidence: 70,
    };

    let report = execute_batch(&config).expect("batch ran");

    assert_eq!(report.rides_created, 1);
    let store = database.store();
    let ride = store.ride(1).expect("read ride").expect("ride stored");
    assert_eq!(ride.pickup_order, vec![2, 1]);
    assert_eq!(store.participants(1).expect("participants").len(), 2);
}

#[rstest]
fn dry_run_never_writes_a_schema() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    let path = root.join("empty.db");
    std::fs::write(&path, b"").expect("create empty datastore");
    let config = BatchCommandConfig {
        date: OptInBuilder::default_date(),
        dry_run: true,
        engine: EngineConfig::resolve(engine_options(path.as_str()), EngineCommand::Batch)
            .expect("engine"),
        min_confidence: 40,
        auto_create_confidence: 70,
    };

    let err = execute_batch(&config).expect_err("no tables to read");

    assert!(matches!(err, CliError::Match(_)));
    assert_eq!(std::fs::metadata(&path).expect("stat").len(), 0);
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "opt_in_id": "first" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let destination = destination();
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "database": "/srv/carpool/from-file.db",
            "primary_routing_url": "http://from-file:5000",
            "max_candidates": 5,
        }),
        None,
    );
    composer.push_environment(json!({
        "opt_in_id": 12,
        "database": "/srv/carpool/from-env.db",
        "destination_lng": destination.x,
        "destination_lat": destination.y,
    }));
    composer.push_cli(json!({ "max_candidates": 1 }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.opt_in_id, 12);
    assert_eq!(
        config.engine.database,
        Utf8PathBuf::from("/srv/carpool/from-env.db")
    );
    assert_eq!(
        config.engine.primary_routing_url.as_deref(),
        Some("http://from-file:5000")
    );
    assert_eq!(config.max_candidates, 1);
}
