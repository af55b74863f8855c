//! Wiring shared by the commands: datastore, route providers and matcher.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use carpool_core::route::RouteOptimizer;
use carpool_core::{LogNotifier, SqliteRideStore, SystemClock};
use carpool_matcher::{MatchConfig, Matcher};
use carpool_routing::{
    DEFAULT_TIMEOUT_SECS, HttpRouteProvider, HttpRouteProviderConfig, OsrmService,
};
use geo::Coord;
use log::{debug, info};

use crate::{
    ARG_DATABASE, ARG_DESTINATION_LAT, ARG_DESTINATION_LNG, CliError, ENV_BATCH_DATABASE,
    ENV_BATCH_DESTINATION_LAT, ENV_BATCH_DESTINATION_LNG, ENV_MATCH_DATABASE,
    ENV_MATCH_DESTINATION_LAT, ENV_MATCH_DESTINATION_LNG,
};

const PRIMARY_PROVIDER: &str = "osrm-trip";
const SECONDARY_PROVIDER: &str = "osrm-route";

/// Matcher wired to the production collaborators.
pub(crate) type CliMatcher = Matcher<SqliteRideStore, LogNotifier, SystemClock>;

/// Which command's environment variables to name in missing-field errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineCommand {
    Match,
    Batch,
}

impl EngineCommand {
    const fn database_env(self) -> &'static str {
        match self {
            Self::Match => ENV_MATCH_DATABASE,
            Self::Batch => ENV_BATCH_DATABASE,
        }
    }

    const fn destination_env(self) -> (&'static str, &'static str) {
        match self {
            Self::Match => (ENV_MATCH_DESTINATION_LNG, ENV_MATCH_DESTINATION_LAT),
            Self::Batch => (ENV_BATCH_DESTINATION_LNG, ENV_BATCH_DESTINATION_LAT),
        }
    }
}

/// Whether a command may write to the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreAccess {
    /// `match` and dry runs: no schema creation, no writes.
    ReadOnly,
    ReadWrite,
}

/// Raw engine options as merged from every configuration layer.
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineOptions {
    pub(crate) database: Option<Utf8PathBuf>,
    pub(crate) destination_lng: Option<f64>,
    pub(crate) destination_lat: Option<f64>,
    pub(crate) primary_routing_url: Option<String>,
    pub(crate) secondary_routing_url: Option<String>,
    pub(crate) routing_timeout_secs: Option<u64>,
}

/// Resolved engine configuration shared by `match` and `batch`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EngineConfig {
    /// SQLite datastore holding opt-ins and rides.
    pub(crate) database: Utf8PathBuf,
    /// Shared commute destination.
    pub(crate) destination: Coord<f64>,
    /// Trip-service endpoint tried first, if any.
    pub(crate) primary_routing_url: Option<String>,
    /// Route-service endpoint tried second, if any.
    pub(crate) secondary_routing_url: Option<String>,
    /// Per-request timeout for both endpoints.
    pub(crate) routing_timeout: Duration,
}

impl EngineConfig {
    pub(crate) fn resolve(options: EngineOptions, command: EngineCommand) -> Result<Self, CliError> {
        let database = options.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: command.database_env(),
        })?;
        let (lng_env, lat_env) = command.destination_env();
        let lng = options.destination_lng.ok_or(CliError::MissingArgument {
            field: ARG_DESTINATION_LNG,
            env: lng_env,
        })?;
        let lat = options.destination_lat.ok_or(CliError::MissingArgument {
            field: ARG_DESTINATION_LAT,
            env: lat_env,
        })?;
        if !valid_coordinate(lng, lat) {
            return Err(CliError::InvalidDestination { lng, lat });
        }

        Ok(Self {
            database,
            destination: Coord { x: lng, y: lat },
            primary_routing_url: non_empty(options.primary_routing_url),
            secondary_routing_url: non_empty(options.secondary_routing_url),
            routing_timeout: Duration::from_secs(
                options.routing_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }

    /// Route optimizer trying the configured endpoints before the local
    /// heuristic.
    pub(crate) fn route_optimizer(&self, config: &MatchConfig) -> Result<RouteOptimizer, CliError> {
        let mut optimizer = RouteOptimizer::new(config.cost);
        let endpoints = [
            (PRIMARY_PROVIDER, &self.primary_routing_url, OsrmService::Trip),
            (SECONDARY_PROVIDER, &self.secondary_routing_url, OsrmService::Route),
        ];
        for (name, url, service) in endpoints {
            let Some(url) = url else { continue };
            let provider_config = HttpRouteProviderConfig::new(name, url.clone(), service)
                .with_timeout(self.routing_timeout);
            let provider = HttpRouteProvider::with_config(provider_config).map_err(|source| {
                CliError::BuildRouteProvider {
                    base_url: url.clone(),
                    source,
                }
            })?;
            optimizer.push_provider(Box::new(provider));
        }
        debug!("route providers: {:?}", optimizer.provider_names());
        Ok(optimizer)
    }

    /// Open the datastore and assemble a matcher around it.
    pub(crate) fn matcher(
        &self,
        config: MatchConfig,
        access: StoreAccess,
    ) -> Result<CliMatcher, CliError> {
        let store = open_store(&self.database, access)?;
        let optimizer = self.route_optimizer(&config)?;
        info!("matching against {}", self.database);
        Ok(Matcher::new(store, LogNotifier, SystemClock, config).with_optimizer(optimizer))
    }
}

fn valid_coordinate(lng: f64, lat: f64) -> bool {
    (-180.0..=180.0).contains(&lng) && (-90.0..=90.0).contains(&lat)
}

fn non_empty(url: Option<String>) -> Option<String> {
    url.filter(|value| !value.trim().is_empty())
}

/// Open an existing SQLite datastore.
///
/// Opt-ins are captured elsewhere, so a missing file is a configuration
/// mistake rather than a fresh database.
pub(crate) fn open_store(
    path: &Utf8Path,
    access: StoreAccess,
) -> Result<SqliteRideStore, CliError> {
    match crate::fs::file_is_file(path) {
        Ok(true) => Ok(match access {
            StoreAccess::ReadOnly => SqliteRideStore::open_read_only(path)?,
            StoreAccess::ReadWrite => SqliteRideStore::open(path)?,
        }),
        Ok(false) => Err(CliError::DatabaseNotFile {
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingDatabase {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectDatabase {
            path: path.to_path_buf(),
            source,
        }),
    }
}
