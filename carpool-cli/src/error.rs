//! Error types emitted by the carpool CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use carpool_core::SqliteRideStoreError;
use carpool_matcher::{LifecycleError, MatchError};
use carpool_routing::ProviderBuildError;
use thiserror::Error;

/// Errors emitted by the carpool CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Environment variable that can supply it instead.
        env: &'static str,
    },
    /// The destination is not a valid longitude/latitude pair.
    #[error("destination ({lng}, {lat}) is not a valid longitude/latitude pair")]
    InvalidDestination {
        /// Longitude in degrees.
        lng: f64,
        /// Latitude in degrees.
        lat: f64,
    },
    /// A reason was given for an answer other than a decline.
    #[error("--reason only applies when the answer is decline")]
    ReasonWithoutDecline,
    /// The datastore path does not exist.
    #[error("database path {path:?} does not exist")]
    MissingDatabase {
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// The datastore path exists but is not a file.
    #[error("database path {path:?} exists but is not a file")]
    DatabaseNotFile {
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// The datastore path could not be inspected.
    #[error("failed to inspect database path {path:?}: {source}")]
    InspectDatabase {
        /// Configured path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite datastore failed.
    #[error(transparent)]
    OpenStore(#[from] SqliteRideStoreError),
    /// Constructing an HTTP route provider failed.
    #[error("failed to build route provider for {base_url:?}: {source}")]
    BuildRouteProvider {
        /// Endpoint the provider was configured with.
        base_url: String,
        /// Underlying build failure.
        #[source]
        source: ProviderBuildError,
    },
    /// Matching rejected the request.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// The ride lifecycle rejected the response.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Serializing the command result failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing the command result failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
