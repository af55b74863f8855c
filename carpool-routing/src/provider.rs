//! HTTP-based `RouteProvider` using OSRM's Trip or Route service.
//!
//! The [`RouteProvider`] trait is synchronous so the matching core stays
//! embeddable in synchronous contexts. This provider bridges the async HTTP
//! calls to the sync interface by blocking on a Tokio runtime internally.
//!
//! # Example
//!
//! ```no_run
//! use carpool_core::route::{RouteProvider, RouteRequest};
//! use carpool_routing::HttpRouteProvider;
//! use geo::Coord;
//!
//! let provider = HttpRouteProvider::primary("http://localhost:5000")?;
//! let request = RouteRequest {
//!     origin: Coord { x: -0.13, y: 51.50 },
//!     destination: Coord { x: -0.09, y: 51.52 },
//!     waypoints: vec![Coord { x: -0.12, y: 51.51 }],
//! };
//!
//! let route = provider.route(&request)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::time::Duration;

use carpool_core::route::{ProviderError, ProviderRoute, RouteLeg, RouteProvider, RouteRequest};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use super::osrm::{OsrmPath, RouteResponse, TripResponse};

/// Error type for [`HttpRouteProvider`] construction failures.
#[derive(Debug, Error)]
pub enum ProviderBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Default user agent for OSRM requests.
pub const DEFAULT_USER_AGENT: &str = "carpool-routing/0.1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default OSRM profile.
pub const DEFAULT_PROFILE: &str = "driving";

/// Which OSRM service a provider queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsrmService {
    /// Trip service: solves the pickup order between a fixed start and end.
    Trip,
    /// Route service: follows the pickups in the order given.
    #[default]
    Route,
}

impl OsrmService {
    /// Path segment used in request URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Route => "route",
        }
    }
}

/// Configuration for [`HttpRouteProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRouteProviderConfig {
    /// Name reported in logs and route results.
    pub name: String,
    /// Base URL for the OSRM service (e.g., `"http://localhost:5000"`).
    /// An empty URL leaves the provider unconfigured.
    pub base_url: String,
    /// Service to query.
    pub service: OsrmService,
    /// OSRM routing profile.
    pub profile: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpRouteProviderConfig {
    fn default() -> Self {
        Self {
            name: "osrm-route".to_owned(),
            base_url: "http://localhost:5000".to_owned(),
            service: OsrmService::Route,
            profile: DEFAULT_PROFILE.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpRouteProviderConfig {
    /// Create a configuration for `service` at `base_url`.
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, service: OsrmService) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            service,
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the OSRM profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

/// Route provider backed by an OSRM HTTP endpoint.
///
/// The provider owns a current-thread Tokio runtime that is reused across
/// calls.
///
/// # Runtime behaviour
///
/// When called from within an existing multi-threaded Tokio runtime
/// (detected via [`Handle::try_current()`] and
/// [`RuntimeFlavor::MultiThread`]), it uses that runtime's handle with
/// [`tokio::task::block_in_place`] to avoid nested runtime panics. Inside a
/// `current_thread` runtime it refuses the request. Outside Tokio it blocks
/// on its own runtime.
pub struct HttpRouteProvider {
    client: Client,
    config: HttpRouteProviderConfig,
    runtime: Runtime,
}

impl fmt::Debug for HttpRouteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRouteProvider")
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

impl HttpRouteProvider {
    /// A Trip-service provider that optimises pickup order.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn primary(base_url: impl Into<String>) -> Result<Self, ProviderBuildError> {
        Self::with_config(HttpRouteProviderConfig::new(
            "osrm-trip",
            base_url,
            OsrmService::Trip,
        ))
    }

    /// A Route-service provider that keeps the suggested pickup order.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn secondary(base_url: impl Into<String>) -> Result<Self, ProviderBuildError> {
        Self::with_config(HttpRouteProviderConfig::new(
            "osrm-route",
            base_url,
            OsrmService::Route,
        ))
    }

    /// Create a provider with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpRouteProviderConfig) -> Result<Self, ProviderBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ProviderBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ProviderBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    /// The provider's configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpRouteProviderConfig {
        &self.config
    }

    /// Build the request URL.
    ///
    /// The format is `{base_url}/{service}/v1/{profile}/{coordinates}` where
    /// coordinates are semicolon-separated `lon,lat` pairs in request order.
    fn build_url(&self, request: &RouteRequest) -> String {
        let coords = request
            .points()
            .iter()
            .map(|p| format!("{},{}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(";");
        let options = match self.config.service {
            OsrmService::Trip => "?source=first&destination=last&roundtrip=false&overview=false",
            OsrmService::Route => "?overview=false",
        };
        format!(
            "{}/{}/v1/{}/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.service.as_str(),
            self.config.profile,
            coords,
            options
        )
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?;

        response.json().await.map_err(|err| ProviderError::Parse {
            message: err.to_string(),
        })
    }

    async fn route_async(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
        let url = self.build_url(request);
        match self.config.service {
            OsrmService::Trip => {
                let response: TripResponse = self.fetch(&url).await?;
                convert_trip(response, request.waypoints.len())
            }
            OsrmService::Route => {
                let response: RouteResponse = self.fetch(&url).await?;
                convert_route(response)
            }
        }
    }

    /// Convert a reqwest error to a `ProviderError`.
    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return ProviderError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        ProviderError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[expect(clippy::float_arithmetic, reason = "unit conversion")]
fn convert_legs(path: OsrmPath) -> Vec<RouteLeg> {
    path.legs
        .into_iter()
        .map(|leg| RouteLeg {
            distance_km: leg.distance / 1000.0,
            duration_minutes: leg.duration / 60.0,
        })
        .collect()
}

fn service_error(code: String, message: Option<String>) -> ProviderError {
    ProviderError::Service {
        code,
        message: message.unwrap_or_default(),
    }
}

/// Convert a Trip response for a request with `waypoint_count` pickups.
///
/// Inputs are origin, pickups, destination. The pickup order is recovered
/// by sorting pickups on their position within the trip.
fn convert_trip(
    response: TripResponse,
    waypoint_count: usize,
) -> Result<ProviderRoute, ProviderError> {
    if !response.is_ok() {
        return Err(service_error(response.code, response.message));
    }
    let parse = |message: &str| ProviderError::Parse {
        message: message.to_owned(),
    };
    let trip = response
        .trips
        .into_iter()
        .next()
        .ok_or_else(|| parse("OSRM trip response has no trips"))?;
    if response.waypoints.len() != waypoint_count + 2 {
        return Err(parse("OSRM trip response lists the wrong number of waypoints"));
    }

    let mut pickups: Vec<(usize, usize)> = response
        .waypoints
        .iter()
        .skip(1)
        .take(waypoint_count)
        .enumerate()
        .map(|(input, wp)| (wp.waypoint_index, input))
        .collect();
    pickups.sort_unstable();

    Ok(ProviderRoute {
        legs: convert_legs(trip),
        waypoint_order: Some(pickups.into_iter().map(|(_, input)| input).collect()),
    })
}

fn convert_route(response: RouteResponse) -> Result<ProviderRoute, ProviderError> {
    if !response.is_ok() {
        return Err(service_error(response.code, response.message));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse {
            message: "OSRM route response has no routes".to_owned(),
        })?;
    Ok(ProviderRoute {
        legs: convert_legs(route),
        waypoint_order: None,
    })
}

impl RouteProvider for HttpRouteProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    /// Fetch a route for `request`.
    ///
    /// # Runtime requirements
    ///
    /// Outside Tokio the provider drives its own runtime. Inside a
    /// multi-threaded runtime it blocks in place. Inside a `current_thread`
    /// runtime blocking would panic, so the call fails with
    /// [`ProviderError::Network`] and the optimizer moves on.
    fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
        if self.config.base_url.trim().is_empty() {
            return Err(ProviderError::Unconfigured {
                provider: self.config.name.clone(),
            });
        }

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.route_async(request)))
            }
            Ok(_) => Err(ProviderError::Network {
                url: self.build_url(request),
                message: "cannot block inside a current-thread Tokio runtime".to_owned(),
            }),
            Err(_) => self.runtime.block_on(self.route_async(request)),
        }
    }
}
