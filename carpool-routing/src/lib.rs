//! HTTP route providers for the carpool engine.
//!
//! [`HttpRouteProvider`] implements [`carpool_core::route::RouteProvider`]
//! against an OSRM server. The primary provider uses the Trip service, which
//! optimises the pickup order between a fixed start and destination. The
//! secondary provider uses the Route service and follows the order it is
//! given. Both are meant to sit in front of the local heuristic in a
//! [`carpool_core::route::RouteOptimizer`].
//!
//! # Example
//!
//! ```no_run
//! use carpool_core::CostModel;
//! use carpool_core::route::RouteOptimizer;
//! use carpool_routing::HttpRouteProvider;
//!
//! let optimizer = RouteOptimizer::new(CostModel::default())
//!     .with_provider(HttpRouteProvider::primary("http://localhost:5000")?)
//!     .with_provider(HttpRouteProvider::secondary("http://localhost:5001")?);
//! assert_eq!(optimizer.provider_names().len(), 3);
//! # Ok::<(), carpool_routing::ProviderBuildError>(())
//! ```

#![forbid(unsafe_code)]

mod osrm;
mod provider;

pub use provider::{
    DEFAULT_PROFILE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, HttpRouteProvider,
    HttpRouteProviderConfig, OsrmService, ProviderBuildError,
};
