//! Pickup ordering and route costing.
//!
//! A [`RouteProvider`] turns an origin, a destination and intermediate
//! pickups into legs, optionally reordering the pickups. The
//! [`RouteOptimizer`] tries an ordered chain of providers and always ends
//! with the local [`NearestNeighbourProvider`], so a candidate never loses
//! its route because external services are unavailable.

mod error;
mod local;
mod optimizer;
mod provider;

pub use error::ProviderError;
pub use local::{LOCAL_PROVIDER_NAME, NearestNeighbourProvider, nearest_neighbour_order};
pub use optimizer::{ParticipantEta, RouteOptimizer, RouteResult, RouteStop, StopKind};
pub use provider::{ProviderRoute, RouteLeg, RouteProvider, RouteRequest};
