//! Route provider trait and the request/response shapes it exchanges.

use geo::Coord;

use super::error::ProviderError;

/// A routing query from the driver's pickup, through rider pickups, to the
/// shared destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    /// Driver's pickup point.
    pub origin: Coord<f64>,
    /// Shared destination.
    pub destination: Coord<f64>,
    /// Rider pickups in the suggested visiting order.
    pub waypoints: Vec<Coord<f64>>,
}

impl RouteRequest {
    /// Every point in request order: origin, waypoints, destination.
    pub fn points(&self) -> Vec<Coord<f64>> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.origin);
        points.extend(self.waypoints.iter().copied());
        points.push(self.destination);
        points
    }
}

/// One leg between consecutive stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    /// Leg length in kilometres.
    pub distance_km: f64,
    /// Leg duration in minutes.
    pub duration_minutes: f64,
}

/// A provider's answer to a [`RouteRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    /// Legs in visiting order; one more than the number of waypoints.
    pub legs: Vec<RouteLeg>,
    /// Visiting order as indices into [`RouteRequest::waypoints`]. `None`
    /// keeps the request order.
    pub waypoint_order: Option<Vec<usize>>,
}

impl ProviderRoute {
    /// Check the route is consistent with a request of `waypoint_count`
    /// pickups.
    pub fn validate(&self, provider: &str, waypoint_count: usize) -> Result<(), ProviderError> {
        let malformed = |reason: String| ProviderError::Malformed {
            provider: provider.to_owned(),
            reason,
        };
        if self.legs.len() != waypoint_count + 1 {
            return Err(malformed(format!(
                "expected {} legs, got {}",
                waypoint_count + 1,
                self.legs.len()
            )));
        }
        let invalid_leg = self.legs.iter().any(|leg| {
            !leg.distance_km.is_finite()
                || !leg.duration_minutes.is_finite()
                || leg.distance_km < 0.0
                || leg.duration_minutes < 0.0
        });
        if invalid_leg {
            return Err(malformed("leg with negative or non-finite value".to_owned()));
        }
        if let Some(order) = &self.waypoint_order {
            let mut sorted = order.clone();
            sorted.sort_unstable();
            if sorted != (0..waypoint_count).collect::<Vec<_>>() {
                return Err(malformed(format!(
                    "waypoint order {order:?} is not a permutation of {waypoint_count} pickups"
                )));
            }
        }
        Ok(())
    }
}

/// Compute a route for a [`RouteRequest`].
///
/// Implementations may call remote services and must bound their latency.
/// Any failure is reported as a [`ProviderError`]; callers fall back to the
/// next provider.
///
/// # Examples
///
/// ```rust
/// use geo::Coord;
/// use carpool_core::route::{ProviderError, ProviderRoute, RouteLeg, RouteProvider, RouteRequest};
///
/// struct Straight;
///
/// impl RouteProvider for Straight {
///     fn name(&self) -> &str {
///         "straight"
///     }
///
///     fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
///         let leg = RouteLeg { distance_km: 1.0, duration_minutes: 2.0 };
///         Ok(ProviderRoute {
///             legs: vec![leg; request.waypoints.len() + 1],
///             waypoint_order: None,
///         })
///     }
/// }
///
/// let request = RouteRequest {
///     origin: Coord { x: 0.0, y: 0.0 },
///     destination: Coord { x: 0.0, y: 0.1 },
///     waypoints: vec![Coord { x: 0.0, y: 0.05 }],
/// };
/// let route = Straight.route(&request)?;
/// assert_eq!(route.legs.len(), 2);
/// # Ok::<(), ProviderError>(())
/// ```
pub trait RouteProvider: Send + Sync {
    /// Short name used in logs and in [`super::RouteResult::source`].
    fn name(&self) -> &str;

    /// Route `request`, returning legs in visiting order.
    fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError>;
}

impl<T: RouteProvider + ?Sized> RouteProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
        (**self).route(request)
    }
}
