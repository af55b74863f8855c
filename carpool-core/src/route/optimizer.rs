//! Provider fallback chain and route costing.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use geo::Coord;
use log::{debug, warn};

use crate::cost::CostModel;
use crate::{MatchGroup, OptIn, OptInId, UserId};

use super::error::ProviderError;
use super::local::{LOCAL_PROVIDER_NAME, NearestNeighbourProvider, nearest_neighbour_order};
use super::provider::{ProviderRoute, RouteProvider, RouteRequest};

/// What happens at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum StopKind {
    /// The driver sets off from their own pickup point.
    Start {
        /// Driver's opt-in.
        opt_in_id: OptInId,
    },
    /// A rider is collected.
    Pickup {
        /// Rider's opt-in.
        opt_in_id: OptInId,
    },
    /// Everyone arrives at the shared destination.
    Destination,
}

/// One stop of an ordered route.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStop {
    /// What happens here.
    pub kind: StopKind,
    /// Where it happens.
    pub coords: Coord<f64>,
}

/// Estimated pickup time for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticipantEta {
    /// Participant's opt-in.
    pub opt_in_id: OptInId,
    /// Participant's user.
    pub user_id: UserId,
    /// When the vehicle reaches their pickup.
    pub eta: DateTime<Utc>,
}

/// An ordered, costed route for one candidate group.
///
/// Recomputed for every candidate evaluation and never cached.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteResult {
    /// Start, pickups in visiting order, then the destination.
    pub ordered_waypoints: Vec<RouteStop>,
    /// Sum of all leg distances in kilometres.
    pub total_distance_km: f64,
    /// Sum of all leg durations in minutes.
    pub total_duration_minutes: f64,
    /// Discounted fare for the vehicle, in minor currency units.
    pub total_cost: f64,
    /// Rounded share per participant, in minor currency units.
    pub cost_per_person: u64,
    /// Pickup times, driver first.
    pub etas: Vec<ParticipantEta>,
    /// Arrival time at the destination.
    pub arrival: DateTime<Utc>,
    /// Name of the provider that produced the legs.
    pub source: String,
}

impl RouteResult {
    /// Opt-in ids in pickup order, driver first.
    pub fn pickup_order(&self) -> Vec<OptInId> {
        self.ordered_waypoints
            .iter()
            .filter_map(|stop| match stop.kind {
                StopKind::Start { opt_in_id } | StopKind::Pickup { opt_in_id } => Some(opt_in_id),
                StopKind::Destination => None,
            })
            .collect()
    }
}

/// Orders pickups through a chain of providers, ending with the local
/// heuristic.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use carpool_core::test_support::{OptInBuilder, base_coord, offset_north};
/// use carpool_core::route::{RouteOptimizer, LOCAL_PROVIDER_NAME};
/// use carpool_core::{CostModel, MatchGroup};
///
/// let driver = OptInBuilder::driver(1, 1, 3).build();
/// let rider = OptInBuilder::rider(2, 2).km_north(1.0).build();
/// let group = MatchGroup { driver: &driver, riders: vec![&rider] };
///
/// let optimizer = RouteOptimizer::new(CostModel::default());
/// let now = Utc.with_ymd_and_hms(2026, 10, 16, 7, 30, 0).unwrap();
/// let route = optimizer.optimize(&group, offset_north(base_coord(), 5.0), now)?;
/// assert_eq!(route.source, LOCAL_PROVIDER_NAME);
/// assert_eq!(route.pickup_order(), vec![1, 2]);
/// # Ok::<(), carpool_core::route::ProviderError>(())
/// ```
pub struct RouteOptimizer {
    providers: Vec<Box<dyn RouteProvider>>,
    fallback: NearestNeighbourProvider,
    cost: CostModel,
}

impl fmt::Debug for RouteOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptimizer")
            .field("providers", &self.provider_names())
            .field("cost", &self.cost)
            .finish()
    }
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self::new(CostModel::default())
    }
}

impl RouteOptimizer {
    /// Construct an optimizer that only uses the local heuristic.
    pub fn new(cost: CostModel) -> Self {
        Self {
            providers: Vec::new(),
            fallback: NearestNeighbourProvider::new(cost.average_speed_kmh),
            cost,
        }
    }

    /// Append an external provider; providers are tried in insertion order.
    #[must_use]
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: RouteProvider + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    /// Append an already boxed provider.
    pub fn push_provider(&mut self, provider: Box<dyn RouteProvider>) {
        self.providers.push(provider);
    }

    /// Provider names in the order they are tried, local heuristic last.
    pub fn provider_names(&self) -> Vec<&str> {
        self.chain().map(|provider| provider.name()).collect()
    }

    /// The fare model applied to every route.
    pub const fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    fn chain(&self) -> impl Iterator<Item = &dyn RouteProvider> {
        self.providers
            .iter()
            .map(|provider| &**provider)
            .chain(std::iter::once(&self.fallback as &dyn RouteProvider))
    }

    /// Order and cost the route for `group`, heading to `destination`.
    ///
    /// Riders are pre-ordered by nearest neighbour before any provider is
    /// asked, so providers that cannot reorder still receive a sensible
    /// sequence. An error is returned only when every provider, including
    /// the local heuristic, fails.
    pub fn optimize(
        &self,
        group: &MatchGroup<'_>,
        destination: Coord<f64>,
        evaluated_at: DateTime<Utc>,
    ) -> Result<RouteResult, ProviderError> {
        let rider_coords: Vec<_> = group.riders.iter().map(|r| r.coords()).collect();
        let riders: Vec<&OptIn> = nearest_neighbour_order(group.driver.coords(), &rider_coords)
            .into_iter()
            .filter_map(|i| group.riders.get(i).copied())
            .collect();
        let request = RouteRequest {
            origin: group.driver.coords(),
            destination,
            waypoints: riders.iter().map(|r| r.coords()).collect(),
        };

        let mut last_error = None;
        for provider in self.chain() {
            let outcome = provider.route(&request).and_then(|route| {
                route.validate(provider.name(), request.waypoints.len())?;
                Ok(route)
            });
            match outcome {
                Ok(route) => {
                    debug!(
                        "route for driver opt-in {} served by {}",
                        group.driver.id,
                        provider.name()
                    );
                    return Ok(self.assemble(
                        group,
                        &riders,
                        &request,
                        route,
                        provider.name(),
                        evaluated_at,
                    ));
                }
                Err(err) => {
                    warn!("route provider {} failed: {err}", provider.name());
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Unconfigured {
            provider: LOCAL_PROVIDER_NAME.to_owned(),
        }))
    }

    #[expect(clippy::float_arithmetic, reason = "leg durations accumulate as minutes")]
    fn assemble(
        &self,
        group: &MatchGroup<'_>,
        riders: &[&OptIn],
        request: &RouteRequest,
        route: ProviderRoute,
        source: &str,
        evaluated_at: DateTime<Utc>,
    ) -> RouteResult {
        let visiting: Vec<&OptIn> = match route.waypoint_order {
            Some(order) => order
                .into_iter()
                .filter_map(|i| riders.get(i).copied())
                .collect(),
            None => riders.to_vec(),
        };

        let mut ordered_waypoints = Vec::with_capacity(visiting.len() + 2);
        ordered_waypoints.push(RouteStop {
            kind: StopKind::Start {
                opt_in_id: group.driver.id,
            },
            coords: request.origin,
        });
        let mut etas = vec![ParticipantEta {
            opt_in_id: group.driver.id,
            user_id: group.driver.user_id,
            eta: evaluated_at,
        }];

        let mut elapsed_minutes = 0.0;
        for (rider, leg) in visiting.iter().zip(route.legs.iter()) {
            elapsed_minutes += leg.duration_minutes;
            ordered_waypoints.push(RouteStop {
                kind: StopKind::Pickup {
                    opt_in_id: rider.id,
                },
                coords: rider.coords(),
            });
            etas.push(ParticipantEta {
                opt_in_id: rider.id,
                user_id: rider.user_id,
                eta: evaluated_at + minutes_to_delta(elapsed_minutes),
            });
        }
        ordered_waypoints.push(RouteStop {
            kind: StopKind::Destination,
            coords: request.destination,
        });

        let total_distance_km: f64 = route.legs.iter().map(|leg| leg.distance_km).sum();
        let total_duration_minutes: f64 = route.legs.iter().map(|leg| leg.duration_minutes).sum();
        let fare = self
            .cost
            .quote(total_distance_km, total_duration_minutes, group.len());

        RouteResult {
            ordered_waypoints,
            total_distance_km,
            total_duration_minutes,
            total_cost: fare.total_cost,
            cost_per_person: fare.cost_per_person,
            etas,
            arrival: evaluated_at + minutes_to_delta(total_duration_minutes),
            source: source.to_owned(),
        }
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_possible_truncation,
    reason = "minutes are rounded to whole milliseconds"
)]
fn minutes_to_delta(minutes: f64) -> TimeDelta {
    let millis = (minutes * 60_000.0).round();
    if !millis.is_finite() {
        return TimeDelta::zero();
    }
    TimeDelta::try_milliseconds(millis as i64).unwrap_or_else(TimeDelta::zero)
}
