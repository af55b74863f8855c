//! Dependency-free nearest-neighbour routing.

use geo::Coord;

use crate::cost::DEFAULT_AVERAGE_SPEED_KMH;
use crate::geometry::{haversine_km, travel_minutes};

use super::error::ProviderError;
use super::provider::{ProviderRoute, RouteLeg, RouteProvider, RouteRequest};

/// Name reported by [`NearestNeighbourProvider`].
pub const LOCAL_PROVIDER_NAME: &str = "local-nearest-neighbour";

/// Greedy visiting order starting at `start`.
///
/// Repeatedly moves to the closest unvisited point. Ties keep the earlier
/// index, so the order is deterministic.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use carpool_core::route::nearest_neighbour_order;
///
/// let start = Coord { x: 0.0, y: 0.0 };
/// let stops = [Coord { x: 0.0, y: 0.03 }, Coord { x: 0.0, y: 0.01 }];
/// assert_eq!(nearest_neighbour_order(start, &stops), vec![1, 0]);
/// ```
pub fn nearest_neighbour_order(start: Coord<f64>, points: &[Coord<f64>]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut order = Vec::with_capacity(points.len());
    let mut current = start;

    while !remaining.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (slot, &idx) in remaining.iter().enumerate() {
            let Some(point) = points.get(idx) else {
                continue;
            };
            let distance = haversine_km(current, *point);
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((slot, distance));
            }
        }
        let Some((slot, _)) = best else {
            break;
        };
        let idx = remaining.remove(slot);
        if let Some(point) = points.get(idx) {
            current = *point;
        }
        order.push(idx);
    }

    order
}

/// Local routing heuristic with no external dependencies.
///
/// Orders pickups by nearest neighbour from the origin, appends the
/// destination leg, and derives durations from a constant average speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestNeighbourProvider {
    average_speed_kmh: f64,
}

impl Default for NearestNeighbourProvider {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE_SPEED_KMH)
    }
}

impl NearestNeighbourProvider {
    /// Construct a provider assuming `average_speed_kmh`.
    pub const fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

impl RouteProvider for NearestNeighbourProvider {
    fn name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
        let all_finite = request
            .points()
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite());
        if !all_finite {
            return Err(ProviderError::Malformed {
                provider: LOCAL_PROVIDER_NAME.to_owned(),
                reason: "request contains non-finite coordinates".to_owned(),
            });
        }

        let order = nearest_neighbour_order(request.origin, &request.waypoints);
        let mut stops = Vec::with_capacity(order.len() + 2);
        stops.push(request.origin);
        stops.extend(order.iter().filter_map(|&i| request.waypoints.get(i).copied()));
        stops.push(request.destination);

        let legs = stops
            .windows(2)
            .filter_map(|pair| match pair {
                [from, to] => {
                    let distance_km = haversine_km(*from, *to);
                    Some(RouteLeg {
                        distance_km,
                        duration_minutes: travel_minutes(distance_km, self.average_speed_kmh),
                    })
                }
                _ => None,
            })
            .collect();

        Ok(ProviderRoute {
            legs,
            waypoint_order: Some(order),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::path_length_km;
    use rstest::rstest;

    fn request() -> RouteRequest {
        RouteRequest {
            origin: Coord { x: 0.0, y: 0.0 },
            destination: Coord { x: 0.0, y: 0.2 },
            waypoints: vec![
                Coord { x: 0.0, y: 0.05 },
                Coord { x: 0.0, y: 0.01 },
                Coord { x: 0.01, y: 0.03 },
            ],
        }
    }

    #[rstest]
    fn orders_by_nearest_unvisited_pickup() {
        let route = NearestNeighbourProvider::default()
            .route(&request())
            .expect("local route");
        assert_eq!(route.waypoint_order, Some(vec![1, 2, 0]));
        assert_eq!(route.legs.len(), 4);
    }

    #[rstest]
    fn legs_sum_to_path_length_including_destination() {
        let req = request();
        let route = NearestNeighbourProvider::default()
            .route(&req)
            .expect("local route");
        let ordered = [
            req.origin,
            req.waypoints[1],
            req.waypoints[2],
            req.waypoints[0],
            req.destination,
        ];
        let total: f64 = route.legs.iter().map(|l| l.distance_km).sum();
        assert!((total - path_length_km(&ordered)).abs() < 1e-9);
    }

    #[rstest]
    fn durations_follow_average_speed() {
        let route = NearestNeighbourProvider::new(30.0)
            .route(&request())
            .expect("local route");
        for leg in route.legs {
            assert!((leg.duration_minutes - leg.distance_km * 2.0).abs() < 1e-9);
        }
    }

    #[rstest]
    fn handles_no_waypoints() {
        let req = RouteRequest {
            waypoints: Vec::new(),
            ..request()
        };
        let route = NearestNeighbourProvider::default()
            .route(&req)
            .expect("local route");
        assert_eq!(route.legs.len(), 1);
        assert_eq!(route.waypoint_order, Some(Vec::new()));
    }

    #[rstest]
    fn rejects_non_finite_coordinates() {
        let req = RouteRequest {
            origin: Coord { x: f64::NAN, y: 0.0 },
            ..request()
        };
        assert!(NearestNeighbourProvider::default().route(&req).is_err());
    }
}
