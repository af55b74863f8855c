//! Great-circle distances and travel-time estimates.
//!
//! All functions are pure. Coordinates are WGS84 with `x = longitude` and
//! `y = latitude`.

use geo::Coord;

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometres.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use carpool_core::geometry::haversine_km;
///
/// let a = Coord { x: 0.0, y: 0.0 };
/// let b = Coord { x: 0.0, y: 1.0 };
/// assert!((haversine_km(a, b) - 111.19).abs() < 0.01);
/// ```
#[expect(
    clippy::float_arithmetic,
    reason = "haversine is inherently floating-point"
)]
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
    let half_dlat = (lat2 - lat1) * 0.5;
    let half_dlng = (b.x - a.x).to_radians() * 0.5;
    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlng.sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Total length of a polyline through `points`, summing consecutive legs.
pub fn path_length_km(points: &[Coord<f64>]) -> f64 {
    points
        .windows(2)
        .filter_map(|pair| match pair {
            [from, to] => Some(haversine_km(*from, *to)),
            _ => None,
        })
        .sum()
}

/// Minutes needed to cover `distance_km` at a constant `speed_kmh`.
///
/// Non-positive speeds yield zero rather than infinity.
#[expect(
    clippy::float_arithmetic,
    reason = "duration is derived from distance and speed"
)]
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

/// Largest pairwise distance between any two points, in kilometres.
pub fn max_pairwise_km(points: &[Coord<f64>]) -> f64 {
    points
        .iter()
        .enumerate()
        .flat_map(|(i, a)| points.iter().skip(i + 1).map(move |b| haversine_km(*a, *b)))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn distance_is_zero_for_identical_points() {
        let p = Coord { x: 13.4, y: 52.5 };
        assert!(haversine_km(p, p).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(Coord { x: -0.1278, y: 51.5074 }, Coord { x: 2.3522, y: 48.8566 }, 343.5)]
    #[case(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }, 111.19)]
    fn distance_matches_known_pairs(
        #[case] a: Coord<f64>,
        #[case] b: Coord<f64>,
        #[case] expected: f64,
    ) {
        let d = haversine_km(a, b);
        assert!((d - expected).abs() < 0.5, "got {d}");
        assert!((haversine_km(b, a) - d).abs() < 1e-9);
    }

    #[rstest]
    fn path_length_sums_legs() {
        let points = [
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.0, y: 0.01 },
            Coord { x: 0.01, y: 0.01 },
        ];
        let expected = haversine_km(points[0], points[1]) + haversine_km(points[1], points[2]);
        assert!((path_length_km(&points) - expected).abs() < 1e-9);
        assert!(path_length_km(&points[..1]).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(25.0, 25.0, 60.0)]
    #[case(5.0, 25.0, 12.0)]
    #[case(5.0, 0.0, 0.0)]
    fn travel_minutes_uses_constant_speed(
        #[case] km: f64,
        #[case] speed: f64,
        #[case] expected: f64,
    ) {
        assert!((travel_minutes(km, speed) - expected).abs() < 1e-9);
    }

    #[rstest]
    fn max_pairwise_picks_widest_pair() {
        let points = [
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.0, y: 0.01 },
            Coord { x: 0.0, y: 0.05 },
        ];
        let widest = haversine_km(points[0], points[2]);
        assert!((max_pairwise_km(&points) - widest).abs() < 1e-9);
        assert!(max_pairwise_km(&points[..1]).abs() < f64::EPSILON);
    }
}
