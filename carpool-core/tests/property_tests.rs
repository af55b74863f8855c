//! Property-based tests for the matching primitives.
//!
//! # Invariants tested
//!
//! - **Overlap symmetry:** `overlap(a, b) == overlap(b, a)`, zero when disjoint.
//! - **Filter guarantees:** no accepted candidate overlaps the target by less
//!   than 15 minutes or sits more than 15 km away.
//! - **Group bounds:** every generated group has one driver and between one
//!   and `capacity` riders.
//! - **One seat per user:** no user appears twice in a generated group, even
//!   when users hold several opt-ins.
//! - **Score range:** confidence is always within `0..=100`.
//! - **Local routes:** total distance equals the haversine path length and the
//!   per-person share times the group size stays within rounding of the total.

use carpool_core::geometry::{haversine_km, path_length_km};
use carpool_core::route::RouteOptimizer;
use carpool_core::test_support::{
    FixedClock, OptInBuilder, base_coord, offset_east, offset_north,
};
use carpool_core::{
    CandidateFilter, Clock, ConfidenceScorer, GroupScorer, OptIn, TimeWindow, generate_groups,
};
use proptest::prelude::*;

fn window_strategy() -> impl Strategy<Value = (u16, u16)> {
    (0_u16..1400).prop_flat_map(|start| (Just(start), (start + 1)..=1440))
}

fn opt_in_strategy(id: u64) -> impl Strategy<Value = OptIn> {
    opt_in_for_user(id, id)
}

fn opt_in_for_user(id: u64, user: u64) -> impl Strategy<Value = OptIn> {
    (window_strategy(), 0.0_f64..25.0, 0.0_f64..25.0, any::<bool>(), 1_u8..=4).prop_map(
        move |((start, end), north, east, driver, seats)| {
            let builder = if driver {
                OptInBuilder::driver(id, user, seats)
            } else {
                OptInBuilder::rider(id, user)
            };
            let mut opt_in = builder.km_north(north).build();
            opt_in.pickup.coords = offset_east(opt_in.coords(), east);
            opt_in.time_window = TimeWindow::new(start, end).expect("strategy yields valid windows");
            opt_in
        },
    )
}

fn pool_strategy(max: u64) -> impl Strategy<Value = Vec<OptIn>> {
    (1..=max).prop_flat_map(|len| (1..=len).map(opt_in_strategy).collect::<Vec<_>>())
}

/// Pools where users frequently hold more than one opt-in.
fn shared_user_pool_strategy(max: u64) -> impl Strategy<Value = Vec<OptIn>> {
    (1..=max).prop_flat_map(|len| {
        (1..=len)
            .map(|id| (1_u64..=3).prop_flat_map(move |user| opt_in_for_user(id, user)))
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn overlap_is_symmetric(a in window_strategy(), b in window_strategy()) {
        let wa = TimeWindow::new(a.0, a.1).expect("valid");
        let wb = TimeWindow::new(b.0, b.1).expect("valid");
        prop_assert_eq!(wa.overlap_minutes(&wb), wb.overlap_minutes(&wa));
        if a.1 <= b.0 || b.1 <= a.0 {
            prop_assert_eq!(wa.overlap_minutes(&wb), 0);
        }
    }

    #[test]
    fn filter_never_returns_distant_or_brief_overlaps(
        target in opt_in_strategy(0),
        pool in pool_strategy(12),
    ) {
        for candidate in CandidateFilter::default().apply(&target, &pool) {
            prop_assert!(target.time_window.overlap_minutes(&candidate.time_window) >= 15);
            prop_assert!(haversine_km(target.coords(), candidate.coords()) <= 15.0);
            prop_assert_ne!(candidate.user_id, target.user_id);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn groups_have_one_driver_within_capacity(pool in pool_strategy(7)) {
        let cluster: Vec<&OptIn> = pool.iter().collect();
        for group in generate_groups(&cluster) {
            prop_assert!(group.driver.is_driver());
            prop_assert!(group.riders.iter().all(|r| !r.is_driver()));
            prop_assert!(!group.riders.is_empty());
            prop_assert!(group.riders.len() <= group.driver.capacity());
        }
    }

    #[test]
    fn users_hold_one_seat_per_group(pool in shared_user_pool_strategy(7)) {
        let cluster: Vec<&OptIn> = pool.iter().collect();
        for group in generate_groups(&cluster) {
            let mut users: Vec<u64> = group.participants().map(|p| p.user_id).collect();
            let seats = users.len();
            users.sort_unstable();
            users.dedup();
            prop_assert_eq!(users.len(), seats);
        }
    }

    #[test]
    fn confidence_stays_in_range(pool in pool_strategy(6), dest_km in 0.0_f64..60.0) {
        let scorer = ConfidenceScorer::new(offset_north(base_coord(), dest_km));
        let cluster: Vec<&OptIn> = pool.iter().collect();
        for group in generate_groups(&cluster) {
            if let Ok(breakdown) = scorer.score(&group) {
                prop_assert!(breakdown.score <= 100);
                prop_assert!(breakdown.min_overlap_minutes >= 15);
            }
        }
    }

    #[test]
    fn local_route_matches_path_length(pool in pool_strategy(5), dest_km in 0.0_f64..30.0) {
        let cluster: Vec<&OptIn> = pool.iter().collect();
        let optimizer = RouteOptimizer::default();
        let now = FixedClock::default().now();
        for group in generate_groups(&cluster) {
            let route = optimizer
                .optimize(&group, offset_north(base_coord(), dest_km), now)
                .expect("local heuristic always succeeds");
            let coords: Vec<_> = route.ordered_waypoints.iter().map(|s| s.coords).collect();
            prop_assert!((route.total_distance_km - path_length_km(&coords)).abs() < 1e-6);
            prop_assert_eq!(route.pickup_order().len(), group.len());

            let people = f64::from(u32::try_from(group.len()).unwrap_or(u32::MAX));
            #[expect(clippy::cast_precision_loss, reason = "fares are small")]
            let shares = route.cost_per_person as f64 * people;
            prop_assert!((shares - route.total_cost).abs() <= people * 0.5 + 1e-9);
        }
    }
}
