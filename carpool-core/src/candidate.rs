//! Scored, routed candidate groups.

use crate::route::RouteResult;
use crate::{ConfidenceBreakdown, MatchGroup, OptIn, OptInId};

/// A group that passed scoring, together with its route.
///
/// Candidates own copies of their opt-ins so they can outlive the pool they
/// were generated from. They are transient and never persisted directly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchCandidate {
    /// The single driver.
    pub driver: OptIn,
    /// Riders, in no particular order; see [`RouteResult::pickup_order`].
    pub riders: Vec<OptIn>,
    /// Score and its explanation.
    pub confidence: ConfidenceBreakdown,
    /// Ordered, costed route.
    pub route: RouteResult,
}

impl MatchCandidate {
    /// Build a candidate from a scored group.
    pub fn new(group: &MatchGroup<'_>, confidence: ConfidenceBreakdown, route: RouteResult) -> Self {
        Self {
            driver: group.driver.clone(),
            riders: group.riders.iter().map(|r| (*r).clone()).collect(),
            confidence,
            route,
        }
    }

    /// Confidence score in `0..=100`.
    pub const fn score(&self) -> u8 {
        self.confidence.score
    }

    /// Driver first, then riders.
    pub fn participants(&self) -> impl Iterator<Item = &OptIn> {
        std::iter::once(&self.driver).chain(self.riders.iter())
    }

    /// Opt-in ids of every participant, driver first.
    pub fn opt_in_ids(&self) -> Vec<OptInId> {
        self.participants().map(|p| p.id).collect()
    }

    /// Whether `opt_in_id` takes part.
    pub fn contains(&self, opt_in_id: OptInId) -> bool {
        self.participants().any(|p| p.id == opt_in_id)
    }
}

/// Sort candidates by descending score, keeping generation order on ties.
pub fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| b.score().cmp(&a.score()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteOptimizer;
    use crate::test_support::{OptInBuilder, base_coord, offset_north, sample_breakdown};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn candidate(score: u8, driver_id: OptInId) -> MatchCandidate {
        let driver = OptInBuilder::driver(driver_id, driver_id, 2).build();
        let rider = OptInBuilder::rider(100 + driver_id, 100 + driver_id)
            .km_north(1.0)
            .build();
        let group = MatchGroup {
            driver: &driver,
            riders: vec![&rider],
        };
        let now = Utc
            .with_ymd_and_hms(2026, 10, 16, 8, 0, 0)
            .single()
            .expect("valid timestamp");
        let route = RouteOptimizer::default()
            .optimize(&group, offset_north(base_coord(), 5.0), now)
            .expect("local route");
        MatchCandidate::new(&group, sample_breakdown(score), route)
    }

    #[rstest]
    fn ranking_is_stable_and_descending() {
        let mut candidates = vec![candidate(60, 1), candidate(80, 2), candidate(60, 3)];
        rank(&mut candidates);
        let order: Vec<_> = candidates.iter().map(|c| c.driver.id).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[rstest]
    fn participants_list_driver_first() {
        let c = candidate(50, 7);
        assert_eq!(c.opt_in_ids(), vec![7, 107]);
        assert!(c.contains(107));
        assert!(!c.contains(8));
    }
}
