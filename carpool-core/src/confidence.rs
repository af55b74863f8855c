//! Deterministic compatibility scoring for candidate groups.
//!
//! The score starts at 50 and is adjusted by fixed bands for departure
//! overlap, pickup spread, seat utilisation and distance to the shared
//! destination, then clamped to `0..=100`. Acceptance (40) and automatic
//! ride creation (70) thresholds downstream are calibrated against these
//! exact bands.

use std::fmt;

use geo::Coord;
use thiserror::Error;

use crate::{MatchGroup, UserId};
use crate::geometry::{haversine_km, max_pairwise_km};

/// Starting score before adjustments.
pub const BASE_SCORE: i32 = 50;
/// Minimum pairwise overlap a group needs to be scored at all.
pub const MIN_GROUP_OVERLAP_MINUTES: u16 = 15;

/// Reasons a group is rejected before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Groups need exactly one driver.
    #[error("group has {0} drivers, expected exactly one")]
    DriverCount(usize),
    /// More riders than the driver offers seats.
    #[error("{riders} riders exceed capacity {capacity}")]
    OverCapacity {
        /// Riders in the group.
        riders: usize,
        /// Seats offered by the driver.
        capacity: usize,
    },
    /// One user would occupy two seats.
    #[error("user {0} appears more than once in the group")]
    DuplicateUser(UserId),
    /// Some pair of participants barely shares a departure window.
    #[error("minimum pairwise overlap {minutes} min is below {MIN_GROUP_OVERLAP_MINUTES} min")]
    InsufficientOverlap {
        /// Smallest pairwise overlap.
        minutes: u16,
    },
}

/// Score for a group together with the inputs and adjustments behind it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceBreakdown {
    /// Final score in `0..=100`.
    pub score: u8,
    /// Smallest pairwise window overlap in minutes.
    pub min_overlap_minutes: u16,
    /// Largest pairwise pickup distance in kilometres.
    pub max_spread_km: f64,
    /// Riders divided by capacity.
    pub utilisation: f64,
    /// Mean distance from each pickup to the destination.
    pub avg_destination_km: f64,
    /// Adjustment from the overlap band.
    pub overlap_bonus: i32,
    /// Adjustment from the spread band.
    pub distance_term: i32,
    /// Adjustment from seat utilisation.
    pub capacity_bonus: i32,
    /// Adjustment from destination proximity.
    pub destination_term: i32,
}

impl ConfidenceBreakdown {
    /// Human-readable explanation of the score, stored with each ride.
    pub fn reasoning(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfidenceBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "confidence {}: overlap {} min ({:+}), pickup spread {:.1} km ({:+}), \
             seat utilisation {:.0}% ({:+}), avg {:.1} km to destination ({:+})",
            self.score,
            self.min_overlap_minutes,
            self.overlap_bonus,
            self.max_spread_km,
            self.distance_term,
            self.utilisation * 100.0,
            self.capacity_bonus,
            self.avg_destination_km,
            self.destination_term,
        )
    }
}

/// Scores candidate groups.
///
/// Implementations must be deterministic and return scores in `0..=100`.
/// Alternative scorers plug in here without touching orchestration.
pub trait GroupScorer: Send + Sync {
    /// Score `group`, or explain why it cannot be scored.
    fn score(&self, group: &MatchGroup<'_>) -> Result<ConfidenceBreakdown, Rejection>;
}

/// The fixed-band scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScorer {
    destination: Coord<f64>,
}

impl ConfidenceScorer {
    /// Construct a scorer for rides heading to `destination`.
    pub const fn new(destination: Coord<f64>) -> Self {
        Self { destination }
    }

    /// The shared destination.
    pub const fn destination(&self) -> Coord<f64> {
        self.destination
    }
}

/// Smallest pairwise overlap across all participants; `u16::MAX` for one.
pub fn min_pairwise_overlap(group: &MatchGroup<'_>) -> u16 {
    let windows: Vec<_> = group.participants().map(|p| p.time_window).collect();
    windows
        .iter()
        .enumerate()
        .flat_map(|(i, a)| windows.iter().skip(i + 1).map(move |b| a.overlap_minutes(b)))
        .min()
        .unwrap_or(u16::MAX)
}

const fn overlap_bonus(minutes: u16) -> i32 {
    match minutes {
        60.. => 15,
        30..=59 => 10,
        _ => 0,
    }
}

fn distance_term(spread_km: f64) -> i32 {
    if spread_km < 2.0 {
        20
    } else if spread_km < 5.0 {
        10
    } else if spread_km <= 10.0 {
        0
    } else {
        -20
    }
}

fn capacity_bonus(utilisation: f64) -> i32 {
    if (0.5..=1.0).contains(&utilisation) {
        5
    } else {
        0
    }
}

fn destination_term(avg_km: f64) -> i32 {
    if avg_km < 10.0 {
        5
    } else if avg_km > 20.0 {
        -5
    } else {
        0
    }
}

impl GroupScorer for ConfidenceScorer {
    #[expect(
        clippy::float_arithmetic,
        reason = "utilisation and mean distances are ratios"
    )]
    fn score(&self, group: &MatchGroup<'_>) -> Result<ConfidenceBreakdown, Rejection> {
        let drivers = group.participants().filter(|p| p.is_driver()).count();
        if drivers != 1 {
            return Err(Rejection::DriverCount(drivers));
        }
        if let Some(user) = group.repeated_user() {
            return Err(Rejection::DuplicateUser(user));
        }
        let capacity = group.driver.capacity();
        let riders = group.riders.len();
        if riders > capacity {
            return Err(Rejection::OverCapacity { riders, capacity });
        }
        let min_overlap = min_pairwise_overlap(group);
        if min_overlap < MIN_GROUP_OVERLAP_MINUTES {
            return Err(Rejection::InsufficientOverlap {
                minutes: min_overlap,
            });
        }

        let pickups: Vec<Coord<f64>> = group.participants().map(|p| p.coords()).collect();
        let spread = max_pairwise_km(&pickups);
        let utilisation = ratio(riders, capacity);
        let avg_destination_km = pickups
            .iter()
            .map(|p| haversine_km(*p, self.destination))
            .sum::<f64>()
            / count_as_f64(pickups.len());

        let overlap = overlap_bonus(min_overlap);
        let distance = distance_term(spread);
        let seats = capacity_bonus(utilisation);
        let destination = destination_term(avg_destination_km);
        let raw = BASE_SCORE + overlap + distance + seats + destination;
        let score = u8::try_from(raw.clamp(0, 100)).unwrap_or(0);

        Ok(ConfidenceBreakdown {
            score,
            min_overlap_minutes: min_overlap,
            max_spread_km: spread,
            utilisation,
            avg_destination_km,
            overlap_bonus: overlap,
            distance_term: distance,
            capacity_bonus: seats,
            destination_term: destination,
        })
    }
}

#[expect(clippy::float_arithmetic, reason = "ratio of two counts")]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    count_as_f64(numerator) / count_as_f64(denominator)
}

fn count_as_f64(count: usize) -> f64 {
    f64::from(u32::try_from(count).unwrap_or(u32::MAX))
}
