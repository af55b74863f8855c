//! Cheap prefilter narrowing a same-date pool to plausible partners.
//!
//! Passing the filter is not a match decision: it only removes entries that
//! could never be grouped with the target.

use log::debug;

use crate::OptIn;
use crate::geometry::haversine_km;

/// Minimum shared departure time, in minutes.
pub const DEFAULT_MIN_OVERLAP_MINUTES: u16 = 15;
/// Maximum distance between pickups, in kilometres.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 15.0;

/// Time-overlap and distance prefilter.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use geo::Coord;
/// use carpool_core::{CandidateFilter, OptIn, PickupLocation, Role, TimeWindow};
///
/// # fn main() -> Result<(), carpool_core::OptInError> {
/// let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
/// let at = |id, x| PickupLocation::new(id, Coord { x, y: 51.5 }, "stop");
/// let target = OptIn::new(1, 10, date, TimeWindow::parse("08:00", "08:30")?, at(1, 0.0)?, Role::Rider, None)?;
/// let near = OptIn::new(2, 20, date, TimeWindow::parse("08:10", "08:40")?, at(2, 0.01)?, Role::Driver, Some(3))?;
/// let late = OptIn::new(3, 30, date, TimeWindow::parse("09:00", "09:30")?, at(3, 0.01)?, Role::Rider, None)?;
///
/// let pool = [near.clone(), late];
/// let kept = CandidateFilter::default().apply(&target, &pool);
/// assert_eq!(kept, vec![&near]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateFilter {
    /// Minimum overlap of departure windows.
    pub min_overlap_minutes: u16,
    /// Maximum haversine distance between pickups.
    pub max_distance_km: f64,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            min_overlap_minutes: DEFAULT_MIN_OVERLAP_MINUTES,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
        }
    }
}

impl CandidateFilter {
    /// Whether `candidate` could share a ride with `target`.
    ///
    /// Entries from the target's own user or another date never pass.
    pub fn accepts(&self, target: &OptIn, candidate: &OptIn) -> bool {
        if candidate.user_id == target.user_id || candidate.commute_date != target.commute_date {
            return false;
        }
        let overlap = target.time_window.overlap_minutes(&candidate.time_window);
        if overlap < self.min_overlap_minutes {
            debug!(
                "opt-in {} rejected for {}: overlap {overlap} min",
                candidate.id, target.id
            );
            return false;
        }
        let distance = haversine_km(target.coords(), candidate.coords());
        if distance > self.max_distance_km {
            debug!(
                "opt-in {} rejected for {}: pickups {distance:.2} km apart",
                candidate.id, target.id
            );
            return false;
        }
        true
    }

    /// Return the pool entries passing the filter, preserving pool order.
    pub fn apply<'a>(&self, target: &OptIn, pool: &'a [OptIn]) -> Vec<&'a OptIn> {
        pool.iter()
            .filter(|candidate| self.accepts(target, candidate))
            .collect()
    }
}
