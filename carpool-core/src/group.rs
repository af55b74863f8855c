//! Enumerate feasible driver + riders groupings within a cluster.
//!
//! Every driver is paired with every non-empty subset of the cluster's
//! riders whose size fits the driver's capacity. All bounded subsets are
//! produced, not only maximal ones, so the scorer can prefer a smaller
//! tighter group over a larger looser one. A user appears at most once per
//! group, even when they hold several opt-ins on the same date.

use std::collections::HashSet;

use crate::{OptIn, OptInId, UserId};

/// One driver and the riders they would carry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchGroup<'a> {
    /// The single driver.
    pub driver: &'a OptIn,
    /// Riders in cluster order.
    pub riders: Vec<&'a OptIn>,
}

impl<'a> MatchGroup<'a> {
    /// Iterate over the driver followed by the riders.
    pub fn participants(&self) -> impl Iterator<Item = &'a OptIn> + '_ {
        std::iter::once(self.driver).chain(self.riders.iter().copied())
    }

    /// Number of people in the vehicle, driver included.
    pub fn len(&self) -> usize {
        self.riders.len() + 1
    }

    /// Groups always contain a driver, so this is always `false`.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `opt_in_id` takes part in the group.
    pub fn contains(&self, opt_in_id: OptInId) -> bool {
        self.participants().any(|p| p.id == opt_in_id)
    }

    /// First user holding more than one seat in the group, if any.
    #[must_use]
    pub fn repeated_user(&self) -> Option<UserId> {
        let mut seen = HashSet::with_capacity(self.len());
        self.participants()
            .map(|p| p.user_id)
            .find(|user| !seen.insert(*user))
    }
}

/// Enumerate every `(driver, riders)` combination in `cluster`.
///
/// Riders are every non-driver entry; subsets range in size from one to
/// `min(rider_count, capacity)`. Combinations that would seat the same user
/// twice are skipped. A cluster without drivers yields nothing.
///
/// # Examples
/// ```
/// use carpool_core::generate_groups;
/// use carpool_core::test_support::OptInBuilder;
///
/// let driver = OptInBuilder::driver(1, 1, 2).build();
/// let riders: Vec<_> = (2..5).map(|id| OptInBuilder::rider(id, id).build()).collect();
/// let mut cluster = vec![&driver];
/// cluster.extend(riders.iter());
///
/// let groups = generate_groups(&cluster);
/// assert_eq!(groups.len(), 6); // C(3,1) + C(3,2)
/// assert!(groups.iter().all(|g| g.riders.len() <= 2));
/// ```
pub fn generate_groups<'a>(cluster: &[&'a OptIn]) -> Vec<MatchGroup<'a>> {
    let (drivers, riders): (Vec<&'a OptIn>, Vec<&'a OptIn>) =
        cluster.iter().copied().partition(|o| o.is_driver());

    let mut groups = Vec::new();
    for driver in drivers {
        let max_size = riders.len().min(driver.capacity());
        for size in 1..=max_size {
            groups.extend(
                combinations(&riders, size)
                    .into_iter()
                    .map(|subset| MatchGroup {
                        driver,
                        riders: subset,
                    })
                    .filter(|group| group.repeated_user().is_none()),
            );
        }
    }
    groups
}

/// All `size`-element subsets of `items`, in lexicographic index order.
fn combinations<'a>(items: &[&'a OptIn], size: usize) -> Vec<Vec<&'a OptIn>> {
    let n = items.len();
    if size == 0 || size > n {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (0..size).collect();
    let mut out = Vec::new();
    loop {
        out.push(
            indices
                .iter()
                .filter_map(|&i| items.get(i).copied())
                .collect(),
        );
        // Find the rightmost index that can still advance.
        let Some(pos) = (0..size).rev().find(|&pos| {
            indices
                .get(pos)
                .is_some_and(|&value| value < n - size + pos)
        }) else {
            break;
        };
        if let Some(value) = indices.get_mut(pos) {
            *value += 1;
        }
        for next in pos + 1..size {
            let prev = indices.get(next - 1).copied().unwrap_or(0);
            if let Some(value) = indices.get_mut(next) {
                *value = prev + 1;
            }
        }
    }
    out
}
