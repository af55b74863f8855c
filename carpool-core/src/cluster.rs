//! Seed-relative location clustering.
//!
//! A single greedy pass picks the first unprocessed opt-in as a seed and
//! gathers every remaining unprocessed entry within the radius *of the
//! seed*. Membership is not transitive: an entry close to another member
//! but far from the seed starts, or joins, a later cluster instead.

use crate::OptIn;
use crate::geometry::haversine_km;

/// Default clustering radius around each seed, in kilometres.
pub const DEFAULT_MAX_CLUSTER_DISTANCE_KM: f64 = 5.0;

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterConfig {
    /// Radius around the seed within which entries join its cluster.
    pub max_cluster_distance_km: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_cluster_distance_km: DEFAULT_MAX_CLUSTER_DISTANCE_KM,
        }
    }
}

impl ClusterConfig {
    /// Partition `opt_ins` into disjoint clusters.
    ///
    /// Seeds are taken in input order, so callers place the target first to
    /// make it the seed of the first cluster. Every input appears in exactly
    /// one cluster.
    pub fn cluster<'a>(&self, opt_ins: &[&'a OptIn]) -> Vec<Vec<&'a OptIn>> {
        let mut processed = vec![false; opt_ins.len()];
        let mut clusters = Vec::new();

        for (seed_idx, seed) in opt_ins.iter().enumerate() {
            if processed.get(seed_idx).copied().unwrap_or(true) {
                continue;
            }
            let mut members = Vec::new();
            for (idx, candidate) in opt_ins.iter().enumerate().skip(seed_idx) {
                let Some(done) = processed.get_mut(idx) else {
                    continue;
                };
                if *done {
                    continue;
                }
                if idx == seed_idx
                    || haversine_km(seed.coords(), candidate.coords())
                        <= self.max_cluster_distance_km
                {
                    *done = true;
                    members.push(*candidate);
                }
            }
            clusters.push(members);
        }

        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::OptInBuilder;
    use rstest::rstest;

    fn ids(cluster: &[&OptIn]) -> Vec<u64> {
        cluster.iter().map(|o| o.id).collect()
    }

    #[rstest]
    fn groups_entries_near_the_seed() {
        let a = OptInBuilder::rider(1, 1).build();
        let b = OptInBuilder::rider(2, 2).km_north(2.0).build();
        let c = OptInBuilder::rider(3, 3).km_north(20.0).build();
        let clusters = ClusterConfig::default().cluster(&[&a, &b, &c]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec![1, 2]);
        assert_eq!(ids(&clusters[1]), vec![3]);
    }

    // Known limitation: membership is measured against the seed only, so a
    // chain of nearby pickups is split rather than merged.
    #[rstest]
    fn membership_is_not_transitive() {
        let seed = OptInBuilder::rider(1, 1).build();
        let middle = OptInBuilder::rider(2, 2).km_north(4.0).build();
        let outlier = OptInBuilder::rider(3, 3).km_north(8.0).build();
        let clusters = ClusterConfig::default().cluster(&[&seed, &middle, &outlier]);
        assert_eq!(ids(&clusters[0]), vec![1, 2]);
        assert_eq!(ids(&clusters[1]), vec![3]);
    }

    #[rstest]
    fn clusters_are_disjoint_and_complete() {
        let entries: Vec<_> = (0..8)
            .map(|i| OptInBuilder::rider(i, i).km_north(f64::from(i as u32) * 3.0).build())
            .collect();
        let refs: Vec<_> = entries.iter().collect();
        let clusters = ClusterConfig::default().cluster(&refs);
        let mut seen: Vec<u64> = clusters.iter().flat_map(|c| ids(c)).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[rstest]
    fn radius_is_configurable() {
        let a = OptInBuilder::rider(1, 1).build();
        let b = OptInBuilder::rider(2, 2).km_north(2.0).build();
        let config = ClusterConfig {
            max_cluster_distance_km: 1.0,
        };
        assert_eq!(config.cluster(&[&a, &b]).len(), 2);
    }

    #[rstest]
    fn empty_input_yields_no_clusters() {
        assert!(ClusterConfig::default().cluster(&[]).is_empty());
    }
}
