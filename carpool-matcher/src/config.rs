//! Tunables for matching and ride creation.

use carpool_core::{CandidateFilter, ClusterConfig, CostModel};
use chrono::TimeDelta;
use geo::Coord;

/// Candidates scoring below this are never offered.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 40;
/// Batch runs only persist candidates scoring strictly above this.
pub const DEFAULT_AUTO_CREATE_CONFIDENCE: u8 = 70;
/// Interactive calls return at most this many candidates.
pub const DEFAULT_MAX_CANDIDATES: usize = 3;
/// Hours participants have to respond before the advisory deadline.
pub const DEFAULT_CONFIRMATION_HOURS: i64 = 24;

/// Configuration for [`crate::Matcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Shared destination every ride heads to.
    pub destination: Coord<f64>,
    /// Minimum score a candidate needs to be returned.
    pub min_confidence: u8,
    /// Score a batch candidate must exceed to become a ride.
    pub auto_create_confidence: u8,
    /// Cap on candidates returned by [`crate::Matcher::find_matches`].
    pub max_candidates: usize,
    /// Time from ride creation to the participants' confirmation deadline.
    pub confirmation_window: TimeDelta,
    /// Time and distance prefilter.
    pub filter: CandidateFilter,
    /// Pickup clustering.
    pub cluster: ClusterConfig,
    /// Fare model.
    pub cost: CostModel,
}

impl MatchConfig {
    /// Default settings for rides heading to `destination`.
    pub fn new(destination: Coord<f64>) -> Self {
        Self {
            destination,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            auto_create_confidence: DEFAULT_AUTO_CREATE_CONFIDENCE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            confirmation_window: TimeDelta::hours(DEFAULT_CONFIRMATION_HOURS),
            filter: CandidateFilter::default(),
            cluster: ClusterConfig::default(),
            cost: CostModel::default(),
        }
    }

    /// Set the minimum confidence for returned candidates.
    #[must_use]
    pub const fn with_min_confidence(mut self, score: u8) -> Self {
        self.min_confidence = score;
        self
    }

    /// Set the score batch candidates must exceed.
    #[must_use]
    pub const fn with_auto_create_confidence(mut self, score: u8) -> Self {
        self.auto_create_confidence = score;
        self
    }

    /// Set the candidate cap.
    #[must_use]
    pub const fn with_max_candidates(mut self, count: usize) -> Self {
        self.max_candidates = count;
        self
    }

    /// Set the confirmation window.
    #[must_use]
    pub const fn with_confirmation_window(mut self, window: TimeDelta) -> Self {
        self.confirmation_window = window;
        self
    }

    /// Replace the prefilter.
    #[must_use]
    pub const fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the clustering settings.
    #[must_use]
    pub const fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Replace the fare model.
    #[must_use]
    pub const fn with_cost(mut self, cost: CostModel) -> Self {
        self.cost = cost;
        self
    }
}
