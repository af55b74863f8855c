//! End-to-end matching for one opt-in and for a whole commute date.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};

use carpool_core::route::RouteOptimizer;
use carpool_core::{
    Clock, ConfidenceScorer, GroupScorer, MatchCandidate, Notifier, OptIn, OptInId, OptInStatus,
    RideId, RideStore, generate_groups, rank,
};

use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::lifecycle::RideLifecycle;

/// Why a match request produced no candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NoMatchReason {
    /// Nobody else is waiting on that date.
    NoOtherOptIns,
    /// Nobody else overlaps in time and distance.
    NoCompatibleOptIns,
    /// No group with a driver and a free seat includes the target.
    NoFeasibleGroup,
    /// Every group scored below the confidence floor.
    BelowMinimumConfidence,
}

impl NoMatchReason {
    /// Message shown to the person who asked.
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoOtherOptIns => "no other opt-ins available",
            Self::NoCompatibleOptIns => "no opt-ins overlap in time and distance",
            Self::NoFeasibleGroup => "no group with a driver and a free seat",
            Self::BelowMinimumConfidence => "no match met minimum confidence",
        }
    }
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Ranked candidates for one opt-in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatchOutcome {
    /// Target opt-in.
    pub opt_in_id: OptInId,
    /// Best candidates first.
    pub candidates: Vec<MatchCandidate>,
    /// Set when `candidates` is empty.
    pub reason: Option<NoMatchReason>,
}

impl MatchOutcome {
    fn empty(opt_in_id: OptInId, reason: NoMatchReason) -> Self {
        debug!("no match for opt-in {opt_in_id}: {reason}");
        Self {
            opt_in_id,
            candidates: Vec::new(),
            reason: Some(reason),
        }
    }
}

/// Options for [`Matcher::run_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Compute decisions without writing anything.
    pub dry_run: bool,
}

/// What the batch did with one candidate above the auto-create threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "snake_case"))]
pub enum BatchAction {
    /// A ride was persisted.
    Created {
        /// New ride.
        ride_id: RideId,
    },
    /// A dry run would have persisted a ride.
    WouldCreate,
    /// Persisting failed and was undone; the batch went on.
    Failed {
        /// Failure description.
        error: String,
    },
}

/// One batch decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BatchDecision {
    /// Opt-in whose matching produced the candidate.
    pub target: OptInId,
    /// Participants, driver first.
    pub opt_in_ids: Vec<OptInId>,
    /// Candidate score.
    pub confidence: u8,
    /// Outcome.
    pub action: BatchAction,
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BatchReport {
    /// Commute date processed.
    pub date: NaiveDate,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Opt-ins used as a matching target.
    pub opt_ins_considered: usize,
    /// Candidates returned across all targets.
    pub candidates_considered: usize,
    /// Decisions in the order they were taken.
    pub decisions: Vec<BatchDecision>,
    /// Rides persisted.
    pub rides_created: usize,
    /// Persistence and notification failures.
    pub errors: Vec<String>,
}

/// Finds candidates for opt-ins and turns the best into rides.
///
/// Collaborators are injected: a [`RideStore`], a [`Notifier`] and a
/// [`Clock`] through the [`RideLifecycle`], plus a [`RouteOptimizer`] and a
/// [`GroupScorer`].
///
/// # Examples
///
/// ```
/// use carpool_core::test_support::{
///     FixedClock, MemoryRideStore, OptInBuilder, RecordingNotifier, base_coord, offset_north,
/// };
/// use carpool_matcher::{MatchConfig, Matcher};
///
/// let store = MemoryRideStore::with_opt_ins([
///     OptInBuilder::rider(1, 1).window("08:00", "08:30").build(),
///     OptInBuilder::driver(2, 2, 4).window("08:10", "08:40").km_north(1.5).build(),
/// ]);
/// let config = MatchConfig::new(offset_north(base_coord(), 5.0));
/// let matcher = Matcher::new(store, RecordingNotifier::default(), FixedClock::default(), config);
///
/// let outcome = matcher.find_matches(1)?;
/// assert_eq!(outcome.candidates.len(), 1);
/// assert_eq!(outcome.candidates[0].score(), 75);
/// # Ok::<(), carpool_matcher::MatchError>(())
/// ```
pub struct Matcher<S, N, K> {
    lifecycle: RideLifecycle<S, N, K>,
    scorer: Box<dyn GroupScorer>,
    optimizer: RouteOptimizer,
    config: MatchConfig,
}

impl<S, N, K> fmt::Debug for Matcher<S, N, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("optimizer", &self.optimizer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, N, K> Matcher<S, N, K>
where
    S: RideStore,
    N: Notifier,
    K: Clock,
{
    /// Construct a matcher using the fixed-band scorer and the local
    /// route heuristic only.
    pub fn new(store: S, notifier: N, clock: K, config: MatchConfig) -> Self {
        let lifecycle = RideLifecycle::new(store, notifier, clock)
            .with_confirmation_window(config.confirmation_window);
        Self {
            lifecycle,
            scorer: Box::new(ConfidenceScorer::new(config.destination)),
            optimizer: RouteOptimizer::new(config.cost),
            config,
        }
    }

    /// Replace the route optimizer, typically one with HTTP providers.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: RouteOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Replace the group scorer.
    #[must_use]
    pub fn with_scorer<C>(mut self, scorer: C) -> Self
    where
        C: GroupScorer + 'static,
    {
        self.scorer = Box::new(scorer);
        self
    }

    /// The active configuration.
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// The ride lifecycle manager used to persist matches.
    pub const fn lifecycle(&self) -> &RideLifecycle<S, N, K> {
        &self.lifecycle
    }

    /// The underlying datastore.
    pub const fn store(&self) -> &S {
        self.lifecycle.store()
    }

    /// Find the best candidates for `opt_in_id` among pending opt-ins on
    /// the same date.
    ///
    /// An empty result is not an error; [`MatchOutcome::reason`] says why.
    ///
    /// # Errors
    ///
    /// Fails when the opt-in is unknown, no longer pending, or the store
    /// cannot be read.
    pub fn find_matches(&self, opt_in_id: OptInId) -> Result<MatchOutcome, MatchError> {
        let target = self
            .store()
            .opt_in(opt_in_id)?
            .ok_or(MatchError::OptInNotFound(opt_in_id))?;
        if target.status != OptInStatus::Pending {
            return Err(MatchError::NotPending {
                opt_in_id,
                status: target.status,
            });
        }
        let pool = self
            .store()
            .opt_ins_for_date(target.commute_date, OptInStatus::Pending)?;
        Ok(self.evaluate(&target, &pool, self.lifecycle.clock().now()))
    }

    /// Score and route every group containing `target` drawn from `pool`.
    fn evaluate(&self, target: &OptIn, pool: &[OptIn], now: DateTime<Utc>) -> MatchOutcome {
        if !pool.iter().any(|o| o.id != target.id) {
            return MatchOutcome::empty(target.id, NoMatchReason::NoOtherOptIns);
        }
        let compatible = self.config.filter.apply(target, pool);
        if compatible.is_empty() {
            return MatchOutcome::empty(target.id, NoMatchReason::NoCompatibleOptIns);
        }

        let mut members = Vec::with_capacity(compatible.len() + 1);
        members.push(target);
        members.extend(compatible);
        let clusters = self.config.cluster.cluster(&members);
        let groups: Vec<_> = clusters
            .iter()
            .filter(|cluster| cluster.iter().any(|o| o.id == target.id))
            .flat_map(|cluster| generate_groups(cluster))
            .filter(|group| group.contains(target.id))
            .collect();
        if groups.is_empty() {
            return MatchOutcome::empty(target.id, NoMatchReason::NoFeasibleGroup);
        }

        let mut candidates = Vec::new();
        for group in &groups {
            let breakdown = match self.scorer.score(group) {
                Ok(breakdown) => breakdown,
                Err(rejection) => {
                    debug!("group led by opt-in {} rejected: {rejection}", group.driver.id);
                    continue;
                }
            };
            if breakdown.score < self.config.min_confidence {
                debug!(
                    "group led by opt-in {} scored {} below {}",
                    group.driver.id, breakdown.score, self.config.min_confidence
                );
                continue;
            }
            match self.optimizer.optimize(group, self.config.destination, now) {
                Ok(route) => candidates.push(MatchCandidate::new(group, breakdown, route)),
                Err(err) => warn!("no route for group led by opt-in {}: {err}", group.driver.id),
            }
        }
        if candidates.is_empty() {
            return MatchOutcome::empty(target.id, NoMatchReason::BelowMinimumConfidence);
        }

        rank(&mut candidates);
        candidates.truncate(self.config.max_candidates);
        debug!(
            "opt-in {}: {} candidates, best {}",
            target.id,
            candidates.len(),
            candidates.first().map_or(0, MatchCandidate::score)
        );
        MatchOutcome {
            opt_in_id: target.id,
            candidates,
            reason: None,
        }
    }

    /// Match every pending opt-in on `date` and persist confident rides.
    ///
    /// Opt-ins are taken as targets in id order. A candidate becomes a ride
    /// when it scores above [`MatchConfig::auto_create_confidence`] and none
    /// of its participants were claimed earlier in this run; its
    /// participants are then claimed for the rest of the run. A failed ride
    /// creation is recorded and the run continues. Claims are local to this
    /// call and do not coordinate with concurrent runs.
    ///
    /// # Errors
    ///
    /// Fails only when the pending opt-ins cannot be loaded.
    pub fn run_batch(
        &self,
        date: NaiveDate,
        options: BatchOptions,
    ) -> Result<BatchReport, MatchError> {
        let pool = self.store().opt_ins_for_date(date, OptInStatus::Pending)?;
        let now = self.lifecycle.clock().now();
        let mut claimed: HashSet<OptInId> = HashSet::new();
        let mut report = BatchReport {
            date,
            dry_run: options.dry_run,
            opt_ins_considered: 0,
            candidates_considered: 0,
            decisions: Vec::new(),
            rides_created: 0,
            errors: Vec::new(),
        };
        info!(
            "batch for {date}: {} pending opt-ins{}",
            pool.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        for target in &pool {
            if claimed.contains(&target.id) {
                continue;
            }
            report.opt_ins_considered += 1;
            let available: Vec<OptIn> = pool
                .iter()
                .filter(|o| !claimed.contains(&o.id))
                .cloned()
                .collect();
            let outcome = self.evaluate(target, &available, now);
            report.candidates_considered += outcome.candidates.len();

            for candidate in &outcome.candidates {
                if candidate.score() <= self.config.auto_create_confidence {
                    break;
                }
                let ids = candidate.opt_in_ids();
                if ids.iter().any(|id| claimed.contains(id)) {
                    continue;
                }
                let action = self.persist(candidate, options, &mut report);
                let persisted = !matches!(action, BatchAction::Failed { .. });
                report.decisions.push(BatchDecision {
                    target: target.id,
                    opt_in_ids: ids.clone(),
                    confidence: candidate.score(),
                    action,
                });
                if persisted {
                    claimed.extend(ids);
                }
            }
        }

        info!(
            "batch for {date}: {} opt-ins considered, {} candidates, {} rides created, {} errors",
            report.opt_ins_considered,
            report.candidates_considered,
            report.rides_created,
            report.errors.len()
        );
        Ok(report)
    }

    fn persist(
        &self,
        candidate: &MatchCandidate,
        options: BatchOptions,
        report: &mut BatchReport,
    ) -> BatchAction {
        if options.dry_run {
            return BatchAction::WouldCreate;
        }
        match self.lifecycle.create_ride(candidate) {
            Ok(created) => {
                report.rides_created += 1;
                report.errors.extend(
                    created
                        .notification
                        .errors
                        .iter()
                        .map(|e| format!("ride {}: {e}", created.ride.id)),
                );
                BatchAction::Created {
                    ride_id: created.ride.id,
                }
            }
            Err(err) => {
                warn!("could not create ride led by opt-in {}: {err}", candidate.driver.id);
                report
                    .errors
                    .push(format!("opt-in {}: {err}", candidate.driver.id));
                BatchAction::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}
