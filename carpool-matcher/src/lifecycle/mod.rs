//! Persisting matches as rides and driving their confirmation state machine.
//!
//! A ride starts `PROPOSED` with every participant `PENDING_ACCEPTANCE`.
//! After each participant write the ride status is recomputed with
//! [`aggregate_status`]: one decline cancels it, unanimous confirmation
//! confirms it, anything else leaves it proposed. Notification failures are
//! reported in the returned values and never undo a transition.

use chrono::TimeDelta;
use log::{info, warn};

use carpool_core::{
    Clock, MatchCandidate, NewParticipant, NewRide, NotificationReport, Notifier, OptInId,
    OptInStatus, Participant, ParticipantStatus, Ride, RideEvent, RideId, RideStatus, RideStore,
    StoreError, UserId, aggregate_status,
};

use crate::config::DEFAULT_CONFIRMATION_HOURS;
use crate::error::LifecycleError;

/// A participant's answer to a proposed ride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantResponse {
    /// Accept the ride.
    Confirm,
    /// Refuse the ride, optionally saying why.
    Decline {
        /// Free-text reason recorded on the cancelled ride.
        reason: Option<String>,
    },
}

/// A freshly persisted ride.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CreatedRide {
    /// The stored ride.
    pub ride: Ride,
    /// Its participants, driver first.
    pub participants: Vec<Participant>,
    /// Outcome of the match notification.
    pub notification: NotificationReport,
}

/// State of a ride after a participant write or re-aggregation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RideUpdate {
    /// The ride as it now stands.
    pub ride: Ride,
    /// Its participants.
    pub participants: Vec<Participant>,
    /// New ride status, when this call changed it.
    pub transition: Option<RideStatus>,
    /// Outcome of the notification sent for the transition.
    pub notification: NotificationReport,
    /// Opt-in status writes that failed after the transition.
    pub errors: Vec<String>,
}

/// Creates rides from match candidates and applies participant responses.
#[derive(Debug)]
pub struct RideLifecycle<S, N, K> {
    store: S,
    notifier: N,
    clock: K,
    confirmation_window: TimeDelta,
}

impl<S, N, K> RideLifecycle<S, N, K>
where
    S: RideStore,
    N: Notifier,
    K: Clock,
{
    /// Construct a lifecycle manager with a 24 hour confirmation window.
    pub fn new(store: S, notifier: N, clock: K) -> Self {
        Self {
            store,
            notifier,
            clock,
            confirmation_window: TimeDelta::hours(DEFAULT_CONFIRMATION_HOURS),
        }
    }

    /// Set the time participants get before their advisory deadline.
    #[must_use]
    pub const fn with_confirmation_window(mut self, window: TimeDelta) -> Self {
        self.confirmation_window = window;
        self
    }

    /// The underlying datastore.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The notifier told about ride events.
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The clock stamping rides and deadlines.
    pub const fn clock(&self) -> &K {
        &self.clock
    }

    /// Persist `candidate` as a proposed ride and mark its opt-ins matched.
    ///
    /// The ride row, the participant rows and the opt-in status flips form
    /// one logical write. When a later step fails the earlier ones are
    /// undone, so no ride is left without participants and no opt-in stays
    /// `MATCHED` for a ride that does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::OptInUnavailable`] when a participant was
    /// matched elsewhere since the candidate was computed, and
    /// [`LifecycleError::RolledBack`] when a write failed and was undone.
    pub fn create_ride(&self, candidate: &MatchCandidate) -> Result<CreatedRide, LifecycleError> {
        self.ensure_pending(candidate)?;

        let now = self.clock.now();
        let new_ride = NewRide {
            commute_date: candidate.driver.commute_date,
            driver_id: candidate.driver.user_id,
            cost_per_person: candidate.route.cost_per_person,
            total_duration_minutes: candidate.route.total_duration_minutes,
            pickup_order: candidate.route.pickup_order(),
            confidence: candidate.score(),
            reasoning: candidate.confidence.reasoning(),
            created_at: now,
        };
        let ride = self.store.insert_ride(&new_ride)?;

        let deadline = now + self.confirmation_window;
        let rows: Vec<NewParticipant> = candidate
            .participants()
            .map(|opt_in| NewParticipant {
                user_id: opt_in.user_id,
                opt_in_id: opt_in.id,
                pickup_location_id: opt_in.pickup.id,
                confirmation_deadline: deadline,
            })
            .collect();
        let participants = match self.store.insert_participants(ride.id, &rows) {
            Ok(participants) => participants,
            Err(err) => return Err(self.roll_back(ride.id, err, &[])),
        };

        let mut flipped = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Err(err) = self
                .store
                .set_opt_in_status(row.opt_in_id, OptInStatus::Matched)
            {
                return Err(self.roll_back(ride.id, err, &flipped));
            }
            flipped.push(row.opt_in_id);
        }

        info!(
            "created ride {} for {} participants (confidence {})",
            ride.id,
            participants.len(),
            ride.confidence
        );
        let notification = self.send(ride.id, RideEvent::Match, None);
        Ok(CreatedRide {
            ride,
            participants,
            notification,
        })
    }

    fn ensure_pending(&self, candidate: &MatchCandidate) -> Result<(), LifecycleError> {
        for id in candidate.opt_in_ids() {
            let opt_in = self
                .store
                .opt_in(id)?
                .ok_or(LifecycleError::OptInNotFound(id))?;
            if opt_in.status != OptInStatus::Pending {
                return Err(LifecycleError::OptInUnavailable {
                    opt_in_id: id,
                    status: opt_in.status,
                });
            }
        }
        Ok(())
    }

    /// Undo a partially created ride and describe what happened.
    fn roll_back(&self, ride_id: RideId, cause: StoreError, flipped: &[OptInId]) -> LifecycleError {
        warn!("rolling back ride {ride_id}: {cause}");
        for &id in flipped {
            if let Err(err) = self.store.set_opt_in_status(id, OptInStatus::Pending) {
                warn!("could not return opt-in {id} to PENDING: {err}");
            }
        }
        match self.store.delete_ride(ride_id) {
            Ok(()) => LifecycleError::RolledBack(cause),
            Err(rollback) => LifecycleError::RollbackFailed {
                ride_id,
                cause,
                rollback,
            },
        }
    }

    /// Record `user_id`'s response and re-aggregate the ride.
    ///
    /// # Errors
    ///
    /// Fails when the ride is unknown or closed, the user is not a
    /// participant, the participant already answered, or the store rejects
    /// the write. A failure after the answer was stored is reported as
    /// [`LifecycleError::Unsettled`]; the answer stands and a later
    /// [`Self::aggregate`] settles the ride.
    pub fn respond(
        &self,
        ride_id: RideId,
        user_id: UserId,
        response: ParticipantResponse,
    ) -> Result<RideUpdate, LifecycleError> {
        let (status, reason) = match response {
            ParticipantResponse::Confirm => (ParticipantStatus::Confirmed, None),
            ParticipantResponse::Decline { reason } => (
                ParticipantStatus::Declined,
                Some(reason.unwrap_or_else(|| format!("user {user_id} declined"))),
            ),
        };
        self.record(ride_id, user_id, status, reason)
    }

    /// Record that `user_id` let the confirmation deadline pass.
    ///
    /// Called by the external deadline scheduler. A non-response neither
    /// confirms nor cancels, so the ride stays proposed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::respond`].
    pub fn mark_no_response(
        &self,
        ride_id: RideId,
        user_id: UserId,
    ) -> Result<RideUpdate, LifecycleError> {
        self.record(ride_id, user_id, ParticipantStatus::NoResponse, None)
    }

    /// Recompute the ride status from its participants.
    ///
    /// # Errors
    ///
    /// Fails when the ride is unknown or the store rejects a read or write.
    pub fn aggregate(&self, ride_id: RideId) -> Result<RideUpdate, LifecycleError> {
        let ride = self.load(ride_id)?;
        self.settle(ride, None)
    }

    fn load(&self, ride_id: RideId) -> Result<Ride, LifecycleError> {
        self.store
            .ride(ride_id)?
            .ok_or(LifecycleError::RideNotFound(ride_id))
    }

    fn record(
        &self,
        ride_id: RideId,
        user_id: UserId,
        status: ParticipantStatus,
        reason: Option<String>,
    ) -> Result<RideUpdate, LifecycleError> {
        let ride = self.load(ride_id)?;
        if ride.status.is_terminal() {
            return Err(LifecycleError::RideClosed {
                ride_id,
                status: ride.status,
            });
        }
        let participant = self
            .store
            .participants(ride_id)?
            .into_iter()
            .find(|p| p.user_id == user_id)
            .ok_or(LifecycleError::NotParticipant { ride_id, user_id })?;
        if participant.status != ParticipantStatus::PendingAcceptance {
            return Err(LifecycleError::AlreadyResponded {
                ride_id,
                user_id,
                status: participant.status,
            });
        }

        self.store.set_participant_status(ride_id, user_id, status)?;
        info!("user {user_id} answered ride {ride_id} with {status}");
        self.settle(ride, reason).map_err(|err| match err {
            LifecycleError::Store(source) => {
                warn!("ride {ride_id} left unsettled after user {user_id} answered: {source}");
                LifecycleError::Unsettled {
                    ride_id,
                    user_id,
                    source,
                }
            }
            other => other,
        })
    }

    fn settle(&self, mut ride: Ride, reason: Option<String>) -> Result<RideUpdate, LifecycleError> {
        let participants = self.store.participants(ride.id)?;
        let statuses: Vec<ParticipantStatus> = participants.iter().map(|p| p.status).collect();
        let transition = if ride.status.is_terminal() {
            None
        } else {
            aggregate_status(&statuses)
        };

        let mut update = RideUpdate {
            ride: ride.clone(),
            participants,
            transition,
            notification: NotificationReport::default(),
            errors: Vec::new(),
        };
        let Some(status) = transition else {
            return Ok(update);
        };

        let reason = match status {
            RideStatus::Cancelled => {
                Some(reason.unwrap_or_else(|| "a participant declined".to_owned()))
            }
            RideStatus::Confirmed | RideStatus::Proposed => None,
        };
        self.store
            .set_ride_status(ride.id, status, reason.as_deref())?;
        info!("ride {} is now {status}", ride.id);
        ride.status = status;
        if reason.is_some() {
            ride.cancellation_reason.clone_from(&reason);
        }

        let event = match status {
            RideStatus::Cancelled => {
                update.errors = self.release_opt_ins(&update.participants);
                RideEvent::Cancellation
            }
            RideStatus::Confirmed | RideStatus::Proposed => RideEvent::Confirmation,
        };
        update.notification = self.send(ride.id, event, reason.as_deref());
        update.ride = ride;
        Ok(update)
    }

    /// Cancel decliners' opt-ins and return everyone else to the pool.
    fn release_opt_ins(&self, participants: &[Participant]) -> Vec<String> {
        participants
            .iter()
            .filter_map(|p| {
                let status = if p.status == ParticipantStatus::Declined {
                    OptInStatus::Cancelled
                } else {
                    OptInStatus::Pending
                };
                self.store
                    .set_opt_in_status(p.opt_in_id, status)
                    .err()
                    .map(|err| {
                        warn!("could not set opt-in {} to {status}: {err}", p.opt_in_id);
                        format!("opt-in {}: {err}", p.opt_in_id)
                    })
            })
            .collect()
    }

    fn send(&self, ride_id: RideId, event: RideEvent, reason: Option<&str>) -> NotificationReport {
        let report = self.notifier.notify(ride_id, event, reason);
        for error in &report.errors {
            warn!("{event} notification for ride {ride_id} failed: {error}");
        }
        report
    }
}
