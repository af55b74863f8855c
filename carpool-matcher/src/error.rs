//! Error types for matching and the ride lifecycle.

use carpool_core::{
    OptInId, OptInStatus, ParticipantStatus, RideId, RideStatus, StoreError, UserId,
};
use thiserror::Error;

/// Errors from [`crate::RideLifecycle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The ride does not exist.
    #[error("ride {0} not found")]
    RideNotFound(RideId),
    /// The user has no place in the ride.
    #[error("user {user_id} is not a participant of ride {ride_id}")]
    NotParticipant {
        /// Ride looked up.
        ride_id: RideId,
        /// User that tried to respond.
        user_id: UserId,
    },
    /// The participant already left `PENDING_ACCEPTANCE`.
    #[error("user {user_id} already answered ride {ride_id} with {status}")]
    AlreadyResponded {
        /// Ride concerned.
        ride_id: RideId,
        /// Responding user.
        user_id: UserId,
        /// Status recorded earlier.
        status: ParticipantStatus,
    },
    /// The ride reached a terminal state.
    #[error("ride {ride_id} is already {status}")]
    RideClosed {
        /// Ride concerned.
        ride_id: RideId,
        /// Terminal status.
        status: RideStatus,
    },
    /// A candidate references an opt-in missing from the store.
    #[error("opt-in {0} not found")]
    OptInNotFound(OptInId),
    /// A candidate references an opt-in that is no longer pending.
    #[error("opt-in {opt_in_id} is {status}, expected PENDING")]
    OptInUnavailable {
        /// Opt-in concerned.
        opt_in_id: OptInId,
        /// Its current status.
        status: OptInStatus,
    },
    /// Ride creation failed part way; every write was undone.
    #[error("ride creation rolled back: {0}")]
    RolledBack(#[source] StoreError),
    /// Ride creation failed and undoing the ride row failed too.
    #[error("ride {ride_id} creation failed ({cause}) and could not be rolled back: {rollback}")]
    RollbackFailed {
        /// Ride left behind.
        ride_id: RideId,
        /// Write that failed first.
        cause: StoreError,
        /// Failure of the compensating delete.
        rollback: StoreError,
    },
    /// The answer was stored but re-aggregating the ride failed.
    ///
    /// The ride keeps its previous status until [`crate::RideLifecycle::aggregate`]
    /// runs again.
    #[error(
        "answer from user {user_id} to ride {ride_id} was recorded but the ride status was \
         not updated: {source}"
    )]
    Unsettled {
        /// Ride concerned.
        ride_id: RideId,
        /// User whose answer was stored.
        user_id: UserId,
        /// Failure raised after the answer was written.
        source: StoreError,
    },
    /// The datastore rejected a read or status write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from [`crate::Matcher`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The target opt-in does not exist.
    #[error("opt-in {0} not found")]
    OptInNotFound(OptInId),
    /// The target opt-in is no longer waiting to be matched.
    #[error("opt-in {opt_in_id} is {status}, only PENDING opt-ins are matched")]
    NotPending {
        /// Opt-in concerned.
        opt_in_id: OptInId,
        /// Its current status.
        status: OptInStatus,
    },
    /// Loading opt-ins failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
