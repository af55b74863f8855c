//! Datastore access for opt-ins, rides and participants.
//!
//! The matching core only needs simple record operations; it never relies
//! on cross-request transactions. Multi-record writes that must succeed
//! together are undone explicitly by the caller through
//! [`RideStore::delete_ride`].

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    NewParticipant, NewRide, OptIn, OptInId, OptInStatus, Participant, ParticipantStatus, Ride,
    RideId, RideStatus, UserId,
};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteRideStore, SqliteRideStoreError};

/// Failure reported by a [`RideStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: u64,
    },
    /// A stored record could not be decoded.
    #[error("{entity} {id} is malformed: {reason}")]
    InvalidRecord {
        /// Kind of record.
        entity: &'static str,
        /// Identifier of the record.
        id: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// The backend rejected the operation.
    #[error("{operation} failed: {message}")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Backend error text.
        message: String,
    },
}

impl StoreError {
    /// Shorthand for a backend failure.
    pub fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

/// Record-level access to opt-ins, rides and participants.
///
/// Every method takes `&self`; implementations synchronise internally so a
/// store can be shared by concurrent invocations.
///
/// # Examples
///
/// ```rust
/// use carpool_core::{OptInStatus, RideStore};
/// use carpool_core::test_support::{MemoryRideStore, OptInBuilder};
///
/// let store = MemoryRideStore::with_opt_ins([OptInBuilder::rider(1, 1).build()]);
/// store.set_opt_in_status(1, OptInStatus::Matched)?;
/// let opt_in = store.opt_in(1)?.expect("stored");
/// assert_eq!(opt_in.status, OptInStatus::Matched);
/// # Ok::<(), carpool_core::StoreError>(())
/// ```
pub trait RideStore: Send + Sync {
    /// Load one opt-in.
    fn opt_in(&self, id: OptInId) -> Result<Option<OptIn>, StoreError>;

    /// All opt-ins for `date` in `status`, ordered by id.
    fn opt_ins_for_date(
        &self,
        date: NaiveDate,
        status: OptInStatus,
    ) -> Result<Vec<OptIn>, StoreError>;

    /// Overwrite an opt-in's status.
    fn set_opt_in_status(&self, id: OptInId, status: OptInStatus) -> Result<(), StoreError>;

    /// Insert a ride in the `PROPOSED` state and return it with its id.
    fn insert_ride(&self, ride: &NewRide) -> Result<Ride, StoreError>;

    /// Insert participants for `ride_id`, all `PENDING_ACCEPTANCE`.
    fn insert_participants(
        &self,
        ride_id: RideId,
        participants: &[NewParticipant],
    ) -> Result<Vec<Participant>, StoreError>;

    /// Load one ride.
    fn ride(&self, id: RideId) -> Result<Option<Ride>, StoreError>;

    /// Participants of `ride_id`, in insertion order.
    fn participants(&self, ride_id: RideId) -> Result<Vec<Participant>, StoreError>;

    /// Overwrite one participant's status.
    fn set_participant_status(
        &self,
        ride_id: RideId,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), StoreError>;

    /// Overwrite a ride's status, recording `reason` on cancellation.
    fn set_ride_status(
        &self,
        ride_id: RideId,
        status: RideStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Delete a ride and its participants. Used only for rollback.
    fn delete_ride(&self, ride_id: RideId) -> Result<(), StoreError>;
}

impl<T: RideStore + ?Sized> RideStore for &T {
    fn opt_in(&self, id: OptInId) -> Result<Option<OptIn>, StoreError> {
        (**self).opt_in(id)
    }

    fn opt_ins_for_date(
        &self,
        date: NaiveDate,
        status: OptInStatus,
    ) -> Result<Vec<OptIn>, StoreError> {
        (**self).opt_ins_for_date(date, status)
    }

    fn set_opt_in_status(&self, id: OptInId, status: OptInStatus) -> Result<(), StoreError> {
        (**self).set_opt_in_status(id, status)
    }

    fn insert_ride(&self, ride: &NewRide) -> Result<Ride, StoreError> {
        (**self).insert_ride(ride)
    }

    fn insert_participants(
        &self,
        ride_id: RideId,
        participants: &[NewParticipant],
    ) -> Result<Vec<Participant>, StoreError> {
        (**self).insert_participants(ride_id, participants)
    }

    fn ride(&self, id: RideId) -> Result<Option<Ride>, StoreError> {
        (**self).ride(id)
    }

    fn participants(&self, ride_id: RideId) -> Result<Vec<Participant>, StoreError> {
        (**self).participants(ride_id)
    }

    fn set_participant_status(
        &self,
        ride_id: RideId,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), StoreError> {
        (**self).set_participant_status(ride_id, user_id, status)
    }

    fn set_ride_status(
        &self,
        ride_id: RideId,
        status: RideStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        (**self).set_ride_status(ride_id, status, reason)
    }

    fn delete_ride(&self, ride_id: RideId) -> Result<(), StoreError> {
        (**self).delete_ride(ride_id)
    }
}
