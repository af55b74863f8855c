//! Core domain model and matching primitives for the carpool engine.
//!
//! The pipeline for one target opt-in is: [`CandidateFilter`] narrows the
//! pending pool, [`ClusterConfig`] groups nearby pickups, [`generate_groups`]
//! enumerates feasible driver and rider combinations, a [`GroupScorer`]
//! rates each group, and [`route::RouteOptimizer`] orders and costs the
//! pickups. Orchestration and persistence workflows live in
//! `carpool-matcher`; this crate only defines the pieces and the
//! [`RideStore`], [`Notifier`] and [`Clock`] seams they talk through.
//!
//! Constructors validate their input and return `Result`.

#![forbid(unsafe_code)]

mod candidate;
mod clock;
mod cluster;
mod confidence;
mod cost;
mod filter;
pub mod geometry;
mod group;
mod notify;
mod opt_in;
mod ride;
pub mod route;
pub mod store;

#[doc(hidden)]
pub mod test_support;

pub use candidate::{MatchCandidate, rank};
pub use clock::{Clock, SystemClock};
pub use cluster::{ClusterConfig, DEFAULT_MAX_CLUSTER_DISTANCE_KM};
pub use confidence::{
    BASE_SCORE, ConfidenceBreakdown, ConfidenceScorer, GroupScorer, MIN_GROUP_OVERLAP_MINUTES,
    Rejection, min_pairwise_overlap,
};
pub use cost::{CostModel, DEFAULT_AVERAGE_SPEED_KMH, FareQuote};
pub use filter::{CandidateFilter, DEFAULT_MAX_DISTANCE_KM, DEFAULT_MIN_OVERLAP_MINUTES};
pub use group::{MatchGroup, generate_groups};
pub use notify::{LogNotifier, NotificationReport, Notifier};
pub use opt_in::{
    LocationId, MINUTES_PER_DAY, OptIn, OptInError, OptInId, OptInStatus, PickupLocation, Role,
    TimeWindow, UserId,
};
pub use ride::{
    NewParticipant, NewRide, Participant, ParticipantStatus, Ride, RideEvent, RideId, RideStatus,
    UnknownStatus, aggregate_status,
};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteRideStore, SqliteRideStoreError};
pub use store::{RideStore, StoreError};
