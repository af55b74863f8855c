//! Facade crate for the carpool matching engine.
//!
//! This crate re-exports the core domain types and exposes the matcher, the
//! HTTP route providers and the SQLite datastore behind feature flags.

#![forbid(unsafe_code)]

pub use carpool_core::route::{RouteOptimizer, RouteProvider, RouteResult};
pub use carpool_core::{
    CandidateFilter, Clock, ClusterConfig, ConfidenceBreakdown, ConfidenceScorer, CostModel,
    GroupScorer, LogNotifier, MatchCandidate, NotificationReport, Notifier, OptIn, OptInStatus,
    Participant, ParticipantStatus, Ride, RideEvent, RideStatus, RideStore, Role, StoreError,
    SystemClock, TimeWindow,
};

#[cfg(feature = "store-sqlite")]
pub use carpool_core::{SqliteRideStore, SqliteRideStoreError};

#[cfg(feature = "matcher")]
pub use carpool_matcher::{
    BatchOptions, BatchReport, LifecycleError, MatchConfig, MatchError, MatchOutcome, Matcher,
    NoMatchReason, ParticipantResponse, RideLifecycle, RideUpdate,
};

#[cfg(feature = "routing-http")]
pub use carpool_routing::{HttpRouteProvider, HttpRouteProviderConfig, OsrmService};
