//! Match orchestration and ride lifecycle for the carpool engine.
//!
//! [`Matcher::find_matches`] runs the full pipeline for one opt-in:
//! prefilter, cluster, enumerate groups, score, route and rank. Results
//! below the confidence floor are dropped and at most three are returned.
//! [`Matcher::run_batch`] does the same for every pending opt-in on a date
//! and hands confident candidates to the [`RideLifecycle`], which persists
//! them as rides and later applies participant responses.
//!
//! Everything is synchronous and single-threaded per call. Collaborators
//! (datastore, notifier, clock, route providers) are injected so tests run
//! against the in-memory doubles in `carpool_core::test_support`.

#![forbid(unsafe_code)]

mod config;
mod error;
mod lifecycle;
mod matcher;

pub use config::{
    DEFAULT_AUTO_CREATE_CONFIDENCE, DEFAULT_CONFIRMATION_HOURS, DEFAULT_MAX_CANDIDATES,
    DEFAULT_MIN_CONFIDENCE, MatchConfig,
};
pub use error::{LifecycleError, MatchError};
pub use lifecycle::{CreatedRide, ParticipantResponse, RideLifecycle, RideUpdate};
pub use matcher::{
    BatchAction, BatchDecision, BatchOptions, BatchReport, MatchOutcome, Matcher, NoMatchReason,
};
