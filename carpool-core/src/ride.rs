//! Persisted rides, their participants, and the status aggregation rule.
//!
//! A ride starts `PROPOSED` and ends `CONFIRMED` or `CANCELLED`. Each
//! participant starts `PENDING_ACCEPTANCE` and independently ends
//! `CONFIRMED`, `DECLINED` or `NO_RESPONSE`. After every participant write
//! the ride status is recomputed with [`aggregate_status`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{LocationId, OptInId, UserId};

/// Identifier of a ride.
pub type RideId = u64;

/// A status string read back from storage was not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    /// Which status family was being parsed.
    pub kind: &'static str,
    /// Raw value.
    pub value: String,
}

/// Lifecycle state of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RideStatus {
    /// Awaiting participant responses.
    #[default]
    Proposed,
    /// Every participant confirmed.
    Confirmed,
    /// At least one participant declined.
    Cancelled,
}

impl RideStatus {
    /// Return the status as stored by the datastore.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states never change again.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Proposed)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSED" => Ok(Self::Proposed),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(UnknownStatus {
                kind: "ride",
                value: s.to_owned(),
            }),
        }
    }
}

/// A participant's response state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ParticipantStatus {
    /// No answer yet.
    #[default]
    PendingAcceptance,
    /// Accepted the ride.
    Confirmed,
    /// Rejected the ride.
    Declined,
    /// The confirmation deadline passed without an answer.
    NoResponse,
}

impl ParticipantStatus {
    /// Return the status as stored by the datastore.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingAcceptance => "PENDING_ACCEPTANCE",
            Self::Confirmed => "CONFIRMED",
            Self::Declined => "DECLINED",
            Self::NoResponse => "NO_RESPONSE",
        }
    }

    /// Terminal states never change again.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::PendingAcceptance)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ACCEPTANCE" => Ok(Self::PendingAcceptance),
            "CONFIRMED" => Ok(Self::Confirmed),
            "DECLINED" => Ok(Self::Declined),
            "NO_RESPONSE" => Ok(Self::NoResponse),
            _ => Err(UnknownStatus {
                kind: "participant",
                value: s.to_owned(),
            }),
        }
    }
}

/// Events the notification dispatcher is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RideEvent {
    /// A ride was proposed to its participants.
    Match,
    /// Every participant confirmed.
    Confirmation,
    /// The ride was cancelled.
    Cancellation,
}

impl RideEvent {
    /// Upper-case event name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Confirmation => "CONFIRMATION",
            Self::Cancellation => "CANCELLATION",
        }
    }
}

impl fmt::Display for RideEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ride fields supplied on insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewRide {
    /// Day of the commute.
    pub commute_date: NaiveDate,
    /// Driving user.
    pub driver_id: UserId,
    /// Share per participant in minor currency units.
    pub cost_per_person: u64,
    /// Estimated trip duration in minutes.
    pub total_duration_minutes: f64,
    /// Opt-in ids in pickup order, driver first.
    pub pickup_order: Vec<OptInId>,
    /// Confidence score the ride was created with.
    pub confidence: u8,
    /// Explanation of the score.
    pub reasoning: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A persisted ride.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ride {
    /// Ride identifier.
    pub id: RideId,
    /// Day of the commute.
    pub commute_date: NaiveDate,
    /// Lifecycle state.
    pub status: RideStatus,
    /// Driving user.
    pub driver_id: UserId,
    /// Share per participant in minor currency units.
    pub cost_per_person: u64,
    /// Estimated trip duration in minutes.
    pub total_duration_minutes: f64,
    /// Opt-in ids in pickup order, driver first.
    pub pickup_order: Vec<OptInId>,
    /// Confidence score the ride was created with.
    pub confidence: u8,
    /// Explanation of the score.
    pub reasoning: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Why the ride was cancelled, once it is.
    pub cancellation_reason: Option<String>,
}

impl Ride {
    /// Materialise a freshly inserted ride.
    pub fn from_new(id: RideId, ride: NewRide) -> Self {
        Self {
            id,
            commute_date: ride.commute_date,
            status: RideStatus::Proposed,
            driver_id: ride.driver_id,
            cost_per_person: ride.cost_per_person,
            total_duration_minutes: ride.total_duration_minutes,
            pickup_order: ride.pickup_order,
            confidence: ride.confidence,
            reasoning: ride.reasoning,
            created_at: ride.created_at,
            cancellation_reason: None,
        }
    }
}

/// Participant fields supplied on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewParticipant {
    /// Participating user.
    pub user_id: UserId,
    /// Opt-in the participant joined through.
    pub opt_in_id: OptInId,
    /// Where they are collected.
    pub pickup_location_id: LocationId,
    /// Advisory response deadline.
    pub confirmation_deadline: DateTime<Utc>,
}

/// One user's membership in a ride.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Participant {
    /// Owning ride.
    pub ride_id: RideId,
    /// Participating user.
    pub user_id: UserId,
    /// Opt-in the participant joined through.
    pub opt_in_id: OptInId,
    /// Where they are collected.
    pub pickup_location_id: LocationId,
    /// Response state.
    pub status: ParticipantStatus,
    /// Advisory response deadline.
    pub confirmation_deadline: DateTime<Utc>,
}

impl Participant {
    /// Materialise a freshly inserted participant.
    pub fn from_new(ride_id: RideId, participant: &NewParticipant) -> Self {
        Self {
            ride_id,
            user_id: participant.user_id,
            opt_in_id: participant.opt_in_id,
            pickup_location_id: participant.pickup_location_id,
            status: ParticipantStatus::PendingAcceptance,
            confirmation_deadline: participant.confirmation_deadline,
        }
    }
}

/// Ride status implied by participant statuses, or `None` for no change.
///
/// Any decline cancels the ride immediately. Otherwise the ride is
/// confirmed once every participant has confirmed.
///
/// # Examples
/// ```
/// use carpool_core::{ParticipantStatus as P, RideStatus, aggregate_status};
///
/// assert_eq!(aggregate_status(&[P::Confirmed, P::Declined]), Some(RideStatus::Cancelled));
/// assert_eq!(aggregate_status(&[P::Confirmed, P::Confirmed]), Some(RideStatus::Confirmed));
/// assert_eq!(aggregate_status(&[P::Confirmed, P::PendingAcceptance]), None);
/// ```
pub fn aggregate_status(statuses: &[ParticipantStatus]) -> Option<RideStatus> {
    if statuses.contains(&ParticipantStatus::Declined) {
        return Some(RideStatus::Cancelled);
    }
    if !statuses.is_empty() && statuses.iter().all(|s| *s == ParticipantStatus::Confirmed) {
        return Some(RideStatus::Confirmed);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use ParticipantStatus::{Confirmed, Declined, NoResponse, PendingAcceptance};

    #[rstest]
    #[case(&[PendingAcceptance, PendingAcceptance, PendingAcceptance], None)]
    #[case(&[Confirmed, Confirmed, PendingAcceptance], None)]
    #[case(&[Confirmed, Confirmed, Confirmed], Some(RideStatus::Confirmed))]
    #[case(&[Declined, PendingAcceptance, PendingAcceptance], Some(RideStatus::Cancelled))]
    #[case(&[Confirmed, Confirmed, Declined], Some(RideStatus::Cancelled))]
    #[case(&[Confirmed, NoResponse, Confirmed], None)]
    #[case(&[], None)]
    fn aggregation_rule(
        #[case] statuses: &[ParticipantStatus],
        #[case] expected: Option<RideStatus>,
    ) {
        assert_eq!(aggregate_status(statuses), expected);
    }

    #[rstest]
    fn statuses_round_trip_through_strings() {
        for status in [PendingAcceptance, Confirmed, Declined, NoResponse] {
            assert_eq!(status.as_str().parse::<ParticipantStatus>(), Ok(status));
        }
        for status in [
            RideStatus::Proposed,
            RideStatus::Confirmed,
            RideStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RideStatus>(), Ok(status));
        }
    }

    #[rstest]
    fn unknown_status_is_reported() {
        let err = "MAYBE".parse::<RideStatus>().expect_err("unknown");
        assert_eq!(err.to_string(), "unknown ride status 'MAYBE'");
    }

    #[rstest]
    fn terminal_states() {
        assert!(!RideStatus::Proposed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(!PendingAcceptance.is_terminal());
        assert!(NoResponse.is_terminal());
    }
}
