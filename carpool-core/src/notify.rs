//! Participant notification dispatch.
//!
//! Delivery channels live outside this crate. The engine only reports which
//! event happened to which ride and collects per-recipient outcomes.
//! Failed deliveries never roll back ride state.

use log::info;

use crate::{RideEvent, RideId};

/// Per-event delivery summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationReport {
    /// Recipients reached.
    pub sent: usize,
    /// Recipients that could not be reached.
    pub failed: usize,
    /// One message per failed recipient.
    pub errors: Vec<String>,
}

impl NotificationReport {
    /// Whether every recipient was reached.
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Sends ride events to participants.
///
/// Implementations look up recipients themselves and must not fail as a
/// whole; partial failures are recorded in the returned report.
pub trait Notifier: Send + Sync {
    /// Deliver `event` for `ride_id`, with an optional reason for
    /// cancellations.
    fn notify(&self, ride_id: RideId, event: RideEvent, reason: Option<&str>) -> NotificationReport;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify(&self, ride_id: RideId, event: RideEvent, reason: Option<&str>) -> NotificationReport {
        (**self).notify(ride_id, event, reason)
    }
}

/// Writes every event to the log and reports it as delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, ride_id: RideId, event: RideEvent, reason: Option<&str>) -> NotificationReport {
        match reason {
            Some(reason) => info!("ride {ride_id}: {event} ({reason})"),
            None => info!("ride {ride_id}: {event}"),
        }
        NotificationReport {
            sent: 1,
            ..NotificationReport::default()
        }
    }
}
