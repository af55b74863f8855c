//! Commute opt-ins: a user's declared intent to share a ride on a date.
//!
//! Constructors validate their input so the matching pipeline can assume
//! well-formed windows, coordinates and driver capacities.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};
use geo::Coord;
use thiserror::Error;

/// Identifier of an opt-in record.
pub type OptInId = u64;
/// Identifier of a user.
pub type UserId = u64;
/// Identifier of a named pickup location.
pub type LocationId = u64;

/// Minutes in a day; the latest valid window end (`24:00`).
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Errors raised while validating opt-in data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptInError {
    /// The window did not start strictly before it ends, or ran past midnight.
    #[error("time window {start}..{end} must satisfy start < end <= {MINUTES_PER_DAY}")]
    InvalidTimeWindow {
        /// Window start in minutes after midnight.
        start: u16,
        /// Window end in minutes after midnight.
        end: u16,
    },
    /// A clock time could not be parsed as `HH:MM`.
    #[error("failed to parse clock time '{value}'")]
    InvalidClockTime {
        /// Raw input.
        value: String,
    },
    /// Pickup coordinates were not finite WGS84 values.
    #[error("pickup coordinates ({lng}, {lat}) are outside WGS84 bounds")]
    InvalidCoordinates {
        /// Longitude in degrees.
        lng: f64,
        /// Latitude in degrees.
        lat: f64,
    },
    /// A driver opt-in did not declare a positive seat capacity.
    #[error("driver opt-in {id} must declare a capacity of at least one seat")]
    MissingCapacity {
        /// Offending opt-in.
        id: OptInId,
    },
    /// A role string was not recognised.
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    /// A status string was not recognised.
    #[error("unknown opt-in status '{0}'")]
    UnknownStatus(String),
}

/// Whether the opt-in offers seats or needs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Role {
    /// Offers a vehicle and seats.
    Driver,
    /// Needs a seat.
    Rider,
}

impl Role {
    /// Return the role as stored by the datastore.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "DRIVER",
            Self::Rider => "RIDER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = OptInError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRIVER" => Ok(Self::Driver),
            "RIDER" => Ok(Self::Rider),
            _ => Err(OptInError::UnknownRole(s.to_owned())),
        }
    }
}

/// Matching state of an opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OptInStatus {
    /// Waiting to be matched.
    #[default]
    Pending,
    /// Part of a proposed or confirmed ride.
    Matched,
    /// Withdrawn, or the user declined a ride.
    Cancelled,
}

impl OptInStatus {
    /// Return the status as stored by the datastore.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Matched => "MATCHED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OptInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptInStatus {
    type Err = OptInError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "MATCHED" => Ok(Self::Matched),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(OptInError::UnknownStatus(s.to_owned())),
        }
    }
}

/// A departure window expressed in minutes after midnight.
///
/// # Examples
/// ```
/// use carpool_core::TimeWindow;
///
/// let a = TimeWindow::parse("08:00", "08:30")?;
/// let b = TimeWindow::parse("08:10", "08:40")?;
/// assert_eq!(a.overlap_minutes(&b), 20);
/// assert_eq!(b.overlap_minutes(&a), 20);
/// # Ok::<(), carpool_core::OptInError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeWindow {
    start: u16,
    end: u16,
}

impl TimeWindow {
    /// Validate and construct a window from minute-of-day bounds.
    pub const fn new(start: u16, end: u16) -> Result<Self, OptInError> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(OptInError::InvalidTimeWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two `HH:MM` clock times.
    pub fn parse(start: &str, end: &str) -> Result<Self, OptInError> {
        Self::new(parse_minute_of_day(start)?, parse_minute_of_day(end)?)
    }

    /// Window start in minutes after midnight.
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Window end in minutes after midnight.
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Length of the window in minutes.
    pub const fn len_minutes(&self) -> u16 {
        self.end - self.start
    }

    /// Minutes shared by both windows; zero when they do not intersect.
    pub fn overlap_minutes(&self, other: &Self) -> u16 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}

fn parse_minute_of_day(value: &str) -> Result<u16, OptInError> {
    if value.trim() == "24:00" {
        return Ok(MINUTES_PER_DAY);
    }
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        OptInError::InvalidClockTime {
            value: value.to_owned(),
        }
    })?;
    let minutes = time.hour() * 60 + time.minute();
    u16::try_from(minutes).map_err(|_| OptInError::InvalidClockTime {
        value: value.to_owned(),
    })
}

/// A named pickup point.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PickupLocation {
    /// Location identifier.
    pub id: LocationId,
    /// Position of the pickup point.
    pub coords: Coord<f64>,
    /// Human-readable name.
    pub name: String,
}

impl PickupLocation {
    /// Validate and construct a pickup location.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use carpool_core::PickupLocation;
    ///
    /// let ok = PickupLocation::new(1, Coord { x: -0.12, y: 51.5 }, "Station");
    /// assert!(ok.is_ok());
    /// let bad = PickupLocation::new(2, Coord { x: 0.0, y: 91.0 }, "Nowhere");
    /// assert!(bad.is_err());
    /// ```
    pub fn new(
        id: LocationId,
        coords: Coord<f64>,
        name: impl Into<String>,
    ) -> Result<Self, OptInError> {
        let valid = coords.x.is_finite()
            && coords.y.is_finite()
            && (-180.0..=180.0).contains(&coords.x)
            && (-90.0..=90.0).contains(&coords.y);
        if !valid {
            return Err(OptInError::InvalidCoordinates {
                lng: coords.x,
                lat: coords.y,
            });
        }
        Ok(Self {
            id,
            coords,
            name: name.into(),
        })
    }
}

/// A user's declared intent to share a ride.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptIn {
    /// Opt-in identifier.
    pub id: OptInId,
    /// Owning user.
    pub user_id: UserId,
    /// Day of the commute.
    pub commute_date: NaiveDate,
    /// Acceptable departure window.
    pub time_window: TimeWindow,
    /// Where the user is picked up (or starts driving from).
    pub pickup: PickupLocation,
    /// Driver or rider.
    pub role: Role,
    /// Seats offered; always `Some` for drivers.
    pub driver_capacity: Option<u8>,
    /// Matching state.
    pub status: OptInStatus,
}

impl OptIn {
    /// Validate and construct a pending opt-in.
    ///
    /// Drivers must declare at least one seat. Any capacity supplied for a
    /// rider is discarded.
    pub fn new(
        id: OptInId,
        user_id: UserId,
        commute_date: NaiveDate,
        time_window: TimeWindow,
        pickup: PickupLocation,
        role: Role,
        driver_capacity: Option<u8>,
    ) -> Result<Self, OptInError> {
        let driver_capacity = match role {
            Role::Driver => match driver_capacity {
                Some(seats) if seats > 0 => Some(seats),
                _ => return Err(OptInError::MissingCapacity { id }),
            },
            Role::Rider => None,
        };
        Ok(Self {
            id,
            user_id,
            commute_date,
            time_window,
            pickup,
            role,
            driver_capacity,
            status: OptInStatus::Pending,
        })
    }

    /// Replace the status, returning the updated opt-in.
    #[must_use]
    pub const fn with_status(mut self, status: OptInStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether this opt-in offers a vehicle.
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    /// Seats offered, or zero for riders.
    pub fn capacity(&self) -> usize {
        usize::from(self.driver_capacity.unwrap_or(0))
    }

    /// Pickup coordinates.
    pub const fn coords(&self) -> Coord<f64> {
        self.pickup.coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pickup() -> PickupLocation {
        PickupLocation::new(1, Coord { x: 0.0, y: 0.0 }, "Depot").expect("valid pickup")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    #[rstest]
    #[case(480, 480)]
    #[case(500, 480)]
    #[case(1400, 1441)]
    fn window_rejects_invalid_bounds(#[case] start: u16, #[case] end: u16) {
        assert_eq!(
            TimeWindow::new(start, end),
            Err(OptInError::InvalidTimeWindow { start, end })
        );
    }

    #[rstest]
    #[case("08:00", "08:30", 480, 510)]
    #[case("23:30", "24:00", 1410, 1440)]
    fn window_parses_clock_times(
        #[case] start: &str,
        #[case] end: &str,
        #[case] start_min: u16,
        #[case] end_min: u16,
    ) {
        let window = TimeWindow::parse(start, end).expect("valid window");
        assert_eq!((window.start(), window.end()), (start_min, end_min));
    }

    #[rstest]
    fn window_rejects_garbage_clock_time() {
        let err = TimeWindow::parse("8am", "09:00").expect_err("unparseable");
        assert!(matches!(err, OptInError::InvalidClockTime { .. }));
    }

    #[rstest]
    #[case((480, 510), (490, 520), 20)]
    #[case((480, 510), (510, 540), 0)]
    #[case((480, 510), (600, 660), 0)]
    #[case((480, 600), (500, 520), 20)]
    fn overlap_is_symmetric(#[case] a: (u16, u16), #[case] b: (u16, u16), #[case] expected: u16) {
        let wa = TimeWindow::new(a.0, a.1).expect("window a");
        let wb = TimeWindow::new(b.0, b.1).expect("window b");
        assert_eq!(wa.overlap_minutes(&wb), expected);
        assert_eq!(wb.overlap_minutes(&wa), expected);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0))]
    fn driver_requires_capacity(#[case] capacity: Option<u8>) {
        let window = TimeWindow::new(480, 510).expect("window");
        let err = OptIn::new(7, 1, date(), window, pickup(), Role::Driver, capacity)
            .expect_err("driver without seats");
        assert_eq!(err, OptInError::MissingCapacity { id: 7 });
    }

    #[rstest]
    fn rider_capacity_is_discarded() {
        let window = TimeWindow::new(480, 510).expect("window");
        let rider = OptIn::new(1, 1, date(), window, pickup(), Role::Rider, Some(3))
            .expect("valid rider");
        assert_eq!(rider.driver_capacity, None);
        assert_eq!(rider.capacity(), 0);
        assert_eq!(rider.status, OptInStatus::Pending);
    }

    #[rstest]
    #[case("driver", Role::Driver)]
    #[case("RIDER", Role::Rider)]
    fn role_parses_case_insensitively(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>(), Ok(expected));
    }

    #[rstest]
    fn status_round_trips_through_strings() {
        for status in [
            OptInStatus::Pending,
            OptInStatus::Matched,
            OptInStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OptInStatus>(), Ok(status));
        }
    }
}
