//! Fixtures and in-memory collaborators used by unit and behaviour tests.
//!
//! Everything here is deterministic. Coordinates are placed by kilometre
//! offsets from [`base_coord`] so distances in tests read as plain numbers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use geo::Coord;

use crate::geometry::EARTH_RADIUS_KM;
use crate::route::{ProviderError, ProviderRoute, RouteLeg, RouteProvider, RouteRequest};
use crate::{
    Clock, ConfidenceBreakdown, NewParticipant, NewRide, NotificationReport, Notifier, OptIn,
    OptInId, OptInStatus, Participant, ParticipantStatus, PickupLocation, Ride, RideEvent, RideId,
    RideStatus, RideStore, Role, StoreError, TimeWindow, UserId,
};

/// Reference point all test coordinates are offset from.
pub const fn base_coord() -> Coord<f64> {
    Coord {
        x: -0.1276,
        y: 51.5072,
    }
}

/// Move `coord` due north by `km` along a great circle.
#[expect(clippy::float_arithmetic, reason = "converts arc length to degrees")]
pub fn offset_north(coord: Coord<f64>, km: f64) -> Coord<f64> {
    Coord {
        x: coord.x,
        y: coord.y + (km / EARTH_RADIUS_KM).to_degrees(),
    }
}

/// Move `coord` due east by roughly `km` at its latitude.
#[expect(clippy::float_arithmetic, reason = "converts arc length to degrees")]
pub fn offset_east(coord: Coord<f64>, km: f64) -> Coord<f64> {
    let scale = coord.y.to_radians().cos().max(f64::EPSILON);
    Coord {
        x: coord.x + (km / (EARTH_RADIUS_KM * scale)).to_degrees(),
        y: coord.y,
    }
}

/// Builder for [`OptIn`] fixtures.
///
/// Defaults: commuting on 2026-10-16, window 08:00 to 09:00, pickup at
/// [`base_coord`], status `PENDING`.
#[derive(Debug, Clone)]
pub struct OptInBuilder {
    id: OptInId,
    user_id: UserId,
    role: Role,
    capacity: Option<u8>,
    date: NaiveDate,
    window: (u16, u16),
    coords: Coord<f64>,
    status: OptInStatus,
}

impl OptInBuilder {
    /// Start a builder for `role`.
    pub fn new(id: OptInId, user_id: UserId, role: Role) -> Self {
        Self {
            id,
            user_id,
            role,
            capacity: None,
            date: Self::default_date(),
            window: (8 * 60, 9 * 60),
            coords: base_coord(),
            status: OptInStatus::Pending,
        }
    }

    /// A rider opt-in.
    pub fn rider(id: OptInId, user_id: UserId) -> Self {
        Self::new(id, user_id, Role::Rider)
    }

    /// A driver opt-in offering `seats`.
    pub fn driver(id: OptInId, user_id: UserId, seats: u8) -> Self {
        Self::new(id, user_id, Role::Driver).capacity(seats)
    }

    /// Commute date used when none is given.
    #[expect(clippy::expect_used, reason = "literal calendar date")]
    pub fn default_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    /// Set the departure window from `HH:MM` clock times.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixtures use literal clock times")]
    pub fn window(mut self, start: &str, end: &str) -> Self {
        let window = TimeWindow::parse(start, end).expect("valid fixture window");
        self.window = (window.start(), window.end());
        self
    }

    /// Place the pickup `km` north of [`base_coord`].
    #[must_use]
    pub fn km_north(mut self, km: f64) -> Self {
        self.coords = offset_north(base_coord(), km);
        self
    }

    /// Place the pickup `km` east of [`base_coord`].
    #[must_use]
    pub fn km_east(mut self, km: f64) -> Self {
        self.coords = offset_east(base_coord(), km);
        self
    }

    /// Place the pickup at explicit coordinates.
    #[must_use]
    pub const fn at(mut self, coords: Coord<f64>) -> Self {
        self.coords = coords;
        self
    }

    /// Set the commute date.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixtures use literal dates")]
    pub fn date(mut self, year: i32, month: u32, day: u32) -> Self {
        self.date = NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date");
        self
    }

    /// Set the seats offered.
    #[must_use]
    pub const fn capacity(mut self, seats: u8) -> Self {
        self.capacity = Some(seats);
        self
    }

    /// Set the status.
    #[must_use]
    pub const fn status(mut self, status: OptInStatus) -> Self {
        self.status = status;
        self
    }

    /// Build the opt-in. The pickup location shares the opt-in's id.
    #[expect(clippy::expect_used, reason = "fixture values are valid by construction")]
    pub fn build(self) -> OptIn {
        let window = TimeWindow::new(self.window.0, self.window.1).expect("valid window");
        let pickup = PickupLocation::new(self.id, self.coords, format!("Pickup {}", self.id))
            .expect("valid pickup");
        OptIn::new(
            self.id,
            self.user_id,
            self.date,
            window,
            pickup,
            self.role,
            self.capacity,
        )
        .expect("valid opt-in")
        .with_status(self.status)
    }
}

/// Scripted [`RouteProvider`].
#[derive(Debug)]
pub struct StubRouteProvider {
    name: String,
    outcome: Result<Vec<RouteLeg>, ProviderError>,
    order: Option<Vec<usize>>,
    calls: AtomicUsize,
}

impl StubRouteProvider {
    /// Always answer with `legs`, keeping the request order.
    pub fn with_legs(name: &str, legs: Vec<RouteLeg>) -> Self {
        Self::new(name, Ok(legs))
    }

    /// Always fail with `error`.
    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self::new(name, Err(error))
    }

    /// Always report a timeout.
    pub fn timing_out(name: &str) -> Self {
        Self::failing(
            name,
            ProviderError::Timeout {
                url: format!("http://{name}.invalid"),
                timeout_secs: 5,
            },
        )
    }

    /// Always report missing credentials.
    pub fn unconfigured(name: &str) -> Self {
        Self::failing(
            name,
            ProviderError::Unconfigured {
                provider: name.to_owned(),
            },
        )
    }

    fn new(name: &str, outcome: Result<Vec<RouteLeg>, ProviderError>) -> Self {
        Self {
            name: name.to_owned(),
            outcome,
            order: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Report `order` as the optimised waypoint order.
    #[must_use]
    pub fn ordered(mut self, order: Vec<usize>) -> Self {
        self.order = Some(order);
        self
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteProvider for StubRouteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn route(&self, _request: &RouteRequest) -> Result<ProviderRoute, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map(|legs| ProviderRoute {
            legs,
            waypoint_order: self.order.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    opt_ins: BTreeMap<OptInId, OptIn>,
    rides: BTreeMap<RideId, Ride>,
    participants: BTreeMap<RideId, Vec<Participant>>,
    next_ride_id: RideId,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    participant_insert: bool,
    opt_in_update: Option<OptInId>,
    participant_update: bool,
    ride_update: bool,
}

/// Mutex-guarded in-memory [`RideStore`] with fault injection.
#[derive(Debug, Default)]
pub struct MemoryRideStore {
    state: Mutex<MemoryState>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(operation: &'static str) -> StoreError {
    StoreError::Backend {
        operation,
        message: "injected failure".to_owned(),
    }
}

impl MemoryRideStore {
    /// Create a store holding `opt_ins`.
    pub fn with_opt_ins<I>(opt_ins: I) -> Self
    where
        I: IntoIterator<Item = OptIn>,
    {
        let store = Self::default();
        for opt_in in opt_ins {
            store.insert_opt_in(opt_in);
        }
        store
    }

    /// Insert or replace an opt-in.
    pub fn insert_opt_in(&self, opt_in: OptIn) {
        lock(&self.state).opt_ins.insert(opt_in.id, opt_in);
    }

    /// Make every participant insertion fail.
    pub fn fail_participant_inserts(&self) {
        lock(&self.faults).participant_insert = true;
    }

    /// Make status updates of opt-in `id` fail.
    pub fn fail_opt_in_update(&self, id: OptInId) {
        lock(&self.faults).opt_in_update = Some(id);
    }

    /// Make participant status updates fail.
    pub fn fail_participant_updates(&self) {
        lock(&self.faults).participant_update = true;
    }

    /// Make ride status updates fail.
    pub fn fail_ride_updates(&self) {
        lock(&self.faults).ride_update = true;
    }

    /// Clear all injected faults.
    pub fn heal(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Current status of opt-in `id`, if stored.
    pub fn opt_in_status(&self, id: OptInId) -> Option<OptInStatus> {
        lock(&self.state).opt_ins.get(&id).map(|o| o.status)
    }

    /// Every stored ride, ordered by id.
    pub fn rides(&self) -> Vec<Ride> {
        lock(&self.state).rides.values().cloned().collect()
    }

    /// Every stored participant across all rides.
    pub fn participant_count(&self) -> usize {
        lock(&self.state).participants.values().map(Vec::len).sum()
    }
}

impl RideStore for MemoryRideStore {
    fn opt_in(&self, id: OptInId) -> Result<Option<OptIn>, StoreError> {
        Ok(lock(&self.state).opt_ins.get(&id).cloned())
    }

    fn opt_ins_for_date(
        &self,
        date: NaiveDate,
        status: OptInStatus,
    ) -> Result<Vec<OptIn>, StoreError> {
        Ok(lock(&self.state)
            .opt_ins
            .values()
            .filter(|o| o.commute_date == date && o.status == status)
            .cloned()
            .collect())
    }

    fn set_opt_in_status(&self, id: OptInId, status: OptInStatus) -> Result<(), StoreError> {
        if lock(&self.faults).opt_in_update == Some(id) {
            return Err(injected("update opt-in"));
        }
        let mut state = lock(&self.state);
        let opt_in = state.opt_ins.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "opt-in",
            id,
        })?;
        opt_in.status = status;
        Ok(())
    }

    fn insert_ride(&self, ride: &NewRide) -> Result<Ride, StoreError> {
        let mut state = lock(&self.state);
        state.next_ride_id += 1;
        let stored = Ride::from_new(state.next_ride_id, ride.clone());
        state.rides.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn insert_participants(
        &self,
        ride_id: RideId,
        participants: &[NewParticipant],
    ) -> Result<Vec<Participant>, StoreError> {
        if lock(&self.faults).participant_insert {
            return Err(injected("insert participants"));
        }
        let mut state = lock(&self.state);
        if !state.rides.contains_key(&ride_id) {
            return Err(StoreError::NotFound {
                entity: "ride",
                id: ride_id,
            });
        }
        let stored: Vec<_> = participants
            .iter()
            .map(|p| Participant::from_new(ride_id, p))
            .collect();
        state
            .participants
            .entry(ride_id)
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    fn ride(&self, id: RideId) -> Result<Option<Ride>, StoreError> {
        Ok(lock(&self.state).rides.get(&id).cloned())
    }

    fn participants(&self, ride_id: RideId) -> Result<Vec<Participant>, StoreError> {
        Ok(lock(&self.state)
            .participants
            .get(&ride_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set_participant_status(
        &self,
        ride_id: RideId,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), StoreError> {
        if lock(&self.faults).participant_update {
            return Err(injected("update participant"));
        }
        let mut state = lock(&self.state);
        let participant = state
            .participants
            .get_mut(&ride_id)
            .and_then(|ps| ps.iter_mut().find(|p| p.user_id == user_id))
            .ok_or(StoreError::NotFound {
                entity: "participant",
                id: user_id,
            })?;
        participant.status = status;
        Ok(())
    }

    fn set_ride_status(
        &self,
        ride_id: RideId,
        status: RideStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        if lock(&self.faults).ride_update {
            return Err(injected("update ride"));
        }
        let mut state = lock(&self.state);
        let ride = state.rides.get_mut(&ride_id).ok_or(StoreError::NotFound {
            entity: "ride",
            id: ride_id,
        })?;
        ride.status = status;
        if let Some(reason) = reason {
            ride.cancellation_reason = Some(reason.to_owned());
        }
        Ok(())
    }

    fn delete_ride(&self, ride_id: RideId) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.rides.remove(&ride_id);
        state.participants.remove(&ride_id);
        Ok(())
    }
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    /// Ride the event concerns.
    pub ride_id: RideId,
    /// Event type.
    pub event: RideEvent,
    /// Cancellation reason, if any.
    pub reason: Option<String>,
}

/// [`Notifier`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: bool,
}

impl RecordingNotifier {
    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            failing: true,
        }
    }

    /// Notifications recorded so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        lock(&self.sent).clone()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<RideEvent> {
        lock(&self.sent).iter().map(|n| n.event).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, ride_id: RideId, event: RideEvent, reason: Option<&str>) -> NotificationReport {
        lock(&self.sent).push(SentNotification {
            ride_id,
            event,
            reason: reason.map(str::to_owned),
        });
        if self.failing {
            NotificationReport {
                sent: 0,
                failed: 1,
                errors: vec![format!("ride {ride_id}: {event} delivery failed")],
            }
        } else {
            NotificationReport {
                sent: 1,
                ..NotificationReport::default()
            }
        }
    }
}

/// [`Clock`] frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze at `hour:minute` UTC on [`OptInBuilder::default_date`].
    #[expect(clippy::expect_used, reason = "literal timestamp")]
    pub fn at(hour: u32, minute: u32) -> Self {
        let date = OptInBuilder::default_date();
        let instant = Utc
            .from_local_datetime(&date.and_hms_opt(hour, minute, 0).expect("valid time"))
            .single()
            .expect("unambiguous UTC time");
        Self(instant)
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(7, 0)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A breakdown with the given score and neutral components.
pub fn sample_breakdown(score: u8) -> ConfidenceBreakdown {
    ConfidenceBreakdown {
        score,
        min_overlap_minutes: 60,
        max_spread_km: 1.0,
        utilisation: 0.5,
        avg_destination_km: 5.0,
        overlap_bonus: 15,
        distance_term: 20,
        capacity_bonus: 5,
        destination_term: 5,
    }
}

/// A ride row ready for insertion.
pub fn sample_new_ride() -> NewRide {
    NewRide {
        commute_date: OptInBuilder::default_date(),
        driver_id: 10,
        cost_per_person: 412,
        total_duration_minutes: 18.5,
        pickup_order: vec![1, 2],
        confidence: 80,
        reasoning: "fixture".to_owned(),
        created_at: FixedClock::default().now(),
    }
}
