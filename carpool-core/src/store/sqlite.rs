//! SQLite-backed ride store.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, NaiveDate, Utc};
use geo::Coord;
use log::warn;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use thiserror::Error;

use crate::{
    NewParticipant, NewRide, OptIn, OptInId, OptInStatus, Participant, ParticipantStatus,
    PickupLocation, Ride, RideId, RideStatus, Role, TimeWindow, UserId,
};

use super::{RideStore, StoreError};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS pickup_locations (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    lng REAL NOT NULL,
    lat REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS opt_ins (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    commute_date TEXT NOT NULL,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    pickup_location_id INTEGER NOT NULL REFERENCES pickup_locations(id),
    role TEXT NOT NULL,
    driver_capacity INTEGER,
    status TEXT NOT NULL DEFAULT 'PENDING'
);
CREATE INDEX IF NOT EXISTS opt_ins_by_date ON opt_ins (commute_date, status);
CREATE TABLE IF NOT EXISTS rides (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    commute_date TEXT NOT NULL,
    status TEXT NOT NULL,
    driver_id INTEGER NOT NULL,
    cost_per_person INTEGER NOT NULL,
    total_duration_minutes REAL NOT NULL,
    pickup_order TEXT NOT NULL,
    confidence INTEGER NOT NULL,
    reasoning TEXT NOT NULL,
    created_at TEXT NOT NULL,
    cancellation_reason TEXT
);
CREATE TABLE IF NOT EXISTS ride_participants (
    ride_id INTEGER NOT NULL REFERENCES rides(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL,
    opt_in_id INTEGER NOT NULL,
    pickup_location_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    confirmation_deadline TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (ride_id, user_id)
);
";

const OPT_IN_COLUMNS: &str = "o.id, o.user_id, o.commute_date, o.window_start, o.window_end, \
     o.role, o.driver_capacity, o.status, p.id, p.name, p.lng, p.lat";

const RIDE_COLUMNS: &str = "id, commute_date, status, driver_id, cost_per_person, \
     total_duration_minutes, pickup_order, confidence, reasoning, created_at, cancellation_reason";

/// Error raised while opening a [`SqliteRideStore`].
#[derive(Debug, Error)]
pub enum SqliteRideStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the tables failed.
    #[error("failed to initialise schema: {0}")]
    Schema(#[source] rusqlite::Error),
}

/// Ride store persisted in a single SQLite database.
///
/// Tables are created on a writable open; [`SqliteRideStore::open_read_only`]
/// leaves the file untouched. Participants cascade when their ride is
/// deleted, and each participant batch is written in one transaction.
pub struct SqliteRideStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteRideStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRideStore").finish_non_exhaustive()
    }
}

impl SqliteRideStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteRideStoreError> {
        let path = path.as_ref();
        let connection =
            Connection::open(path).map_err(|source| SqliteRideStoreError::OpenDatabase {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection)
    }

    /// Open an existing database without creating tables or allowing writes.
    ///
    /// Reads against a file lacking the schema fail with
    /// [`StoreError::Backend`]; any write is rejected by SQLite.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, SqliteRideStoreError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SqliteRideStoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteRideStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteRideStoreError::OpenDatabase {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, SqliteRideStoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(SqliteRideStoreError::Schema)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Insert or replace an opt-in together with its pickup location.
    ///
    /// Opt-in capture is owned by another system; this exists for seeding
    /// and imports.
    pub fn upsert_opt_in(&self, opt_in: &OptIn) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO pickup_locations (id, name, lng, lat) VALUES (?1, ?2, ?3, ?4)",
            params![
                opt_in.pickup.id,
                opt_in.pickup.name,
                opt_in.pickup.coords.x,
                opt_in.pickup.coords.y
            ],
        )
        .map_err(|err| StoreError::backend("upsert pickup location", err))?;
        conn.execute(
            "INSERT OR REPLACE INTO opt_ins (id, user_id, commute_date, window_start, window_end, \
             pickup_location_id, role, driver_capacity, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                opt_in.id,
                opt_in.user_id,
                opt_in.commute_date.to_string(),
                opt_in.time_window.start(),
                opt_in.time_window.end(),
                opt_in.pickup.id,
                opt_in.role.as_str(),
                opt_in.driver_capacity,
                opt_in.status.as_str(),
            ],
        )
        .map_err(|err| StoreError::backend("upsert opt-in", err))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::backend("lock connection", "mutex poisoned"))
    }
}

/// Raw opt-in columns; decoded separately so bad rows can be skipped.
struct OptInRow {
    id: OptInId,
    user_id: UserId,
    commute_date: String,
    window_start: u16,
    window_end: u16,
    role: String,
    driver_capacity: Option<u8>,
    status: String,
    location_id: u64,
    location_name: String,
    lng: f64,
    lat: f64,
}

impl OptInRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            commute_date: row.get(2)?,
            window_start: row.get(3)?,
            window_end: row.get(4)?,
            role: row.get(5)?,
            driver_capacity: row.get(6)?,
            status: row.get(7)?,
            location_id: row.get(8)?,
            location_name: row.get(9)?,
            lng: row.get(10)?,
            lat: row.get(11)?,
        })
    }

    fn decode(self) -> Result<OptIn, StoreError> {
        let id = self.id;
        let invalid = |reason: String| StoreError::InvalidRecord {
            entity: "opt-in",
            id,
            reason,
        };
        let date: NaiveDate = self
            .commute_date
            .parse()
            .map_err(|err| invalid(format!("commute date: {err}")))?;
        let window = TimeWindow::new(self.window_start, self.window_end)
            .map_err(|err| invalid(err.to_string()))?;
        let role: Role = self.role.parse().map_err(|err| invalid(format!("{err}")))?;
        let status: OptInStatus = self
            .status
            .parse()
            .map_err(|err| invalid(format!("{err}")))?;
        let pickup = PickupLocation::new(
            self.location_id,
            Coord {
                x: self.lng,
                y: self.lat,
            },
            self.location_name,
        )
        .map_err(|err| invalid(err.to_string()))?;
        OptIn::new(
            id,
            self.user_id,
            date,
            window,
            pickup,
            role,
            self.driver_capacity,
        )
        .map(|opt_in| opt_in.with_status(status))
        .map_err(|err| invalid(err.to_string()))
    }
}

struct RideRow {
    id: RideId,
    commute_date: String,
    status: String,
    driver_id: UserId,
    cost_per_person: u64,
    total_duration_minutes: f64,
    pickup_order: String,
    confidence: u8,
    reasoning: String,
    created_at: String,
    cancellation_reason: Option<String>,
}

impl RideRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            commute_date: row.get(1)?,
            status: row.get(2)?,
            driver_id: row.get(3)?,
            cost_per_person: row.get(4)?,
            total_duration_minutes: row.get(5)?,
            pickup_order: row.get(6)?,
            confidence: row.get(7)?,
            reasoning: row.get(8)?,
            created_at: row.get(9)?,
            cancellation_reason: row.get(10)?,
        })
    }

    fn decode(self) -> Result<Ride, StoreError> {
        let id = self.id;
        let invalid = |reason: String| StoreError::InvalidRecord {
            entity: "ride",
            id,
            reason,
        };
        Ok(Ride {
            id,
            commute_date: self
                .commute_date
                .parse()
                .map_err(|err| invalid(format!("commute date: {err}")))?,
            status: self
                .status
                .parse()
                .map_err(|err| invalid(format!("{err}")))?,
            driver_id: self.driver_id,
            cost_per_person: self.cost_per_person,
            total_duration_minutes: self.total_duration_minutes,
            pickup_order: serde_json::from_str(&self.pickup_order)
                .map_err(|err| invalid(format!("pickup order: {err}")))?,
            confidence: self.confidence,
            reasoning: self.reasoning,
            created_at: parse_timestamp(&self.created_at).map_err(invalid)?,
            cancellation_reason: self.cancellation_reason,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| format!("timestamp '{raw}': {err}"))
}

struct ParticipantRow {
    ride_id: RideId,
    user_id: UserId,
    opt_in_id: OptInId,
    pickup_location_id: u64,
    status: String,
    confirmation_deadline: String,
}

impl ParticipantRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ride_id: row.get(0)?,
            user_id: row.get(1)?,
            opt_in_id: row.get(2)?,
            pickup_location_id: row.get(3)?,
            status: row.get(4)?,
            confirmation_deadline: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Participant, StoreError> {
        let user_id = self.user_id;
        let invalid = |reason: String| StoreError::InvalidRecord {
            entity: "participant",
            id: user_id,
            reason,
        };
        Ok(Participant {
            ride_id: self.ride_id,
            user_id,
            opt_in_id: self.opt_in_id,
            pickup_location_id: self.pickup_location_id,
            status: self
                .status
                .parse()
                .map_err(|err| invalid(format!("{err}")))?,
            confirmation_deadline: parse_timestamp(&self.confirmation_deadline)
                .map_err(invalid)?,
        })
    }
}

impl RideStore for SqliteRideStore {
    fn opt_in(&self, id: OptInId) -> Result<Option<OptIn>, StoreError> {
        let conn = self.lock()?;
        let query = format!(
            "SELECT {OPT_IN_COLUMNS} FROM opt_ins o \
             JOIN pickup_locations p ON p.id = o.pickup_location_id WHERE o.id = ?1"
        );
        let row = conn
            .query_row(&query, params![id], OptInRow::read)
            .optional()
            .map_err(|err| StoreError::backend("load opt-in", err))?;
        row.map(OptInRow::decode).transpose()
    }

    fn opt_ins_for_date(
        &self,
        date: NaiveDate,
        status: OptInStatus,
    ) -> Result<Vec<OptIn>, StoreError> {
        let conn = self.lock()?;
        let query = format!(
            "SELECT {OPT_IN_COLUMNS} FROM opt_ins o \
             JOIN pickup_locations p ON p.id = o.pickup_location_id \
             WHERE o.commute_date = ?1 AND o.status = ?2 ORDER BY o.id"
        );
        let mut statement = conn
            .prepare(&query)
            .map_err(|err| StoreError::backend("list opt-ins", err))?;
        let rows = statement
            .query_map(params![date.to_string(), status.as_str()], OptInRow::read)
            .map_err(|err| StoreError::backend("list opt-ins", err))?;

        let mut opt_ins = Vec::new();
        for row in rows {
            let row = row.map_err(|err| StoreError::backend("list opt-ins", err))?;
            match row.decode() {
                Ok(opt_in) => opt_ins.push(opt_in),
                Err(err) => warn!("skipping malformed record: {err}"),
            }
        }
        Ok(opt_ins)
    }

    fn set_opt_in_status(&self, id: OptInId, status: OptInStatus) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE opt_ins SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|err| StoreError::backend("update opt-in", err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "opt-in",
                id,
            });
        }
        Ok(())
    }

    fn insert_ride(&self, ride: &NewRide) -> Result<Ride, StoreError> {
        let conn = self.lock()?;
        let pickup_order = serde_json::to_string(&ride.pickup_order)
            .map_err(|err| StoreError::backend("encode pickup order", err))?;
        conn.execute(
            "INSERT INTO rides (commute_date, status, driver_id, cost_per_person, \
             total_duration_minutes, pickup_order, confidence, reasoning, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                ride.commute_date.to_string(),
                RideStatus::Proposed.as_str(),
                ride.driver_id,
                ride.cost_per_person,
                ride.total_duration_minutes,
                pickup_order,
                ride.confidence,
                ride.reasoning,
                ride.created_at.to_rfc3339(),
            ],
        )
        .map_err(|err| StoreError::backend("insert ride", err))?;
        let id = u64::try_from(conn.last_insert_rowid())
            .map_err(|err| StoreError::backend("insert ride", err))?;
        Ok(Ride::from_new(id, ride.clone()))
    }

    fn insert_participants(
        &self,
        ride_id: RideId,
        participants: &[NewParticipant],
    ) -> Result<Vec<Participant>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|err| StoreError::backend("insert participants", err))?;
        for (position, participant) in participants.iter().enumerate() {
            tx.execute(
                "INSERT INTO ride_participants (ride_id, user_id, opt_in_id, pickup_location_id, \
                 status, confirmation_deadline, position) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ride_id,
                    participant.user_id,
                    participant.opt_in_id,
                    participant.pickup_location_id,
                    ParticipantStatus::PendingAcceptance.as_str(),
                    participant.confirmation_deadline.to_rfc3339(),
                    position,
                ],
            )
            .map_err(|err| StoreError::backend("insert participants", err))?;
        }
        tx.commit()
            .map_err(|err| StoreError::backend("insert participants", err))?;
        Ok(participants
            .iter()
            .map(|p| Participant::from_new(ride_id, p))
            .collect())
    }

    fn ride(&self, id: RideId) -> Result<Option<Ride>, StoreError> {
        let conn = self.lock()?;
        let query = format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = ?1");
        let row = conn
            .query_row(&query, params![id], RideRow::read)
            .optional()
            .map_err(|err| StoreError::backend("load ride", err))?;
        row.map(RideRow::decode).transpose()
    }

    fn participants(&self, ride_id: RideId) -> Result<Vec<Participant>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT ride_id, user_id, opt_in_id, pickup_location_id, status, \
                 confirmation_deadline FROM ride_participants WHERE ride_id = ?1 ORDER BY position",
            )
            .map_err(|err| StoreError::backend("list participants", err))?;
        let rows = statement
            .query_map(params![ride_id], ParticipantRow::read)
            .map_err(|err| StoreError::backend("list participants", err))?;

        rows.map(|row| {
            row.map_err(|err| StoreError::backend("list participants", err))
                .and_then(ParticipantRow::decode)
        })
        .collect()
    }

    fn set_participant_status(
        &self,
        ride_id: RideId,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE ride_participants SET status = ?1 WHERE ride_id = ?2 AND user_id = ?3",
                params![status.as_str(), ride_id, user_id],
            )
            .map_err(|err| StoreError::backend("update participant", err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "participant",
                id: user_id,
            });
        }
        Ok(())
    }

    fn set_ride_status(
        &self,
        ride_id: RideId,
        status: RideStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE rides SET status = ?1, \
                 cancellation_reason = COALESCE(?2, cancellation_reason) WHERE id = ?3",
                params![status.as_str(), reason, ride_id],
            )
            .map_err(|err| StoreError::backend("update ride", err))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "ride",
                id: ride_id,
            });
        }
        Ok(())
    }

    fn delete_ride(&self, ride_id: RideId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM rides WHERE id = ?1", params![ride_id])
            .map_err(|err| StoreError::backend("delete ride", err))?;
        Ok(())
    }
}
