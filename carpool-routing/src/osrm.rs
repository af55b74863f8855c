//! OSRM API response types for the Trip and Route services.
//!
//! See: <http://project-osrm.org/docs/v5.24.0/api/#trip-service> and
//! <http://project-osrm.org/docs/v5.24.0/api/#route-service>

use serde::Deserialize;

/// One leg between consecutive coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OsrmLeg {
    /// Leg length in metres.
    pub distance: f64,
    /// Leg duration in seconds.
    pub duration: f64,
}

/// A route or trip made of legs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsrmPath {
    /// Legs in travel order.
    #[serde(default)]
    pub legs: Vec<OsrmLeg>,
}

/// Input coordinate as snapped by the Trip service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TripWaypoint {
    /// Position of this input coordinate within the trip.
    pub waypoint_index: usize,
    /// Trip the coordinate belongs to.
    #[serde(default)]
    pub trips_index: usize,
}

/// Trip service response; waypoints are listed in input order.
#[derive(Debug, Deserialize)]
pub struct TripResponse {
    /// Status code, `"Ok"` on success.
    pub code: String,
    /// Error text when `code` is not `"Ok"`.
    pub message: Option<String>,
    /// Computed trips; a single one when source and destination are fixed.
    #[serde(default)]
    pub trips: Vec<OsrmPath>,
    /// Snapped inputs, in input order.
    #[serde(default)]
    pub waypoints: Vec<TripWaypoint>,
}

/// Route service response.
#[derive(Debug, Deserialize)]
pub struct RouteResponse {
    /// Status code, `"Ok"` on success.
    pub code: String,
    /// Error text when `code` is not `"Ok"`.
    pub message: Option<String>,
    /// Alternatives; the first is the best.
    #[serde(default)]
    pub routes: Vec<OsrmPath>,
}

impl TripResponse {
    /// Check if the response indicates success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

impl RouteResponse {
    /// Check if the response indicates success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}
