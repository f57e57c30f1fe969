use serde::{Deserialize, Serialize};

use crate::values::{FlightId, Timestamp};

/// Altitudes below this (feet) are treated as garbage from the simulator
pub const MIN_ALTITUDE: f64 = -9000.0;

/// A reported aircraft position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Why a position was not persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaypointRejection {
    /// No open flight exists for the callsign
    NoOpenFlight,
    /// Altitude below [`MIN_ALTITUDE`]
    InvalidAltitude(f64),
    /// Latitude, longitude and altitude all exactly zero ("no fix")
    NoFix,
    /// A coordinate is NaN or infinite
    NonFinite,
}

impl std::fmt::Display for WaypointRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaypointRejection::NoOpenFlight => write!(f, "no open flight available"),
            WaypointRejection::InvalidAltitude(alt) => write!(f, "invalid altitude ({alt})"),
            WaypointRejection::NoFix => write!(f, "invalid position (0, 0, 0)"),
            WaypointRejection::NonFinite => write!(f, "non-finite coordinate"),
        }
    }
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Check the sentinel values peers send when they have no usable fix
    pub fn validate(&self) -> Result<(), WaypointRejection> {
        // The store cannot hold NaN; it would bind as NULL
        if ![self.latitude, self.longitude, self.altitude]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(WaypointRejection::NonFinite);
        }
        if self.altitude < MIN_ALTITUDE {
            return Err(WaypointRejection::InvalidAltitude(self.altitude));
        }
        if self.latitude == 0.0 && self.longitude == 0.0 && self.altitude == 0.0 {
            return Err(WaypointRejection::NoFix);
        }
        Ok(())
    }
}

/// A persisted position belonging to a flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub flight_id: FlightId,
    pub time: Timestamp,
    pub position: Position,
}

/// Time and horizontal location of a stored waypoint
///
/// This is the projection the split-flight heuristic works on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub time: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
}

impl TrackPoint {
    pub fn new(time: Timestamp, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
        }
    }
}
