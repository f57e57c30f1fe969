use serde::{Deserialize, Serialize};

use crate::values::{Callsign, FlightId, Timestamp};

/// Lifecycle status of a stored flight session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightStatus {
    /// No end time recorded yet
    Open,
    /// Closed by DISCONNECT or a superseding CONNECT
    Closed,
}

impl FlightStatus {
    /// Column value used by the relational store
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Open => "OPEN",
            FlightStatus::Closed => "CLOSED",
        }
    }

    /// Parse the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(FlightStatus::Open),
            "CLOSED" => Some(FlightStatus::Closed),
            _ => None,
        }
    }
}

/// A flight session that is currently open for a server
///
/// The session tracker keeps one of these per callsign; it is a cache of the
/// stored row plus the number of waypoints recorded since the flight opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFlight {
    pub id: FlightId,
    pub callsign: Callsign,
    /// Aircraft model, e.g. `A340-600HGW`
    pub model: String,
    pub start_time: Timestamp,
    /// Waypoints recorded since open (monotonic while open)
    pub waypoints: u32,
}

impl OpenFlight {
    /// A freshly opened flight with no waypoints
    pub fn new(
        id: FlightId,
        callsign: impl Into<Callsign>,
        model: impl Into<String>,
        start_time: Timestamp,
    ) -> Self {
        Self {
            id,
            callsign: callsign.into(),
            model: model.into(),
            start_time,
            waypoints: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_round_trips_column_value() {
        for status in [FlightStatus::Open, FlightStatus::Closed] {
            assert_eq!(FlightStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FlightStatus::parse("open"), None);
    }

    #[test]
    fn test_new_flight_has_no_waypoints() {
        let flight = OpenFlight::new(7, "AF2222", "A340-600HGW", Utc::now());
        assert_eq!(flight.waypoints, 0);
        assert_eq!(flight.callsign, "AF2222");
    }
}
