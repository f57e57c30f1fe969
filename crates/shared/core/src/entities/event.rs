use serde::{Deserialize, Serialize};

use super::Position;
use crate::values::{Callsign, Timestamp};

/// Flight lifecycle event reported by an fgms peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackEvent {
    /// A pilot joined the server
    Connect {
        callsign: Callsign,
        model: String,
        time: Timestamp,
    },
    /// A pilot left the server
    Disconnect {
        callsign: Callsign,
        model: String,
        time: Timestamp,
    },
    /// Periodic position report
    Position {
        callsign: Callsign,
        position: Position,
        time: Timestamp,
    },
}

impl TrackEvent {
    pub fn callsign(&self) -> &str {
        match self {
            TrackEvent::Connect { callsign, .. }
            | TrackEvent::Disconnect { callsign, .. }
            | TrackEvent::Position { callsign, .. } => callsign,
        }
    }

    pub fn time(&self) -> Timestamp {
        match self {
            TrackEvent::Connect { time, .. }
            | TrackEvent::Disconnect { time, .. }
            | TrackEvent::Position { time, .. } => *time,
        }
    }

    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            TrackEvent::Connect { .. } => "CONNECT",
            TrackEvent::Disconnect { .. } => "DISCONNECT",
            TrackEvent::Position { .. } => "POSITION",
        }
    }
}
