//! fgtracker Core Domain
//!
//! Pure domain types for the flight-session tracker.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod geo;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Flight sessions
    FlightStatus,
    OpenFlight,
    // Positions
    Position,
    // Peer-reported events
    TrackEvent,
    TrackPoint,
    // Trust list
    TrustEntry,
    Waypoint,
    WaypointRejection,
};
pub use values::{Callsign, FlightId, PeerId, ServerIdentity, Timestamp};
