mod event;
mod flight;
mod trust;
mod waypoint;

pub use event::TrackEvent;
pub use flight::{FlightStatus, OpenFlight};
pub use trust::TrustEntry;
pub use waypoint::{Position, TrackPoint, Waypoint, WaypointRejection};
