//! fgtracker Session Tracker
//!
//! Turns the lifecycle events an identified fgms server reports into flight
//! rows in the store:
//! - **CONNECT** opens a flight, closing any flight still open for the callsign
//! - **POSITION** appends a waypoint to the open flight
//! - **DISCONNECT** closes the open flight
//!
//! One [`SessionTracker`] exists per identified peer. It caches the open
//! flights of its server (id + waypoint count) so events do not re-query the
//! store, and runs the split-flight [`merge`] heuristic right after a flight's
//! second waypoint.

pub mod error;
pub mod merge;
pub mod tracker;

pub use error::{Result, TrackerError};
pub use merge::{MergeCheck, MergeRejection};
pub use tracker::{EventOutcome, SessionTracker};
