//! fgtracker Store
//!
//! SQLite implementation of the [`FlightStore`](fgtracker_ports::FlightStore)
//! port. Holds three tables:
//!
//! - `flights`: one row per flight session, `OPEN` until closed
//! - `waypoints`: accepted position reports, owned by a flight
//! - `fgms_servers`: the trust list peers are authorized against
//!
//! The connection is dropped on the first failing statement and only comes
//! back through [`FlightStore::reconnect`](fgtracker_ports::FlightStore::reconnect),
//! so callers always see a consistent connected flag.

mod schema;
mod sqlite;

pub use schema::SCHEMA;
pub use sqlite::{SqliteFlightStore, StoreTarget};
