//! fgtracker Ports
//!
//! Port definitions (traits) for the flight-session tracker.
//! These define the boundaries between the protocol engine and infrastructure
//! (relational store, DNS, wall clock).

mod clock;
mod error;
mod resolver;
mod store;

pub use clock::Clock;
pub use error::{StoreError, StoreResult};
pub use resolver::HostResolver;
pub use store::FlightStore;
