use std::net::IpAddr;

use fgtracker_core::{FlightId, OpenFlight, ServerIdentity, Timestamp, TrackPoint, TrustEntry, Waypoint};

use crate::error::StoreResult;

/// Port for the relational store holding flights, waypoints and the trust list
///
/// Processing is single-threaded, so implementations are driven through
/// `&mut self` and need no internal locking. Each method is one autocommit
/// statement except [`FlightStore::merge_flights`], which must be atomic.
///
/// Any failing call leaves the store in the disconnected state; callers
/// observe it via [`FlightStore::is_connected`] and recover with
/// [`FlightStore::reconnect`].
pub trait FlightStore: Send {
    /// Whether the last operation left the connection usable
    fn is_connected(&self) -> bool;

    /// Flag the connection as lost (e.g. a caller saw a failure it cannot retry)
    fn mark_disconnected(&mut self);

    /// Re-establish the connection; idempotent when already connected
    fn reconnect(&mut self) -> StoreResult<()>;

    /// Open flights recorded for a server, with their waypoint counts
    fn find_open_flights(&mut self, server: &ServerIdentity) -> StoreResult<Vec<OpenFlight>>;

    /// Insert a new open flight and return its id
    fn open_flight(
        &mut self,
        callsign: &str,
        model: &str,
        start_time: Timestamp,
        server: &ServerIdentity,
    ) -> StoreResult<FlightId>;

    /// Mark an open flight closed at `end_time`; closed flights are left untouched
    fn close_flight(&mut self, id: FlightId, end_time: Timestamp) -> StoreResult<()>;

    /// Time of the latest waypoint of a flight, if it has any
    fn last_waypoint_time(&mut self, id: FlightId) -> StoreResult<Option<Timestamp>>;

    fn insert_waypoint(&mut self, waypoint: &Waypoint) -> StoreResult<()>;

    /// Insert or replace a trust entry, keyed by (name, protocol)
    fn upsert_trust_entry(&mut self, entry: &TrustEntry) -> StoreResult<()>;

    /// Name of the enabled trust entry for (protocol, connecting address)
    fn find_authorized_server(
        &mut self,
        protocol: &str,
        address: IpAddr,
    ) -> StoreResult<Option<String>>;

    /// Enabled trust entry registered under a declared server name
    fn find_authorized_server_by_name(
        &mut self,
        protocol: &str,
        name: &str,
    ) -> StoreResult<Option<TrustEntry>>;

    /// Most recently closed flight on the same server, with the same callsign
    /// and model, that ended 0..=120 seconds before `new_flight` started
    fn find_merge_candidate(
        &mut self,
        callsign: &str,
        new_flight: FlightId,
        model: &str,
    ) -> StoreResult<Option<FlightId>>;

    /// Latest `count` waypoints of a flight, newest first
    fn last_waypoints(&mut self, id: FlightId, count: usize) -> StoreResult<Vec<TrackPoint>>;

    /// Move every waypoint of `absorb` onto `keep`, reopen `keep` and delete
    /// `absorb`, atomically. Returns the waypoint count of `keep` afterwards.
    fn merge_flights(&mut self, keep: FlightId, absorb: FlightId) -> StoreResult<u32>;
}
