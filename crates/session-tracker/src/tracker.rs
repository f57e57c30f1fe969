//! Per-server flight session state machine

use std::collections::HashMap;
use std::sync::Arc;

use fgtracker_core::{
    Callsign, FlightId, OpenFlight, Position, ServerIdentity, Timestamp, TrackEvent, Waypoint,
    WaypointRejection,
};
use fgtracker_ports::{Clock, FlightStore};
use log::{debug, info, trace, warn};

use crate::error::Result;
use crate::merge::{self, MergeRejection};

/// Waypoint count at which the split-flight heuristic runs
const MERGE_AT_WAYPOINT: u32 = 2;

/// What an event did to the stored flights
///
/// Every outcome is acknowledged with `OK` on the wire; the variants only
/// matter for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    FlightOpened {
        id: FlightId,
        /// Flight that was still open for the callsign and got closed first
        closed_prior: Option<FlightId>,
    },
    FlightClosed {
        id: FlightId,
    },
    /// DISCONNECT for a callsign without an open flight
    NothingToClose,
    WaypointRecorded {
        flight: FlightId,
        /// Waypoints on the flight after this one
        count: u32,
        /// Earlier flight this one was folded into, if the merge heuristic passed
        merged_into: Option<FlightId>,
    },
    WaypointRejected(WaypointRejection),
}

/// Open-flight state for one identified server
pub struct SessionTracker {
    server: ServerIdentity,
    clock: Arc<dyn Clock>,
    /// Open flights keyed by callsign
    flights: HashMap<Callsign, OpenFlight>,
}

impl SessionTracker {
    /// Load the server's open flights from the store
    ///
    /// Fails if the store cannot be queried; the caller must not process
    /// events for this server without the open-flight state.
    pub fn attach(
        server: ServerIdentity,
        store: &mut dyn FlightStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let open = store.find_open_flights(&server)?;
        let mut tracker = Self {
            server,
            clock,
            flights: HashMap::with_capacity(open.len()),
        };

        // Rows arrive in id order, so a later duplicate is the newer flight
        for flight in open {
            if let Some(older) = tracker.flights.insert(flight.callsign.clone(), flight) {
                warn!(
                    "[{}] Callsign {} had more than one open flight, closing {}",
                    tracker.server, older.callsign, older.id
                );
                tracker.close_superseded(&older, store)?;
            }
        }

        info!(
            "[{}] Session tracker attached with {} open flight(s)",
            tracker.server,
            tracker.flights.len()
        );
        Ok(tracker)
    }

    pub fn server(&self) -> &ServerIdentity {
        &self.server
    }

    /// Cached open flight for a callsign
    pub fn open_flight(&self, callsign: &str) -> Option<&OpenFlight> {
        self.flights.get(callsign)
    }

    pub fn open_flight_count(&self) -> usize {
        self.flights.len()
    }

    /// Apply one event to the store
    ///
    /// A store failure leaves the cache as it was before the failing
    /// statement and is returned as an error.
    pub fn on_event(
        &mut self,
        event: &TrackEvent,
        store: &mut dyn FlightStore,
    ) -> Result<EventOutcome> {
        match event {
            TrackEvent::Connect {
                callsign,
                model,
                time,
            } => self.connect(callsign, model, *time, store),
            TrackEvent::Disconnect { callsign, time, .. } => {
                self.disconnect(callsign, *time, store)
            }
            TrackEvent::Position {
                callsign,
                position,
                time,
            } => self.position(callsign, position, *time, store),
        }
    }

    fn connect(
        &mut self,
        callsign: &str,
        model: &str,
        time: Timestamp,
        store: &mut dyn FlightStore,
    ) -> Result<EventOutcome> {
        let closed_prior = match self.flights.get(callsign) {
            Some(prior) => {
                let prior = prior.clone();
                self.close_superseded(&prior, store)?;
                self.flights.remove(callsign);
                Some(prior.id)
            }
            None => None,
        };

        let id = store.open_flight(callsign, model, time, &self.server)?;
        self.flights
            .insert(callsign.to_string(), OpenFlight::new(id, callsign, model, time));
        info!(
            "[{}] Opened flight {} for {} ({})",
            self.server, id, callsign, model
        );

        Ok(EventOutcome::FlightOpened { id, closed_prior })
    }

    fn disconnect(
        &mut self,
        callsign: &str,
        time: Timestamp,
        store: &mut dyn FlightStore,
    ) -> Result<EventOutcome> {
        let Some(flight) = self.flights.get(callsign) else {
            debug!("[{}] DISCONNECT {}: no open flight", self.server, callsign);
            return Ok(EventOutcome::NothingToClose);
        };

        let id = flight.id;
        store.close_flight(id, time)?;
        self.flights.remove(callsign);
        info!("[{}] Closed flight {} for {}", self.server, id, callsign);

        Ok(EventOutcome::FlightClosed { id })
    }

    fn position(
        &mut self,
        callsign: &str,
        position: &Position,
        time: Timestamp,
        store: &mut dyn FlightStore,
    ) -> Result<EventOutcome> {
        let Some(mut flight) = self.flights.get(callsign).cloned() else {
            return Ok(self.reject(callsign, WaypointRejection::NoOpenFlight));
        };
        if let Err(rejection) = position.validate() {
            return Ok(self.reject(callsign, rejection));
        }

        store.insert_waypoint(&Waypoint {
            flight_id: flight.id,
            time,
            position: *position,
        })?;
        flight.waypoints += 1;
        self.flights.insert(flight.callsign.clone(), flight.clone());
        trace!(
            "[{}] Waypoint {} recorded for flight {} ({})",
            self.server, flight.waypoints, flight.id, callsign
        );

        if flight.waypoints == MERGE_AT_WAYPOINT {
            if let Some(keep) = self.try_merge(&flight, store)? {
                let count = self.flights.get(callsign).map_or(0, |f| f.waypoints);
                return Ok(EventOutcome::WaypointRecorded {
                    flight: keep,
                    count,
                    merged_into: Some(keep),
                });
            }
        }

        Ok(EventOutcome::WaypointRecorded {
            flight: flight.id,
            count: flight.waypoints,
            merged_into: None,
        })
    }

    /// Run the split-flight heuristic for a flight that just got its second
    /// waypoint, folding it into the candidate on a pass
    fn try_merge(
        &mut self,
        flight: &OpenFlight,
        store: &mut dyn FlightStore,
    ) -> Result<Option<FlightId>> {
        let Some(candidate) = store.find_merge_candidate(&flight.callsign, flight.id, &flight.model)?
        else {
            self.log_no_merge(flight, MergeRejection::NoCandidate);
            return Ok(None);
        };

        let new_points = store.last_waypoints(flight.id, 2)?;
        let candidate_points = store.last_waypoints(candidate, 2)?;

        let check = match merge::evaluate(&new_points, &candidate_points) {
            Ok(check) => check,
            Err(rejection) => {
                self.log_no_merge(flight, rejection);
                return Ok(None);
            }
        };

        info!(
            "[{}] Merging flight {} into {} for {}: {:.0} km/h / {:.0} km/h, gap {:.0} m (max {:.0} m)",
            self.server,
            flight.id,
            candidate,
            flight.callsign,
            check.new_speed_kmh,
            check.candidate_speed_kmh,
            check.gap_m,
            check.max_gap_m
        );
        let count = store.merge_flights(candidate, flight.id)?;

        if let Some(cached) = self.flights.get_mut(&flight.callsign) {
            cached.id = candidate;
            cached.waypoints = count;
        }
        Ok(Some(candidate))
    }

    /// Close a flight replaced by a newer one, at its last waypoint time
    fn close_superseded(&self, flight: &OpenFlight, store: &mut dyn FlightStore) -> Result<()> {
        let end = match store.last_waypoint_time(flight.id)? {
            Some(time) => time,
            None => self.clock.now(),
        };
        store.close_flight(flight.id, end)?;
        info!(
            "[{}] Closed superseded flight {} for {}",
            self.server, flight.id, flight.callsign
        );
        Ok(())
    }

    fn reject(&self, callsign: &str, rejection: WaypointRejection) -> EventOutcome {
        warn!(
            "[{}] POSITION {} rejected: {}",
            self.server, callsign, rejection
        );
        EventOutcome::WaypointRejected(rejection)
    }

    fn log_no_merge(&self, flight: &OpenFlight, rejection: MergeRejection) {
        debug!(
            "[{}] Flight {} ({}) not merged: {}",
            self.server, flight.id, flight.callsign, rejection
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use fgtracker_core::{TrackPoint, TrustEntry};
    use fgtracker_ports::{StoreError, StoreResult};
    use std::net::IpAddr;

    /// In-memory store double recording calls
    #[derive(Default)]
    struct FakeStore {
        next_id: FlightId,
        open: Vec<OpenFlight>,
        closed: Vec<(FlightId, Timestamp)>,
        waypoints: Vec<Waypoint>,
        fail_inserts: bool,
        connected: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                next_id: 1,
                connected: true,
                ..Default::default()
            }
        }
    }

    impl FlightStore for FakeStore {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn mark_disconnected(&mut self) {
            self.connected = false;
        }

        fn reconnect(&mut self) -> StoreResult<()> {
            self.connected = true;
            Ok(())
        }

        fn find_open_flights(&mut self, _server: &ServerIdentity) -> StoreResult<Vec<OpenFlight>> {
            Ok(self.open.clone())
        }

        fn open_flight(
            &mut self,
            _callsign: &str,
            _model: &str,
            _start_time: Timestamp,
            _server: &ServerIdentity,
        ) -> StoreResult<FlightId> {
            let id = self.next_id;
            self.next_id += 1;
            Ok(id)
        }

        fn close_flight(&mut self, id: FlightId, end_time: Timestamp) -> StoreResult<()> {
            self.closed.push((id, end_time));
            Ok(())
        }

        fn last_waypoint_time(&mut self, id: FlightId) -> StoreResult<Option<Timestamp>> {
            Ok(self
                .waypoints
                .iter()
                .filter(|w| w.flight_id == id)
                .map(|w| w.time)
                .max())
        }

        fn insert_waypoint(&mut self, waypoint: &Waypoint) -> StoreResult<()> {
            if self.fail_inserts {
                self.connected = false;
                return Err(StoreError::Query("disk I/O error".into()));
            }
            self.waypoints.push(waypoint.clone());
            Ok(())
        }

        fn find_authorized_server(
            &mut self,
            _protocol: &str,
            _address: IpAddr,
        ) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn upsert_trust_entry(&mut self, _entry: &TrustEntry) -> StoreResult<()> {
            Ok(())
        }

        fn find_authorized_server_by_name(
            &mut self,
            _protocol: &str,
            _name: &str,
        ) -> StoreResult<Option<TrustEntry>> {
            Ok(None)
        }

        fn find_merge_candidate(
            &mut self,
            _callsign: &str,
            _new_flight: FlightId,
            _model: &str,
        ) -> StoreResult<Option<FlightId>> {
            Ok(None)
        }

        fn last_waypoints(&mut self, _id: FlightId, _count: usize) -> StoreResult<Vec<TrackPoint>> {
            Ok(Vec::new())
        }

        fn merge_flights(&mut self, _keep: FlightId, _absorb: FlightId) -> StoreResult<u32> {
            Ok(0)
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2015, 12, 7, 12, 0, 0).unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(fgtracker_clock::ManualClock::new(Some(t0() + Duration::hours(1))))
    }

    fn tracker(store: &mut FakeStore) -> SessionTracker {
        SessionTracker::attach(ServerIdentity::new("mpserver01"), store, clock()).unwrap()
    }

    fn connect(callsign: &str, time: Timestamp) -> TrackEvent {
        TrackEvent::Connect {
            callsign: callsign.into(),
            model: "A340".into(),
            time,
        }
    }

    fn position(callsign: &str, lat: f64, lon: f64, alt: f64, time: Timestamp) -> TrackEvent {
        TrackEvent::Position {
            callsign: callsign.into(),
            position: Position::new(lat, lon, alt),
            time,
        }
    }

    #[test]
    fn test_attach_loads_open_flights() {
        let mut store = FakeStore::new();
        store.open.push(OpenFlight {
            waypoints: 7,
            ..OpenFlight::new(3, "AF2222", "A340", t0())
        });

        let tracker = tracker(&mut store);
        assert_eq!(tracker.open_flight_count(), 1);
        assert_eq!(tracker.open_flight("AF2222").unwrap().waypoints, 7);
    }

    #[test]
    fn test_attach_closes_older_duplicate() {
        let mut store = FakeStore::new();
        store.open.push(OpenFlight::new(3, "AF2222", "A340", t0()));
        store.open.push(OpenFlight::new(9, "AF2222", "A340", t0()));

        let tracker = tracker(&mut store);
        assert_eq!(tracker.open_flight("AF2222").unwrap().id, 9);
        // No waypoints: closed at clock time
        assert_eq!(store.closed, vec![(3, t0() + Duration::hours(1))]);
    }

    #[test]
    fn test_connect_opens_flight() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);

        let outcome = tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();
        assert_eq!(
            outcome,
            EventOutcome::FlightOpened {
                id: 1,
                closed_prior: None
            }
        );
        let flight = tracker.open_flight("AF2222").unwrap();
        assert_eq!(flight.waypoints, 0);
        assert_eq!(flight.start_time, t0());
    }

    #[test]
    fn test_second_connect_closes_first_at_last_waypoint() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);

        tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();
        let last = t0() + Duration::seconds(30);
        tracker
            .on_event(&position("AF2222", 45.0, 5.0, 1000.0, last), &mut store)
            .unwrap();

        let outcome = tracker
            .on_event(&connect("AF2222", t0() + Duration::minutes(5)), &mut store)
            .unwrap();
        assert_eq!(
            outcome,
            EventOutcome::FlightOpened {
                id: 2,
                closed_prior: Some(1)
            }
        );
        assert_eq!(store.closed, vec![(1, last)]);
        assert_eq!(tracker.open_flight_count(), 1);
        assert_eq!(tracker.open_flight("AF2222").unwrap().id, 2);
    }

    #[test]
    fn test_disconnect_without_flight_is_noop() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);

        let event = TrackEvent::Disconnect {
            callsign: "KLM1".into(),
            model: "B737".into(),
            time: t0(),
        };
        assert_eq!(
            tracker.on_event(&event, &mut store).unwrap(),
            EventOutcome::NothingToClose
        );
        assert!(store.closed.is_empty());
    }

    #[test]
    fn test_disconnect_closes_at_event_time() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);
        tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();

        let end = t0() + Duration::minutes(42);
        let event = TrackEvent::Disconnect {
            callsign: "AF2222".into(),
            model: "A340".into(),
            time: end,
        };
        assert_eq!(
            tracker.on_event(&event, &mut store).unwrap(),
            EventOutcome::FlightClosed { id: 1 }
        );
        assert_eq!(store.closed, vec![(1, end)]);
        assert!(tracker.open_flight("AF2222").is_none());
    }

    #[test]
    fn test_position_rejections() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);

        let outcome = tracker
            .on_event(&position("AF2222", 45.0, 5.0, 1000.0, t0()), &mut store)
            .unwrap();
        assert_eq!(
            outcome,
            EventOutcome::WaypointRejected(WaypointRejection::NoOpenFlight)
        );

        tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();
        let outcome = tracker
            .on_event(&position("AF2222", 45.0, 5.0, -9001.0, t0()), &mut store)
            .unwrap();
        assert_eq!(
            outcome,
            EventOutcome::WaypointRejected(WaypointRejection::InvalidAltitude(-9001.0))
        );

        let outcome = tracker
            .on_event(&position("AF2222", 0.0, 0.0, 0.0, t0()), &mut store)
            .unwrap();
        assert_eq!(outcome, EventOutcome::WaypointRejected(WaypointRejection::NoFix));

        assert!(store.waypoints.is_empty());
        assert_eq!(tracker.open_flight("AF2222").unwrap().waypoints, 0);
    }

    #[test]
    fn test_position_counts_waypoints() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);
        tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();

        for i in 1..=3 {
            let outcome = tracker
                .on_event(
                    &position("AF2222", 45.0, 5.0, 1000.0, t0() + Duration::seconds(i)),
                    &mut store,
                )
                .unwrap();
            assert_eq!(
                outcome,
                EventOutcome::WaypointRecorded {
                    flight: 1,
                    count: i as u32,
                    merged_into: None
                }
            );
        }
        assert_eq!(store.waypoints.len(), 3);
    }

    #[test]
    fn test_store_failure_keeps_cache() {
        let mut store = FakeStore::new();
        let mut tracker = tracker(&mut store);
        tracker.on_event(&connect("AF2222", t0()), &mut store).unwrap();

        store.fail_inserts = true;
        let result = tracker.on_event(&position("AF2222", 45.0, 5.0, 1000.0, t0()), &mut store);
        assert!(matches!(result, Err(crate::TrackerError::Store(StoreError::Query(_)))));
        assert!(!store.is_connected());
        assert_eq!(tracker.open_flight("AF2222").unwrap().waypoints, 0);
    }
}
