//! SQLite storage gateway

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::DateTime;
use fgtracker_core::{
    FlightId, FlightStatus, OpenFlight, ServerIdentity, Timestamp, TrackPoint, TrustEntry,
    Waypoint,
};
use fgtracker_ports::{FlightStore, StoreError, StoreResult};
use log::{debug, error, info};
use rusqlite::{Connection, OptionalExtension, params};

use crate::schema::SCHEMA;

const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Seconds a closed flight may precede a new one and still be merged into it
const MERGE_WINDOW_SECS: i64 = 120;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    File(PathBuf),
    /// Private in-memory database; a reconnect starts from an empty schema
    Memory,
}

impl std::fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTarget::File(path) => write!(f, "{}", path.display()),
            StoreTarget::Memory => write!(f, ":memory:"),
        }
    }
}

/// Storage gateway backed by a single SQLite connection
pub struct SqliteFlightStore {
    target: StoreTarget,
    /// `None` while disconnected
    conn: Option<Connection>,
    /// Statements issued since construction (including failed ones)
    statements: u64,
}

impl SqliteFlightStore {
    /// Connect to the target and make sure the schema exists
    pub fn open(target: StoreTarget) -> StoreResult<Self> {
        let conn = open_connection(&target)?;
        info!("Connected to store {}", target);
        Ok(Self {
            target,
            conn: Some(conn),
            statements: 0,
        })
    }

    /// Fresh in-memory store (tests, dry runs)
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(StoreTarget::Memory)
    }

    /// Create a handle that starts disconnected; the first
    /// [`FlightStore::reconnect`] opens the database
    pub fn deferred(target: StoreTarget) -> Self {
        Self {
            target,
            conn: None,
            statements: 0,
        }
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    /// Number of statements issued against the database so far
    pub fn statements_executed(&self) -> u64 {
        self.statements
    }

    /// Status and end time of a flight, if the row exists
    pub fn flight_status(
        &mut self,
        id: FlightId,
    ) -> StoreResult<Option<(FlightStatus, Option<Timestamp>)>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT status, end_time FROM flights WHERE id = ?1",
                params![id],
                |row| {
                    let status: String = row.get(0)?;
                    let end: Option<i64> = row.get(1)?;
                    let end = end.map(|secs| from_secs(1, secs)).transpose()?;
                    Ok((status, end))
                },
            )
            .optional()
        })?;

        match row {
            None => Ok(None),
            Some((status, end)) => {
                let status = FlightStatus::parse(&status)
                    .ok_or_else(|| StoreError::InvalidRow(format!("flight {id} status {status}")))?;
                Ok(Some((status, end)))
            }
        }
    }

    /// Run one statement group against the live connection
    ///
    /// Any failure drops the connection, so the gateway reports itself down
    /// until reconnected.
    fn with_conn<T, F>(&mut self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.as_mut().ok_or(StoreError::Disconnected)?;
        self.statements += 1;
        match op(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("Store {} query failed, marking disconnected: {}", self.target, e);
                self.conn = None;
                Err(StoreError::Query(e.to_string()))
            }
        }
    }
}

impl FlightStore for SqliteFlightStore {
    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn mark_disconnected(&mut self) {
        if self.conn.take().is_some() {
            info!("Store {} marked disconnected", self.target);
        }
    }

    fn upsert_trust_entry(&mut self, entry: &TrustEntry) -> StoreResult<()> {
        let ip = entry.address.map(|a| a.to_string());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO fgms_servers (name, protocol, ip, domain, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (name, protocol) DO UPDATE SET
                    ip = excluded.ip, domain = excluded.domain, enabled = excluded.enabled",
                params![entry.name, entry.protocol, ip, entry.domain, entry.enabled],
            )
        })?;
        Ok(())
    }

    fn reconnect(&mut self) -> StoreResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        info!("Connecting to store {}...", self.target);
        let conn = open_connection(&self.target)?;
        self.conn = Some(conn);
        info!("Connected to store {}", self.target);
        Ok(())
    }

    fn find_open_flights(&mut self, server: &ServerIdentity) -> StoreResult<Vec<OpenFlight>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT f.id, f.callsign, f.model, f.start_time, COUNT(w.id)
                 FROM flights f LEFT JOIN waypoints w ON w.flight_id = f.id
                 WHERE f.status = 'OPEN' AND f.server = ?1
                 GROUP BY f.id
                 ORDER BY f.id",
            )?;
            let rows = stmt.query_map(params![server.as_str()], |row| {
                let start: i64 = row.get(3)?;
                let count: i64 = row.get(4)?;
                Ok(OpenFlight {
                    id: row.get(0)?,
                    callsign: row.get(1)?,
                    model: row.get(2)?,
                    start_time: from_secs(3, start)?,
                    waypoints: u32::try_from(count).unwrap_or(u32::MAX),
                })
            })?;
            rows.collect()
        })
    }

    fn open_flight(
        &mut self,
        callsign: &str,
        model: &str,
        start_time: Timestamp,
        server: &ServerIdentity,
    ) -> StoreResult<FlightId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO flights (callsign, status, model, start_time, server)
                 VALUES (?1, 'OPEN', ?2, ?3, ?4)",
                params![callsign, model, start_time.timestamp(), server.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn close_flight(&mut self, id: FlightId, end_time: Timestamp) -> StoreResult<()> {
        let updated = self.with_conn(|conn| {
            conn.execute(
                "UPDATE flights SET status = 'CLOSED', end_time = ?1
                 WHERE id = ?2 AND status = 'OPEN'",
                params![end_time.timestamp(), id],
            )
        })?;
        if updated == 0 {
            debug!("Flight {} was not open, nothing closed", id);
        }
        Ok(())
    }

    fn last_waypoint_time(&mut self, id: FlightId) -> StoreResult<Option<Timestamp>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT MAX(time) FROM waypoints WHERE flight_id = ?1",
                params![id],
                |row| {
                    let secs: Option<i64> = row.get(0)?;
                    secs.map(|s| from_secs(0, s)).transpose()
                },
            )
        })
    }

    fn insert_waypoint(&mut self, waypoint: &Waypoint) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO waypoints (flight_id, time, latitude, longitude, altitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                waypoint.flight_id,
                waypoint.time.timestamp(),
                waypoint.position.latitude,
                waypoint.position.longitude,
                waypoint.position.altitude,
            ])
        })?;
        Ok(())
    }

    fn find_authorized_server(
        &mut self,
        protocol: &str,
        address: IpAddr,
    ) -> StoreResult<Option<String>> {
        let ip = address.to_string();
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name FROM fgms_servers
                 WHERE protocol = ?1 AND ip = ?2 AND enabled = 1
                 LIMIT 1",
                params![protocol, ip],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn find_authorized_server_by_name(
        &mut self,
        protocol: &str,
        name: &str,
    ) -> StoreResult<Option<TrustEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name, protocol, ip, domain, enabled FROM fgms_servers
                 WHERE protocol = ?1 AND name = ?2 AND enabled = 1
                 LIMIT 1",
                params![protocol, name],
                |row| {
                    let ip: Option<String> = row.get(2)?;
                    Ok(TrustEntry {
                        name: row.get(0)?,
                        protocol: row.get(1)?,
                        address: ip.and_then(|s| s.parse().ok()),
                        domain: row.get(3)?,
                        enabled: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    fn find_merge_candidate(
        &mut self,
        callsign: &str,
        new_flight: FlightId,
        model: &str,
    ) -> StoreResult<Option<FlightId>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id FROM flights c JOIN flights n ON n.id = ?2
                 WHERE c.callsign = ?1
                   AND c.model = ?3
                   AND c.server = n.server
                   AND c.id <> n.id
                   AND c.status = 'CLOSED'
                   AND c.end_time IS NOT NULL
                   AND n.start_time - c.end_time BETWEEN 0 AND ?4
                 ORDER BY c.end_time DESC
                 LIMIT 1",
                params![callsign, new_flight, model, MERGE_WINDOW_SECS],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn last_waypoints(&mut self, id: FlightId, count: usize) -> StoreResult<Vec<TrackPoint>> {
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT time, latitude, longitude FROM waypoints
                 WHERE flight_id = ?1
                 ORDER BY time DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![id, limit], |row| {
                let secs: i64 = row.get(0)?;
                Ok(TrackPoint::new(from_secs(0, secs)?, row.get(1)?, row.get(2)?))
            })?;
            rows.collect()
        })
    }

    fn merge_flights(&mut self, keep: FlightId, absorb: FlightId) -> StoreResult<u32> {
        let count = self.with_conn(|conn| {
            // Rolled back on drop unless committed
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE waypoints SET flight_id = ?1 WHERE flight_id = ?2",
                params![keep, absorb],
            )?;
            tx.execute(
                "UPDATE flights SET status = 'OPEN', end_time = NULL WHERE id = ?1",
                params![keep],
            )?;
            tx.execute("DELETE FROM flights WHERE id = ?1", params![absorb])?;
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM waypoints WHERE flight_id = ?1",
                params![keep],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(count)
        })?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

fn open_connection(target: &StoreTarget) -> StoreResult<Connection> {
    let connect = |e: rusqlite::Error| StoreError::Connect(format!("{target}: {e}"));

    let conn = match target {
        StoreTarget::File(path) => {
            let conn = Connection::open(path).map_err(connect)?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(connect)?;
            conn
        }
        StoreTarget::Memory => Connection::open_in_memory().map_err(connect)?,
    };
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(connect)?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .map_err(connect)?;
    conn.execute_batch(SCHEMA).map_err(connect)?;
    Ok(conn)
}

fn from_secs(col: usize, secs: i64) -> rusqlite::Result<Timestamp> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(col, secs))
}
