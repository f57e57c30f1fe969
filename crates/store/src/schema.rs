/// Baseline schema, created on every connect if absent
///
/// Times are stored as UTC unix seconds so the merge window can be computed
/// in SQL.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS flights (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    callsign    TEXT    NOT NULL,
    status      TEXT    NOT NULL CHECK (status IN ('OPEN', 'CLOSED')),
    model       TEXT    NOT NULL,
    start_time  INTEGER NOT NULL,
    end_time    INTEGER,
    server      TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS flights_server_status ON flights (server, status);
CREATE INDEX IF NOT EXISTS flights_callsign_end ON flights (callsign, end_time);

CREATE TABLE IF NOT EXISTS waypoints (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_id   INTEGER NOT NULL REFERENCES flights (id) ON DELETE CASCADE,
    time        INTEGER NOT NULL,
    latitude    REAL    NOT NULL,
    longitude   REAL    NOT NULL,
    altitude    REAL    NOT NULL
);
CREATE INDEX IF NOT EXISTS waypoints_flight_time ON waypoints (flight_id, time);

CREATE TABLE IF NOT EXISTS fgms_servers (
    name        TEXT    NOT NULL,
    protocol    TEXT    NOT NULL,
    ip          TEXT,
    domain      TEXT,
    enabled     INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (name, protocol)
);
";
