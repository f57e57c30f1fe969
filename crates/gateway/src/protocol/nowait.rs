//! NUL-terminated record grammar spoken after identification
//!
//! ```text
//! PING
//! PONG
//! POSITION   <callsign> <reserved> <lat> <lon> <alt> <date> <time>
//! CONNECT    <callsign> <reserved> <model> <date> <time>
//! DISCONNECT <callsign> <reserved> <model> <date> <time>
//! ```
//!
//! Tokens are separated by single spaces; `<date> <time>` is UTC in
//! `%Y-%m-%d %H:%M:%S`. The reserved token is ignored.

use chrono::NaiveDateTime;
use fgtracker_core::{Position, Timestamp, TrackEvent};

use super::{Inbound, MessageDispatcher};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fragments some fgms builds emit for clients they cannot decode, e.g.
/// `POSITION * Bad Client *  0 0 . 2012-12-03 21:03:53`
const MALFORMED_MARKERS: [&str; 2] = ["* bad client *", ". . ."];

#[derive(Debug, Default, Clone, Copy)]
pub struct NowaitDispatcher;

impl MessageDispatcher for NowaitDispatcher {
    fn name(&self) -> &str {
        "NOWAIT"
    }

    fn parse(&self, record: &str) -> Inbound {
        parse_record(record)
    }
}

pub fn parse_record(record: &str) -> Inbound {
    let lower = record.to_ascii_lowercase();
    if MALFORMED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Inbound::Malformed;
    }

    let tokens: Vec<&str> = record.split(' ').collect();
    let event = match tokens.as_slice() {
        ["PING", ..] => return Inbound::Ping,
        ["PONG", ..] => return Inbound::Pong,
        ["POSITION", callsign, _, lat, lon, alt, date, time, ..] => {
            position(callsign, lat, lon, alt, date, time)
        }
        ["CONNECT", callsign, _, model, date, time, ..] => {
            parse_time(date, time).map(|time| TrackEvent::Connect {
                callsign: callsign.to_string(),
                model: model.to_string(),
                time,
            })
        }
        ["DISCONNECT", callsign, _, model, date, time, ..] => {
            parse_time(date, time).map(|time| TrackEvent::Disconnect {
                callsign: callsign.to_string(),
                model: model.to_string(),
                time,
            })
        }
        _ => None,
    };

    event.map_or(Inbound::Unrecognized, Inbound::Event)
}

fn position(
    callsign: &str,
    lat: &str,
    lon: &str,
    alt: &str,
    date: &str,
    time: &str,
) -> Option<TrackEvent> {
    let position = Position::new(lat.parse().ok()?, lon.parse().ok()?, alt.parse().ok()?);
    Some(TrackEvent::Position {
        callsign: callsign.to_string(),
        position,
        time: parse_time(date, time)?,
    })
}

fn parse_time(date: &str, time: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}
