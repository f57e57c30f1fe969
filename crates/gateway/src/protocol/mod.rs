//! Protocol families and record dispatch for identified peers
//!
//! A peer picks its protocol family with the first token of its ident line.
//! The family fixes the record dialect for the rest of the connection: the
//! dispatcher is chosen once at identification and kept in the peer's
//! [`PeerSession`].

pub mod nowait;

use fgtracker_core::{ServerIdentity, TrackEvent};
use fgtracker_ports::FlightStore;
use fgtracker_sessions::SessionTracker;
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};

use crate::messages::{Reply, has_record, next_record};
use crate::transport::{PeerConnection, PeerSocket, PeerState};

pub use nowait::NowaitDispatcher;

/// Record grammar a protocol family speaks after identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// NUL-terminated records, see [`nowait`]
    Nowait,
}

impl Dialect {
    pub fn dispatcher(&self) -> Box<dyn MessageDispatcher> {
        match self {
            Dialect::Nowait => Box::new(NowaitDispatcher),
        }
    }
}

/// A recognized protocol family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSpec {
    /// Literal first token of the ident line, also the trust-list protocol key
    pub key: String,
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
    /// Allow identification by declared name + DNS when the address is not
    /// in the trust list
    #[serde(default)]
    pub name_fallback: bool,
}

fn default_dialect() -> Dialect {
    Dialect::Nowait
}

impl ProtocolSpec {
    /// Bare `NOWAIT` ident, authorized by address only
    pub fn nowait() -> Self {
        Self {
            key: "NOWAIT".to_string(),
            dialect: Dialect::Nowait,
            name_fallback: false,
        }
    }

    /// `V20151207 <fgms-version> <domain> <name>` ident
    pub fn v20151207() -> Self {
        Self {
            key: "V20151207".to_string(),
            dialect: Dialect::Nowait,
            name_fallback: true,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::nowait(), Self::v20151207()]
    }
}

/// One parsed record
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ping,
    /// Answer to a PING we sent; needs no reply
    Pong,
    Event(TrackEvent),
    /// Known garbage some peers send; acknowledged and dropped
    Malformed,
    /// Protocol violation; the peer is disconnected
    Unrecognized,
}

/// Record parser for one dialect
pub trait MessageDispatcher: Send {
    fn name(&self) -> &str;

    fn parse(&self, record: &str) -> Inbound;
}

/// Everything bound to a peer once it has identified
pub struct PeerSession {
    server: ServerIdentity,
    protocol: String,
    dispatcher: Box<dyn MessageDispatcher>,
    tracker: SessionTracker,
}

impl PeerSession {
    pub fn new(protocol: &ProtocolSpec, tracker: SessionTracker) -> Self {
        Self {
            server: tracker.server().clone(),
            protocol: protocol.key.clone(),
            dispatcher: protocol.dialect.dispatcher(),
            tracker,
        }
    }

    pub fn server(&self) -> &ServerIdentity {
        &self.server
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }
}

/// Why a dispatch pass stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// No complete record left
    Drained,
    /// Per-tick record cap reached with records still buffered
    BatchLimit,
    /// The peer was marked dead (protocol violation or store failure)
    PeerClosed,
    /// The store went down; remaining records wait for reconnect
    StoreDown,
    /// Peer has not identified yet
    NotIdentified,
}

/// Process up to `max_records` buffered records of an identified peer
///
/// Every event reply is queued on the peer. Processing stops early as soon
/// as the peer or the store is marked disconnected.
pub fn dispatch<S: PeerSocket>(
    peer: &mut PeerConnection<S>,
    store: &mut dyn FlightStore,
    max_records: usize,
) -> DispatchStatus {
    let PeerState::Identified(session) = &mut peer.state else {
        return DispatchStatus::NotIdentified;
    };

    for _ in 0..max_records {
        let Some(record) = next_record(&mut peer.inbound) else {
            return DispatchStatus::Drained;
        };
        peer.stats.records += 1;
        trace!("[{}] {}: {}", session.server, session.dispatcher.name(), record);

        match session.dispatcher.parse(&record) {
            Inbound::Ping => Reply::Pong.encode_into(&mut peer.outbound),
            Inbound::Pong => trace!("[{}] PONG received", session.server),
            Inbound::Malformed => {
                warn!("[{}] Malformed record ignored: {}", session.server, record);
                Reply::Ok.encode_into(&mut peer.outbound);
            }
            Inbound::Unrecognized => {
                warn!(
                    "[{}] Unrecognized record, closing connection: {}",
                    session.server, record
                );
                Reply::not_recognized().encode_into(&mut peer.outbound);
                peer.connected = false;
            }
            Inbound::Event(event) => match session.tracker.on_event(&event, store) {
                Ok(outcome) => {
                    debug!(
                        "[{}] {} {}: {:?}",
                        session.server,
                        event.kind(),
                        event.callsign(),
                        outcome
                    );
                    Reply::Ok.encode_into(&mut peer.outbound);
                }
                Err(e) => {
                    error!(
                        "[{}] {} {} failed: {}",
                        session.server,
                        event.kind(),
                        event.callsign(),
                        e
                    );
                    store.mark_disconnected();
                    peer.connected = false;
                }
            },
        }

        if !peer.connected {
            return DispatchStatus::PeerClosed;
        }
        if !store.is_connected() {
            return DispatchStatus::StoreDown;
        }
    }

    if has_record(&peer.inbound) {
        debug!(
            "[{}] Record cap ({}) reached, resuming next tick",
            session.server, max_records
        );
        return DispatchStatus::BatchLimit;
    }
    DispatchStatus::Drained
}
