//! Peer identification against the trust list
//!
//! A peer's first record is a disposable banner. The second is its ident
//! line, whose first token names the protocol family:
//!
//! ```text
//! NOWAIT
//! V20151207 <fgms-version> <domain> <name>
//! ```
//!
//! The peer is authorized when a trust entry for (family, connecting
//! address) exists. Families with the name fallback may instead match by
//! the declared `<name>`, provided the entry's registered domain resolves
//! to the connecting address. Declared names or domains that are literal
//! IP addresses are refused outright.

use std::net::IpAddr;
use std::sync::Arc;

use fgtracker_core::ServerIdentity;
use fgtracker_ports::{Clock, FlightStore, HostResolver, StoreResult};
use fgtracker_sessions::SessionTracker;
use log::{debug, error, info, warn};

use crate::messages::Reply;
use crate::protocol::{PeerSession, ProtocolSpec};
use crate::transport::{PeerConnection, PeerSocket, PeerState};

/// Result of one identification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentOutcome {
    /// No complete record buffered yet
    Incomplete,
    /// The banner record was dropped; the ident line comes next
    BannerDiscarded,
    Identified(ServerIdentity),
    /// Unknown protocol family (the token is carried for logging)
    Unsupported(String),
    /// Known family, but no trust entry matches
    Unauthorized,
    /// The store failed; peer closed and store marked down
    StoreUnavailable,
    /// Peer already identified
    AlreadyIdentified,
}

/// Identifies peers and binds them to a session tracker
pub struct IdentityResolver {
    protocols: Vec<ProtocolSpec>,
    resolver: Arc<dyn HostResolver>,
    clock: Arc<dyn Clock>,
}

impl IdentityResolver {
    pub fn new(
        protocols: Vec<ProtocolSpec>,
        resolver: Arc<dyn HostResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            protocols,
            resolver,
            clock,
        }
    }

    pub fn protocols(&self) -> &[ProtocolSpec] {
        &self.protocols
    }

    /// Consume at most one record from an unidentified peer
    ///
    /// Any failure marks the peer dead; only success queues a reply.
    pub fn identify<S: PeerSocket>(
        &self,
        peer: &mut PeerConnection<S>,
        store: &mut dyn FlightStore,
    ) -> IdentOutcome {
        if peer.is_identified() {
            return IdentOutcome::AlreadyIdentified;
        }
        let Some(record) = peer.next_record() else {
            return IdentOutcome::Incomplete;
        };

        if matches!(peer.state, PeerState::AwaitingBanner) {
            debug!("Peer {} banner discarded: {}", peer.addr(), record);
            peer.state = PeerState::AwaitingIdent;
            return IdentOutcome::BannerDiscarded;
        }

        let tokens: Vec<&str> = record.split_whitespace().collect();
        let key = tokens.first().copied().unwrap_or_default();
        let Some(protocol) = self.protocols.iter().find(|p| p.key == key) else {
            warn!(
                "Peer {} sent unsupported protocol {:?}, closing",
                peer.addr(),
                key
            );
            peer.mark_dead();
            return IdentOutcome::Unsupported(key.to_string());
        };

        let server = match self.authorize(protocol, &tokens, peer.addr(), store) {
            Ok(Some(server)) => server,
            Ok(None) => {
                warn!(
                    "Peer {} is not authorized for protocol {}, closing",
                    peer.addr(),
                    protocol.key
                );
                peer.mark_dead();
                return IdentOutcome::Unauthorized;
            }
            Err(e) => return self.store_failed(peer, store, &e.to_string()),
        };

        let tracker = match SessionTracker::attach(server.clone(), store, Arc::clone(&self.clock)) {
            Ok(tracker) => tracker,
            Err(e) => return self.store_failed(peer, store, &e.to_string()),
        };

        info!(
            "Peer {} identified as {} via protocol {}",
            peer.addr(),
            server,
            protocol.key
        );
        peer.state = PeerState::Identified(Box::new(PeerSession::new(protocol, tracker)));
        peer.queue(Reply::Identified(server.to_string()));
        IdentOutcome::Identified(server)
    }

    fn authorize(
        &self,
        protocol: &ProtocolSpec,
        tokens: &[&str],
        addr: IpAddr,
        store: &mut dyn FlightStore,
    ) -> StoreResult<Option<ServerIdentity>> {
        if let Some(name) = store.find_authorized_server(&protocol.key, addr)? {
            return Ok(Some(ServerIdentity::new(name)));
        }
        if !protocol.name_fallback {
            return Ok(None);
        }

        // <key> <fgms-version> <domain> <name>
        let (Some(domain), Some(name)) = (tokens.get(2), tokens.get(3)) else {
            debug!("Peer {} declared no name", addr);
            return Ok(None);
        };
        if is_ip_literal(domain) || is_ip_literal(name) {
            warn!(
                "Peer {} declared an address instead of a name ({} {})",
                addr, domain, name
            );
            return Ok(None);
        }

        let Some(entry) = store.find_authorized_server_by_name(&protocol.key, name)? else {
            return Ok(None);
        };
        let Some(registered) = entry.domain.as_deref() else {
            debug!("Trust entry {} has no registered domain", entry.name);
            return Ok(None);
        };

        match self.resolver.resolve(registered) {
            Ok(addrs) if addrs.iter().any(|a| a.to_canonical() == addr) => {
                Ok(Some(ServerIdentity::new(entry.name)))
            }
            Ok(addrs) => {
                warn!(
                    "Peer {} claims {} but {} resolves to {:?}",
                    addr, name, registered, addrs
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Cannot resolve {} for peer {}: {}", registered, addr, e);
                Ok(None)
            }
        }
    }

    fn store_failed<S: PeerSocket>(
        &self,
        peer: &mut PeerConnection<S>,
        store: &mut dyn FlightStore,
        reason: &str,
    ) -> IdentOutcome {
        error!("Identification of peer {} failed: {}", peer.addr(), reason);
        store.mark_disconnected();
        peer.mark_dead();
        IdentOutcome::StoreUnavailable
    }
}

fn is_ip_literal(token: &str) -> bool {
    token.trim_matches(['[', ']']).parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticResolver;
    use crate::transport::connection::testing::FakeSocket;
    use chrono::{TimeZone, Utc};
    use fgtracker_clock::ManualClock;
    use fgtracker_core::{Timestamp, TrustEntry};
    use fgtracker_store::SqliteFlightStore;
    use uuid::Uuid;

    const PEER_ADDR: &str = "192.0.2.10";

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2015, 12, 7, 12, 0, 0).unwrap()
    }

    fn addr() -> IpAddr {
        PEER_ADDR.parse().unwrap()
    }

    fn resolver(dns: StaticResolver) -> IdentityResolver {
        IdentityResolver::new(
            ProtocolSpec::defaults(),
            Arc::new(dns),
            Arc::new(ManualClock::new(Some(t0()))),
        )
    }

    fn peer(input: &[u8]) -> PeerConnection<FakeSocket> {
        let mut peer = PeerConnection::new(Uuid::new_v4(), addr(), FakeSocket::default(), t0());
        peer.inbound.extend_from_slice(input);
        peer
    }

    fn store() -> SqliteFlightStore {
        let mut store = SqliteFlightStore::in_memory().unwrap();
        store
            .upsert_trust_entry(&TrustEntry::by_address("mpserver01", "NOWAIT", addr()))
            .unwrap();
        store
            .upsert_trust_entry(&TrustEntry::by_domain(
                "mpserver02",
                "V20151207",
                "mpserver02.example.org",
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_banner_is_discarded_first() {
        let mut store = store();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"NOWAIT\0NOWAIT\0");

        // Even a valid ident line is dropped when it is the first record
        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::BannerDiscarded);
        assert!(!peer.is_identified());
        assert!(peer.pending_output().is_empty());

        assert_eq!(
            ident.identify(&mut peer, &mut store),
            IdentOutcome::Identified(ServerIdentity::new("mpserver01"))
        );
        assert_eq!(peer.pending_output(), b"IDENTIFIED mpserver01\0");
        assert_eq!(peer.server(), Some(&ServerIdentity::new("mpserver01")));
    }

    #[test]
    fn test_incomplete_record_waits() {
        let mut store = store();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"Please initial");

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::Incomplete);
        assert!(peer.is_connected());
    }

    #[test]
    fn test_unsupported_protocol_skips_store() {
        let mut store = store();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"Please initialize\0V20151118 0.11\0");
        ident.identify(&mut peer, &mut store);

        let before = store.statements_executed();
        assert_eq!(
            ident.identify(&mut peer, &mut store),
            IdentOutcome::Unsupported("V20151118".into())
        );
        assert_eq!(store.statements_executed(), before);
        assert!(!peer.is_connected());
    }

    #[test]
    fn test_unauthorized_address_gets_no_reply() {
        let mut store = SqliteFlightStore::in_memory().unwrap();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"Please initialize\0NOWAIT\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::Unauthorized);
        assert!(!peer.is_connected());
        assert!(peer.pending_output().is_empty());
    }

    #[test]
    fn test_nowait_has_no_name_fallback() {
        let mut store = SqliteFlightStore::in_memory().unwrap();
        store
            .upsert_trust_entry(&TrustEntry::by_domain("mpserver02", "NOWAIT", "mpserver02.example.org"))
            .unwrap();
        let ident = resolver(StaticResolver::new().with_host("mpserver02.example.org", addr()));
        let mut peer = peer(b"x\0NOWAIT 0.11 mpserver02.example.org mpserver02\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::Unauthorized);
    }

    #[test]
    fn test_declared_name_with_matching_dns() {
        let mut store = store();
        let ident = resolver(StaticResolver::new().with_host("mpserver02.example.org", addr()));
        let mut peer = peer(b"Please initialize\0V20151207 0.11.8 mpserver02.example.org mpserver02\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(
            ident.identify(&mut peer, &mut store),
            IdentOutcome::Identified(ServerIdentity::new("mpserver02"))
        );
        assert_eq!(peer.pending_output(), b"IDENTIFIED mpserver02\0");
    }

    #[test]
    fn test_declared_name_with_mismatched_dns() {
        let mut store = store();
        let other: IpAddr = "198.51.100.1".parse().unwrap();
        let ident = resolver(StaticResolver::new().with_host("mpserver02.example.org", other));
        let mut peer = peer(b"x\0V20151207 0.11.8 mpserver02.example.org mpserver02\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::Unauthorized);
        assert!(peer.pending_output().is_empty());
    }

    #[test]
    fn test_declared_address_is_refused() {
        let mut store = store();
        let ident = resolver(StaticResolver::new().with_host("mpserver02.example.org", addr()));
        let mut peer = peer(b"x\0V20151207 0.11.8 192.0.2.10 mpserver02\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::Unauthorized);
    }

    #[test]
    fn test_address_match_wins_for_versioned_protocol() {
        let mut store = store();
        store
            .upsert_trust_entry(&TrustEntry::by_address("mpserver03", "V20151207", addr()))
            .unwrap();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"x\0V20151207 0.11.8 mpserver02.example.org mpserver02\0");
        ident.identify(&mut peer, &mut store);

        assert_eq!(
            ident.identify(&mut peer, &mut store),
            IdentOutcome::Identified(ServerIdentity::new("mpserver03"))
        );
    }

    #[test]
    fn test_store_down_closes_peer() {
        let mut store = store();
        let ident = resolver(StaticResolver::new());
        let mut peer = peer(b"x\0NOWAIT\0");
        ident.identify(&mut peer, &mut store);
        store.mark_disconnected();

        assert_eq!(ident.identify(&mut peer, &mut store), IdentOutcome::StoreUnavailable);
        assert!(!peer.is_connected());
        assert!(!store.is_connected());
    }
}
