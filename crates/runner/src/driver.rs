//! The polling event loop
//!
//! One thread serves every peer. Each tick does a bounded amount of work per
//! peer, and the loop only sleeps when no new peer arrived, so a burst of
//! connections is drained without delay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fgtracker_core::{PeerId, TrustEntry};
use fgtracker_gateway::{
    ConnectionManager, DispatchStatus, IdentOutcome, IdentityResolver, dispatch,
};
use fgtracker_ports::{Clock, FlightStore};
use log::{debug, error, info};
use tokio::sync::watch;

use crate::bootstrap::seed_trust_entries;
use crate::reconnect::{ReconnectOutcome, ReconnectPolicy};

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub store: ReconnectOutcome,
    pub accepted: Option<PeerId>,
    /// Peers that completed identification
    pub identified: usize,
    /// Peers refused during identification
    pub refused: usize,
    /// Peers removed from the table
    pub closed: usize,
    /// Peers still in the table
    pub peers: usize,
    pub store_connected: bool,
}

/// Owns the listener, the store and the identification rules
pub struct Tracker<F: FlightStore> {
    manager: ConnectionManager,
    store: F,
    ident: IdentityResolver,
    clock: Arc<dyn Clock>,
    reconnect: ReconnectPolicy,
    tick_interval: Duration,
    /// Re-seeded whenever the store is restored
    trusted: Vec<TrustEntry>,
}

impl<F: FlightStore> Tracker<F> {
    pub fn new(
        manager: ConnectionManager,
        store: F,
        ident: IdentityResolver,
        clock: Arc<dyn Clock>,
        reconnect: ReconnectPolicy,
        tick_interval: Duration,
    ) -> Self {
        Self {
            manager,
            store,
            ident,
            clock,
            reconnect,
            tick_interval,
            trusted: Vec::new(),
        }
    }

    pub fn with_trust_entries(mut self, entries: Vec<TrustEntry>) -> Self {
        self.trusted = entries;
        self
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut F {
        &mut self.store
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.manager.local_addr()
    }

    /// Run one pass over the listener and every peer
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let store_outcome = self.reconnect.maybe_reconnect(&mut self.store, now);
        if store_outcome == ReconnectOutcome::Restored {
            seed_trust_entries(&mut self.store, &self.trusted);
        }

        let accepted = match self.manager.accept(now) {
            Ok(id) => id,
            Err(e) => {
                error!("Accept failed: {}", e);
                None
            }
        };

        let config = self.manager.config().clone();
        let mut identified = 0;
        let mut refused = 0;

        for peer in self.manager.peers_mut() {
            if peer.close_if_dead(config.max_write_attempts) {
                continue;
            }
            peer.check_timeout(now, config.ping_interval);

            // With the store down, input stays in the socket until it is back
            if peer.is_connected() && self.store.is_connected() {
                peer.read_into(config.read_chunk, config.max_pending_record, now);

                if peer.is_connected() && peer.has_record() {
                    if peer.is_identified() {
                        let status =
                            dispatch(peer, &mut self.store, config.max_records_per_tick);
                        if status == DispatchStatus::StoreDown {
                            debug!("Store went down while serving peer {}", peer.id());
                        }
                    } else {
                        match self.ident.identify(peer, &mut self.store) {
                            IdentOutcome::Identified(_) => identified += 1,
                            IdentOutcome::Unsupported(_)
                            | IdentOutcome::Unauthorized
                            | IdentOutcome::StoreUnavailable => refused += 1,
                            IdentOutcome::Incomplete
                            | IdentOutcome::BannerDiscarded
                            | IdentOutcome::AlreadyIdentified => {}
                        }
                    }
                }
            }

            if peer.is_connected() {
                peer.write_from(config.max_write_attempts);
            }
        }

        let closed = self.manager.reap();
        TickReport {
            store: store_outcome,
            accepted,
            identified,
            refused,
            closed,
            peers: self.manager.len(),
            store_connected: self.store.is_connected(),
        }
    }

    /// Tick until shutdown is signalled, then close everything
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Tracker running on {} (tick {} ms, clock {})",
            self.local_addr(),
            self.tick_interval.as_millis(),
            self.clock.name()
        );

        while !*shutdown.borrow() {
            let report = self.tick();
            if report.accepted.is_some() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.shutdown();
    }

    /// Say goodbye to every peer, close the listener and drop the store
    pub fn shutdown(&mut self) {
        info!("Shutting down ({} peer(s) connected)", self.manager.len());
        self.manager.shutdown_all();
        self.store.mark_disconnected();
    }
}
