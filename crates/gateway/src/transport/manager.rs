//! Listening socket and the table of accepted peers

use std::io;
use std::net::{SocketAddr, TcpListener};

use fgtracker_core::{PeerId, Timestamp};
use log::{debug, info, warn};
use uuid::Uuid;

use super::config::TransportConfig;
use super::connection::PeerConnection;
use crate::error::{GatewayError, Result};

/// Owns the listener and every accepted peer
pub struct ConnectionManager {
    /// `None` after shutdown
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    peers: Vec<PeerConnection>,
    config: TransportConfig,
}

impl ConnectionManager {
    /// Bind a non-blocking listener
    pub fn bind(addr: SocketAddr, config: TransportConfig) -> Result<Self> {
        let bind_err = |source: io::Error| GatewayError::Bind { addr, source };

        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!("Listening for fgms peers on {}", local_addr);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            peers: Vec::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.iter()
    }

    pub fn peers_mut(&mut self) -> impl Iterator<Item = &mut PeerConnection> {
        self.peers.iter_mut()
    }

    pub fn peer(&self, id: PeerId) -> Option<&PeerConnection> {
        self.peers.iter().find(|p| p.id() == id)
    }

    /// Accept at most one pending connection; never blocks
    pub fn accept(&mut self, now: Timestamp) -> Result<Option<PeerId>> {
        let listener = self.listener.as_ref().ok_or(GatewayError::ListenerClosed)?;

        let (stream, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(e) => return Err(GatewayError::Listener(e)),
        };

        if let Err(e) = stream.set_nonblocking(true) {
            warn!("Dropping connection from {}: {}", addr, e);
            return Ok(None);
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY on {} failed: {}", addr, e);
        }

        let id = Uuid::new_v4();
        self.peers.push(PeerConnection::new(id, addr.ip(), stream, now));
        info!("Accepted peer {} from {}", id, addr);
        Ok(Some(id))
    }

    /// Drop peers whose close sequence has run; returns how many went
    pub fn reap(&mut self) -> usize {
        let before = self.peers.len();
        self.peers.retain(|p| !p.is_closed());
        before - self.peers.len()
    }

    /// Close every peer with a goodbye record, then the listener
    pub fn shutdown_all(&mut self) {
        let attempts = self.config.max_write_attempts;
        for peer in &mut self.peers {
            peer.mark_dead();
            peer.close_if_dead(attempts);
        }
        let closed = self.reap();

        if self.listener.take().is_some() {
            info!(
                "Closed listener on {} ({} peer(s) disconnected)",
                self.local_addr, closed
            );
        }
    }
}
