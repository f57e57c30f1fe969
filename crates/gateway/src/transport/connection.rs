//! One accepted peer: socket, buffers, timeout escalation

use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, TcpStream};

use chrono::Duration;
use fgtracker_core::{PeerId, ServerIdentity, Timestamp};
use log::{debug, info, warn};

use super::config::TransportConfig;
use crate::messages::{Reply, has_record, next_record, partial_len};
use crate::protocol::PeerSession;

/// Byte stream a peer connection runs over
///
/// Reads and writes must be non-blocking: `WouldBlock` means "nothing now".
pub trait PeerSocket: Read + Write + Send {
    /// Close both directions
    fn close(&mut self) -> io::Result<()>;
}

impl PeerSocket for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Where a peer is in the identify → stream lifecycle
pub enum PeerState {
    /// First record not yet seen; it is discarded unread
    AwaitingBanner,
    /// Next record must be the protocol ident line
    AwaitingIdent,
    Identified(Box<PeerSession>),
}

impl PeerState {
    pub fn is_identified(&self) -> bool {
        matches!(self, PeerState::Identified(_))
    }
}

/// Traffic counters, logged when the peer closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub records: u64,
}

/// An accepted peer
pub struct PeerConnection<S: PeerSocket = TcpStream> {
    id: PeerId,
    addr: IpAddr,
    socket: S,
    /// Cleared on any fatal condition; the peer is then only sent a goodbye
    pub(crate) connected: bool,
    /// Socket already shut down
    closed: bool,
    pub(crate) state: PeerState,
    /// Received bytes; at most one unterminated record at the tail
    pub(crate) inbound: Vec<u8>,
    /// Bytes queued for the peer, sent in order
    pub(crate) outbound: Vec<u8>,
    last_reception: Timestamp,
    timeout_stage: u32,
    pub(crate) stats: PeerStats,
}

impl<S: PeerSocket> PeerConnection<S> {
    pub fn new(id: PeerId, addr: IpAddr, socket: S, now: Timestamp) -> Self {
        Self {
            id,
            addr: addr.to_canonical(),
            socket,
            connected: true,
            closed: false,
            state: PeerState::AwaitingBanner,
            inbound: Vec::new(),
            outbound: Vec::new(),
            last_reception: now,
            timeout_stage: 0,
            stats: PeerStats::default(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_identified(&self) -> bool {
        self.state.is_identified()
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    /// Server name the peer identified as
    pub fn server(&self) -> Option<&ServerIdentity> {
        match &self.state {
            PeerState::Identified(session) => Some(session.server()),
            _ => None,
        }
    }

    pub fn timeout_stage(&self) -> u32 {
        self.timeout_stage
    }

    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Bytes waiting to be written
    pub fn pending_output(&self) -> &[u8] {
        &self.outbound
    }

    pub fn has_record(&self) -> bool {
        has_record(&self.inbound)
    }

    pub(crate) fn next_record(&mut self) -> Option<String> {
        let record = next_record(&mut self.inbound)?;
        self.stats.records += 1;
        Some(record)
    }

    pub fn queue(&mut self, reply: Reply) {
        reply.encode_into(&mut self.outbound);
    }

    /// Drop the peer at the next close check
    pub fn mark_dead(&mut self) {
        self.connected = false;
    }

    /// Name used in log lines: the server identity once known, else the address
    fn label(&self) -> String {
        match self.server() {
            Some(server) => server.to_string(),
            None => self.addr.to_string(),
        }
    }

    /// Escalate the timeout stage if the peer has been silent too long
    ///
    /// Stages 1 to 3 ping identified peers; stage 4 marks the peer dead.
    pub fn check_timeout(&mut self, now: Timestamp, ping_interval: Duration) {
        let waited = ping_interval * self.timeout_stage as i32;
        if now - self.last_reception - waited <= ping_interval {
            return;
        }

        self.timeout_stage += 1;
        let silent = (ping_interval * self.timeout_stage as i32).num_seconds();
        if self.timeout_stage > TransportConfig::MAX_PING_STAGE {
            warn!("Peer {} timed out ({} seconds)", self.label(), silent);
            self.connected = false;
            return;
        }

        if self.is_identified() {
            info!("PING peer {} (no input for {} seconds)", self.label(), silent);
            self.queue(Reply::Ping);
        }
    }

    /// Issue one non-blocking read
    ///
    /// Nothing is read while `max_pending` bytes of complete records wait to
    /// be consumed. A record growing past `max_pending` without a terminator
    /// marks the peer dead. Returns false if the peer is gone (EOF, socket
    /// error or oversized record).
    pub fn read_into(&mut self, chunk: usize, max_pending: usize, now: Timestamp) -> bool {
        if self.inbound.len() >= max_pending && has_record(&self.inbound) {
            return true;
        }

        let mut buf = vec![0u8; chunk];
        match self.socket.read(&mut buf) {
            Ok(0) => {
                info!("Peer {} closed the connection", self.label());
                self.connected = false;
                false
            }
            Ok(n) => {
                self.inbound.extend_from_slice(&buf[..n]);
                self.stats.bytes_read += n as u64;
                if partial_len(&self.inbound) > max_pending {
                    warn!(
                        "Peer {} sent {} bytes without a record terminator, closing",
                        self.label(),
                        partial_len(&self.inbound)
                    );
                    self.connected = false;
                    return false;
                }
                self.last_reception = now;
                self.timeout_stage = 0;
                true
            }
            Err(e) if is_transient(&e) => true,
            Err(e) => {
                warn!("Read from peer {} failed: {}", self.label(), e);
                self.connected = false;
                false
            }
        }
    }

    /// Drain the outbound buffer in at most `max_attempts` writes
    ///
    /// Unsent bytes stay queued for the next tick. Returns false on a
    /// socket error.
    pub fn write_from(&mut self, max_attempts: usize) -> bool {
        let mut attempts = 0;
        while !self.outbound.is_empty() && attempts < max_attempts {
            attempts += 1;
            match self.socket.write(&self.outbound) {
                Ok(0) => {
                    warn!("Peer {} stopped accepting data", self.label());
                    self.connected = false;
                    return false;
                }
                Ok(n) => {
                    self.outbound.drain(..n);
                    self.stats.bytes_written += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Write to peer {} failed: {}", self.label(), e);
                    self.connected = false;
                    return false;
                }
            }
        }

        if !self.outbound.is_empty() {
            debug!(
                "Peer {}: {} bytes left after {} write attempt(s)",
                self.label(),
                self.outbound.len(),
                attempts
            );
        }
        true
    }

    /// Send the goodbye record and shut the socket if the peer is dead
    ///
    /// Returns whether the peer was closed. A closed peer must be removed
    /// from the peer table.
    pub fn close_if_dead(&mut self, max_write_attempts: usize) -> bool {
        if self.connected || self.closed {
            return self.closed;
        }

        self.queue(Reply::Closing);
        self.write_from(max_write_attempts);
        if let Err(e) = self.socket.close() {
            debug!("Shutdown of peer {} failed: {}", self.label(), e);
        }
        self.closed = true;

        info!(
            "Closed peer {} ({}): {} bytes in, {} bytes out, {} records",
            self.label(),
            self.id,
            self.stats.bytes_read,
            self.stats.bytes_written,
            self.stats.records
        );
        true
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted socket: reads pop from a queue, writes accept up to a budget
    #[derive(Default)]
    pub struct FakeSocket {
        pub reads: VecDeque<io::Result<Vec<u8>>>,
        pub written: Vec<u8>,
        /// Bytes accepted per write call; `None` means unlimited
        pub write_limit: Option<usize>,
        /// Write calls allowed before `WouldBlock`; `None` means unlimited
        pub writes_allowed: Option<usize>,
        pub write_error: Option<io::ErrorKind>,
        pub write_calls: usize,
        pub closed: bool,
    }

    impl FakeSocket {
        pub fn with_input(data: &[u8]) -> Self {
            let mut socket = Self::default();
            socket.push(data);
            socket
        }

        pub fn push(&mut self, data: &[u8]) {
            self.reads.push_back(Ok(data.to_vec()));
        }
    }

    impl Read for FakeSocket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                None => Err(io::ErrorKind::WouldBlock.into()),
                Some(Err(e)) => Err(e),
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.reads.push_front(Ok(data[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for FakeSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_calls += 1;
            if let Some(kind) = self.write_error {
                return Err(kind.into());
            }
            if let Some(allowed) = self.writes_allowed {
                if self.write_calls > allowed {
                    return Err(io::ErrorKind::WouldBlock.into());
                }
            }
            let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl PeerSocket for FakeSocket {
        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }
    }
}
