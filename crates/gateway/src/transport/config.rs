//! Transport configuration

use chrono::Duration;

/// Per-peer limits applied on every tick
///
/// Each limit bounds the work one peer can cause in a single tick, so the
/// tick has a fixed worst case regardless of how chatty a peer is.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Silence after which an identified peer is pinged; four missed
    /// windows drop the peer
    pub ping_interval: Duration,
    /// Bytes requested per read
    pub read_chunk: usize,
    /// Write calls per peer per tick
    pub max_write_attempts: usize,
    /// Records dispatched per peer per tick
    pub max_records_per_tick: usize,
    /// Longest record a peer may send; also the inbound backlog at which
    /// reading pauses until buffered records are consumed
    pub max_pending_record: usize,
}

impl TransportConfig {
    pub const DEFAULT_READ_CHUNK: usize = 2048;
    pub const DEFAULT_MAX_WRITE_ATTEMPTS: usize = 4;
    pub const DEFAULT_MAX_RECORDS_PER_TICK: usize = 100;
    pub const DEFAULT_MAX_PENDING_RECORD: usize = 64 * 1024;

    /// Escalation stages that get a PING; the next one drops the peer
    pub const MAX_PING_STAGE: u32 = 3;

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::seconds(60),
            read_chunk: Self::DEFAULT_READ_CHUNK,
            max_write_attempts: Self::DEFAULT_MAX_WRITE_ATTEMPTS,
            max_records_per_tick: Self::DEFAULT_MAX_RECORDS_PER_TICK,
            max_pending_record: Self::DEFAULT_MAX_PENDING_RECORD,
        }
    }
}
