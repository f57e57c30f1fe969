use fgtracker_core::Timestamp;

/// Source of "now" for the tick loop
///
/// Peer timeouts and the store reconnect cadence read the time only through
/// this port, so tests drive them with a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Shown in the startup log line
    fn name(&self) -> &str {
        "clock"
    }
}
