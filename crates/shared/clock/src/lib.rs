//! fgtracker Clock Infrastructure
//!
//! Provides the time sources the tracker runs on:
//!
//! - [`SystemClock`]: wall-clock UTC in whole seconds, used by the daemon
//! - [`ManualClock`]: frozen time that only moves when told to, used to
//!   drive ping/timeout escalation and reconnect cadence in tests
//!
//! ## Usage
//!
//! ```ignore
//! use fgtracker_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! let t0 = clock.now();
//! clock.advance(Duration::seconds(61));
//! assert_eq!(clock.now() - t0, Duration::seconds(61));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use fgtracker_ports::Clock;
