//! fgtracker Runner
//!
//! Wires the tracker together and drives it:
//!
//! - **Config**: JSON configuration with environment overrides
//! - **Bootstrap**: store connection, trust-list seeding, listener bind with retry
//! - **Reconnect**: rate-limited store reconnect attempts
//! - **Driver**: the single-threaded polling loop
//!
//! ## Tick
//!
//! ```text
//!  reconnect store (if due)
//!          │
//!  accept one peer
//!          │
//!  for each peer ──► close if dead ──► timeout check ──► read
//!          │                                              │
//!          │                 identify (unidentified) ◄────┤
//!          │                 dispatch (identified)   ◄────┘
//!          │                          │
//!          │                        write
//!          ▼
//!  reap closed peers ──► sleep (unless a peer was just accepted)
//! ```

pub mod bootstrap;
pub mod config;
pub mod driver;
pub mod error;
pub mod reconnect;

// Re-export main types
pub use bootstrap::{BindRetry, bind_with_retry, launch, open_store, seed_trust_entries};
pub use config::{ConfigError, ListenConfig, StoreConfig, TrackerConfig};
pub use driver::{TickReport, Tracker};
pub use error::RunnerError;
pub use reconnect::{ReconnectOutcome, ReconnectPolicy};
