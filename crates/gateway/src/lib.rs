//! fgtracker Gateway
//!
//! Everything between the listening socket and the session tracker:
//! - Wire framing and replies (NUL-terminated ASCII records)
//! - Peer connections with their buffers and timeout state
//! - The connection manager owning the listener and the peer table
//! - Identification of a peer against the trust list
//! - Per-protocol record dispatch into the session tracker
//!
//! ## Flow
//!
//! ```text
//! socket ──► inbound buffer ──► next_record ──┬─► IdentityResolver (unidentified)
//!                                             └─► dispatch ──► SessionTracker ──► FlightStore
//!                                                     │
//! socket ◄── outbound buffer ◄── Reply ◄──────────────┘
//! ```
//!
//! All socket I/O is non-blocking and every per-peer step is bounded, so a
//! single thread can poll any number of peers.

pub mod error;
pub mod ident;
pub mod messages;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::{GatewayError, Result};
pub use ident::{IdentOutcome, IdentityResolver};
pub use messages::{RECORD_TERMINATOR, Reply, next_record};
pub use protocol::{
    Dialect, DispatchStatus, Inbound, MessageDispatcher, PeerSession, ProtocolSpec, dispatch,
};
pub use transport::{
    BoundedResolver, ConnectionManager, PeerConnection, PeerSocket, PeerState, PeerStats,
    StaticResolver, SystemResolver, TransportConfig,
};
