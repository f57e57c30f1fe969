//! Peer transport: non-blocking TCP connections and their bookkeeping

pub mod config;
pub mod connection;
pub mod dns;
pub mod manager;

pub use config::TransportConfig;
pub use connection::{PeerConnection, PeerSocket, PeerState, PeerStats};
pub use dns::{BoundedResolver, StaticResolver, SystemResolver};
pub use manager::ConnectionManager;
