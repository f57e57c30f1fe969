//! Error types for the gateway crate

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Listener-level errors
///
/// Peer I/O failures never show up here; they only mark the peer dead.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Listener error: {0}")]
    Listener(#[from] io::Error),

    #[error("Listener is closed")]
    ListenerClosed,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
