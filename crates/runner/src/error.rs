//! Runner errors

use std::net::SocketAddr;

use fgtracker_gateway::GatewayError;
use fgtracker_ports::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not listen on {addr} after {attempts} attempt(s): {source}")]
    Bind {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
