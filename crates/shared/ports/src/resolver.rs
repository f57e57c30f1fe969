use std::io;
use std::net::IpAddr;

/// Port for forward DNS resolution
///
/// Used when a peer self-declares its name: the registered domain of the
/// matching trust entry must resolve to the connecting address.
pub trait HostResolver: Send + Sync {
    /// Resolve a host name to all of its addresses
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}
