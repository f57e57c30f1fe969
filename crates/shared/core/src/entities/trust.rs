use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A configured (protocol, address-or-name) pair authorized to report as a
/// named server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEntry {
    /// Server identity flights are recorded under
    pub name: String,
    /// Protocol family key, e.g. `NOWAIT`
    pub protocol: String,
    /// Address the server connects from (direct match)
    #[serde(default)]
    pub address: Option<IpAddr>,
    /// Registered DNS name, used when the peer self-declares its name
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TrustEntry {
    /// Entry authorized by connecting address
    pub fn by_address(name: impl Into<String>, protocol: impl Into<String>, address: IpAddr) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            address: Some(address),
            domain: None,
            enabled: true,
        }
    }

    /// Entry authorized by declared name whose domain must resolve to the peer
    pub fn by_domain(
        name: impl Into<String>,
        protocol: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            address: None,
            domain: Some(domain.into()),
            enabled: true,
        }
    }
}
