use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Storage-assigned flight identifier
pub type FlightId = i64;

/// Unique identifier for an accepted peer connection
pub type PeerId = Uuid;

/// Callsign reported by a pilot, e.g. `AF2222`
pub type Callsign = String;

/// Name of an authorized fgms server, as registered in the trust list
///
/// Flights are scoped to the server that reported them, so this is also the
/// partition key of the open-flight state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerIdentity(pub String);

impl ServerIdentity {
    /// Create a new server identity
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServerIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServerIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
