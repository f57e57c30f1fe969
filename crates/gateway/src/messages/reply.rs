//! Records the tracker sends back to peers

use std::fmt;

use super::framing::write_record;

/// A server-to-peer record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Acknowledges an event record
    Ok,
    /// Keepalive sent to a silent peer
    Ping,
    /// Answer to a peer's `PING`
    Pong,
    /// Identification accepted under this server name
    Identified(String),
    /// `Failed : <reason>`
    Failed(String),
    /// Last record before the tracker closes the connection
    Closing,
}

impl Reply {
    pub fn not_recognized() -> Self {
        Reply::Failed("Message not recognized".to_string())
    }

    /// Append the framed record to an outbound buffer
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        write_record(out, &self.to_string());
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Ping => write!(f, "PING"),
            Reply::Pong => write!(f, "PONG"),
            Reply::Identified(name) => write!(f, "IDENTIFIED {}", name),
            Reply::Failed(reason) => write!(f, "Failed : {}", reason),
            Reply::Closing => write!(f, "Error : FGTracker is closing your connection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_text() {
        assert_eq!(Reply::Identified("mpserver01".into()).to_string(), "IDENTIFIED mpserver01");
        assert_eq!(
            Reply::not_recognized().to_string(),
            "Failed : Message not recognized"
        );
    }

    #[test]
    fn test_encode_appends_terminator() {
        let mut out = b"OK\0".to_vec();
        Reply::Pong.encode_into(&mut out);
        assert_eq!(out, b"OK\0PONG\0");
    }
}
