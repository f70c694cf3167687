//! Peer identity.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The unique key of a peer in the directory: `host:port`.
///
/// The host is whatever the peer announced in its HELLO (a node name or an
/// address); the port is the peer's data-plane listening port. Two live
/// peers never share an identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId {
    host: String,
    port: u16,
}

impl PeerId {
    /// Creates an identity from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or contains whitespace, a pipe,
    /// or a comma.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        validate_host(&host)?;
        Ok(Self { host, port })
    }

    /// Returns the host part.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port part.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(Error::invalid_identity(host, "empty host"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(Error::invalid_identity(host, "host contains whitespace"));
    }
    // Pipes would blur the `|||` separator and commas split listing lines.
    if host.contains(['|', ',']) {
        return Err(Error::invalid_identity(host, "host contains a pipe or comma"));
    }
    Ok(())
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::invalid_identity(s, "missing port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::invalid_identity(s, "port is not a number"))?;
        validate_host(host).map_err(|_| Error::invalid_identity(s, "invalid host"))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn peer_id_parse_and_display() {
        let id: PeerId = "alice:5001".parse().unwrap();
        assert_eq!(id.host(), "alice");
        assert_eq!(id.port(), 5001);
        assert_eq!(id.to_string(), "alice:5001");
    }

    #[test]
    fn peer_id_splits_on_last_colon() {
        let id: PeerId = "fe80::1:7000".parse().unwrap();
        assert_eq!(id.host(), "fe80::1");
        assert_eq!(id.port(), 7000);
    }

    #[test]
    fn peer_id_rejects_bad_input() {
        assert!("alice".parse::<PeerId>().is_err());
        assert!("alice:port".parse::<PeerId>().is_err());
        assert!(":5001".parse::<PeerId>().is_err());
        assert!("al ice:5001".parse::<PeerId>().is_err());
        assert!("alice:70000".parse::<PeerId>().is_err());
        assert!(PeerId::new("a|||b", 1).is_err());
        assert!("|alice:5001".parse::<PeerId>().is_err());
        assert!(PeerId::new("a,b", 1).is_err());
    }
}
