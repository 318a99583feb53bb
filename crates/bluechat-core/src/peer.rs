//! Peer identities observed during discovery.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Transport address of a remote peer.
///
/// Opaque to the core: a MAC address such as "00:11:22:AA:BB:CC" on a real
/// radio, a socket address on the TCP-emulated radio. Stable for the
/// lifetime of the peer and unique per peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Creates a new PeerAddress from a string.
    ///
    /// No format validation is performed; the radio owns the address format.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PeerAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Peer Identity
// ============================================================================

/// A remote device as seen by discovery.
///
/// Immutable once observed. Equality and hashing use the address only:
/// names are optional and may change between sightings of the same device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Transport address (the identity key)
    pub address: PeerAddress,

    /// Human-readable device name, if the radio reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PeerIdentity {
    /// Creates a peer identity with a name.
    pub fn new(address: impl Into<PeerAddress>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    /// Creates a peer identity for a device that did not report a name.
    pub fn unnamed(address: impl Into<PeerAddress>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Returns the name for display, falling back to the address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.address.as_str())
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_name() {
        let a = PeerIdentity::new("00:11:22:33:44:55", "Pixel");
        let b = PeerIdentity::new("00:11:22:33:44:55", "Renamed");
        let c = PeerIdentity::unnamed("00:11:22:33:44:55");
        assert_eq!(a, b);
        assert_eq!(a, c);

        let other = PeerIdentity::new("66:77:88:99:AA:BB", "Pixel");
        assert_ne!(a, other);
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(PeerIdentity::new("AA", "first"));
        set.insert(PeerIdentity::new("AA", "second"));
        set.insert(PeerIdentity::unnamed("BB"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(PeerIdentity::new("AA", "Laptop").display_name(), "Laptop");
        assert_eq!(PeerIdentity::unnamed("AA").display_name(), "AA");
    }

    #[test]
    fn test_display() {
        assert_eq!(PeerIdentity::new("AA", "Laptop").to_string(), "Laptop (AA)");
        assert_eq!(PeerIdentity::unnamed("AA").to_string(), "AA");
    }

    #[test]
    fn test_serde_skips_missing_name() {
        let json = serde_json::to_string(&PeerIdentity::unnamed("AA")).unwrap();
        assert_eq!(json, r#"{"address":"AA"}"#);

        let parsed: PeerIdentity = serde_json::from_str(r#"{"address":"BB","name":"x"}"#).unwrap();
        assert_eq!(parsed.address.as_str(), "BB");
        assert_eq!(parsed.name.as_deref(), Some("x"));
    }
}
