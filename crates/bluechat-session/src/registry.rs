//! Registry of peers seen during a scan.

use std::sync::Arc;

use tokio::sync::RwLock;

use bluechat_core::{PeerAddress, PeerIdentity};

/// Registry shared between the discovery pump (writer) and display
/// collaborators (readers).
pub type SharedRegistry = Arc<RwLock<DeviceRegistry>>;

/// Deduplicated peers in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    peers: Vec<PeerIdentity>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry behind a lock.
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Forgets every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Appends `peer` unless its address is already present.
    ///
    /// Returns true if the peer was new. A later sighting never replaces the
    /// first one, even if it carries a different name.
    pub fn add(&mut self, peer: PeerIdentity) -> bool {
        if self.contains(&peer.address) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Owned copy of the peers in discovery order.
    pub fn snapshot(&self) -> Vec<PeerIdentity> {
        self.peers.clone()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peer at `index` in discovery order.
    pub fn get(&self, index: usize) -> Option<&PeerIdentity> {
        self.peers.get(index)
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.peers.iter().any(|p| &p.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates_by_address() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.add(PeerIdentity::new("AA", "first")));
        assert!(registry.add(PeerIdentity::unnamed("BB")));
        assert!(!registry.add(PeerIdentity::new("AA", "renamed")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).and_then(|p| p.name.as_deref()), Some("first"));
    }

    #[test]
    fn test_snapshot_preserves_first_seen_order() {
        let mut registry = DeviceRegistry::new();
        for addr in ["CC", "AA", "BB", "AA", "CC"] {
            registry.add(PeerIdentity::unnamed(addr));
        }

        let order: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|p| p.address.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["CC", "AA", "BB"]);
    }

    #[test]
    fn test_clear() {
        let mut registry = DeviceRegistry::new();
        registry.add(PeerIdentity::unnamed("AA"));
        registry.clear();

        assert!(registry.is_empty());
        assert!(!registry.contains(&PeerAddress::new("AA")));
        assert!(registry.get(0).is_none());
    }
}
