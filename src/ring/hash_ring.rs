//! Hash Ring Module
//!
//! Consistent-hash ring mapping keys onto peer addresses via virtual replicas.

use std::collections::BTreeSet;

use crate::ring::{hash_key, DEFAULT_REPLICAS};

// == Hash Ring ==
/// Sorted ring of virtual nodes.
///
/// Each peer occupies `replicas` positions. Positions are ordered by
/// `(hash, peer)` so two peers colliding on the same hash always resolve in
/// the same order.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Virtual replicas per peer
    replicas: usize,
    /// Virtual node positions, sorted by (hash, peer)
    nodes: Vec<(u64, String)>,
    /// Distinct peers on the ring
    peers: BTreeSet<String>,
}

impl HashRing {
    // == Constructor ==
    /// Creates an empty ring with `replicas` virtual nodes per peer.
    ///
    /// A replica count of zero falls back to [`DEFAULT_REPLICAS`].
    pub fn new(replicas: usize) -> Self {
        let replicas = if replicas == 0 {
            DEFAULT_REPLICAS
        } else {
            replicas
        };

        Self {
            replicas,
            nodes: Vec::new(),
            peers: BTreeSet::new(),
        }
    }

    // == Add ==
    /// Adds a peer and its virtual nodes to the ring.
    ///
    /// Existing positions are left untouched; re-adding a known peer is a no-op.
    /// Returns true if the peer was new.
    pub fn add(&mut self, peer: &str) -> bool {
        if !self.peers.insert(peer.to_string()) {
            return false;
        }

        self.nodes.reserve(self.replicas);
        for index in 0..self.replicas {
            let position = hash_key(format!("{}{}", index, peer).as_bytes());
            self.nodes.push((position, peer.to_string()));
        }
        self.nodes.sort_unstable();

        true
    }

    // == Resolve ==
    /// Returns the peer owning `key`, or None if the ring is empty.
    ///
    /// The owner is the first virtual node at or after the key's hash,
    /// wrapping around to the smallest position.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        if self.nodes.is_empty() {
            return None;
        }

        let hash = hash_key(key.as_bytes());
        let index = self.nodes.partition_point(|(position, _)| *position < hash);
        let (_, peer) = &self.nodes[index % self.nodes.len()];
        Some(peer.as_str())
    }

    // == Peers ==
    /// Returns the distinct peers on the ring in sorted order.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    /// Returns the virtual replica count per peer.
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    // == Length ==
    /// Returns the number of distinct peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}
