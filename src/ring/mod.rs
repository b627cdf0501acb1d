//! Ring Module
//!
//! Consistent hashing used to name one owning peer per key.

mod hash_ring;


use sha2::{Digest, Sha256};

pub use hash_ring::HashRing;

// == Public Constants ==
/// Virtual nodes per peer when none is configured
pub const DEFAULT_REPLICAS: usize = 40;

// == Hash Function ==
/// Hashes bytes onto the ring.
///
/// Takes the first eight bytes of SHA-256, big-endian. The output must be
/// identical on every node, so a process-seeded hasher is not an option.
pub fn hash_key(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
