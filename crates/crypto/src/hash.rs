//! Domain-separated hashing.
//!
//! All digests carry a `TIDE:<domain>:` prefix so that hashes computed in
//! different contexts can never collide, even over identical payloads.

use blake3::Hasher as Blake3;
use sha3::{Digest, Sha3_256};

const PREFIX: &[u8] = b"TIDE:";

#[inline]
pub fn sha3_256_domain(domain: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    h.update(PREFIX);
    h.update(domain);
    h.update(b":");
    h.update(msg);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

#[inline]
pub fn blake3_domain(domain: &[u8], msg: &[u8]) -> [u8; 32] {
    blake3_domain_parts(domain, &[msg])
}

/// Multi-part variant: hashes the concatenation of `parts` without an
/// intermediate allocation. Identifier derivations (owner ∥ nonce) use this.
#[inline]
pub fn blake3_domain_parts(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Blake3::new();
    h.update(PREFIX);
    h.update(domain);
    h.update(b":");
    for part in parts {
        h.update(part);
    }
    h.finalize().into()
}
