//! Canonical account and database identifiers.
//!
//! # Definition
//! An address is **exactly 20 bytes**, derived from the account's public key
//! as `blake3("addr", pubkey)[..20]`. The compact width keeps state keys
//! small; authentication strength comes from signature checks performed by
//! the consensus layer, not from the address itself.
//!
//! A database id has the same width and derives from the owner address and
//! the creation nonce. The two spaces are deliberately interconvertible: the
//! account address of a chain is the raw bytes of its database id. That
//! bijection is what lets a transfer addressed to a chain be recognized and
//! routed to the chain's billing records instead of an ordinary account.

use serde::{Deserialize, Serialize};
use tide_crypto::hash::{blake3_domain, blake3_domain_parts};
use tide_crypto::PublicKey;

pub const ADDRESS_LEN: usize = 20;

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    #[inline]
    pub fn from_bytes(b: [u8; ADDRESS_LEN]) -> Self {
        Address(b)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Derive the address owned by a public key.
    pub fn from_public_key(pk: &PublicKey) -> Self {
        let digest = blake3_domain(b"addr", pk.as_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(out)
    }

    /// Reinterpret this address as a database id. Whether a chain actually
    /// lives under that id is for the state lookup to decide.
    #[inline]
    pub fn database_id(&self) -> DatabaseId {
        DatabaseId(self.0)
    }
}

impl AsRef<[u8]> for Address {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifier of a provisioned chain.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DatabaseId(pub [u8; ADDRESS_LEN]);

impl DatabaseId {
    /// `blake3("dbid", owner ∥ nonce_le)[..20]`. The nonce makes ids from
    /// the same owner distinct across creations.
    pub fn from_owner_and_nonce(owner: Address, nonce: u32) -> Self {
        let digest = blake3_domain_parts(b"dbid", &[owner.as_bytes(), &nonce.to_le_bytes()]);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        DatabaseId(out)
    }

    /// The account address the chain itself holds funds under.
    #[inline]
    pub fn account_address(&self) -> Address {
        Address(self.0)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}
