//! Genesis-block synthesis for newly provisioned chains.
//!
//! The first block of a chain carries no transactions; its signed header
//! seeds the chain's identity cross-check. The msgpack encoding of the
//! whole block is what `CreateDatabase` embeds into the chain profile.

use crate::state::MetaState;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tide_crypto::hash::sha3_256_domain;
use tide_crypto::{LocalKeys, NodeId, PublicKey, Signature};

/// Protocol version sentinel carried by every block header.
pub const BLOCK_VERSION: u32 = 0x0100_0000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub producer: NodeId,
    pub genesis_hash: [u8; 32],
    pub parent_hash: [u8; 32],
    pub timestamp_ms: u64,
}

impl Header {
    /// Canonical hash: domain-separated SHA3 over the msgpack encoding.
    /// Header fields and their order are part of the wire contract.
    pub fn hash(&self) -> [u8; 32] {
        let enc = rmp_serde::to_vec(self).expect("header msgpack encode");
        sha3_256_domain(b"block-header", &enc)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeader {
    pub header: Header,
    pub block_hash: [u8; 32],
    pub signee: PublicKey,
    pub signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub signed_header: SignedHeader,
}

impl Block {
    /// Hash the header and sign the hash with the producer key.
    pub fn pack_and_sign(header: Header, keys: &LocalKeys) -> Block {
        let block_hash = header.hash();
        let signature = keys.sign(&block_hash);
        Block {
            signed_header: SignedHeader {
                header,
                block_hash,
                signee: keys.public().clone(),
                signature,
            },
        }
    }

    /// Recompute the header hash and check the producer signature.
    pub fn verify(&self) -> bool {
        let sh = &self.signed_header;
        sh.block_hash == sh.header.hash() && sh.signee.verify(&sh.block_hash, &sh.signature)
    }

    /// Stable msgpack bytes, as embedded in a chain profile.
    pub fn encode(&self) -> Vec<u8> {
        rmp_serde::to_vec(self).expect("genesis block msgpack encode")
    }

    pub fn decode(bytes: &[u8]) -> Result<Block, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

impl MetaState {
    /// Synthesize and sign the first block of a new chain.
    pub(crate) fn generate_genesis_block(&self) -> Block {
        let header = Header {
            version: BLOCK_VERSION,
            producer: self.keys().node_id().clone(),
            genesis_hash: [0u8; 32],
            parent_hash: [0u8; 32],
            timestamp_ms: now_utc_ms(),
        };
        Block::pack_and_sign(header, self.keys())
    }
}

fn now_utc_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
