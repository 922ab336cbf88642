//! Local producer identity.
//!
//! The ledger consumes keys through this one type: it never touches key
//! files or mining. Node ids are minted elsewhere (proof-of-work over the
//! node's public key) and arrive here as opaque strings.

use crate::sig::{keypair, PublicKey, SecretKey, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identity string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signing identity of this block producer: keypair plus node id.
#[derive(Clone)]
pub struct LocalKeys {
    public: PublicKey,
    secret: SecretKey,
    node_id: NodeId,
}

impl LocalKeys {
    /// Fresh identity with a generated keypair.
    pub fn generate(node_id: NodeId) -> Self {
        let (public, secret) = keypair();
        LocalKeys {
            public,
            secret,
            node_id,
        }
    }

    /// Assemble from previously stored parts.
    pub fn from_parts(public: PublicKey, secret: SecretKey, node_id: NodeId) -> Self {
        LocalKeys {
            public,
            secret,
            node_id,
        }
    }

    #[inline]
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Sign with the local secret key.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.secret.sign(msg)
    }
}

impl fmt::Debug for LocalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeys")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}
