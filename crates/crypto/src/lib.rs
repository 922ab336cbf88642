//! # TideSQL cryptography core
//!
//! Low-level primitives consumed by the rest of the platform:
//!
//! * **Hashing** — domain-separated SHA3-256 and BLAKE3; every identifier
//!   (account address, database id, block hash) derives from these.
//! * **Signatures** — ML-DSA-44 detached signatures.
//! * **Key store** — the local producer identity (keypair + node id).
//!
//! Higher-level crates treat everything here as opaque: they never look
//! inside a digest or a signature, they only compare and forward them.

pub mod hash;
pub mod keystore;
pub mod sig;

pub use keystore::{LocalKeys, NodeId};
pub use sig::{keypair, PublicKey, SecretKey, Signature};
