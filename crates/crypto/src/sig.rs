//! ML-DSA-44 detached signatures.
//!
//! The platform signs with exactly one scheme, so the key and signature
//! types are thin validated wrappers over the raw byte encodings rather
//! than a multi-scheme registry. Byte layouts are canonical and
//! binary-stable; dependent crates embed them in persisted structures.

use pqcrypto_mldsa::mldsa44;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PUBLIC_KEY_LEN: usize = 1312;
pub const SECRET_KEY_LEN: usize = 2560;
pub const SIGNATURE_LEN: usize = 2420;

/// Verification key. Freely shareable and serializable.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

/// Signing key. Never serialized, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

/// Detached signature over an arbitrary message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl PublicKey {
    /// Validate raw bytes with the backend before wrapping them.
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        mldsa44::PublicKey::from_bytes(b).ok()?;
        Some(PublicKey(b.to_vec()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check a detached signature. Malformed inputs verify as false.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
        let (Ok(pk), Ok(sig)) = (
            mldsa44::PublicKey::from_bytes(&self.0),
            mldsa44::DetachedSignature::from_bytes(&sig.0),
        ) else {
            return false;
        };
        mldsa44::verify_detached_signature(&sig, msg, &pk).is_ok()
    }
}

impl SecretKey {
    /// Validate raw bytes with the backend before wrapping them.
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        mldsa44::SecretKey::from_bytes(b).ok()?;
        Some(SecretKey(b.to_vec()))
    }

    /// Sign a message. The wrapped bytes were validated at construction,
    /// so re-parsing them cannot fail.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let sk = mldsa44::SecretKey::from_bytes(&self.0)
            .expect("secret key bytes validated at construction");
        Signature(mldsa44::detached_sign(msg, &sk).as_bytes().to_vec())
    }
}

impl Signature {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        mldsa44::DetachedSignature::from_bytes(b).ok()?;
        Some(Signature(b.to_vec()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Generate a fresh ML-DSA-44 keypair.
pub fn keypair() -> (PublicKey, SecretKey) {
    let (pk, sk) = mldsa44::keypair();
    (
        PublicKey(pk.as_bytes().to_vec()),
        SecretKey(sk.as_bytes().to_vec()),
    )
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({} bytes)", self.0.len())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(redacted)")
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}
