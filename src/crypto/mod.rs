// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Digest and key primitives used by consensus. Everything is secp256k1
//! with recoverable compact signatures; block and transaction identities
//! are truncated sha256 digests.

use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use thiserror::Error;

/// Compressed secp256k1 public key length in bytes.
pub const PUB_KEY_LEN: usize = 33;
/// Recoverable compact signature length in bytes (recovery byte + r + s).
pub const SIG_LEN: usize = 65;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("public key recovery failed: {0}")]
    Recovery(String),
}

/// A sha256 output. Used for transaction digests, merkle nodes and as the
/// base of block ids.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Digest(#[serde(with = "hex")] pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Digest of the concatenation of two digests. Merkle interior nodes.
    pub fn hash_pair(a: &Digest, b: &Digest) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(a.0);
        hasher.update(b.0);
        Digest(hasher.finalize().into())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Plain sha256.
pub fn sha256(data: &[u8]) -> Digest {
    Digest(Sha256::digest(data).into())
}

/// A compressed secp256k1 public key. Stored in its 33-byte SEC1 encoding
/// so it can key ordered indexes; parsed on demand for verification.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex")] pub [u8; PUB_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let arr: [u8; PUB_KEY_LEN] = bytes.try_into().map_err(|_| Error::InvalidPublicKey)?;
        // Reject encodings that do not lie on the curve.
        VerifyingKey::from_sec1_bytes(&arr).map_err(|_| Error::InvalidPublicKey)?;
        Ok(PublicKey(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A signing key. Never serialized; the debug representation is redacted.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        SigningKey::from_slice(bytes)
            .map(SecretKey)
            .map_err(|_| Error::InvalidSecretKey)
    }

    /// Deterministic key derived from a seed string. Test and genesis use.
    pub fn from_seed(seed: &str) -> Self {
        let mut digest = sha256(seed.as_bytes());
        loop {
            match SigningKey::from_slice(&digest.0) {
                Ok(key) => return SecretKey(key),
                // Astronomically unlikely; re-hash until on the curve.
                Err(_) => digest = sha256(&digest.0),
            }
        }
    }

    pub fn public_key(&self) -> PublicKey {
        let point = self.0.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; PUB_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        PublicKey(bytes)
    }

    /// Sign a digest, producing a recoverable compact signature.
    pub fn sign(&self, digest: &Digest) -> Signature {
        // Signing over a 32-byte prehash cannot fail for a valid key.
        let (sig, recovery) = self
            .0
            .sign_prehash_recoverable(&digest.0)
            .expect("signing over sha256 prehash");
        let mut bytes = [0u8; SIG_LEN];
        bytes[0] = recovery.to_byte();
        bytes[1..].copy_from_slice(&sig.to_bytes());
        Signature(bytes)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Recoverable compact ECDSA signature: one recovery byte followed by the
/// 64-byte r || s encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex")] pub [u8; SIG_LEN]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Recover the signing public key from the signature over `digest`.
    pub fn recover(&self, digest: &Digest) -> Result<PublicKey, Error> {
        let recovery =
            RecoveryId::from_byte(self.0[0]).ok_or_else(|| {
                Error::InvalidSignature(format!("recovery byte {}", self.0[0]))
            })?;
        let sig = k256::ecdsa::Signature::from_slice(&self.0[1..])
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        let key = VerifyingKey::recover_from_prehash(&digest.0, &sig, recovery)
            .map_err(|e| Error::Recovery(e.to_string()))?;
        let point = key.to_encoded_point(true);
        let mut bytes = [0u8; PUB_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Ok(PublicKey(bytes))
    }

    /// Verify that the signature over `digest` recovers to `signer`.
    pub fn verify(&self, digest: &Digest, signer: &PublicKey) -> Result<(), Error> {
        let recovered = self.recover(digest)?;
        if &recovered == signer {
            Ok(())
        } else {
            Err(Error::InvalidSignature("signer mismatch".into()))
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_recover() {
        let sk = SecretKey::from_seed("init");
        let digest = sha256(b"payload");
        let sig = sk.sign(&digest);
        let recovered = sig.recover(&digest).unwrap();
        assert_eq!(recovered, sk.public_key());
        sig.verify(&digest, &sk.public_key()).unwrap();
    }

    #[test]
    fn recover_rejects_garbage() {
        let sig = Signature([0xAA; SIG_LEN]);
        let digest = sha256(b"payload");
        assert!(sig.recover(&digest).is_err());
    }

    #[test]
    fn distinct_digests_distinct_signatures() {
        let sk = SecretKey::from_seed("init");
        let a = sk.sign(&sha256(b"a"));
        let b = sk.sign(&sha256(b"b"));
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn hash_pair_is_order_sensitive() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        assert_ne!(Digest::hash_pair(&a, &b), Digest::hash_pair(&b, &a));
    }
}
