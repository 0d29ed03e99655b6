// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Canonical binary encoding. All consensus digests (transaction ids,
//! block ids, signing digests) and the block log run through this one
//! CBOR codec so every node derives identical bytes.

use crate::crypto::{sha256, Digest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    cbor4ii::serde::to_vec(Vec::new(), value).map_err(|e| Error::Encode(e.to_string()))
}

pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    cbor4ii::serde::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
}

/// Sha256 of the canonical encoding.
pub fn digest<T: Serialize>(value: &T) -> Result<Digest, Error> {
    Ok(sha256(&to_vec(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let v: Vec<u32> = vec![1, 2, 3];
        let bytes = to_vec(&v).unwrap();
        let back: Vec<u32> = from_slice(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest(&42u64).unwrap(), digest(&42u64).unwrap());
        assert_ne!(digest(&42u64).unwrap(), digest(&43u64).unwrap());
    }
}
