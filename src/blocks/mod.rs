// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Block structures. A block is a signed header plus the transaction list;
//! its identity is the truncated sha256 of the canonical header encoding
//! with the big-endian height spliced into the first four bytes, so ids
//! sort by height and carry it for free.

mod header;

pub use header::{BlockHeader, BlockHeaderExtension, HardforkVote, ProtocolVersion};

use crate::crypto::{self, Digest, PublicKey, SecretKey, Signature};
use crate::encoding;
use crate::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block encoding failed: {0}")]
    Encoding(#[from] encoding::Error),
    #[error("block signature invalid: {0}")]
    Signature(#[from] crypto::Error),
}

/// A block identifier: 20 bytes, the first four of which are the
/// big-endian block number.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BlockId(#[serde(with = "hex")] pub [u8; 20]);

impl BlockId {
    /// Height encoded in the id.
    pub fn block_num(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// The 32-bit TaPoS prefix: the second word of the id, unaffected by
    /// the height splice.
    pub fn tapos_prefix(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(self.0))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A produced block: header, producing witness's signature, transactions.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub witness_signature: Signature,
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    pub fn block_num(&self) -> u32 {
        self.header.previous.block_num() + 1
    }

    /// Canonical id: sha256 of the header encoding, truncated to 160 bits,
    /// with the height written over the first word.
    pub fn id(&self) -> Result<BlockId, Error> {
        let digest = self.header.digest()?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[..20]);
        bytes[..4].copy_from_slice(&self.block_num().to_be_bytes());
        Ok(BlockId(bytes))
    }

    /// Recover the key that signed the header.
    pub fn signee(&self, chain_id: &Digest) -> Result<PublicKey, Error> {
        let digest = self.header.signing_digest(chain_id)?;
        Ok(self.witness_signature.recover(&digest)?)
    }

    /// Merkle root over the transaction digests.
    pub fn calculate_merkle_root(&self) -> Result<Digest, Error> {
        let leaves = self
            .transactions
            .iter()
            .map(|tx| tx.digest())
            .collect::<Result<Vec<_>, encoding::Error>>()?;
        Ok(merkle_root(leaves))
    }

    pub fn sign(header: BlockHeader, key: &SecretKey, chain_id: &Digest) -> Result<Signature, Error> {
        let digest = header.signing_digest(chain_id)?;
        Ok(key.sign(&digest))
    }
}

/// Root of a binary merkle tree over `leaves`; an odd node at any level is
/// carried up unhashed. Zero digest for an empty block.
pub fn merkle_root(mut leaves: Vec<Digest>) -> Digest {
    if leaves.is_empty() {
        return Digest::default();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for pair in leaves.chunks(2) {
            match pair {
                [a, b] => next.push(Digest::hash_pair(a, b)),
                [a] => next.push(*a),
                _ => unreachable!(),
            }
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;
    use crate::types::{AccountName, Timestamp};

    fn header(num: u32) -> BlockHeader {
        let mut previous = BlockId::default();
        previous.0[..4].copy_from_slice(&(num - 1).to_be_bytes());
        BlockHeader {
            previous,
            timestamp: Timestamp(1000 + num * 3),
            witness: AccountName::from("initwitness"),
            transaction_merkle_root: Digest::default(),
            extensions: Vec::new(),
        }
    }

    #[test]
    fn id_carries_height_and_prefix() {
        let key = SecretKey::from_seed("w");
        let chain_id = sha256(b"test chain");
        let h = header(7);
        let sig = SignedBlock::sign(h.clone(), &key, &chain_id).unwrap();
        let block = SignedBlock {
            header: h,
            witness_signature: sig,
            transactions: Vec::new(),
        };
        let id = block.id().unwrap();
        assert_eq!(id.block_num(), 7);
        // The prefix word must not be the height word.
        assert_eq!(id.tapos_prefix().to_le_bytes(), id.0[4..8]);
    }

    #[test]
    fn signee_round_trips() {
        let key = SecretKey::from_seed("w");
        let chain_id = sha256(b"test chain");
        let h = header(1);
        let sig = SignedBlock::sign(h.clone(), &key, &chain_id).unwrap();
        let block = SignedBlock {
            header: h,
            witness_signature: sig,
            transactions: Vec::new(),
        };
        assert_eq!(block.signee(&chain_id).unwrap(), key.public_key());
    }

    #[test]
    fn merkle_of_odd_leaf_counts() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        let c = sha256(b"c");
        assert_eq!(merkle_root(vec![]), Digest::default());
        assert_eq!(merkle_root(vec![a]), a);
        assert_eq!(merkle_root(vec![a, b]), Digest::hash_pair(&a, &b));
        let ab = Digest::hash_pair(&a, &b);
        assert_eq!(merkle_root(vec![a, b, c]), Digest::hash_pair(&ab, &c));
    }
}
