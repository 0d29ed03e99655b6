// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Signed transactions. A transaction binds a list of operations to a
//! recent block (TaPoS) and an expiration time, and carries the signatures
//! that must jointly satisfy the operations' required authorities.

use crate::blocks::BlockId;
use crate::crypto::{self, sha256, Digest, PublicKey, SecretKey, Signature};
use crate::encoding;
use crate::operations::Operation;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Truncated digest identifying a transaction.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TransactionId(#[serde(with = "hex")] pub [u8; 20]);

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", hex::encode(self.0))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Low 16 bits of the referenced block's height.
    pub ref_block_num: u16,
    /// Second word of the referenced block's id.
    pub ref_block_prefix: u32,
    pub expiration: Timestamp,
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Bind this transaction to a recent block for TaPoS validation.
    pub fn set_reference_block(&mut self, id: &BlockId) {
        self.ref_block_num = (id.block_num() & 0xFFFF) as u16;
        self.ref_block_prefix = id.tapos_prefix();
    }

    pub fn digest(&self) -> Result<Digest, encoding::Error> {
        encoding::digest(self)
    }

    pub fn id(&self) -> Result<TransactionId, encoding::Error> {
        let digest = self.digest()?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[..20]);
        Ok(TransactionId(bytes))
    }

    /// The digest signatures commit to: chain id followed by the
    /// transaction bytes, so signatures cannot replay across chains.
    pub fn signing_digest(&self, chain_id: &Digest) -> Result<Digest, encoding::Error> {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&chain_id.0);
        bytes.extend_from_slice(&encoding::to_vec(self)?);
        Ok(sha256(&bytes))
    }

    pub fn sign(self, keys: &[&SecretKey], chain_id: &Digest) -> Result<SignedTransaction, encoding::Error> {
        let digest = self.signing_digest(chain_id)?;
        let signatures = keys.iter().map(|key| key.sign(&digest)).collect();
        Ok(SignedTransaction {
            transaction: self,
            signatures,
        })
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub signatures: Vec<Signature>,
}

impl SignedTransaction {
    pub fn digest(&self) -> Result<Digest, encoding::Error> {
        self.transaction.digest()
    }

    pub fn id(&self) -> Result<TransactionId, encoding::Error> {
        self.transaction.id()
    }

    /// Recover the set of keys that signed. Duplicate signatures by one key
    /// are rejected so signature lists stay canonical.
    pub fn signees(&self, chain_id: &Digest) -> Result<BTreeSet<PublicKey>, SigneeError> {
        let digest = self.transaction.signing_digest(chain_id)?;
        let mut keys = BTreeSet::new();
        for sig in &self.signatures {
            let key = sig.recover(&digest)?;
            if !keys.insert(key) {
                return Err(SigneeError::Duplicate(key));
            }
        }
        Ok(keys)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigneeError {
    #[error("transaction encoding failed: {0}")]
    Encoding(#[from] encoding::Error),
    #[error("signature recovery failed: {0}")]
    Recovery(#[from] crypto::Error),
    #[error("duplicate signature by {0}")]
    Duplicate(PublicKey),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::TransferOperation;
    use crate::types::{AccountName, Asset};

    fn transfer_tx() -> Transaction {
        Transaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: Timestamp(60),
            operations: vec![Operation::Transfer(TransferOperation {
                from: AccountName::from("alice"),
                to: AccountName::from("bob"),
                amount: Asset::grove(10_000),
                memo: String::new(),
            })],
        }
    }

    #[test]
    fn id_changes_with_contents() {
        let a = transfer_tx();
        let mut b = transfer_tx();
        b.expiration = Timestamp(61);
        assert_ne!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn signees_recover_signing_keys() {
        let chain_id = sha256(b"test chain");
        let k1 = SecretKey::from_seed("one");
        let k2 = SecretKey::from_seed("two");
        let tx = transfer_tx().sign(&[&k1, &k2], &chain_id).unwrap();
        let signees = tx.signees(&chain_id).unwrap();
        assert_eq!(signees.len(), 2);
        assert!(signees.contains(&k1.public_key()));
        assert!(signees.contains(&k2.public_key()));
    }

    #[test]
    fn duplicate_signatures_rejected() {
        let chain_id = sha256(b"test chain");
        let k1 = SecretKey::from_seed("one");
        let tx = transfer_tx().sign(&[&k1, &k1], &chain_id).unwrap();
        assert!(matches!(
            tx.signees(&chain_id),
            Err(SigneeError::Duplicate(_))
        ));
    }

    #[test]
    fn reference_block_binding() {
        let mut id = BlockId::default();
        id.0[..4].copy_from_slice(&70_000u32.to_be_bytes());
        id.0[4..8].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        let mut tx = transfer_tx();
        tx.set_reference_block(&id);
        assert_eq!(tx.ref_block_num, (70_000 & 0xFFFF) as u16);
        assert_eq!(tx.ref_block_prefix, 0xDEADBEEF);
    }
}
