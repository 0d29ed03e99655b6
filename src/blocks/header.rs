// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BlockId, Error};
use crate::crypto::{sha256, Digest};
use crate::encoding;
use crate::types::{AccountName, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A running protocol version, `major.minor.patch`. Witnesses report the
/// version they run in a header extension; hardforks are keyed to the
/// `major.minor` pair.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, patch: u16) -> ProtocolVersion {
        ProtocolVersion {
            major,
            minor,
            patch,
        }
    }

    /// The hardfork identity of a version ignores the patch level.
    pub fn hardfork_version(&self) -> ProtocolVersion {
        ProtocolVersion::new(self.major, self.minor, 0)
    }
}

impl fmt::Debug for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A witness's vote for the activation of a future hardfork.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HardforkVote {
    pub hf_version: ProtocolVersion,
    pub hf_time: Timestamp,
}

/// Header extensions: a witness reports its binary version and, when its
/// view differs from its on-chain record, its hardfork vote.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BlockHeaderExtension {
    Version(ProtocolVersion),
    HardforkVote(HardforkVote),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous: BlockId,
    pub timestamp: Timestamp,
    pub witness: AccountName,
    pub transaction_merkle_root: Digest,
    pub extensions: Vec<BlockHeaderExtension>,
}

impl BlockHeader {
    pub fn block_num(&self) -> u32 {
        self.previous.block_num() + 1
    }

    /// Digest of the canonical header encoding; the base of the block id.
    pub fn digest(&self) -> Result<Digest, Error> {
        Ok(encoding::digest(self)?)
    }

    /// The digest a witness signs: chain id followed by the header bytes.
    pub fn signing_digest(&self, chain_id: &Digest) -> Result<Digest, Error> {
        let mut bytes = Vec::with_capacity(128);
        bytes.extend_from_slice(&chain_id.0);
        bytes.extend_from_slice(&encoding::to_vec(self)?);
        Ok(sha256(&bytes))
    }

    /// Reported binary version, if any extension carries one.
    pub fn reported_version(&self) -> Option<ProtocolVersion> {
        self.extensions.iter().find_map(|ext| match ext {
            BlockHeaderExtension::Version(v) => Some(*v),
            _ => None,
        })
    }

    /// Reported hardfork vote, if present.
    pub fn hardfork_vote(&self) -> Option<HardforkVote> {
        self.extensions.iter().find_map(|ext| match ext {
            BlockHeaderExtension::HardforkVote(v) => Some(*v),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(ProtocolVersion::new(0, 20, 0) > ProtocolVersion::new(0, 19, 6));
        assert_eq!(
            ProtocolVersion::new(0, 19, 6).hardfork_version(),
            ProtocolVersion::new(0, 19, 0)
        );
    }

    #[test]
    fn extension_lookup() {
        let header = BlockHeader {
            previous: BlockId::default(),
            timestamp: Timestamp(0),
            witness: AccountName::from("wit"),
            transaction_merkle_root: Digest::default(),
            extensions: vec![
                BlockHeaderExtension::Version(ProtocolVersion::new(0, 20, 1)),
                BlockHeaderExtension::HardforkVote(HardforkVote {
                    hf_version: ProtocolVersion::new(0, 20, 0),
                    hf_time: Timestamp(99),
                }),
            ],
        };
        assert_eq!(
            header.reported_version(),
            Some(ProtocolVersion::new(0, 20, 1))
        );
        assert_eq!(header.hardfork_vote().unwrap().hf_time, Timestamp(99));
    }
}
