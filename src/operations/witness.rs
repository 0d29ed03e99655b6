// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError, PERCENT_100};
use crate::blocks::{BlockHeader, BlockId};
use crate::crypto::{Digest, PublicKey, Signature};
use crate::types::{is_valid_account_name, AccountName, Asset, Price, Symbol};
use serde::{Deserialize, Serialize};

pub const MAX_WITNESS_URL_LEN: usize = 2048;
/// Lower bound any witness may vote for; headers above the voted median
/// are rejected outright.
pub const MIN_BLOCK_SIZE_LIMIT: u32 = 1 << 16;

/// Chain knobs elected by witness median.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChainProperties {
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
    pub gbd_interest_rate: u16,
}

impl Default for ChainProperties {
    fn default() -> ChainProperties {
        ChainProperties {
            account_creation_fee: Asset::grove(1),
            maximum_block_size: MIN_BLOCK_SIZE_LIMIT * 2,
            gbd_interest_rate: 10 * super::PERCENT_1,
        }
    }
}

impl ChainProperties {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            self.account_creation_fee.symbol == Symbol::GROVE,
            "account creation fee must be the core asset"
        );
        check!(
            self.account_creation_fee.amount >= 0,
            "account creation fee cannot be negative"
        );
        check!(
            self.maximum_block_size >= MIN_BLOCK_SIZE_LIMIT,
            "maximum block size below protocol floor"
        );
        check!(
            self.gbd_interest_rate <= PERCENT_100,
            "interest rate out of range"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct WitnessUpdateOperation {
    pub owner: AccountName,
    pub url: String,
    /// Cleared (all-zero key is not representable; an empty option) to
    /// stop producing.
    pub block_signing_key: Option<PublicKey>,
    pub props: ChainProperties,
    pub fee: Asset,
}

impl WitnessUpdateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.owner), "invalid owner name");
        check!(!self.url.is_empty(), "witness url must not be empty");
        check!(self.url.len() <= MAX_WITNESS_URL_LEN, "witness url too long");
        check!(self.fee.symbol == Symbol::GROVE, "fee must be the core asset");
        check!(self.fee.amount >= 0, "fee cannot be negative");
        self.props.validate()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AccountWitnessVoteOperation {
    pub account: AccountName,
    pub witness: AccountName,
    pub approve: bool,
}

impl AccountWitnessVoteOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        check!(is_valid_account_name(&self.witness), "invalid witness name");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AccountWitnessProxyOperation {
    pub account: AccountName,
    /// Empty clears the proxy.
    pub proxy: String,
}

impl AccountWitnessProxyOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        check!(
            self.proxy.is_empty() || is_valid_account_name(&self.proxy),
            "invalid proxy name"
        );
        check!(self.proxy != self.account.as_str(), "cannot proxy to self");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FeedPublishOperation {
    pub publisher: AccountName,
    /// Stable asset per core asset.
    pub exchange_rate: Price,
}

impl FeedPublishOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.publisher), "invalid publisher");
        check!(!self.exchange_rate.is_null(), "null feed price");
        check!(
            self.exchange_rate.base.symbol == Symbol::GBD
                && self.exchange_rate.quote.symbol == Symbol::GROVE,
            "feed must price the stable asset in the core asset"
        );
        check!(
            self.exchange_rate.base.amount > 0 && self.exchange_rate.quote.amount > 0,
            "feed amounts must be positive"
        );
        Ok(())
    }
}

/// Legacy proof-of-work account/witness bootstrap.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PowOperation {
    pub worker_account: AccountName,
    pub block_id: BlockId,
    pub nonce: u64,
    pub work: Digest,
    pub work_key: PublicKey,
    pub props: ChainProperties,
}

impl PowOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.worker_account),
            "invalid worker account"
        );
        self.props.validate()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Pow2Operation {
    pub worker_account: AccountName,
    pub prev_block: BlockId,
    pub nonce: u64,
    /// Smaller is more work; compared against the chain's target.
    pub pow_summary: u32,
    pub props: ChainProperties,
}

impl Pow2Operation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.worker_account),
            "invalid worker account"
        );
        self.props.validate()
    }
}

/// Evidence that a witness signed two different blocks for one slot. The
/// reported witness forfeits its vesting to the reporter.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ReportOverProductionOperation {
    pub reporter: AccountName,
    pub first_block: BlockHeader,
    pub first_signature: Signature,
    pub second_block: BlockHeader,
    pub second_signature: Signature,
}

impl ReportOverProductionOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.reporter), "invalid reporter");
        check!(
            self.first_block.witness == self.second_block.witness,
            "blocks are by different witnesses"
        );
        check!(
            self.first_block.timestamp == self.second_block.timestamp,
            "blocks are for different slots"
        );
        check!(
            self.first_signature != self.second_signature,
            "the two blocks are the same block"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_orientation_enforced() {
        let op = FeedPublishOperation {
            publisher: AccountName::from("witness0"),
            exchange_rate: Price::new(Asset::grove(1000), Asset::gbd(1000)),
        };
        assert!(op.validate().is_err());
        let op = FeedPublishOperation {
            publisher: AccountName::from("witness0"),
            exchange_rate: Price::new(Asset::gbd(1000), Asset::grove(1000)),
        };
        assert!(op.validate().is_ok());
    }

    #[test]
    fn chain_properties_floor() {
        let mut props = ChainProperties::default();
        props.maximum_block_size = 100;
        assert!(props.validate().is_err());
    }
}
