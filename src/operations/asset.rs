// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! User-issued assets. A market-issued ("bit") asset is collateralized in
//! its backing asset through call orders and priced by witness feeds.

use super::{check, validate_amount_positive, ValidationError, PERCENT_100};
use crate::types::{is_valid_account_name, AccountName, Asset, Price, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Denominator for collateral ratios: a ratio of 1750 is 1.75x.
pub const COLLATERAL_RATIO_DENOM: u16 = 1000;
/// Collateral ratios below 100% are meaningless.
pub const MIN_COLLATERAL_RATIO: u16 = COLLATERAL_RATIO_DENOM;
pub const MAX_FEED_PRODUCERS: usize = 10;
pub const MAX_ASSET_SUPPLY: i64 = i64::MAX / 2;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetOptions {
    pub max_supply: i64,
    /// Fee taken from the receiving side of every fill, in basis points.
    pub market_fee_percent: u16,
    pub max_market_fee: i64,
    /// Only these accounts may hold the asset when non-empty.
    pub whitelist_authorities: BTreeSet<AccountName>,
    pub description: String,
}

impl AssetOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            self.max_supply > 0 && self.max_supply <= MAX_ASSET_SUPPLY,
            "max supply out of range"
        );
        check!(
            self.market_fee_percent <= PERCENT_100,
            "market fee percent out of range"
        );
        check!(self.max_market_fee >= 0, "max market fee cannot be negative");
        for name in &self.whitelist_authorities {
            check!(is_valid_account_name(name), "invalid whitelist name");
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BitassetOptions {
    /// Feeds older than this fall out of the median.
    pub feed_lifetime_secs: u32,
    pub minimum_feeds: u8,
    /// Delay between a settlement request and its execution at the feed.
    pub force_settlement_delay_secs: u32,
    /// Settlement executes this much below the feed, in basis points.
    pub force_settlement_offset_percent: u16,
    pub short_backing_asset: Symbol,
}

impl BitassetOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(self.feed_lifetime_secs > 0, "feed lifetime must be positive");
        check!(self.minimum_feeds > 0, "minimum feeds must be positive");
        check!(
            self.force_settlement_offset_percent <= PERCENT_100,
            "settlement offset out of range"
        );
        Ok(())
    }
}

/// A witness-published price feed for one bitasset.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Debt asset per backing asset.
    pub settlement_price: Price,
    pub maintenance_collateral_ratio: u16,
    pub maximum_short_squeeze_ratio: u16,
}

impl PriceFeed {
    pub fn is_valid(&self) -> bool {
        !self.settlement_price.is_null()
            && self.maintenance_collateral_ratio >= MIN_COLLATERAL_RATIO
            && self.maximum_short_squeeze_ratio >= MIN_COLLATERAL_RATIO
    }

    /// The worst price at which margin calls may take liquidity:
    /// `settlement / MSSR`.
    pub fn max_short_squeeze_price(&self) -> Price {
        let p = &self.settlement_price;
        let base = (p.base.amount as i128 * i128::from(COLLATERAL_RATIO_DENOM))
            / i128::from(self.maximum_short_squeeze_ratio);
        Price::new(
            Asset::new(base.max(1) as i64, p.base.symbol),
            p.quote,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(self.is_valid(), "malformed price feed");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetCreateOperation {
    pub issuer: AccountName,
    pub symbol: Symbol,
    pub precision: u8,
    pub options: AssetOptions,
    pub bitasset_options: Option<BitassetOptions>,
    pub is_prediction_market: bool,
}

impl AssetCreateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        check!(
            self.symbol != Symbol::GROVE
                && self.symbol != Symbol::GBD
                && self.symbol != Symbol::VESTS,
            "reserved symbol"
        );
        check!(self.precision <= 12, "precision out of range");
        self.options.validate()?;
        if let Some(bitasset) = &self.bitasset_options {
            bitasset.validate()?;
            check!(
                bitasset.short_backing_asset != self.symbol,
                "asset cannot back itself"
            );
        }
        if self.is_prediction_market {
            check!(
                self.bitasset_options.is_some(),
                "prediction markets are market-issued"
            );
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetIssueOperation {
    pub issuer: AccountName,
    pub asset_to_issue: Asset,
    pub issue_to_account: AccountName,
}

impl AssetIssueOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        check!(
            is_valid_account_name(&self.issue_to_account),
            "invalid receiver name"
        );
        validate_amount_positive(&self.asset_to_issue, "issue amount")
    }
}

/// Burn previously issued supply from the payer's balance.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetReserveOperation {
    pub payer: AccountName,
    pub amount_to_reserve: Asset,
}

impl AssetReserveOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.payer), "invalid payer name");
        validate_amount_positive(&self.amount_to_reserve, "reserve amount")
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetUpdateOperation {
    pub issuer: AccountName,
    pub asset_to_update: Symbol,
    pub new_issuer: Option<AccountName>,
    pub new_options: AssetOptions,
}

impl AssetUpdateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        if let Some(new_issuer) = &self.new_issuer {
            check!(is_valid_account_name(new_issuer), "invalid new issuer");
        }
        self.new_options.validate()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetUpdateBitassetOperation {
    pub issuer: AccountName,
    pub asset_to_update: Symbol,
    pub new_options: BitassetOptions,
}

impl AssetUpdateBitassetOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        self.new_options.validate()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetUpdateFeedProducersOperation {
    pub issuer: AccountName,
    pub asset_to_update: Symbol,
    pub new_feed_producers: BTreeSet<AccountName>,
}

impl AssetUpdateFeedProducersOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        check!(
            self.new_feed_producers.len() <= MAX_FEED_PRODUCERS,
            "too many feed producers"
        );
        for name in &self.new_feed_producers {
            check!(is_valid_account_name(name), "invalid producer name");
        }
        Ok(())
    }
}

/// Top up the pool that subsidizes fills in this asset.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetFundFeePoolOperation {
    pub from_account: AccountName,
    pub asset_symbol: Symbol,
    pub amount: Asset,
}

impl AssetFundFeePoolOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from_account), "invalid funder");
        check!(
            self.amount.symbol == Symbol::GROVE,
            "fee pools hold the core asset"
        );
        validate_amount_positive(&self.amount, "fee pool amount")
    }
}

/// Issuer-forced settlement of the entire asset at a stated price.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetGlobalSettleOperation {
    pub issuer: AccountName,
    pub asset_to_settle: Symbol,
    pub settle_price: Price,
}

impl AssetGlobalSettleOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        check!(!self.settle_price.is_null(), "null settle price");
        check!(
            self.settle_price.base.symbol == self.asset_to_settle,
            "settle price must be quoted in the settled asset"
        );
        Ok(())
    }
}

/// Instant settlement against the settlement fund of a globally settled
/// asset.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetSettleOperation {
    pub account: AccountName,
    pub amount: Asset,
}

impl AssetSettleOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        validate_amount_positive(&self.amount, "settle amount")
    }
}

/// Delayed settlement at the feed median for a live bitasset.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetForceSettleOperation {
    pub account: AccountName,
    pub settlement_id: u32,
    pub amount: Asset,
}

impl AssetForceSettleOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        validate_amount_positive(&self.amount, "settle amount")
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetPublishFeedOperation {
    pub publisher: AccountName,
    pub asset_symbol: Symbol,
    pub feed: PriceFeed,
}

impl AssetPublishFeedOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.publisher), "invalid publisher");
        check!(
            self.feed.settlement_price.base.symbol == self.asset_symbol,
            "feed must be quoted in the asset"
        );
        self.feed.validate()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AssetClaimFeesOperation {
    pub issuer: AccountName,
    pub amount_to_claim: Asset,
}

impl AssetClaimFeesOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.issuer), "invalid issuer name");
        validate_amount_positive(&self.amount_to_claim, "claim amount")
    }
}

/// Open, adjust or close a collateralized debt position.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CallOrderUpdateOperation {
    pub funding_account: AccountName,
    /// Collateral paid in (positive) or withdrawn (negative).
    pub delta_collateral: Asset,
    /// Debt drawn (positive) or covered (negative).
    pub delta_debt: Asset,
}

impl CallOrderUpdateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.funding_account),
            "invalid funding account"
        );
        check!(
            self.delta_collateral.symbol != self.delta_debt.symbol,
            "collateral and debt must differ"
        );
        check!(
            self.delta_collateral.amount != 0 || self.delta_debt.amount != 0,
            "no-op call order update"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_symbols_rejected() {
        let op = AssetCreateOperation {
            issuer: AccountName::from("alice"),
            symbol: Symbol::GBD,
            precision: 3,
            options: AssetOptions {
                max_supply: 1_000_000,
                market_fee_percent: 0,
                max_market_fee: 0,
                whitelist_authorities: BTreeSet::new(),
                description: String::new(),
            },
            bitasset_options: None,
            is_prediction_market: false,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn squeeze_price_divides_by_ratio() {
        let feed = PriceFeed {
            settlement_price: Price::new(
                Asset::new(1000, Symbol::new("USD").unwrap()),
                Asset::grove(1000),
            ),
            maintenance_collateral_ratio: 1750,
            maximum_short_squeeze_ratio: 1100,
        };
        let squeeze = feed.max_short_squeeze_price();
        // 1000 * 1000 / 1100 = 909
        assert_eq!(squeeze.base.amount, 909);
        assert_eq!(squeeze.quote.amount, 1000);
    }
}
