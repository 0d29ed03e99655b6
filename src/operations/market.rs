// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, validate_amount_positive, ValidationError};
use crate::types::{is_valid_account_name, AccountName, Asset, Price, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LimitOrderCreateOperation {
    pub owner: AccountName,
    /// Caller-chosen id, unique among the owner's open orders.
    pub order_id: u32,
    pub amount_to_sell: Asset,
    pub min_to_receive: Asset,
    /// Fail instead of resting on the book when not fully matched.
    pub fill_or_kill: bool,
    pub expiration: Timestamp,
}

impl LimitOrderCreateOperation {
    /// The implied sell price: base is what is sold, quote what is bought.
    pub fn sell_price(&self) -> Price {
        Price::new(self.amount_to_sell, self.min_to_receive)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.owner), "invalid owner name");
        validate_amount_positive(&self.amount_to_sell, "amount to sell")?;
        validate_amount_positive(&self.min_to_receive, "min to receive")?;
        check!(
            self.amount_to_sell.symbol != self.min_to_receive.symbol,
            "cannot trade an asset against itself"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LimitOrderCreate2Operation {
    pub owner: AccountName,
    pub order_id: u32,
    pub amount_to_sell: Asset,
    pub exchange_rate: Price,
    pub fill_or_kill: bool,
    pub expiration: Timestamp,
}

impl LimitOrderCreate2Operation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.owner), "invalid owner name");
        validate_amount_positive(&self.amount_to_sell, "amount to sell")?;
        check!(!self.exchange_rate.is_null(), "null exchange rate");
        check!(
            self.exchange_rate.base.symbol == self.amount_to_sell.symbol,
            "exchange rate base must match the asset sold"
        );
        check!(
            self.exchange_rate.base.symbol != self.exchange_rate.quote.symbol,
            "cannot trade an asset against itself"
        );
        check!(
            self.amount_to_sell.convert(&self.exchange_rate).amount > 0,
            "order would receive nothing at this rate"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LimitOrderCancelOperation {
    pub owner: AccountName,
    pub order_id: u32,
}

impl LimitOrderCancelOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.owner), "invalid owner name");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_symbol_pair_rejected() {
        let op = LimitOrderCreateOperation {
            owner: AccountName::from("alice"),
            order_id: 1,
            amount_to_sell: Asset::grove(100),
            min_to_receive: Asset::grove(100),
            fill_or_kill: false,
            expiration: Timestamp::MAX,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn dust_rate_rejected() {
        let op = LimitOrderCreate2Operation {
            owner: AccountName::from("alice"),
            order_id: 1,
            amount_to_sell: Asset::grove(1),
            exchange_rate: Price::new(Asset::grove(1_000_000), Asset::gbd(1)),
            fill_or_kill: false,
            expiration: Timestamp::MAX,
        };
        assert!(op.validate().is_err());
    }
}
