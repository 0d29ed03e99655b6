// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, validate_amount_positive, ValidationError, PERCENT_100};
use crate::types::{is_valid_account_name, AccountName, Asset, Symbol};
use serde::{Deserialize, Serialize};

pub const MAX_MEMO_LEN: usize = 2048;

fn validate_memo(memo: &str) -> Result<(), ValidationError> {
    check!(memo.len() <= MAX_MEMO_LEN, "memo too long");
    Ok(())
}

fn validate_liquid_symbol(amount: &Asset) -> Result<(), ValidationError> {
    check!(
        amount.symbol == Symbol::GROVE || amount.symbol == Symbol::GBD,
        "amount must be a liquid asset, got {}",
        amount.symbol
    );
    Ok(())
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TransferOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from), "invalid from name");
        check!(is_valid_account_name(&self.to), "invalid to name");
        check!(
            self.amount.symbol != Symbol::VESTS,
            "vesting shares are not transferable"
        );
        validate_amount_positive(&self.amount, "transfer amount")?;
        validate_memo(&self.memo)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TransferToVestingOperation {
    pub from: AccountName,
    /// Empty means vest to `from`.
    pub to: String,
    pub amount: Asset,
}

impl TransferToVestingOperation {
    pub fn receiver(&self) -> AccountName {
        if self.to.is_empty() {
            self.from.clone()
        } else {
            AccountName::unchecked(&self.to)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from), "invalid from name");
        check!(
            self.to.is_empty() || is_valid_account_name(&self.to),
            "invalid to name"
        );
        check!(
            self.amount.symbol == Symbol::GROVE,
            "only the core asset can be vested"
        );
        validate_amount_positive(&self.amount, "vesting amount")
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct WithdrawVestingOperation {
    pub account: AccountName,
    /// Total shares to withdraw over the schedule; zero cancels a pending
    /// withdrawal.
    pub vesting_shares: Asset,
}

impl WithdrawVestingOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        check!(
            self.vesting_shares.symbol == Symbol::VESTS,
            "withdrawal must be denominated in vesting shares"
        );
        check!(
            self.vesting_shares.amount >= 0,
            "withdrawal cannot be negative"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SetWithdrawVestingRouteOperation {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub percent: u16,
    /// Deliver the routed share as vesting rather than liquid.
    pub auto_vest: bool,
}

impl SetWithdrawVestingRouteOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from_account), "invalid from name");
        check!(is_valid_account_name(&self.to_account), "invalid to name");
        check!(self.percent <= PERCENT_100, "percent out of range");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TransferToSavingsOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferToSavingsOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from), "invalid from name");
        check!(is_valid_account_name(&self.to), "invalid to name");
        validate_liquid_symbol(&self.amount)?;
        validate_amount_positive(&self.amount, "savings amount")?;
        validate_memo(&self.memo)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TransferFromSavingsOperation {
    pub from: AccountName,
    /// Scopes the withdraw so an account can run several in parallel.
    pub request_id: u32,
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferFromSavingsOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from), "invalid from name");
        check!(is_valid_account_name(&self.to), "invalid to name");
        validate_liquid_symbol(&self.amount)?;
        validate_amount_positive(&self.amount, "savings withdraw amount")?;
        validate_memo(&self.memo)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CancelTransferFromSavingsOperation {
    pub from: AccountName,
    pub request_id: u32,
}

impl CancelTransferFromSavingsOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.from), "invalid from name");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DelegateVestingSharesOperation {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    /// New total delegated to `delegatee`; zero removes the delegation.
    pub vesting_shares: Asset,
}

impl DelegateVestingSharesOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.delegator), "invalid delegator");
        check!(is_valid_account_name(&self.delegatee), "invalid delegatee");
        check!(self.delegator != self.delegatee, "cannot delegate to self");
        check!(
            self.vesting_shares.symbol == Symbol::VESTS,
            "delegation must be denominated in vesting shares"
        );
        check!(self.vesting_shares.amount >= 0, "delegation cannot be negative");
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConvertOperation {
    pub owner: AccountName,
    pub request_id: u32,
    pub amount: Asset,
}

impl ConvertOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.owner), "invalid owner name");
        check!(
            self.amount.symbol == Symbol::GBD,
            "only the stable asset converts against the feed"
        );
        validate_amount_positive(&self.amount, "conversion amount")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vests_are_not_transferable() {
        let op = TransferOperation {
            from: AccountName::from("alice"),
            to: AccountName::from("bob"),
            amount: Asset::vests(1),
            memo: String::new(),
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn zero_withdraw_cancels() {
        let op = WithdrawVestingOperation {
            account: AccountName::from("alice"),
            vesting_shares: Asset::vests(0),
        };
        assert!(op.validate().is_ok());
    }

    #[test]
    fn self_delegation_rejected() {
        let op = DelegateVestingSharesOperation {
            delegator: AccountName::from("alice"),
            delegatee: AccountName::from("alice"),
            vesting_shares: Asset::vests(1),
        };
        assert!(op.validate().is_err());
    }
}
