// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError};
use crate::types::{is_valid_account_name, AccountName, Asset, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EscrowTransferOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub escrow_id: u32,
    pub grove_amount: Asset,
    pub gbd_amount: Asset,
    pub fee: Asset,
    /// Unless both counterparties approve before this, funds return.
    pub ratification_deadline: Timestamp,
    pub escrow_expiration: Timestamp,
    pub json_meta: String,
}

impl EscrowTransferOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (label, name) in [("from", &self.from), ("to", &self.to), ("agent", &self.agent)] {
            check!(is_valid_account_name(name), "invalid {label} name");
        }
        check!(
            self.from != self.agent && self.to != self.agent,
            "agent must be a third party"
        );
        check!(
            self.grove_amount.symbol == Symbol::GROVE,
            "core escrow amount has wrong symbol"
        );
        check!(
            self.gbd_amount.symbol == Symbol::GBD,
            "stable escrow amount has wrong symbol"
        );
        check!(
            self.grove_amount.amount >= 0 && self.gbd_amount.amount >= 0,
            "escrow amounts cannot be negative"
        );
        check!(
            self.grove_amount.amount > 0 || self.gbd_amount.amount > 0,
            "escrow must carry some amount"
        );
        check!(
            self.fee.symbol == Symbol::GROVE || self.fee.symbol == Symbol::GBD,
            "fee must be a liquid asset"
        );
        check!(self.fee.amount >= 0, "fee cannot be negative");
        check!(
            self.ratification_deadline < self.escrow_expiration,
            "ratification deadline must precede expiration"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EscrowApproveOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// `to` or `agent`.
    pub who: AccountName,
    pub escrow_id: u32,
    /// Disapproving cancels the escrow outright.
    pub approve: bool,
}

impl EscrowApproveOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.who), "invalid who name");
        check!(
            self.who == self.to || self.who == self.agent,
            "only the receiver or agent ratify an escrow"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EscrowDisputeOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub who: AccountName,
    pub escrow_id: u32,
}

impl EscrowDisputeOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.who), "invalid who name");
        check!(
            self.who == self.from || self.who == self.to,
            "only a counterparty may dispute"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EscrowReleaseOperation {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// Who is releasing: a counterparty normally, the agent when disputed.
    pub who: AccountName,
    /// Funds may only flow between the two counterparties.
    pub receiver: AccountName,
    pub escrow_id: u32,
    pub grove_amount: Asset,
    pub gbd_amount: Asset,
}

impl EscrowReleaseOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.who), "invalid who name");
        check!(
            self.who == self.from || self.who == self.to || self.who == self.agent,
            "who must be a party to the escrow"
        );
        check!(
            self.receiver == self.from || self.receiver == self.to,
            "receiver must be a counterparty"
        );
        check!(
            self.grove_amount.symbol == Symbol::GROVE,
            "core amount has wrong symbol"
        );
        check!(
            self.gbd_amount.symbol == Symbol::GBD,
            "stable amount has wrong symbol"
        );
        check!(
            self.grove_amount.amount >= 0 && self.gbd_amount.amount >= 0,
            "release amounts cannot be negative"
        );
        check!(
            self.grove_amount.amount > 0 || self.gbd_amount.amount > 0,
            "release must carry some amount"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_transfer() -> EscrowTransferOperation {
        EscrowTransferOperation {
            from: AccountName::from("alice"),
            to: AccountName::from("bob"),
            agent: AccountName::from("judge"),
            escrow_id: 1,
            grove_amount: Asset::grove(1000),
            gbd_amount: Asset::gbd(0),
            fee: Asset::grove(10),
            ratification_deadline: Timestamp(100),
            escrow_expiration: Timestamp(200),
            json_meta: String::new(),
        }
    }

    #[test]
    fn agent_must_be_third_party() {
        let mut op = base_transfer();
        op.agent = op.from.clone();
        assert!(op.validate().is_err());
    }

    #[test]
    fn deadline_ordering() {
        let mut op = base_transfer();
        op.ratification_deadline = op.escrow_expiration;
        assert!(op.validate().is_err());
    }

    #[test]
    fn only_parties_release() {
        let op = EscrowReleaseOperation {
            from: AccountName::from("alice"),
            to: AccountName::from("bob"),
            agent: AccountName::from("judge"),
            who: AccountName::from("mallory"),
            receiver: AccountName::from("bob"),
            escrow_id: 1,
            grove_amount: Asset::grove(1),
            gbd_amount: Asset::gbd(0),
        };
        assert!(op.validate().is_err());
    }
}
