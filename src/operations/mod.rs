// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The operation set. Every transaction payload is one variant of
//! [`Operation`]; stateless structural validation lives here with the
//! payload types, stateful evaluation in [`crate::evaluator`].

mod account;
mod asset;
mod custom;
mod escrow;
mod market;
mod recovery;
mod social;
mod transfer;
mod virtual_ops;
mod witness;

pub use account::*;
pub use asset::*;
pub use custom::*;
pub use escrow::*;
pub use market::*;
pub use recovery::*;
pub use social::*;
pub use transfer::*;
pub use virtual_ops::VirtualOperation;
pub use witness::*;

use crate::types::{AccountName, Asset, Authority};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One hundred percent in basis points; all percentage fields use this
/// scale.
pub const PERCENT_100: u16 = 10_000;
/// One percent in basis points.
pub const PERCENT_1: u16 = PERCENT_100 / 100;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

macro_rules! check {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::operations::ValidationError(format!($($arg)*)));
        }
    };
}
pub(crate) use check;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Operation {
    Vote(VoteOperation),
    Comment(CommentOperation),
    CommentOptions(CommentOptionsOperation),
    DeleteComment(DeleteCommentOperation),
    Transfer(TransferOperation),
    TransferToVesting(TransferToVestingOperation),
    WithdrawVesting(WithdrawVestingOperation),
    SetWithdrawVestingRoute(SetWithdrawVestingRouteOperation),
    AccountCreate(AccountCreateOperation),
    AccountCreateWithDelegation(AccountCreateWithDelegationOperation),
    AccountUpdate(AccountUpdateOperation),
    WitnessUpdate(WitnessUpdateOperation),
    AccountWitnessVote(AccountWitnessVoteOperation),
    AccountWitnessProxy(AccountWitnessProxyOperation),
    Custom(CustomOperation),
    CustomBinary(CustomBinaryOperation),
    CustomJson(CustomJsonOperation),
    Pow(PowOperation),
    Pow2(Pow2Operation),
    ReportOverProduction(ReportOverProductionOperation),
    FeedPublish(FeedPublishOperation),
    Convert(ConvertOperation),
    LimitOrderCreate(LimitOrderCreateOperation),
    LimitOrderCreate2(LimitOrderCreate2Operation),
    LimitOrderCancel(LimitOrderCancelOperation),
    ChallengeAuthority(ChallengeAuthorityOperation),
    ProveAuthority(ProveAuthorityOperation),
    RequestAccountRecovery(RequestAccountRecoveryOperation),
    RecoverAccount(RecoverAccountOperation),
    ChangeRecoveryAccount(ChangeRecoveryAccountOperation),
    EscrowTransfer(EscrowTransferOperation),
    EscrowApprove(EscrowApproveOperation),
    EscrowDispute(EscrowDisputeOperation),
    EscrowRelease(EscrowReleaseOperation),
    TransferToSavings(TransferToSavingsOperation),
    TransferFromSavings(TransferFromSavingsOperation),
    CancelTransferFromSavings(CancelTransferFromSavingsOperation),
    DeclineVotingRights(DeclineVotingRightsOperation),
    ResetAccount(ResetAccountOperation),
    SetResetAccount(SetResetAccountOperation),
    DelegateVestingShares(DelegateVestingSharesOperation),
    AssetCreate(AssetCreateOperation),
    AssetIssue(AssetIssueOperation),
    AssetReserve(AssetReserveOperation),
    AssetUpdate(AssetUpdateOperation),
    AssetUpdateBitasset(AssetUpdateBitassetOperation),
    AssetUpdateFeedProducers(AssetUpdateFeedProducersOperation),
    AssetFundFeePool(AssetFundFeePoolOperation),
    AssetGlobalSettle(AssetGlobalSettleOperation),
    AssetSettle(AssetSettleOperation),
    AssetForceSettle(AssetForceSettleOperation),
    AssetPublishFeed(AssetPublishFeedOperation),
    AssetClaimFees(AssetClaimFeesOperation),
    CallOrderUpdate(CallOrderUpdateOperation),
}

impl Operation {
    /// Stateless structural validation, run before any state is touched.
    pub fn validate(&self) -> Result<(), ValidationError> {
        use Operation::*;
        match self {
            Vote(op) => op.validate(),
            Comment(op) => op.validate(),
            CommentOptions(op) => op.validate(),
            DeleteComment(op) => op.validate(),
            Transfer(op) => op.validate(),
            TransferToVesting(op) => op.validate(),
            WithdrawVesting(op) => op.validate(),
            SetWithdrawVestingRoute(op) => op.validate(),
            AccountCreate(op) => op.validate(),
            AccountCreateWithDelegation(op) => op.validate(),
            AccountUpdate(op) => op.validate(),
            WitnessUpdate(op) => op.validate(),
            AccountWitnessVote(op) => op.validate(),
            AccountWitnessProxy(op) => op.validate(),
            Custom(op) => op.validate(),
            CustomBinary(op) => op.validate(),
            CustomJson(op) => op.validate(),
            Pow(op) => op.validate(),
            Pow2(op) => op.validate(),
            ReportOverProduction(op) => op.validate(),
            FeedPublish(op) => op.validate(),
            Convert(op) => op.validate(),
            LimitOrderCreate(op) => op.validate(),
            LimitOrderCreate2(op) => op.validate(),
            LimitOrderCancel(op) => op.validate(),
            ChallengeAuthority(op) => op.validate(),
            ProveAuthority(op) => op.validate(),
            RequestAccountRecovery(op) => op.validate(),
            RecoverAccount(op) => op.validate(),
            ChangeRecoveryAccount(op) => op.validate(),
            EscrowTransfer(op) => op.validate(),
            EscrowApprove(op) => op.validate(),
            EscrowDispute(op) => op.validate(),
            EscrowRelease(op) => op.validate(),
            TransferToSavings(op) => op.validate(),
            TransferFromSavings(op) => op.validate(),
            CancelTransferFromSavings(op) => op.validate(),
            DeclineVotingRights(op) => op.validate(),
            ResetAccount(op) => op.validate(),
            SetResetAccount(op) => op.validate(),
            DelegateVestingShares(op) => op.validate(),
            AssetCreate(op) => op.validate(),
            AssetIssue(op) => op.validate(),
            AssetReserve(op) => op.validate(),
            AssetUpdate(op) => op.validate(),
            AssetUpdateBitasset(op) => op.validate(),
            AssetUpdateFeedProducers(op) => op.validate(),
            AssetFundFeePool(op) => op.validate(),
            AssetGlobalSettle(op) => op.validate(),
            AssetSettle(op) => op.validate(),
            AssetForceSettle(op) => op.validate(),
            AssetPublishFeed(op) => op.validate(),
            AssetClaimFees(op) => op.validate(),
            CallOrderUpdate(op) => op.validate(),
        }
    }

    /// Accounts whose posting authority must sign.
    pub fn required_posting(&self, out: &mut Vec<AccountName>) {
        use Operation::*;
        match self {
            Vote(op) => out.push(op.voter.clone()),
            Comment(op) => out.push(op.author.clone()),
            CommentOptions(op) => out.push(op.author.clone()),
            DeleteComment(op) => out.push(op.author.clone()),
            CustomJson(op) => out.extend(op.required_posting_auths.iter().cloned()),
            CustomBinary(op) => out.extend(op.required_posting_auths.iter().cloned()),
            _ => {}
        }
    }

    /// Accounts whose active authority must sign.
    pub fn required_active(&self, out: &mut Vec<AccountName>) {
        use Operation::*;
        match self {
            Transfer(op) => out.push(op.from.clone()),
            TransferToVesting(op) => out.push(op.from.clone()),
            WithdrawVesting(op) => out.push(op.account.clone()),
            SetWithdrawVestingRoute(op) => out.push(op.from_account.clone()),
            AccountCreate(op) => out.push(op.creator.clone()),
            AccountCreateWithDelegation(op) => out.push(op.creator.clone()),
            AccountUpdate(op) if op.owner.is_none() => out.push(op.account.clone()),
            WitnessUpdate(op) => out.push(op.owner.clone()),
            AccountWitnessVote(op) => out.push(op.account.clone()),
            AccountWitnessProxy(op) => out.push(op.account.clone()),
            Custom(op) => out.extend(op.required_auths.iter().cloned()),
            CustomJson(op) => out.extend(op.required_auths.iter().cloned()),
            CustomBinary(op) => out.extend(op.required_active_auths.iter().cloned()),
            ReportOverProduction(op) => out.push(op.reporter.clone()),
            FeedPublish(op) => out.push(op.publisher.clone()),
            Convert(op) => out.push(op.owner.clone()),
            LimitOrderCreate(op) => out.push(op.owner.clone()),
            LimitOrderCreate2(op) => out.push(op.owner.clone()),
            LimitOrderCancel(op) => out.push(op.owner.clone()),
            ChallengeAuthority(op) => out.push(op.challenger.clone()),
            ProveAuthority(op) if !op.require_owner => out.push(op.challenged.clone()),
            RequestAccountRecovery(op) => out.push(op.recovery_account.clone()),
            EscrowTransfer(op) => out.push(op.from.clone()),
            EscrowApprove(op) => out.push(op.who.clone()),
            EscrowDispute(op) => out.push(op.who.clone()),
            EscrowRelease(op) => out.push(op.who.clone()),
            TransferToSavings(op) => out.push(op.from.clone()),
            TransferFromSavings(op) => out.push(op.from.clone()),
            CancelTransferFromSavings(op) => out.push(op.from.clone()),
            ResetAccount(op) => out.push(op.reset_account.clone()),
            DelegateVestingShares(op) => out.push(op.delegator.clone()),
            AssetCreate(op) => out.push(op.issuer.clone()),
            AssetIssue(op) => out.push(op.issuer.clone()),
            AssetReserve(op) => out.push(op.payer.clone()),
            AssetUpdate(op) => out.push(op.issuer.clone()),
            AssetUpdateBitasset(op) => out.push(op.issuer.clone()),
            AssetUpdateFeedProducers(op) => out.push(op.issuer.clone()),
            AssetFundFeePool(op) => out.push(op.from_account.clone()),
            AssetGlobalSettle(op) => out.push(op.issuer.clone()),
            AssetSettle(op) => out.push(op.account.clone()),
            AssetForceSettle(op) => out.push(op.account.clone()),
            AssetPublishFeed(op) => out.push(op.publisher.clone()),
            AssetClaimFees(op) => out.push(op.issuer.clone()),
            CallOrderUpdate(op) => out.push(op.funding_account.clone()),
            Pow2(op) => {
                // A PoW for an existing account is authorized by the work
                // itself; an active signature is only demanded when the
                // account exists (checked in the evaluator).
                out.push(op.worker_account.clone());
            }
            _ => {}
        }
    }

    /// Accounts whose owner authority must sign.
    pub fn required_owner(&self, out: &mut Vec<AccountName>) {
        use Operation::*;
        match self {
            AccountUpdate(op) if op.owner.is_some() => out.push(op.account.clone()),
            CustomBinary(op) => out.extend(op.required_owner_auths.iter().cloned()),
            ChangeRecoveryAccount(op) => out.push(op.account_to_recover.clone()),
            DeclineVotingRights(op) => out.push(op.account.clone()),
            SetResetAccount(op) => out.push(op.account.clone()),
            ProveAuthority(op) if op.require_owner => out.push(op.challenged.clone()),
            _ => {}
        }
    }

    /// Free-standing authorities that must be satisfied directly (account
    /// recovery proves the old and new owner authorities themselves).
    pub fn required_other(&self, out: &mut Vec<Authority>) {
        use Operation::*;
        match self {
            RecoverAccount(op) => {
                out.push(op.new_owner_authority.clone());
                out.push(op.recent_owner_authority.clone());
            }
            Pow(op) => {
                // Work is self-certifying; the worker key signs.
                out.push(Authority::single_key(op.work_key));
            }
            _ => {}
        }
    }

    /// True for operations a prevented (challenged) account may still use.
    pub fn is_proving(&self) -> bool {
        matches!(self, Operation::ProveAuthority(_))
    }
}

pub(crate) fn validate_amount_positive(amount: &Asset, what: &str) -> Result<(), ValidationError> {
    check!(amount.amount > 0, "{what} must be positive, got {amount}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;

    #[test]
    fn transfer_authority_is_active() {
        let op = Operation::Transfer(TransferOperation {
            from: AccountName::from("alice"),
            to: AccountName::from("bob"),
            amount: Asset::grove(1),
            memo: String::new(),
        });
        let mut active = Vec::new();
        let mut posting = Vec::new();
        let mut owner = Vec::new();
        op.required_active(&mut active);
        op.required_posting(&mut posting);
        op.required_owner(&mut owner);
        assert_eq!(active, vec![AccountName::from("alice")]);
        assert!(posting.is_empty());
        assert!(owner.is_empty());
    }

    #[test]
    fn vote_authority_is_posting() {
        let op = Operation::Vote(VoteOperation {
            voter: AccountName::from("alice"),
            author: AccountName::from("bob"),
            permlink: "post".into(),
            weight: PERCENT_100 as i16,
        });
        let mut posting = Vec::new();
        op.required_posting(&mut posting);
        assert_eq!(posting, vec![AccountName::from("alice")]);
    }

    #[test]
    fn owner_update_requires_owner() {
        let base = AccountUpdateOperation {
            account: AccountName::from("alice"),
            owner: None,
            active: None,
            posting: None,
            memo_key: None,
            json_metadata: String::new(),
        };
        let mut out = Vec::new();
        Operation::AccountUpdate(base.clone()).required_owner(&mut out);
        assert!(out.is_empty());
        let mut with_owner = base;
        with_owner.owner = Some(Authority::impossible());
        Operation::AccountUpdate(with_owner).required_owner(&mut out);
        assert_eq!(out, vec![AccountName::from("alice")]);
    }

    #[test]
    fn validate_rejects_bad_amounts() {
        let op = Operation::Transfer(TransferOperation {
            from: AccountName::from("alice"),
            to: AccountName::from("bob"),
            amount: Asset::new(-5, Symbol::GROVE),
            memo: String::new(),
        });
        assert!(op.validate().is_err());
    }
}
