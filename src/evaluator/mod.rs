// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Operation evaluators. Each evaluator takes the chain with the write
//! lock held, checks its preconditions against live state, and mutates
//! the store. Structural validation has already run by the time an
//! evaluator is reached.

mod account;
mod asset;
mod comment;
mod escrow;
mod market;
mod recovery;
mod transfer;
mod witness;

use crate::chain::{Chain, Error};
use crate::operations::Operation;

/// Dispatch one operation to its evaluator.
pub(crate) fn apply_operation(chain: &mut Chain, op: &Operation) -> Result<(), Error> {
    use Operation::*;
    match op {
        Vote(op) => comment::apply_vote(chain, op),
        Comment(op) => comment::apply_comment(chain, op),
        CommentOptions(op) => comment::apply_comment_options(chain, op),
        DeleteComment(op) => comment::apply_delete_comment(chain, op),
        Transfer(op) => transfer::apply_transfer(chain, op),
        TransferToVesting(op) => transfer::apply_transfer_to_vesting(chain, op),
        WithdrawVesting(op) => transfer::apply_withdraw_vesting(chain, op),
        SetWithdrawVestingRoute(op) => transfer::apply_set_withdraw_vesting_route(chain, op),
        AccountCreate(op) => account::apply_account_create(chain, op),
        AccountCreateWithDelegation(op) => {
            account::apply_account_create_with_delegation(chain, op)
        }
        AccountUpdate(op) => account::apply_account_update(chain, op),
        WitnessUpdate(op) => witness::apply_witness_update(chain, op),
        AccountWitnessVote(op) => witness::apply_account_witness_vote(chain, op),
        AccountWitnessProxy(op) => witness::apply_account_witness_proxy(chain, op),
        Custom(_) | CustomBinary(_) | CustomJson(_) => Ok(()),
        Pow(op) => witness::apply_pow(chain, op),
        Pow2(op) => witness::apply_pow2(chain, op),
        ReportOverProduction(op) => witness::apply_report_over_production(chain, op),
        FeedPublish(op) => witness::apply_feed_publish(chain, op),
        Convert(op) => transfer::apply_convert(chain, op),
        LimitOrderCreate(op) => market::apply_limit_order_create(chain, op),
        LimitOrderCreate2(op) => market::apply_limit_order_create2(chain, op),
        LimitOrderCancel(op) => market::apply_limit_order_cancel(chain, op),
        ChallengeAuthority(op) => account::apply_challenge_authority(chain, op),
        ProveAuthority(op) => account::apply_prove_authority(chain, op),
        RequestAccountRecovery(op) => recovery::apply_request_account_recovery(chain, op),
        RecoverAccount(op) => recovery::apply_recover_account(chain, op),
        ChangeRecoveryAccount(op) => recovery::apply_change_recovery_account(chain, op),
        EscrowTransfer(op) => escrow::apply_escrow_transfer(chain, op),
        EscrowApprove(op) => escrow::apply_escrow_approve(chain, op),
        EscrowDispute(op) => escrow::apply_escrow_dispute(chain, op),
        EscrowRelease(op) => escrow::apply_escrow_release(chain, op),
        TransferToSavings(op) => transfer::apply_transfer_to_savings(chain, op),
        TransferFromSavings(op) => transfer::apply_transfer_from_savings(chain, op),
        CancelTransferFromSavings(op) => {
            transfer::apply_cancel_transfer_from_savings(chain, op)
        }
        DeclineVotingRights(op) => account::apply_decline_voting_rights(chain, op),
        ResetAccount(op) => account::apply_reset_account(chain, op),
        SetResetAccount(op) => account::apply_set_reset_account(chain, op),
        DelegateVestingShares(op) => transfer::apply_delegate_vesting_shares(chain, op),
        AssetCreate(op) => asset::apply_asset_create(chain, op),
        AssetIssue(op) => asset::apply_asset_issue(chain, op),
        AssetReserve(op) => asset::apply_asset_reserve(chain, op),
        AssetUpdate(op) => asset::apply_asset_update(chain, op),
        AssetUpdateBitasset(op) => asset::apply_asset_update_bitasset(chain, op),
        AssetUpdateFeedProducers(op) => asset::apply_asset_update_feed_producers(chain, op),
        AssetFundFeePool(op) => asset::apply_asset_fund_fee_pool(chain, op),
        AssetGlobalSettle(op) => asset::apply_asset_global_settle(chain, op),
        AssetSettle(op) => asset::apply_asset_settle(chain, op),
        AssetForceSettle(op) => asset::apply_asset_force_settle(chain, op),
        AssetPublishFeed(op) => asset::apply_asset_publish_feed(chain, op),
        AssetClaimFees(op) => asset::apply_asset_claim_fees(chain, op),
        CallOrderUpdate(op) => asset::apply_call_order_update(chain, op),
    }
}
