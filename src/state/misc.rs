// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The long tail of state records: TaPoS summaries, dedup entries,
//! reward funds, deferred requests of every flavor, and bandwidth tallies.

use crate::blocks::BlockId;
use crate::db::{ObjectId, StateObject};
use crate::transaction::TransactionId;
use crate::types::{AccountName, Asset, Authority, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ring of recent block ids consulted by TaPoS checks. The table holds
/// exactly 2^16 rows; row `n` describes the latest block whose height has
/// low bits `n`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: BlockId,
}

pub type BlockSummaryId = ObjectId<BlockSummary>;

pub const BLOCK_SUMMARY_SLOTS: u64 = 1 << 16;

impl StateObject for BlockSummary {
    type Indexes = ();

    const TYPE_NAME: &'static str = "block_summary";

    fn index_insert(_: &mut (), _: BlockSummaryId, _: &BlockSummary) {}
    fn index_remove(_: &mut (), _: BlockSummaryId, _: &BlockSummary) {}
}

/// Dedup record for an in-window transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionObject {
    pub trx_id: TransactionId,
    pub expiration: Timestamp,
}

pub type TransactionObjectId = ObjectId<TransactionObject>;

#[derive(Default)]
pub struct TransactionObjectIndexes {
    pub by_trx_id: BTreeMap<TransactionId, TransactionObjectId>,
    pub by_expiration: BTreeMap<(Timestamp, TransactionObjectId), ()>,
}

impl StateObject for TransactionObject {
    type Indexes = TransactionObjectIndexes;

    const TYPE_NAME: &'static str = "transaction";

    fn index_insert(ix: &mut Self::Indexes, id: TransactionObjectId, obj: &Self) {
        ix.by_trx_id.insert(obj.trx_id, id);
        ix.by_expiration.insert((obj.expiration, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: TransactionObjectId, obj: &Self) {
        ix.by_trx_id.remove(&obj.trx_id);
        ix.by_expiration.remove(&(obj.expiration, id));
    }
}

/// A named content reward pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardFund {
    pub name: String,
    pub reward_balance: Asset,
    /// Decaying sum of claimed vote shares, the divisor of every payout.
    pub recent_rshares2: u128,
    pub percent_content_rewards: u16,
    pub content_constant: u128,
    pub last_update: Timestamp,
}

pub type RewardFundId = ObjectId<RewardFund>;

#[derive(Default)]
pub struct RewardFundIndexes {
    pub by_name: BTreeMap<String, RewardFundId>,
}

impl StateObject for RewardFund {
    type Indexes = RewardFundIndexes;

    const TYPE_NAME: &'static str = "reward_fund";

    fn index_insert(ix: &mut Self::Indexes, id: RewardFundId, obj: &Self) {
        ix.by_name.insert(obj.name.clone(), id);
    }

    fn index_remove(ix: &mut Self::Indexes, _id: RewardFundId, obj: &Self) {
        ix.by_name.remove(&obj.name);
    }
}

/// A pending stable→core conversion, executed at the historical median
/// once the delay elapses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub owner: AccountName,
    pub request_id: u32,
    pub amount: Asset,
    pub conversion_date: Timestamp,
}

pub type ConvertRequestId = ObjectId<ConvertRequest>;

#[derive(Default)]
pub struct ConvertRequestIndexes {
    pub by_owner: BTreeMap<(AccountName, u32), ConvertRequestId>,
    pub by_conversion_date: BTreeMap<(Timestamp, ConvertRequestId), ()>,
}

impl StateObject for ConvertRequest {
    type Indexes = ConvertRequestIndexes;

    const TYPE_NAME: &'static str = "convert_request";

    fn index_insert(ix: &mut Self::Indexes, id: ConvertRequestId, obj: &Self) {
        ix.by_owner.insert((obj.owner.clone(), obj.request_id), id);
        ix.by_conversion_date.insert((obj.conversion_date, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: ConvertRequestId, obj: &Self) {
        ix.by_owner.remove(&(obj.owner.clone(), obj.request_id));
        ix.by_conversion_date.remove(&(obj.conversion_date, id));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Escrow {
    pub escrow_id: u32,
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub ratification_deadline: Timestamp,
    pub escrow_expiration: Timestamp,
    pub grove_balance: Asset,
    pub gbd_balance: Asset,
    pub pending_fee: Asset,
    pub to_approved: bool,
    pub agent_approved: bool,
    pub disputed: bool,
}

impl Escrow {
    pub fn is_approved(&self) -> bool {
        self.to_approved && self.agent_approved
    }
}

pub type EscrowId = ObjectId<Escrow>;

#[derive(Default)]
pub struct EscrowIndexes {
    pub by_from_id: BTreeMap<(AccountName, u32), EscrowId>,
    pub by_ratification_deadline: BTreeMap<(Timestamp, EscrowId), ()>,
}

impl StateObject for Escrow {
    type Indexes = EscrowIndexes;

    const TYPE_NAME: &'static str = "escrow";

    fn index_insert(ix: &mut Self::Indexes, id: EscrowId, obj: &Self) {
        ix.by_from_id.insert((obj.from.clone(), obj.escrow_id), id);
        if !obj.is_approved() {
            ix.by_ratification_deadline
                .insert((obj.ratification_deadline, id), ());
        }
    }

    fn index_remove(ix: &mut Self::Indexes, id: EscrowId, obj: &Self) {
        ix.by_from_id.remove(&(obj.from.clone(), obj.escrow_id));
        if !obj.is_approved() {
            ix.by_ratification_deadline
                .remove(&(obj.ratification_deadline, id));
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavingsWithdraw {
    pub from: AccountName,
    pub to: AccountName,
    pub memo: String,
    pub request_id: u32,
    pub amount: Asset,
    pub complete: Timestamp,
}

pub type SavingsWithdrawId = ObjectId<SavingsWithdraw>;

#[derive(Default)]
pub struct SavingsWithdrawIndexes {
    pub by_from_rid: BTreeMap<(AccountName, u32), SavingsWithdrawId>,
    pub by_complete: BTreeMap<(Timestamp, SavingsWithdrawId), ()>,
}

impl StateObject for SavingsWithdraw {
    type Indexes = SavingsWithdrawIndexes;

    const TYPE_NAME: &'static str = "savings_withdraw";

    fn index_insert(ix: &mut Self::Indexes, id: SavingsWithdrawId, obj: &Self) {
        ix.by_from_rid.insert((obj.from.clone(), obj.request_id), id);
        ix.by_complete.insert((obj.complete, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: SavingsWithdrawId, obj: &Self) {
        ix.by_from_rid.remove(&(obj.from.clone(), obj.request_id));
        ix.by_complete.remove(&(obj.complete, id));
    }
}

/// Standing instruction splitting an account's vesting withdrawals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawVestingRoute {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub percent: u16,
    pub auto_vest: bool,
}

pub type WithdrawVestingRouteId = ObjectId<WithdrawVestingRoute>;

#[derive(Default)]
pub struct WithdrawVestingRouteIndexes {
    pub by_route: BTreeMap<(AccountName, AccountName), WithdrawVestingRouteId>,
    pub by_from: BTreeMap<(AccountName, WithdrawVestingRouteId), ()>,
}

impl StateObject for WithdrawVestingRoute {
    type Indexes = WithdrawVestingRouteIndexes;

    const TYPE_NAME: &'static str = "withdraw_vesting_route";

    fn index_insert(ix: &mut Self::Indexes, id: WithdrawVestingRouteId, obj: &Self) {
        ix.by_route
            .insert((obj.from_account.clone(), obj.to_account.clone()), id);
        ix.by_from.insert((obj.from_account.clone(), id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: WithdrawVestingRouteId, obj: &Self) {
        ix.by_route
            .remove(&(obj.from_account.clone(), obj.to_account.clone()));
        ix.by_from.remove(&(obj.from_account.clone(), id));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VestingDelegation {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    pub vesting_shares: Asset,
    pub min_delegation_time: Timestamp,
}

pub type VestingDelegationId = ObjectId<VestingDelegation>;

#[derive(Default)]
pub struct VestingDelegationIndexes {
    pub by_delegation: BTreeMap<(AccountName, AccountName), VestingDelegationId>,
}

impl StateObject for VestingDelegation {
    type Indexes = VestingDelegationIndexes;

    const TYPE_NAME: &'static str = "vesting_delegation";

    fn index_insert(ix: &mut Self::Indexes, id: VestingDelegationId, obj: &Self) {
        ix.by_delegation
            .insert((obj.delegator.clone(), obj.delegatee.clone()), id);
    }

    fn index_remove(ix: &mut Self::Indexes, _id: VestingDelegationId, obj: &Self) {
        ix.by_delegation
            .remove(&(obj.delegator.clone(), obj.delegatee.clone()));
    }
}

/// Shares in flight back to their delegator after a delegation shrank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VestingDelegationExpiration {
    pub delegator: AccountName,
    pub vesting_shares: Asset,
    pub expiration: Timestamp,
}

pub type VestingDelegationExpirationId = ObjectId<VestingDelegationExpiration>;

#[derive(Default)]
pub struct VestingDelegationExpirationIndexes {
    pub by_expiration: BTreeMap<(Timestamp, VestingDelegationExpirationId), ()>,
}

impl StateObject for VestingDelegationExpiration {
    type Indexes = VestingDelegationExpirationIndexes;

    const TYPE_NAME: &'static str = "vesting_delegation_expiration";

    fn index_insert(ix: &mut Self::Indexes, id: VestingDelegationExpirationId, obj: &Self) {
        ix.by_expiration.insert((obj.expiration, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: VestingDelegationExpirationId, obj: &Self) {
        ix.by_expiration.remove(&(obj.expiration, id));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeclineVotingRightsRequest {
    pub account: AccountName,
    pub effective_date: Timestamp,
}

pub type DeclineVotingRightsRequestId = ObjectId<DeclineVotingRightsRequest>;

#[derive(Default)]
pub struct DeclineVotingRightsRequestIndexes {
    pub by_account: BTreeMap<AccountName, DeclineVotingRightsRequestId>,
    pub by_effective_date: BTreeMap<(Timestamp, DeclineVotingRightsRequestId), ()>,
}

impl StateObject for DeclineVotingRightsRequest {
    type Indexes = DeclineVotingRightsRequestIndexes;

    const TYPE_NAME: &'static str = "decline_voting_rights_request";

    fn index_insert(ix: &mut Self::Indexes, id: DeclineVotingRightsRequestId, obj: &Self) {
        ix.by_account.insert(obj.account.clone(), id);
        ix.by_effective_date.insert((obj.effective_date, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: DeclineVotingRightsRequestId, obj: &Self) {
        ix.by_account.remove(&obj.account);
        ix.by_effective_date.remove(&(obj.effective_date, id));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountRecoveryRequest {
    pub account_to_recover: AccountName,
    pub new_owner_authority: Authority,
    pub expires: Timestamp,
}

pub type AccountRecoveryRequestId = ObjectId<AccountRecoveryRequest>;

#[derive(Default)]
pub struct AccountRecoveryRequestIndexes {
    pub by_account: BTreeMap<AccountName, AccountRecoveryRequestId>,
    pub by_expiration: BTreeMap<(Timestamp, AccountRecoveryRequestId), ()>,
}

impl StateObject for AccountRecoveryRequest {
    type Indexes = AccountRecoveryRequestIndexes;

    const TYPE_NAME: &'static str = "account_recovery_request";

    fn index_insert(ix: &mut Self::Indexes, id: AccountRecoveryRequestId, obj: &Self) {
        ix.by_account.insert(obj.account_to_recover.clone(), id);
        ix.by_expiration.insert((obj.expires, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: AccountRecoveryRequestId, obj: &Self) {
        ix.by_account.remove(&obj.account_to_recover);
        ix.by_expiration.remove(&(obj.expires, id));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountRequest {
    pub account_to_recover: AccountName,
    pub recovery_account: AccountName,
    pub effective_on: Timestamp,
}

pub type ChangeRecoveryAccountRequestId = ObjectId<ChangeRecoveryAccountRequest>;

#[derive(Default)]
pub struct ChangeRecoveryAccountRequestIndexes {
    pub by_account: BTreeMap<AccountName, ChangeRecoveryAccountRequestId>,
    pub by_effective_date: BTreeMap<(Timestamp, ChangeRecoveryAccountRequestId), ()>,
}

impl StateObject for ChangeRecoveryAccountRequest {
    type Indexes = ChangeRecoveryAccountRequestIndexes;

    const TYPE_NAME: &'static str = "change_recovery_account_request";

    fn index_insert(ix: &mut Self::Indexes, id: ChangeRecoveryAccountRequestId, obj: &Self) {
        ix.by_account.insert(obj.account_to_recover.clone(), id);
        ix.by_effective_date.insert((obj.effective_on, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: ChangeRecoveryAccountRequestId, obj: &Self) {
        ix.by_account.remove(&obj.account_to_recover);
        ix.by_effective_date.remove(&(obj.effective_on, id));
    }
}

/// Retained owner authorities; any of these proves ownership during the
/// recovery window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerAuthorityHistory {
    pub account: AccountName,
    pub previous_owner_authority: Authority,
    pub last_valid_time: Timestamp,
}

pub type OwnerAuthorityHistoryId = ObjectId<OwnerAuthorityHistory>;

#[derive(Default)]
pub struct OwnerAuthorityHistoryIndexes {
    pub by_account: BTreeMap<(AccountName, OwnerAuthorityHistoryId), ()>,
    pub by_last_valid: BTreeMap<(Timestamp, OwnerAuthorityHistoryId), ()>,
}

impl StateObject for OwnerAuthorityHistory {
    type Indexes = OwnerAuthorityHistoryIndexes;

    const TYPE_NAME: &'static str = "owner_authority_history";

    fn index_insert(ix: &mut Self::Indexes, id: OwnerAuthorityHistoryId, obj: &Self) {
        ix.by_account.insert((obj.account.clone(), id), ());
        ix.by_last_valid.insert((obj.last_valid_time, id), ());
    }

    fn index_remove(ix: &mut Self::Indexes, id: OwnerAuthorityHistoryId, obj: &Self) {
        ix.by_account.remove(&(obj.account.clone(), id));
        ix.by_last_valid.remove(&(obj.last_valid_time, id));
    }
}

/// Which rolling window a transaction debits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum BandwidthClass {
    Forum,
    Market,
    OldForum,
    OldMarket,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountBandwidth {
    pub account: AccountName,
    pub class: BandwidthClass,
    pub average_bandwidth: u128,
    pub lifetime_bandwidth: u128,
    pub last_bandwidth_update: Timestamp,
}

pub type AccountBandwidthId = ObjectId<AccountBandwidth>;

#[derive(Default)]
pub struct AccountBandwidthIndexes {
    pub by_account_class: BTreeMap<(AccountName, BandwidthClass), AccountBandwidthId>,
}

impl StateObject for AccountBandwidth {
    type Indexes = AccountBandwidthIndexes;

    const TYPE_NAME: &'static str = "account_bandwidth";

    fn index_insert(ix: &mut Self::Indexes, id: AccountBandwidthId, obj: &Self) {
        ix.by_account_class.insert((obj.account.clone(), obj.class), id);
    }

    fn index_remove(ix: &mut Self::Indexes, _id: AccountBandwidthId, obj: &Self) {
        ix.by_account_class.remove(&(obj.account.clone(), obj.class));
    }
}
