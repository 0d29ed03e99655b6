// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::crypto::PublicKey;
use crate::db::{ObjectId, StateObject};
use crate::operations::PERCENT_100;
use crate::types::{AccountName, Asset, Authority, Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proxy chains are followed at most this deep when vote weight moves.
pub const MAX_PROXY_DEPTH: usize = 4;

pub type AccountId = ObjectId<Account>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
    /// Delegate all governance votes to this account instead.
    pub proxy: Option<AccountName>,
    pub recovery_account: Option<AccountName>,
    pub reset_account: Option<AccountName>,
    pub created: Timestamp,
    pub last_owner_update: Timestamp,
    pub last_account_update: Timestamp,
    pub last_account_recovery: Timestamp,

    pub can_vote: bool,
    /// Regenerating vote stamina in basis points.
    pub voting_power: u16,
    pub last_vote_time: Timestamp,
    pub post_count: u32,
    pub last_post: Timestamp,
    pub last_root_post: Timestamp,

    pub balance: Asset,
    pub savings_balance: Asset,
    pub gbd_balance: Asset,
    pub savings_gbd_balance: Asset,
    /// Balance-seconds accumulator driving stable-asset interest.
    pub gbd_seconds: u128,
    pub gbd_seconds_last_update: Timestamp,
    pub gbd_last_interest_payment: Timestamp,
    pub savings_gbd_seconds: u128,
    pub savings_gbd_seconds_last_update: Timestamp,
    pub savings_gbd_last_interest_payment: Timestamp,
    pub savings_withdraw_requests: u16,

    pub vesting_shares: Asset,
    pub delegated_vesting_shares: Asset,
    pub received_vesting_shares: Asset,
    pub vesting_withdraw_rate: Asset,
    /// `Timestamp::MAX` when no withdrawal is scheduled.
    pub next_vesting_withdrawal: Timestamp,
    pub withdrawn: i64,
    pub to_withdraw: i64,
    pub withdraw_routes: u16,

    /// Vote weight proxied to this account, bucketed by proxy distance.
    pub proxied_vsf_votes: [i64; MAX_PROXY_DEPTH],
    pub witnesses_voted_for: u16,

    pub active_challenged: bool,
    pub owner_challenged: bool,
    pub last_active_proved: Timestamp,
    pub last_owner_proved: Timestamp,
}

impl Account {
    pub fn starter(name: AccountName, memo_key: PublicKey, created: Timestamp) -> Account {
        Account {
            name,
            owner: Authority::default(),
            active: Authority::default(),
            posting: Authority::default(),
            memo_key,
            json_metadata: String::new(),
            proxy: None,
            recovery_account: None,
            reset_account: None,
            created,
            last_owner_update: Timestamp(0),
            last_account_update: Timestamp(0),
            last_account_recovery: Timestamp(0),
            can_vote: true,
            voting_power: PERCENT_100,
            last_vote_time: created,
            post_count: 0,
            last_post: Timestamp(0),
            last_root_post: Timestamp(0),
            balance: Asset::grove(0),
            savings_balance: Asset::grove(0),
            gbd_balance: Asset::gbd(0),
            savings_gbd_balance: Asset::gbd(0),
            gbd_seconds: 0,
            gbd_seconds_last_update: created,
            gbd_last_interest_payment: created,
            savings_gbd_seconds: 0,
            savings_gbd_seconds_last_update: created,
            savings_gbd_last_interest_payment: created,
            savings_withdraw_requests: 0,
            vesting_shares: Asset::vests(0),
            delegated_vesting_shares: Asset::vests(0),
            received_vesting_shares: Asset::vests(0),
            vesting_withdraw_rate: Asset::vests(0),
            next_vesting_withdrawal: Timestamp::MAX,
            withdrawn: 0,
            to_withdraw: 0,
            withdraw_routes: 0,
            proxied_vsf_votes: [0; MAX_PROXY_DEPTH],
            witnesses_voted_for: 0,
            active_challenged: false,
            owner_challenged: false,
            last_active_proved: Timestamp(0),
            last_owner_proved: Timestamp(0),
        }
    }

    /// Shares that back this account's own influence: owned, minus what it
    /// delegated away, plus what others delegated in.
    pub fn effective_vesting_shares(&self) -> Asset {
        self.vesting_shares - self.delegated_vesting_shares + self.received_vesting_shares
    }

    /// Weight this account contributes to witness elections: its own
    /// shares plus everything proxied to it. Delegations do not move
    /// witness vote weight.
    pub fn witness_vote_weight(&self) -> i64 {
        self.vesting_shares.amount + self.proxied_vsf_votes_total()
    }

    pub fn proxied_vsf_votes_total(&self) -> i64 {
        self.proxied_vsf_votes.iter().sum()
    }
}

#[derive(Default)]
pub struct AccountIndexes {
    pub by_name: BTreeMap<AccountName, AccountId>,
    /// Only accounts with a scheduled withdrawal appear here.
    pub by_next_vesting_withdrawal: BTreeMap<(Timestamp, AccountId), ()>,
}

impl StateObject for Account {
    type Indexes = AccountIndexes;

    const TYPE_NAME: &'static str = "account";

    fn index_insert(ix: &mut AccountIndexes, id: AccountId, obj: &Account) {
        ix.by_name.insert(obj.name.clone(), id);
        if obj.next_vesting_withdrawal != Timestamp::MAX {
            ix.by_next_vesting_withdrawal
                .insert((obj.next_vesting_withdrawal, id), ());
        }
    }

    fn index_remove(ix: &mut AccountIndexes, id: AccountId, obj: &Account) {
        ix.by_name.remove(&obj.name);
        ix.by_next_vesting_withdrawal
            .remove(&(obj.next_vesting_withdrawal, id));
    }
}

/// Holdings of user-issued assets; the three core assets live on the
/// account record itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountBalance {
    pub owner: AccountName,
    pub symbol: Symbol,
    pub balance: i64,
}

pub type AccountBalanceId = ObjectId<AccountBalance>;

#[derive(Default)]
pub struct AccountBalanceIndexes {
    pub by_owner_symbol: BTreeMap<(AccountName, Symbol), AccountBalanceId>,
}

impl StateObject for AccountBalance {
    type Indexes = AccountBalanceIndexes;

    const TYPE_NAME: &'static str = "account_balance";

    fn index_insert(ix: &mut AccountBalanceIndexes, id: AccountBalanceId, obj: &AccountBalance) {
        ix.by_owner_symbol.insert((obj.owner.clone(), obj.symbol), id);
    }

    fn index_remove(ix: &mut AccountBalanceIndexes, _id: AccountBalanceId, obj: &AccountBalance) {
        ix.by_owner_symbol.remove(&(obj.owner.clone(), obj.symbol));
    }
}
