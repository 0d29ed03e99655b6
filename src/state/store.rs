// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;
use crate::db::{Error, Singleton, Table};
use crate::types::AccountName;

/// Every table and singleton of chain state, with the shared undo-session
/// stack. Sessions open and close across all containers in lockstep; each
/// outer session carries a revision number aligned with block height so
/// commits can discard exactly the frames that became irreversible.
#[derive(Default)]
pub struct Store {
    pub accounts: Table<Account>,
    pub account_balances: Table<AccountBalance>,
    pub comments: Table<Comment>,
    pub comment_votes: Table<CommentVote>,
    pub witnesses: Table<Witness>,
    pub witness_votes: Table<WitnessVote>,
    pub limit_orders: Table<LimitOrder>,
    pub call_orders: Table<CallOrder>,
    pub force_settlements: Table<ForceSettlement>,
    pub liquidity_rewards: Table<LiquidityReward>,
    pub assets: Table<AssetObject>,
    pub asset_dynamic: Table<AssetDynamicData>,
    pub asset_bitassets: Table<AssetBitassetData>,
    pub block_summaries: Table<BlockSummary>,
    pub transactions: Table<TransactionObject>,
    pub reward_funds: Table<RewardFund>,
    pub convert_requests: Table<ConvertRequest>,
    pub escrows: Table<Escrow>,
    pub savings_withdraws: Table<SavingsWithdraw>,
    pub withdraw_routes: Table<WithdrawVestingRoute>,
    pub vesting_delegations: Table<VestingDelegation>,
    pub delegation_expirations: Table<VestingDelegationExpiration>,
    pub decline_voting_requests: Table<DeclineVotingRightsRequest>,
    pub recovery_requests: Table<AccountRecoveryRequest>,
    pub change_recovery_requests: Table<ChangeRecoveryAccountRequest>,
    pub owner_histories: Table<OwnerAuthorityHistory>,
    pub bandwidth: Table<AccountBandwidth>,

    pub dgp: Singleton<DynamicGlobalProperties>,
    pub witness_schedule: Singleton<WitnessSchedule>,
    pub feed_history: Singleton<FeedHistory>,
    pub hardforks: Singleton<HardforkProperties>,

    revision: u64,
    session_revisions: Vec<u64>,
}

macro_rules! for_each_container {
    ($self:ident, $method:ident) => {
        $self.accounts.$method();
        $self.account_balances.$method();
        $self.comments.$method();
        $self.comment_votes.$method();
        $self.witnesses.$method();
        $self.witness_votes.$method();
        $self.limit_orders.$method();
        $self.call_orders.$method();
        $self.force_settlements.$method();
        $self.liquidity_rewards.$method();
        $self.assets.$method();
        $self.asset_dynamic.$method();
        $self.asset_bitassets.$method();
        $self.block_summaries.$method();
        $self.transactions.$method();
        $self.reward_funds.$method();
        $self.convert_requests.$method();
        $self.escrows.$method();
        $self.savings_withdraws.$method();
        $self.withdraw_routes.$method();
        $self.vesting_delegations.$method();
        $self.delegation_expirations.$method();
        $self.decline_voting_requests.$method();
        $self.recovery_requests.$method();
        $self.change_recovery_requests.$method();
        $self.owner_histories.$method();
        $self.bandwidth.$method();
        $self.dgp.$method();
        $self.witness_schedule.$method();
        $self.feed_history.$method();
        $self.hardforks.$method();
    };
}

impl Store {
    /// Revision of the newest state layer; tracks head block number.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn session_depth(&self) -> usize {
        self.session_revisions.len()
    }

    /// Align the committed revision with an externally known height. Only
    /// legal with no open sessions (open, genesis, reindex).
    pub fn set_revision(&mut self, revision: u64) -> Result<(), Error> {
        if !self.session_revisions.is_empty() {
            return Err(Error::SessionsOpen);
        }
        self.revision = revision;
        Ok(())
    }

    pub fn begin_session(&mut self) {
        self.revision += 1;
        self.session_revisions.push(self.revision);
        for_each_container!(self, begin);
    }

    /// Roll back the innermost session.
    pub fn undo_session(&mut self) -> Result<(), Error> {
        self.session_revisions.pop().ok_or(Error::NoSession)?;
        for_each_container!(self, undo);
        self.revision -= 1;
        Ok(())
    }

    /// Merge the innermost session into its parent.
    pub fn squash_session(&mut self) -> Result<(), Error> {
        if self.session_revisions.len() < 2 {
            return Err(Error::SquashOutermost);
        }
        self.session_revisions.pop();
        for_each_container!(self, squash);
        self.revision -= 1;
        Ok(())
    }

    /// Discard undo data for every session with revision `<= revision`,
    /// making those layers irreversible.
    pub fn commit(&mut self, revision: u64) {
        while let Some(&oldest) = self.session_revisions.first() {
            if oldest > revision {
                break;
            }
            self.session_revisions.remove(0);
            for_each_container!(self, commit_oldest);
        }
    }

    /// Unwind every open session.
    pub fn undo_all(&mut self) {
        while !self.session_revisions.is_empty() {
            let _ = self.undo_session();
        }
    }

    pub fn find_account(&self, name: &AccountName) -> Option<AccountId> {
        self.accounts.indexes.by_name.get(name).copied()
    }

    pub fn find_witness(&self, name: &AccountName) -> Option<WitnessId> {
        self.witnesses.indexes.by_name.get(name).copied()
    }

    pub fn find_comment(&self, author: &AccountName, permlink: &str) -> Option<CommentId> {
        self.comments
            .indexes
            .by_permlink
            .get(&(author.clone(), permlink.to_owned()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;
    use crate::types::{Asset, Timestamp};

    fn seed_account(store: &mut Store, name: &str) -> AccountId {
        let key = SecretKey::from_seed(name).public_key();
        store.accounts.insert(|_| {
            let mut account =
                Account::starter(AccountName::from(name), key, Timestamp(0));
            account.balance = Asset::grove(1000);
            account
        })
    }

    #[test]
    fn nested_sessions_round_trip() {
        let mut store = Store::default();
        let alice = seed_account(&mut store, "alice");

        store.begin_session();
        store
            .accounts
            .modify(alice, |a| a.balance = Asset::grove(900))
            .unwrap();

        store.begin_session();
        store
            .accounts
            .modify(alice, |a| a.balance = Asset::grove(800))
            .unwrap();
        store.squash_session().unwrap();
        assert_eq!(store.accounts.get(alice).unwrap().balance, Asset::grove(800));

        store.undo_session().unwrap();
        assert_eq!(store.accounts.get(alice).unwrap().balance, Asset::grove(1000));
        assert_eq!(store.session_depth(), 0);
    }

    #[test]
    fn commit_pins_history() {
        let mut store = Store::default();
        let alice = seed_account(&mut store, "alice");
        store.set_revision(10).unwrap();

        store.begin_session(); // revision 11
        store
            .accounts
            .modify(alice, |a| a.balance = Asset::grove(900))
            .unwrap();
        store.begin_session(); // revision 12
        store
            .accounts
            .modify(alice, |a| a.balance = Asset::grove(800))
            .unwrap();

        store.commit(11);
        assert_eq!(store.session_depth(), 1);
        store.undo_all();
        // Revision 11 is permanent, only 12 unwound.
        assert_eq!(store.accounts.get(alice).unwrap().balance, Asset::grove(900));
    }

    #[test]
    fn set_revision_requires_no_sessions() {
        let mut store = Store::default();
        store.begin_session();
        assert!(store.set_revision(5).is_err());
    }
}
