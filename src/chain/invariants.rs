// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The end-of-block auditor. Re-derives every supply and vote total from
//! first principles and compares against the tracked globals; any
//! mismatch is fatal.

use super::{Chain, Error};
use crate::rewards::rshares_square;
use crate::types::Symbol;
use std::collections::BTreeMap;

impl Chain {
    pub(crate) fn validate_invariants(&self) -> Result<(), Error> {
        let dgp = self.dgp();
        let mut grove_total: i128 = 0;
        let mut gbd_total: i128 = 0;
        let mut vests_total: i128 = 0;

        for (_, account) in self.store.accounts.iter() {
            grove_total += i128::from(account.balance.amount);
            grove_total += i128::from(account.savings_balance.amount);
            gbd_total += i128::from(account.gbd_balance.amount);
            gbd_total += i128::from(account.savings_gbd_balance.amount);
            vests_total += i128::from(account.vesting_shares.amount);
        }
        for (_, escrow) in self.store.escrows.iter() {
            grove_total += i128::from(escrow.grove_balance.amount);
            gbd_total += i128::from(escrow.gbd_balance.amount);
            if escrow.pending_fee.symbol == Symbol::GROVE {
                grove_total += i128::from(escrow.pending_fee.amount);
            } else {
                gbd_total += i128::from(escrow.pending_fee.amount);
            }
        }
        for (_, request) in self.store.convert_requests.iter() {
            gbd_total += i128::from(request.amount.amount);
        }
        for (_, order) in self.store.limit_orders.iter() {
            if order.sells() == Symbol::GROVE {
                grove_total += i128::from(order.for_sale);
            } else if order.sells() == Symbol::GBD {
                gbd_total += i128::from(order.for_sale);
            }
        }
        for (_, withdraw) in self.store.savings_withdraws.iter() {
            if withdraw.amount.symbol == Symbol::GROVE {
                grove_total += i128::from(withdraw.amount.amount);
            } else {
                gbd_total += i128::from(withdraw.amount.amount);
            }
        }
        for (_, fund) in self.store.reward_funds.iter() {
            grove_total += i128::from(fund.reward_balance.amount);
        }
        for (_, dynamic) in self.store.asset_dynamic.iter() {
            grove_total += i128::from(dynamic.fee_pool);
        }
        for (_, call) in self.store.call_orders.iter() {
            if call.collateral_symbol == Symbol::GROVE {
                grove_total += i128::from(call.collateral);
            }
        }
        for (_, bitasset) in self.store.asset_bitassets.iter() {
            if bitasset.options.short_backing_asset == Symbol::GROVE {
                grove_total += i128::from(bitasset.settlement_fund);
            }
        }
        grove_total += i128::from(dgp.total_vesting_fund.amount);

        if grove_total != i128::from(dgp.current_supply.amount) {
            return Err(Error::Fatal(format!(
                "core supply mismatch: derived {grove_total}, tracked {}",
                dgp.current_supply.amount
            )));
        }
        if gbd_total != i128::from(dgp.current_gbd_supply.amount) {
            return Err(Error::Fatal(format!(
                "stable supply mismatch: derived {gbd_total}, tracked {}",
                dgp.current_gbd_supply.amount
            )));
        }
        if vests_total != i128::from(dgp.total_vesting_shares.amount) {
            return Err(Error::Fatal(format!(
                "vesting share mismatch: derived {vests_total}, tracked {}",
                dgp.total_vesting_shares.amount
            )));
        }

        self.validate_witness_votes()?;
        self.validate_delegations()?;
        self.validate_user_asset_supplies()?;
        self.validate_rshares_rollup()?;

        // Virtual supply is the core supply plus the stable supply valued
        // at the feed.
        if let Some(median) = self.store.feed_history.get().current_median_history {
            let expected = dgp.current_supply + dgp.current_gbd_supply.convert(&median);
            if expected != dgp.virtual_supply {
                return Err(Error::Fatal(format!(
                    "virtual supply mismatch: derived {expected}, tracked {}",
                    dgp.virtual_supply
                )));
            }
        }
        Ok(())
    }

    fn validate_witness_votes(&self) -> Result<(), Error> {
        let total_vests = self.dgp().total_vesting_shares.amount;
        let mut expected: BTreeMap<crate::types::AccountName, i64> = BTreeMap::new();
        for (_, vote) in self.store.witness_votes.iter() {
            let Some(account_id) = self.store.find_account(&vote.account) else {
                continue;
            };
            let account = self.store.accounts.get(account_id)?;
            if account.proxy.is_none() {
                *expected.entry(vote.witness.clone()).or_default() +=
                    account.witness_vote_weight();
            }
        }
        for (_, witness) in self.store.witnesses.iter() {
            let derived = expected.get(&witness.owner).copied().unwrap_or(0);
            if witness.votes != derived {
                return Err(Error::Fatal(format!(
                    "witness {} vote mismatch: derived {derived}, tracked {}",
                    witness.owner, witness.votes
                )));
            }
            if witness.votes > total_vests {
                return Err(Error::Fatal(format!(
                    "witness {} votes exceed total vesting shares",
                    witness.owner
                )));
            }
        }
        Ok(())
    }

    fn validate_delegations(&self) -> Result<(), Error> {
        let mut delegated: i128 = 0;
        let mut received: i128 = 0;
        for (_, account) in self.store.accounts.iter() {
            delegated += i128::from(account.delegated_vesting_shares.amount);
            received += i128::from(account.received_vesting_shares.amount);
        }
        let mut records: i128 = 0;
        for (_, delegation) in self.store.vesting_delegations.iter() {
            records += i128::from(delegation.vesting_shares.amount);
        }
        let mut in_flight: i128 = 0;
        for (_, expiration) in self.store.delegation_expirations.iter() {
            in_flight += i128::from(expiration.vesting_shares.amount);
        }
        if delegated != records + in_flight {
            return Err(Error::Fatal(format!(
                "delegated shares mismatch: accounts {delegated}, records {records} + returning {in_flight}"
            )));
        }
        if received != records {
            return Err(Error::Fatal(format!(
                "received shares mismatch: accounts {received}, records {records}"
            )));
        }
        Ok(())
    }

    /// Each user-issued asset's tracked supply equals everything held,
    /// resting on the book, or awaiting settlement; collateral of assets
    /// backed by it counts too.
    fn validate_user_asset_supplies(&self) -> Result<(), Error> {
        let mut derived: BTreeMap<Symbol, i128> = BTreeMap::new();
        for (_, balance) in self.store.account_balances.iter() {
            *derived.entry(balance.symbol).or_default() += i128::from(balance.balance);
        }
        for (_, order) in self.store.limit_orders.iter() {
            let symbol = order.sells();
            if symbol != Symbol::GROVE && symbol != Symbol::GBD {
                *derived.entry(symbol).or_default() += i128::from(order.for_sale);
            }
        }
        for (_, settlement) in self.store.force_settlements.iter() {
            *derived.entry(settlement.balance.symbol).or_default() +=
                i128::from(settlement.balance.amount);
        }
        for (_, call) in self.store.call_orders.iter() {
            if call.collateral_symbol != Symbol::GROVE && call.collateral_symbol != Symbol::GBD {
                *derived.entry(call.collateral_symbol).or_default() +=
                    i128::from(call.collateral);
            }
        }
        for (_, bitasset) in self.store.asset_bitassets.iter() {
            let backing = bitasset.options.short_backing_asset;
            if backing != Symbol::GROVE && backing != Symbol::GBD {
                *derived.entry(backing).or_default() += i128::from(bitasset.settlement_fund);
            }
        }
        for (_, dynamic) in self.store.asset_dynamic.iter() {
            let total = derived.get(&dynamic.symbol).copied().unwrap_or(0);
            if total != i128::from(dynamic.current_supply) {
                return Err(Error::Fatal(format!(
                    "{} supply mismatch: derived {total}, tracked {}",
                    dynamic.symbol, dynamic.current_supply
                )));
            }
        }
        Ok(())
    }

    /// The subtree weight rollup must agree with a fresh bottom-up count.
    fn validate_rshares_rollup(&self) -> Result<(), Error> {
        let mut expected: BTreeMap<crate::state::CommentId, u128> = BTreeMap::new();
        for (id, comment) in self.store.comments.iter() {
            let square = rshares_square(comment.net_rshares);
            *expected.entry(id).or_default() += square;
            let mut parent = comment.parent_key();
            while let Some((author, permlink)) = parent {
                let Some(parent_id) = self.store.find_comment(&author, &permlink) else {
                    break;
                };
                *expected.entry(parent_id).or_default() += square;
                parent = self.store.comments.get(parent_id)?.parent_key();
            }
        }
        for (id, comment) in self.store.comments.iter() {
            let derived = expected.get(&id).copied().unwrap_or(0);
            if derived != comment.children_rshares2 {
                return Err(Error::Fatal(format!(
                    "rshares rollup mismatch on {}/{}: derived {derived}, tracked {}",
                    comment.author, comment.permlink, comment.children_rshares2
                )));
            }
        }
        Ok(())
    }
}
