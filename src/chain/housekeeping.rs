// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! End-of-block maintenance, run in a fixed order for every block: burns,
//! inflation, deferred requests of all kinds, medians, and expirations.

use super::{Chain, Error};
use crate::genesis::NULL_ACCOUNT;
use crate::operations::{VirtualOperation, PERCENT_100};
use crate::types::{AccountName, Asset, Price};
use tracing::debug;

impl Chain {
    /// The per-block loop. Failures here are fatal to the block.
    pub(crate) fn per_block_maintenance(&mut self) -> Result<(), Error> {
        self.clear_null_account_balances()?;
        self.create_block_rewards()?;
        self.update_gbd_median_feed()?;
        self.process_conversions()?;
        self.process_comment_cashouts()?;
        self.process_vesting_withdrawals()?;
        self.process_savings_withdraws()?;
        self.pay_liquidity_reward()?;
        self.update_virtual_supply_and_print_rate()?;
        self.process_expirations()?;
        Ok(())
    }

    /// Anything sent to the null account burns at the next block boundary.
    fn clear_null_account_balances(&mut self) -> Result<(), Error> {
        let null_name = AccountName::unchecked(NULL_ACCOUNT);
        let Some(null_id) = self.store.find_account(&null_name) else {
            return Ok(());
        };
        let null = self.store.accounts.get(null_id)?.clone();

        let burn_grove = null.balance + null.savings_balance;
        let burn_gbd = null.gbd_balance + null.savings_gbd_balance;
        let vesting = null.vesting_shares;

        if burn_grove.amount == 0 && burn_gbd.amount == 0 && vesting.amount == 0 {
            return Ok(());
        }
        let vesting_value = vesting.convert(&self.dgp().vesting_share_price());
        self.store.accounts.modify(null_id, |a| {
            a.balance = Asset::grove(0);
            a.savings_balance = Asset::grove(0);
            a.gbd_balance = Asset::gbd(0);
            a.savings_gbd_balance = Asset::gbd(0);
            a.vesting_shares = Asset::vests(0);
        })?;
        if vesting.amount > 0 {
            self.store.dgp.modify(|dgp| {
                dgp.total_vesting_shares -= vesting;
                dgp.total_vesting_fund -= vesting_value;
            });
        }
        if burn_grove.amount > 0 || vesting_value.amount > 0 {
            self.adjust_supply(-(burn_grove + vesting_value))?;
        }
        if burn_gbd.amount > 0 {
            self.adjust_supply(-burn_gbd)?;
        }
        debug!("burned null balances: {burn_grove}, {burn_gbd}, {vesting}");
        Ok(())
    }

    /// Refresh the stable asset's feed history from the elected
    /// witnesses' published rates; conversions execute against the median
    /// of this window.
    fn update_gbd_median_feed(&mut self) -> Result<(), Error> {
        let interval = self.config.feed_interval_blocks;
        if interval == 0 || self.head_block_num() % interval != 0 {
            return Ok(());
        }
        let schedule = self.store.witness_schedule.get().clone();
        let mut rates: Vec<Price> = schedule
            .current_shuffled_witnesses
            .iter()
            .filter_map(|name| self.store.find_witness(name))
            .filter_map(|wid| self.store.witnesses.get(wid).ok())
            .filter_map(|w| w.gbd_exchange_rate)
            .collect();
        if rates.is_empty() {
            return Ok(());
        }
        rates.sort();
        let median_rate = rates[rates.len() / 2];
        let window = self.config.feed_history_window;
        self.store.feed_history.modify(|fh| {
            fh.price_history.push_back(median_rate);
            while fh.price_history.len() > window {
                fh.price_history.pop_front();
            }
            fh.recompute_median();
        });
        Ok(())
    }

    /// Execute stable→core conversions whose delay elapsed, at the
    /// historical median.
    fn process_conversions(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        let Some(median) = self.store.feed_history.get().current_median_history else {
            return Ok(());
        };
        loop {
            let next = self
                .store
                .convert_requests
                .indexes
                .by_conversion_date
                .keys()
                .next()
                .copied();
            let Some((date, request_id)) = next else { break };
            if date > now {
                break;
            }
            let request = self.store.convert_requests.remove(request_id)?;
            let amount_out = request.amount.convert(&median);
            let owner_id = self.get_account_id(&request.owner)?;
            self.adjust_supply(-request.amount)?;
            self.adjust_supply(amount_out)?;
            self.adjust_balance(owner_id, amount_out)?;
            self.push_virtual_operation(VirtualOperation::FillConvertRequest {
                owner: request.owner.clone(),
                request_id: request.request_id,
                amount_in: request.amount,
                amount_out,
            });
        }
        Ok(())
    }

    /// Release one weekly installment for every account whose clock came
    /// due, splitting it across its withdraw routes.
    fn process_vesting_withdrawals(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        loop {
            let next = self
                .store
                .accounts
                .indexes
                .by_next_vesting_withdrawal
                .keys()
                .next()
                .copied();
            let Some((due, account_id)) = next else { break };
            if due > now {
                break;
            }
            self.process_one_vesting_withdrawal(account_id)?;
        }
        Ok(())
    }

    fn process_one_vesting_withdrawal(
        &mut self,
        account_id: crate::state::AccountId,
    ) -> Result<(), Error> {
        let account = self.store.accounts.get(account_id)?.clone();
        let share_price = self.dgp().vesting_share_price();

        let remaining = account.to_withdraw - account.withdrawn;
        let to_withdraw = account
            .vesting_withdraw_rate
            .amount
            .min(remaining)
            .min(account.vesting_shares.amount)
            .max(0);

        let routes: Vec<crate::state::WithdrawVestingRoute> = self
            .store
            .withdraw_routes
            .indexes
            .by_from
            .range((account.name.clone(), crate::db::ObjectId::new(0))..)
            .take_while(|((from, _), _)| *from == account.name)
            .filter_map(|((_, id), _)| self.store.withdraw_routes.get(*id).ok().cloned())
            .collect();

        let mut vests_deposited = 0i64;
        let mut converted = 0i64;
        for route in &routes {
            let share = (to_withdraw as i128 * i128::from(route.percent)
                / i128::from(PERCENT_100)) as i64;
            if share == 0 {
                continue;
            }
            let to_id = self.get_account_id(&route.to_account)?;
            if route.auto_vest {
                // Shares move between accounts without touching the fund.
                vests_deposited += share;
                self.store
                    .accounts
                    .modify(to_id, |a| a.vesting_shares += Asset::vests(share))?;
                self.adjust_proxied_witness_votes(to_id, share)?;
                self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                    from_account: account.name.clone(),
                    to_account: route.to_account.clone(),
                    withdrawn: Asset::vests(share),
                    deposited: Asset::vests(share),
                });
            } else {
                let grove = Asset::vests(share).convert(&share_price);
                converted += share;
                self.store.dgp.modify(|dgp| {
                    dgp.total_vesting_shares -= Asset::vests(share);
                    dgp.total_vesting_fund -= grove;
                });
                self.adjust_balance(to_id, grove)?;
                self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                    from_account: account.name.clone(),
                    to_account: route.to_account.clone(),
                    withdrawn: Asset::vests(share),
                    deposited: grove,
                });
            }
        }

        // Whatever was not routed converts to liquid for the withdrawer.
        let leftover = to_withdraw - vests_deposited - converted;
        if leftover > 0 {
            let grove = Asset::vests(leftover).convert(&share_price);
            self.store.dgp.modify(|dgp| {
                dgp.total_vesting_shares -= Asset::vests(leftover);
                dgp.total_vesting_fund -= grove;
            });
            self.adjust_balance(account_id, grove)?;
            self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                from_account: account.name.clone(),
                to_account: account.name.clone(),
                withdrawn: Asset::vests(leftover),
                deposited: grove,
            });
        }

        let interval = self.config.vesting_withdraw_interval_secs;
        self.store.accounts.modify(account_id, |a| {
            a.vesting_shares -= Asset::vests(to_withdraw);
            a.withdrawn += to_withdraw;
            let finished =
                a.withdrawn >= a.to_withdraw || a.vesting_shares.amount == 0 || to_withdraw == 0;
            if finished {
                a.vesting_withdraw_rate = Asset::vests(0);
                a.next_vesting_withdrawal = crate::types::Timestamp::MAX;
                a.to_withdraw = 0;
                a.withdrawn = 0;
            } else {
                a.next_vesting_withdrawal = a.next_vesting_withdrawal + interval;
            }
        })?;
        // The withdrawer's stake shrank; its vote weight follows.
        self.adjust_proxied_witness_votes(account_id, -to_withdraw)?;
        Ok(())
    }

    fn process_savings_withdraws(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        loop {
            let next = self
                .store
                .savings_withdraws
                .indexes
                .by_complete
                .keys()
                .next()
                .copied();
            let Some((complete, id)) = next else { break };
            if complete > now {
                break;
            }
            let withdraw = self.store.savings_withdraws.remove(id)?;
            let from_id = self.get_account_id(&withdraw.from)?;
            let to_id = self.get_account_id(&withdraw.to)?;
            self.adjust_balance(to_id, withdraw.amount)?;
            self.store
                .accounts
                .modify(from_id, |a| a.savings_withdraw_requests -= 1)?;
            self.push_virtual_operation(VirtualOperation::FillTransferFromSavings {
                from: withdraw.from.clone(),
                to: withdraw.to.clone(),
                amount: withdraw.amount,
                request_id: withdraw.request_id,
                memo: withdraw.memo.clone(),
            });
        }
        Ok(())
    }

    /// Revalue the stable supply at the feed and interpolate the print
    /// rate: full printing below the start share of market cap, none past
    /// the stop share.
    fn update_virtual_supply_and_print_rate(&mut self) -> Result<(), Error> {
        let Some(median) = self.store.feed_history.get().current_median_history else {
            return Ok(());
        };
        let start = u32::from(self.config.gbd_start_percent);
        let stop = u32::from(self.config.gbd_stop_percent);
        self.store.dgp.modify(|dgp| {
            dgp.virtual_supply = dgp.current_supply + dgp.current_gbd_supply.convert(&median);
            let virtual_amount = dgp.virtual_supply.amount.max(1);
            let gbd_share = (dgp.current_gbd_supply.convert(&median).amount as i128
                * i128::from(PERCENT_100 as u32)
                / virtual_amount as i128) as u32;
            dgp.gbd_print_rate = if gbd_share < start {
                PERCENT_100
            } else if gbd_share >= stop {
                0
            } else {
                // Linear ramp between the two bounds.
                ((stop - gbd_share) * u32::from(PERCENT_100) / (stop - start)) as u16
            };
        });
        Ok(())
    }

    /// Everything with a deadline: orders, escrows, recovery plumbing,
    /// delegation returns, forced settlements.
    fn process_expirations(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();

        // Expired limit orders refund.
        loop {
            let next = self
                .store
                .limit_orders
                .indexes
                .by_expiration
                .keys()
                .next()
                .copied();
            let Some((expiration, order_id)) = next else { break };
            if expiration > now {
                break;
            }
            self.cancel_order(order_id, true)?;
        }

        // Escrows nobody ratified in time return to the sender.
        loop {
            let next = self
                .store
                .escrows
                .indexes
                .by_ratification_deadline
                .keys()
                .next()
                .copied();
            let Some((deadline, escrow_id)) = next else { break };
            if deadline > now {
                break;
            }
            let escrow = self.store.escrows.remove(escrow_id)?;
            let from_id = self.get_account_id(&escrow.from)?;
            self.adjust_balance(from_id, escrow.grove_balance)?;
            self.adjust_balance(from_id, escrow.gbd_balance)?;
            if escrow.pending_fee.amount > 0 {
                self.adjust_balance(from_id, escrow.pending_fee)?;
            }
        }

        // Stale account-recovery requests evaporate.
        loop {
            let next = self
                .store
                .recovery_requests
                .indexes
                .by_expiration
                .keys()
                .next()
                .copied();
            let Some((expires, id)) = next else { break };
            if expires > now {
                break;
            }
            self.store.recovery_requests.remove(id)?;
        }

        // Outgrown owner-authority history.
        loop {
            let next = self
                .store
                .owner_histories
                .indexes
                .by_last_valid
                .keys()
                .next()
                .copied();
            let Some((valid_until, id)) = next else { break };
            if valid_until > now {
                break;
            }
            self.store.owner_histories.remove(id)?;
        }

        // Recovery-partner changes come into force.
        loop {
            let next = self
                .store
                .change_recovery_requests
                .indexes
                .by_effective_date
                .keys()
                .next()
                .copied();
            let Some((effective, id)) = next else { break };
            if effective > now {
                break;
            }
            let request = self.store.change_recovery_requests.remove(id)?;
            let account_id = self.get_account_id(&request.account_to_recover)?;
            self.store
                .accounts
                .modify(account_id, |a| {
                    a.recovery_account = Some(request.recovery_account.clone())
                })?;
        }

        // Declined voting rights take effect: votes and proxy dissolve.
        loop {
            let next = self
                .store
                .decline_voting_requests
                .indexes
                .by_effective_date
                .keys()
                .next()
                .copied();
            let Some((effective, id)) = next else { break };
            if effective > now {
                break;
            }
            let request = self.store.decline_voting_requests.remove(id)?;
            let account_id = self.get_account_id(&request.account)?;
            self.clear_witness_votes(account_id)?;
            let account = self.store.accounts.get(account_id)?.clone();
            if account.proxy.is_some() {
                let mut deltas = [0i64; crate::state::MAX_PROXY_DEPTH + 1];
                deltas[0] = -account.vesting_shares.amount;
                for i in 0..crate::state::MAX_PROXY_DEPTH {
                    deltas[i + 1] = -account.proxied_vsf_votes[i];
                }
                self.apply_proxy_deltas(account_id, &deltas)?;
                self.store.accounts.modify(account_id, |a| a.proxy = None)?;
            }
            self.store.accounts.modify(account_id, |a| a.can_vote = false)?;
        }

        // Delegations on their way home arrive.
        loop {
            let next = self
                .store
                .delegation_expirations
                .indexes
                .by_expiration
                .keys()
                .next()
                .copied();
            let Some((expiration, id)) = next else { break };
            if expiration > now {
                break;
            }
            let returned = self.store.delegation_expirations.remove(id)?;
            let delegator_id = self.get_account_id(&returned.delegator)?;
            self.store.accounts.modify(delegator_id, |a| {
                a.delegated_vesting_shares -= returned.vesting_shares
            })?;
            self.push_virtual_operation(VirtualOperation::ReturnVestingDelegation {
                account: returned.delegator.clone(),
                vesting_shares: returned.vesting_shares,
            });
        }

        // Due force settlements execute at the feed.
        loop {
            let next = self
                .store
                .force_settlements
                .indexes
                .by_expiration
                .keys()
                .next()
                .copied();
            let Some((date, id)) = next else { break };
            if date > now {
                break;
            }
            self.execute_force_settlement(id)?;
        }
        Ok(())
    }

    /// Remove every witness approval of an account, with its weight.
    pub(crate) fn clear_witness_votes(&mut self, account_id: crate::state::AccountId) -> Result<(), Error> {
        let account = self.store.accounts.get(account_id)?.clone();
        let votes: Vec<(AccountName, crate::state::WitnessVoteId)> = self
            .store
            .witness_votes
            .indexes
            .by_account_witness
            .range((account.name.clone(), AccountName::unchecked(""))..)
            .take_while(|((name, _), _)| *name == account.name)
            .map(|((_, witness), id)| (witness.clone(), *id))
            .collect();
        let weight = if account.proxy.is_none() {
            account.witness_vote_weight()
        } else {
            0
        };
        for (witness, vote_id) in votes {
            if weight != 0 {
                let wid = self.get_witness_id(&witness)?;
                self.adjust_witness_vote(wid, -weight)?;
            }
            self.store.witness_votes.remove(vote_id)?;
        }
        self.store
            .accounts
            .modify(account_id, |a| a.witnesses_voted_for = 0)?;
        Ok(())
    }
}
