// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Hardfork activation. Forks apply strictly in sequence once their
//! scheduled time passes and the elected witnesses' vote covers the
//! version; each numbered fork runs its one-shot migration.

use super::{Chain, Error};
use crate::networks::{
    HardforkSchedule, HF_LIQUIDITY_SUNSET, HF_REWARD_FUNDS, HF_SCHEDULE_LAP_CHANGE,
    HF_VOTE_RETALLY,
};
use crate::operations::{VirtualOperation, PERCENT_100};
use crate::rewards::{COMMENT_FUND, POST_FUND};
use crate::state::RewardFund;
use crate::types::Asset;
use tracing::info;

impl Chain {
    pub(crate) fn process_hardforks(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        loop {
            let state = self.store.hardforks.get().clone();
            let next_num = state.last_hardfork + 1;
            let Some(schedule) = self.config().hardfork(next_num).cloned() else {
                break;
            };
            if now < schedule.time {
                break;
            }
            if state.next_hardfork < schedule.version {
                // The witness majority has not voted this far yet.
                break;
            }
            self.apply_hardfork(next_num, &schedule)?;
        }
        Ok(())
    }

    fn apply_hardfork(&mut self, num: u32, schedule: &HardforkSchedule) -> Result<(), Error> {
        let now = self.head_block_time();
        info!("applying hardfork {num} (version {})", schedule.version);
        let version = schedule.version;
        self.store.hardforks.modify(|hf| {
            hf.last_hardfork = num;
            hf.current_hardfork_version = version;
            hf.processed_hardforks.push(now);
        });
        self.push_virtual_operation(VirtualOperation::Hardfork { hardfork_id: num });

        match num {
            HF_VOTE_RETALLY => self.retally_witness_votes()?,
            HF_SCHEDULE_LAP_CHANGE => self.reset_virtual_schedule()?,
            HF_LIQUIDITY_SUNSET => self.retire_liquidity_rewards()?,
            HF_REWARD_FUNDS => self.split_reward_funds()?,
            _ => {}
        }
        Ok(())
    }

    /// Rebuild every witness tally from the vote records. Run once to fix
    /// drift accumulated before proxy accounting was corrected.
    fn retally_witness_votes(&mut self) -> Result<(), Error> {
        let witness_ids: Vec<_> = self.store.witnesses.iter().map(|(id, _)| id).collect();
        for wid in witness_ids {
            self.store.witnesses.modify(wid, |w| w.votes = 0)?;
        }
        let votes: Vec<(crate::types::AccountName, crate::types::AccountName)> = self
            .store
            .witness_votes
            .iter()
            .map(|(_, vote)| (vote.account.clone(), vote.witness.clone()))
            .collect();
        for (account, witness) in votes {
            let account_id = self.get_account_id(&account)?;
            let account = self.store.accounts.get(account_id)?;
            if account.proxy.is_some() {
                continue;
            }
            let weight = account.witness_vote_weight();
            let wid = self.get_witness_id(&witness)?;
            self.adjust_witness_vote(wid, weight)?;
        }
        Ok(())
    }

    /// Restart the virtual-time wheel under the shorter lap length.
    fn reset_virtual_schedule(&mut self) -> Result<(), Error> {
        let lap = self.virtual_schedule_lap();
        self.store
            .witness_schedule
            .modify(|s| s.current_virtual_time = 0);
        let witness_ids: Vec<_> = self.store.witnesses.iter().map(|(id, _)| id).collect();
        for wid in witness_ids {
            self.store.witnesses.modify(wid, |w| {
                w.virtual_position = 0;
                w.virtual_last_update = 0;
                w.virtual_scheduled_time = lap / ((w.votes.max(0) as u128) + 1);
            })?;
        }
        Ok(())
    }

    fn retire_liquidity_rewards(&mut self) -> Result<(), Error> {
        let ids: Vec<_> = self.store.liquidity_rewards.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.store.liquidity_rewards.remove(id)?;
        }
        Ok(())
    }

    /// Replies get their own pool so root posts stop competing with them;
    /// comment cashouts clamp into the standard window.
    fn split_reward_funds(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        let post_id = self
            .store
            .reward_funds
            .indexes
            .by_name
            .get(POST_FUND)
            .copied()
            .ok_or_else(|| Error::Fatal("post reward fund missing".into()))?;
        let post_fund = self.store.reward_funds.get(post_id)?.clone();
        self.store.reward_funds.modify(post_id, |fund| {
            fund.percent_content_rewards = 75 * (PERCENT_100 / 100);
        })?;
        let content_constant = post_fund.content_constant;
        let recent = post_fund.recent_rshares2;
        self.store.reward_funds.insert(|_| RewardFund {
            name: COMMENT_FUND.to_owned(),
            reward_balance: Asset::grove(0),
            recent_rshares2: recent,
            percent_content_rewards: 25 * (PERCENT_100 / 100),
            content_constant,
            last_update: now,
        });

        let window = self.config().cashout_window_secs;
        let unpaid: Vec<_> = self
            .store
            .comments
            .indexes
            .by_cashout_time
            .keys()
            .map(|(_, id)| *id)
            .collect();
        for comment_id in unpaid {
            let comment = self.store.comments.get(comment_id)?;
            let clamped = comment
                .cashout_time
                .min(comment.created + window)
                .min(comment.max_cashout_time);
            if clamped != comment.cashout_time {
                self.store
                    .comments
                    .modify(comment_id, |c| c.cashout_time = clamped)?;
            }
        }
        Ok(())
    }
}
