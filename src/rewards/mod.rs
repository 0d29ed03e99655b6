// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The content reward engine: the saturating payout curve, per-block
//! inflation, comment cashouts with curator distribution, and the
//! periodic liquidity reward.

use crate::chain::{Chain, Error};
use crate::networks::{HF_CURATION_QUARTER, HF_LIQUIDITY_SUNSET, HF_REWARD_FUNDS};
use crate::operations::{VirtualOperation, PERCENT_100};
use crate::state::{CommentId, RewardFundId, ScheduleClass};
use crate::types::{Asset, Timestamp};
use tracing::debug;

/// Fund receiving root-post rewards (and, before the fund split, all
/// rewards).
pub const POST_FUND: &str = "post";
/// Fund receiving reply rewards once the split hardfork is live.
pub const COMMENT_FUND: &str = "comment";

/// The payout curve: `r(r + 2c) / (r + 4c)`. Quadratic for small stakes,
/// saturating toward linear around the content constant.
pub fn calculate_vshares(rshares: u128, content_constant: u128) -> u128 {
    if rshares == 0 {
        return 0;
    }
    let two_alpha = content_constant * 2;
    rshares * (rshares + two_alpha) / (rshares + two_alpha * 2)
}

/// Raw squared vote weight, the unit of the `children_rshares2` rollup.
pub fn rshares_square(rshares: i64) -> u128 {
    let r = rshares.unsigned_abs() as u128;
    r * r
}

/// Floor of the square root; curation weights are square-root deltas.
pub fn isqrt(value: u128) -> u64 {
    if value == 0 {
        return 0;
    }
    let mut x = value;
    let mut result = 0u128;
    let mut bit = 1u128 << ((127 - value.leading_zeros()) & !1);
    while bit != 0 {
        if x >= result + bit {
            x -= result + bit;
            result = (result >> 1) + bit;
        } else {
            result >>= 1;
        }
        bit >>= 2;
    }
    result as u64
}

/// Annual inflation in basis points at a given height: starts high and
/// narrows by one basis point per narrowing interval until the floor.
pub fn inflation_rate_at(start: u16, floor: u16, narrowing_blocks: u32, head: u32) -> u16 {
    let narrowed = u32::from(start).saturating_sub(head / narrowing_blocks.max(1));
    (narrowed as u16).max(floor)
}

impl Chain {
    /// Mint the block's inflation and split it between the content funds,
    /// the vesting fund and the producing witness.
    pub(crate) fn create_block_rewards(&mut self) -> Result<(), Error> {
        let config = self.config();
        let head = self.head_block_num();
        let rate = inflation_rate_at(
            config.inflation_start_percent,
            config.inflation_floor_percent,
            config.inflation_narrowing_blocks,
            head,
        );
        let content_percent = config.content_reward_percent;
        let vesting_percent = config.vesting_fund_percent;
        let blocks_per_year = config.blocks_per_year;

        let virtual_supply = self.dgp().virtual_supply;
        let new_grove = (virtual_supply.amount as i128 * i128::from(rate)
            / (i128::from(PERCENT_100) * i128::from(blocks_per_year)))
            as i64;
        let new_grove = new_grove.max(1);

        let content_reward = new_grove * i64::from(content_percent) / i64::from(PERCENT_100);
        let vesting_reward = new_grove * i64::from(vesting_percent) / i64::from(PERCENT_100);
        let witness_base = new_grove - content_reward - vesting_reward;

        // Distribute the content share across the named funds.
        let funds: Vec<(RewardFundId, u16)> = self
            .store
            .reward_funds
            .iter()
            .map(|(id, fund)| (id, fund.percent_content_rewards))
            .collect();
        let mut content_paid = 0i64;
        for (fund_id, percent) in &funds {
            let share = content_reward * i64::from(*percent) / i64::from(PERCENT_100);
            self.store.reward_funds.modify(*fund_id, |fund| {
                fund.reward_balance += Asset::grove(share);
            })?;
            content_paid += share;
        }

        // The vesting fund grows with no new shares, raising the price of
        // every existing share.
        self.store.dgp.modify(|dgp| {
            dgp.total_vesting_fund += Asset::grove(vesting_reward);
        });

        // Witness pay scales with the schedule class of the producer.
        let witness_name = self.dgp().current_witness.clone();
        let wid = self.get_witness_id(&witness_name)?;
        let schedule = self.store.witness_schedule.get();
        let class_weight = match self.store.witnesses.get(wid)?.schedule {
            ScheduleClass::Timeshare => schedule.timeshare_weight,
            ScheduleClass::Miner => schedule.miner_weight,
            _ => schedule.top_weight,
        };
        let normalization = schedule.witness_pay_normalization_factor.max(1);
        let num_scheduled = schedule.num_scheduled_witnesses.max(1);
        let witness_pay = witness_base * i64::from(num_scheduled) * i64::from(class_weight)
            / i64::from(normalization);

        let minted = content_paid + vesting_reward + witness_pay;
        self.adjust_supply(Asset::grove(minted))?;

        let producer_id = self.get_account_id(&witness_name)?;
        let vests = self.create_vesting(producer_id, Asset::grove(witness_pay))?;
        self.push_virtual_operation(VirtualOperation::ProducerReward {
            producer: witness_name,
            vesting_shares: vests,
        });
        Ok(())
    }

    /// Pay out every comment whose cashout time has arrived.
    pub(crate) fn process_comment_cashouts(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        loop {
            let next = self
                .store
                .comments
                .indexes
                .by_cashout_time
                .keys()
                .next()
                .copied();
            let Some((cashout_time, comment_id)) = next else { break };
            if cashout_time > now {
                break;
            }
            self.cashout_comment(comment_id)?;
        }
        Ok(())
    }

    fn reward_fund_for(&self, comment_id: CommentId) -> Result<RewardFundId, Error> {
        let comment = self.store.comments.get(comment_id)?;
        let name = if comment.is_root() || !self.has_hardfork(HF_REWARD_FUNDS) {
            POST_FUND
        } else {
            COMMENT_FUND
        };
        self.store
            .reward_funds
            .indexes
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::Fatal(format!("reward fund {name} missing")))
    }

    pub(crate) fn curation_percent(&self) -> u16 {
        if self.has_hardfork(HF_CURATION_QUARTER) {
            self.config().curation_percent
        } else {
            self.config().curation_percent_early
        }
    }

    /// Linear decay of a fund's recent claims, then return its id.
    fn tick_reward_fund(&mut self, fund_id: RewardFundId) -> Result<(), Error> {
        let now = self.head_block_time();
        let decay_secs = u128::from(self.config().recent_rshares_decay_secs.max(1));
        self.store.reward_funds.modify(fund_id, |fund| {
            let elapsed = u128::from(now.secs_since(fund.last_update)).min(decay_secs);
            fund.recent_rshares2 -= fund.recent_rshares2 * elapsed / decay_secs;
            fund.last_update = now;
        })?;
        Ok(())
    }

    fn cashout_comment(&mut self, comment_id: CommentId) -> Result<(), Error> {
        let now = self.head_block_time();
        let fund_id = self.reward_fund_for(comment_id)?;
        self.tick_reward_fund(fund_id)?;

        let comment = self.store.comments.get(comment_id)?.clone();
        let median = self.store.feed_history.get().current_median_history;

        if comment.net_rshares > 0 {
            let fund = self.store.reward_funds.get(fund_id)?.clone();
            let vshares = calculate_vshares(comment.net_rshares as u128, fund.content_constant);
            // The comment's shares join the decayed recent pool and its
            // claim is its fraction of that pool.
            let recent = fund.recent_rshares2.saturating_add(vshares).max(1);
            let mut claim = (fund.reward_balance.amount as u128 * vshares / recent) as i64;
            claim = claim.min(fund.reward_balance.amount);
            claim = claim * i64::from(comment.reward_weight) / i64::from(PERCENT_100);

            // Cap by the author's declared maximum, valued in the stable
            // asset at the feed.
            if let Some(median) = &median {
                let claim_gbd_value = Asset::grove(claim).convert(median);
                if claim_gbd_value.amount > comment.max_accepted_payout.amount {
                    claim = comment.max_accepted_payout.convert(median).amount;
                }
            } else if comment.max_accepted_payout.amount == 0 {
                claim = 0;
            }

            let curation_tokens = if comment.allow_curation_rewards {
                claim * i64::from(self.curation_percent()) / i64::from(PERCENT_100)
            } else {
                0
            };
            let curators_paid = self.pay_curators(comment_id, curation_tokens)?;
            let mut author_tokens = claim - curation_tokens;

            // Beneficiaries take their declared share of the author side.
            let mut beneficiary_paid = 0i64;
            for route in comment.beneficiaries.iter() {
                let share = author_tokens * i64::from(route.weight) / i64::from(PERCENT_100);
                let account_id = self.get_account_id(&route.account)?;
                let vests = self.create_vesting(account_id, Asset::grove(share))?;
                beneficiary_paid += share;
                self.push_virtual_operation(VirtualOperation::CommentBenefactorReward {
                    benefactor: route.account.clone(),
                    author: comment.author.clone(),
                    permlink: comment.permlink.clone(),
                    reward: vests,
                });
            }
            author_tokens -= beneficiary_paid;

            // Half of the author side is nominally stable, scaled by the
            // comment's stable percentage and the chain's print rate.
            // Without a valid feed nothing stable can be printed and the
            // stable leg pays out liquid.
            let to_gbd_grove = author_tokens * i64::from(comment.percent_grove_dollars)
                / i64::from(2 * PERCENT_100);
            let to_vesting = author_tokens - to_gbd_grove;

            let print_rate = if median.is_some() {
                self.dgp().gbd_print_rate
            } else {
                0
            };
            let printed_grove = to_gbd_grove * i64::from(print_rate) / i64::from(PERCENT_100);
            let liquid_grove = to_gbd_grove - printed_grove;
            let gbd_payout = match &median {
                Some(median) => Asset::grove(printed_grove).convert(median),
                None => Asset::gbd(0),
            };

            let author_id = self.get_account_id(&comment.author)?;
            // Stable payout: the core tokens leave supply, stable enters.
            self.adjust_supply(Asset::grove(-printed_grove))?;
            self.adjust_supply(gbd_payout)?;
            self.adjust_balance(author_id, gbd_payout)?;
            self.adjust_balance(author_id, Asset::grove(liquid_grove))?;
            let vesting_payout = self.create_vesting(author_id, Asset::grove(to_vesting))?;

            let total_paid = curators_paid + beneficiary_paid + author_tokens;

            self.push_virtual_operation(VirtualOperation::AuthorReward {
                author: comment.author.clone(),
                permlink: comment.permlink.clone(),
                gbd_payout,
                grove_payout: Asset::grove(liquid_grove),
                vesting_payout,
            });
            let total_payout_gbd = match &median {
                Some(median) => Asset::grove(total_paid).convert(median),
                None => Asset::gbd(0),
            };
            self.push_virtual_operation(VirtualOperation::CommentReward {
                author: comment.author.clone(),
                permlink: comment.permlink.clone(),
                payout: total_payout_gbd,
            });

            if let Some(median) = &median {
                let author_side_gbd =
                    Asset::grove(author_tokens + beneficiary_paid).convert(median);
                let curator_side_gbd = Asset::grove(curators_paid).convert(median);
                self.store.comments.modify(comment_id, |c| {
                    c.total_payout_value += author_side_gbd;
                    c.curator_payout_value += curator_side_gbd;
                })?;
            }
            self.store.comments.modify(comment_id, |c| {
                c.author_rewards += author_tokens;
            })?;
            self.store.reward_funds.modify(fund_id, |fund| {
                fund.reward_balance -= Asset::grove(total_paid);
                fund.recent_rshares2 = recent;
            })?;
        }

        // Remove this comment's weight from the tree rollup, then park it
        // as paid.
        let old_square = rshares_square(comment.net_rshares);
        self.adjust_rshares2(comment_id, old_square, 0)?;
        self.store.comments.modify(comment_id, |c| {
            c.net_rshares = 0;
            c.abs_rshares = 0;
            c.vote_rshares = 0;
            c.total_vote_weight = 0;
            c.cashout_time = Timestamp::MAX;
            c.last_payout = now;
        })?;
        Ok(())
    }

    /// Split the curator pool pro-rata by frozen vote weight. Rounding
    /// dust and curation-disabled remainders go back to the fund, so the
    /// return value is what actually left it.
    fn pay_curators(&mut self, comment_id: CommentId, pool: i64) -> Result<i64, Error> {
        if pool <= 0 {
            return Ok(0);
        }
        let comment = self.store.comments.get(comment_id)?;
        let total_weight = comment.total_vote_weight;
        let author = comment.author.clone();
        let permlink = comment.permlink.clone();
        if total_weight == 0 {
            return Ok(0);
        }
        let votes: Vec<(crate::types::AccountName, u64)> = self
            .store
            .comment_votes
            .indexes
            .by_comment_voter
            .range((comment_id, crate::types::AccountName::unchecked(""))..)
            .take_while(|((cid, _), _)| *cid == comment_id)
            .filter_map(|((_, voter), vid)| {
                self.store
                    .comment_votes
                    .get(*vid)
                    .ok()
                    .map(|v| (voter.clone(), v.weight))
            })
            .collect();
        let mut paid = 0i64;
        for (voter, weight) in votes {
            let share = ((pool as u128) * u128::from(weight) / u128::from(total_weight)) as i64;
            if share == 0 {
                continue;
            }
            let voter_id = self.get_account_id(&voter)?;
            let vests = self.create_vesting(voter_id, Asset::grove(share))?;
            paid += share;
            self.push_virtual_operation(VirtualOperation::CurationReward {
                curator: voter,
                reward: vests,
                comment_author: author.clone(),
                comment_permlink: permlink.clone(),
            });
        }
        Ok(paid)
    }

    /// Maintain the `children_rshares2` rollup along the ancestor chain.
    pub(crate) fn adjust_rshares2(
        &mut self,
        comment_id: CommentId,
        old_rshares2: u128,
        new_rshares2: u128,
    ) -> Result<(), Error> {
        let mut current = Some(comment_id);
        while let Some(id) = current {
            self.store.comments.modify(id, |c| {
                c.children_rshares2 = c.children_rshares2 - old_rshares2 + new_rshares2;
            })?;
            let comment = self.store.comments.get(id)?;
            current = match comment.parent_key() {
                Some((author, permlink)) => Some(
                    self.store
                        .find_comment(&author, &permlink)
                        .ok_or_else(|| Error::Fatal("dangling parent comment".into()))?,
                ),
                None => None,
            };
        }
        Ok(())
    }

    /// Every reward interval, the heaviest liquidity provider takes the
    /// minted bounty. Retired by hardfork.
    pub(crate) fn pay_liquidity_reward(&mut self) -> Result<(), Error> {
        if self.has_hardfork(HF_LIQUIDITY_SUNSET) {
            return Ok(());
        }
        let interval = self.config().liquidity_reward_interval_blocks;
        if interval == 0 || self.head_block_num() % interval != 0 {
            return Ok(());
        }
        let reward = Asset::grove(self.config().liquidity_reward_amount);
        let best = self
            .store
            .liquidity_rewards
            .indexes
            .by_volume_weight
            .keys()
            .next()
            .map(|(_, id)| *id);
        let Some(lr_id) = best else { return Ok(()) };
        let entry = self.store.liquidity_rewards.get(lr_id)?.clone();
        if entry.weight == 0 {
            return Ok(());
        }
        let owner_id = self.get_account_id(&entry.owner)?;
        self.adjust_supply(reward)?;
        self.adjust_balance(owner_id, reward)?;
        self.store.liquidity_rewards.modify(lr_id, |lr| {
            lr.grove_volume = 0;
            lr.gbd_volume = 0;
            lr.weight = 0;
        })?;
        debug!("liquidity reward {} to {}", reward, entry.owner);
        self.push_virtual_operation(VirtualOperation::LiquidityReward {
            owner: entry.owner,
            payout: reward,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vshares_curve_shape() {
        let c = 2_000_000_000_000u128;
        // Small stakes are heavily damped.
        let small = calculate_vshares(1_000, c);
        assert!(small < 1_000);
        // Far past the constant the curve is nearly linear.
        let big = 1u128 << 80;
        let out = calculate_vshares(big, c);
        assert!(out > big - (big >> 10));
        assert!(out <= big);
        assert_eq!(calculate_vshares(0, c), 0);
    }

    #[test]
    fn isqrt_exactness() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1 << 40), 1 << 20);
        let v = u128::from(u64::MAX);
        assert_eq!(isqrt(v * v), u64::MAX);
    }

    #[test]
    fn inflation_narrows_to_floor() {
        assert_eq!(inflation_rate_at(978, 95, 250_000, 0), 978);
        assert_eq!(inflation_rate_at(978, 95, 250_000, 250_000), 977);
        // Far enough out the floor binds.
        assert_eq!(inflation_rate_at(978, 95, 250_000, u32::MAX), 95);
    }
}
