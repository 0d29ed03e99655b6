// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::{BlockId, ProtocolVersion};
use crate::operations::ChainProperties;
use crate::types::{AccountName, Asset, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The chain-global counters every component reads. One undoable instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: BlockId,
    pub time: Timestamp,
    pub current_witness: AccountName,
    /// Absolute slot since genesis, counting missed slots.
    pub current_aslot: u64,
    /// One bit per recent slot; a set bit is a produced block.
    pub recent_slots_filled: u128,
    pub participation_count: u8,
    pub last_irreversible_block_num: u32,

    pub total_pow: u64,
    pub num_pow_witnesses: u32,

    pub current_supply: Asset,
    /// Core supply plus the stable supply valued at the feed.
    pub virtual_supply: Asset,
    pub current_gbd_supply: Asset,
    pub total_vesting_fund: Asset,
    pub total_vesting_shares: Asset,

    pub gbd_interest_rate: u16,
    /// Portion of nominal stable payouts actually printed as stable;
    /// the rest settles in the core asset.
    pub gbd_print_rate: u16,

    pub average_block_size: u32,
    pub maximum_block_size: u32,
    pub current_reserve_ratio: u64,
    pub max_virtual_bandwidth: u128,
}

impl Default for DynamicGlobalProperties {
    fn default() -> DynamicGlobalProperties {
        DynamicGlobalProperties {
            head_block_number: 0,
            head_block_id: BlockId::default(),
            time: Timestamp(0),
            current_witness: AccountName::unchecked(""),
            current_aslot: 0,
            recent_slots_filled: u128::MAX,
            participation_count: 128,
            last_irreversible_block_num: 0,
            total_pow: 0,
            num_pow_witnesses: 0,
            current_supply: Asset::grove(0),
            virtual_supply: Asset::grove(0),
            current_gbd_supply: Asset::gbd(0),
            total_vesting_fund: Asset::grove(0),
            total_vesting_shares: Asset::vests(0),
            gbd_interest_rate: 0,
            gbd_print_rate: crate::operations::PERCENT_100,
            average_block_size: 0,
            maximum_block_size: 0,
            current_reserve_ratio: 1,
            max_virtual_bandwidth: 0,
        }
    }
}

impl DynamicGlobalProperties {
    /// Price of one vesting share in the core asset.
    pub fn vesting_share_price(&self) -> Price {
        if self.total_vesting_shares.amount <= 0 || self.total_vesting_fund.amount <= 0 {
            // Bootstrap rate: one thousand shares per core unit.
            Price::new(Asset::vests(1000), Asset::grove(1))
        } else {
            Price::new(self.total_vesting_shares, self.total_vesting_fund)
        }
    }

    pub fn participation_rate_percent(&self) -> u32 {
        u32::from(self.participation_count) * 100 / 128
    }
}

/// The witness rota for the current round plus the medians it elected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WitnessSchedule {
    pub current_virtual_time: u128,
    pub next_shuffle_block_num: u32,
    pub current_shuffled_witnesses: Vec<AccountName>,
    pub num_scheduled_witnesses: u8,

    /// Relative pay weights per schedule class.
    pub top_weight: u8,
    pub timeshare_weight: u8,
    pub miner_weight: u8,
    pub witness_pay_normalization_factor: u32,

    pub median_props: ChainProperties,
    pub majority_version: ProtocolVersion,

    pub max_voted_witnesses: u8,
    pub max_miner_witnesses: u8,
    pub max_runner_witnesses: u8,
}

impl Default for WitnessSchedule {
    fn default() -> WitnessSchedule {
        WitnessSchedule {
            current_virtual_time: 0,
            next_shuffle_block_num: 1,
            current_shuffled_witnesses: Vec::new(),
            num_scheduled_witnesses: 1,
            top_weight: 1,
            timeshare_weight: 5,
            miner_weight: 1,
            witness_pay_normalization_factor: 25,
            median_props: ChainProperties::default(),
            majority_version: ProtocolVersion::default(),
            max_voted_witnesses: 19,
            max_miner_witnesses: 1,
            max_runner_witnesses: 1,
        }
    }
}

/// Rolling window of stable-asset feed medians; conversions execute at the
/// median of this window rather than the instantaneous feed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeedHistory {
    pub current_median_history: Option<Price>,
    pub price_history: VecDeque<Price>,
}

impl FeedHistory {
    pub fn recompute_median(&mut self) {
        if self.price_history.is_empty() {
            self.current_median_history = None;
            return;
        }
        let mut sorted: Vec<&Price> = self.price_history.iter().collect();
        sorted.sort();
        self.current_median_history = Some(*sorted[sorted.len() / 2]);
    }
}

/// Which protocol changes have taken effect.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HardforkProperties {
    /// Activation times of every processed hardfork, index 0 being
    /// genesis.
    pub processed_hardforks: Vec<Timestamp>,
    /// Number of the last hardfork applied.
    pub last_hardfork: u32,
    pub current_hardfork_version: ProtocolVersion,
    pub next_hardfork: ProtocolVersion,
    pub next_hardfork_time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_share_price() {
        let props = DynamicGlobalProperties::default();
        let price = props.vesting_share_price();
        assert_eq!(Asset::grove(5).convert(&price), Asset::vests(5000));
    }

    #[test]
    fn feed_median_is_middle_element() {
        let mut fh = FeedHistory::default();
        for quote in [100, 300, 200] {
            fh.price_history
                .push_back(Price::new(Asset::gbd(100), Asset::grove(quote)));
        }
        fh.recompute_median();
        assert_eq!(fh.current_median_history.unwrap().quote.amount, 200);
    }
}
