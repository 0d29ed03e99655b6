// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Network configuration: every protocol constant and the hardfork
//! schedule live here, so consensus code is generic over deployments.

use crate::blocks::ProtocolVersion;
use crate::crypto::{sha256, Digest};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

pub mod mainnet;
pub mod testnet;

/// Numbered protocol changes. Evaluators gate on
/// [`crate::chain::Chain::hardfork_level`] reaching one of these.
pub const HF_VOTE_RETALLY: u32 = 1;
pub const HF_CURATION_QUARTER: u32 = 2;
pub const HF_SCHEDULE_LAP_CHANGE: u32 = 3;
pub const HF_LIQUIDITY_SUNSET: u32 = 4;
pub const HF_REWARD_FUNDS: u32 = 5;

/// One entry of the hardfork schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HardforkSchedule {
    pub num: u32,
    pub version: ProtocolVersion,
    pub time: Timestamp,
}

/// Defines all parameters of one chain deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: Digest,
    pub genesis_time: Timestamp,
    pub init_witness: String,
    pub init_witness_key: crate::crypto::PublicKey,
    pub init_supply: i64,

    pub block_interval_secs: u32,
    pub blocks_per_year: u32,
    pub blocks_per_day: u32,

    pub max_voted_witnesses: u8,
    pub max_miner_witnesses: u8,
    pub max_runner_witnesses: u8,
    /// Percent of scheduled witnesses that must confirm a block before it
    /// is irreversible.
    pub irreversible_threshold_percent: u32,
    /// Clear a witness's signing key when it has signed nothing for this
    /// long (counted in blocks) after the shutdown hardfork.
    pub witness_shutdown_blocks: u32,

    pub max_sig_check_depth: u32,
    pub max_authority_membership: usize,
    pub max_transaction_expiration_secs: u32,
    pub min_transaction_size: usize,

    pub bandwidth_average_window_secs: u32,
    pub bandwidth_precision: u128,
    /// Reserve ratio bounds for virtual bandwidth scaling.
    pub max_reserve_ratio: u64,

    pub cashout_window_secs: u32,
    pub max_cashout_window_secs: u32,
    pub reverse_auction_window_secs: u32,
    pub vote_regeneration_secs: u32,
    pub min_vote_interval_secs: u32,
    pub min_reply_interval_secs: u32,
    pub min_root_comment_interval_secs: u32,
    pub content_constant: u128,
    /// Linear-decay window for the reward funds' recent claims.
    pub recent_rshares_decay_secs: u32,
    /// Curation share of a payout before and after the curation hardfork.
    pub curation_percent_early: u16,
    pub curation_percent: u16,

    pub inflation_start_percent: u16,
    pub inflation_floor_percent: u16,
    /// Every this many blocks the annual inflation narrows by 0.01%.
    pub inflation_narrowing_blocks: u32,
    pub content_reward_percent: u16,
    pub vesting_fund_percent: u16,

    pub liquidity_reward_interval_blocks: u32,
    pub liquidity_reward_amount: i64,

    pub gbd_interest_rate: u16,
    pub gbd_interest_interval_secs: u32,
    pub gbd_start_percent: u16,
    pub gbd_stop_percent: u16,
    pub feed_interval_blocks: u32,
    pub feed_history_window: usize,
    pub conversion_delay_secs: u32,

    pub vesting_withdraw_intervals: u32,
    pub vesting_withdraw_interval_secs: u32,
    pub delegation_return_period_secs: u32,
    pub savings_withdraw_delay_secs: u32,

    pub owner_auth_recovery_secs: u32,
    pub account_recovery_request_expiration_secs: u32,
    pub owner_update_limit_secs: u32,
    pub owner_challenge_fee: i64,
    pub active_challenge_fee: i64,

    pub min_pow_target: u32,
    pub flush_blocks: u32,
    pub max_undo_history: u32,

    pub hardforks: Vec<HardforkSchedule>,
}

impl ChainConfig {
    pub fn mainnet() -> ChainConfig {
        mainnet::config()
    }

    pub fn testnet() -> ChainConfig {
        testnet::config()
    }

    /// Latest hardfork number this binary knows.
    pub fn last_hardfork(&self) -> u32 {
        self.hardforks.last().map(|hf| hf.num).unwrap_or(0)
    }

    /// The protocol version this binary reports in produced headers.
    pub fn binary_version(&self) -> ProtocolVersion {
        self.hardforks
            .last()
            .map(|hf| hf.version)
            .unwrap_or_default()
    }

    pub fn hardfork(&self, num: u32) -> Option<&HardforkSchedule> {
        self.hardforks.iter().find(|hf| hf.num == num)
    }
}

pub(crate) fn chain_id_for(name: &str) -> Digest {
    sha256(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardfork_schedules_are_ordered() {
        for config in [ChainConfig::mainnet(), ChainConfig::testnet()] {
            let mut prev_num = 0;
            let mut prev_time = Timestamp(0);
            let mut prev_version = ProtocolVersion::default();
            for hf in &config.hardforks {
                assert_eq!(hf.num, prev_num + 1, "{}: gap in schedule", config.name);
                assert!(hf.time >= prev_time, "{}: time regression", config.name);
                assert!(hf.version > prev_version, "{}: version regression", config.name);
                prev_num = hf.num;
                prev_time = hf.time;
                prev_version = hf.version;
            }
            assert_eq!(config.last_hardfork(), HF_REWARD_FUNDS);
        }
    }

    #[test]
    fn chain_ids_differ() {
        assert_ne!(
            ChainConfig::mainnet().chain_id,
            ChainConfig::testnet().chain_id
        );
    }
}
