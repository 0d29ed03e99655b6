// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{chain_id_for, ChainConfig, HardforkSchedule};
use crate::blocks::ProtocolVersion;
use crate::operations::PERCENT_1;
use crate::types::Timestamp;

const BLOCK_INTERVAL_SECS: u32 = 3;
const BLOCKS_PER_DAY: u32 = 24 * 60 * 60 / BLOCK_INTERVAL_SECS;
const BLOCKS_PER_YEAR: u32 = 365 * BLOCKS_PER_DAY;

/// 2026-01-01T00:00:00Z.
const GENESIS_TIME: Timestamp = Timestamp(1_767_225_600);

pub fn config() -> ChainConfig {
    ChainConfig {
        name: "grove-mainnet".into(),
        chain_id: chain_id_for("grove-mainnet"),
        genesis_time: GENESIS_TIME,
        init_witness: "initwitness".into(),
        init_witness_key: crate::crypto::SecretKey::from_seed("grove-mainnet-init").public_key(),
        init_supply: 0,

        block_interval_secs: BLOCK_INTERVAL_SECS,
        blocks_per_year: BLOCKS_PER_YEAR,
        blocks_per_day: BLOCKS_PER_DAY,

        max_voted_witnesses: 19,
        max_miner_witnesses: 1,
        max_runner_witnesses: 1,
        irreversible_threshold_percent: 75,
        witness_shutdown_blocks: BLOCKS_PER_DAY,

        max_sig_check_depth: 2,
        max_authority_membership: 10,
        max_transaction_expiration_secs: 3600,
        min_transaction_size: 64,

        bandwidth_average_window_secs: 7 * 24 * 60 * 60,
        bandwidth_precision: 1_000_000,
        max_reserve_ratio: 20_000,

        cashout_window_secs: 7 * 24 * 60 * 60,
        max_cashout_window_secs: 14 * 24 * 60 * 60,
        reverse_auction_window_secs: 30 * 60,
        vote_regeneration_secs: 5 * 24 * 60 * 60,
        min_vote_interval_secs: 3,
        min_reply_interval_secs: 20,
        min_root_comment_interval_secs: 5 * 60,
        content_constant: 2_000_000_000_000,
        recent_rshares_decay_secs: 15 * 24 * 60 * 60,
        curation_percent_early: 50 * PERCENT_1,
        curation_percent: 25 * PERCENT_1,

        inflation_start_percent: 978,
        inflation_floor_percent: 95,
        inflation_narrowing_blocks: 250_000,
        content_reward_percent: 75 * PERCENT_1,
        vesting_fund_percent: 15 * PERCENT_1,

        liquidity_reward_interval_blocks: 1200,
        liquidity_reward_amount: 1_200_000,

        gbd_interest_rate: 10 * PERCENT_1,
        gbd_interest_interval_secs: 30 * 24 * 60 * 60,
        gbd_start_percent: 2 * PERCENT_1,
        gbd_stop_percent: 5 * PERCENT_1,
        feed_interval_blocks: 1200,
        feed_history_window: 168,
        conversion_delay_secs: 3 * 24 * 60 * 60 + 12 * 60 * 60,

        vesting_withdraw_intervals: 13,
        vesting_withdraw_interval_secs: 7 * 24 * 60 * 60,
        delegation_return_period_secs: 7 * 24 * 60 * 60,
        savings_withdraw_delay_secs: 3 * 24 * 60 * 60,

        owner_auth_recovery_secs: 30 * 24 * 60 * 60,
        account_recovery_request_expiration_secs: 24 * 60 * 60,
        owner_update_limit_secs: 60 * 60,
        owner_challenge_fee: 30_000,
        active_challenge_fee: 2_000,

        min_pow_target: u32::MAX / 4,
        flush_blocks: 8000,
        max_undo_history: 10_000,

        hardforks: schedule(),
    }
}

fn schedule() -> Vec<HardforkSchedule> {
    const DAY: u32 = 24 * 60 * 60;
    vec![
        HardforkSchedule {
            num: super::HF_VOTE_RETALLY,
            version: ProtocolVersion::new(0, 1, 0),
            time: Timestamp(GENESIS_TIME.0 + 30 * DAY),
        },
        HardforkSchedule {
            num: super::HF_CURATION_QUARTER,
            version: ProtocolVersion::new(0, 2, 0),
            time: Timestamp(GENESIS_TIME.0 + 60 * DAY),
        },
        HardforkSchedule {
            num: super::HF_SCHEDULE_LAP_CHANGE,
            version: ProtocolVersion::new(0, 3, 0),
            time: Timestamp(GENESIS_TIME.0 + 90 * DAY),
        },
        HardforkSchedule {
            num: super::HF_LIQUIDITY_SUNSET,
            version: ProtocolVersion::new(0, 4, 0),
            time: Timestamp(GENESIS_TIME.0 + 150 * DAY),
        },
        HardforkSchedule {
            num: super::HF_REWARD_FUNDS,
            version: ProtocolVersion::new(0, 5, 0),
            time: Timestamp(GENESIS_TIME.0 + 240 * DAY),
        },
    ]
}
