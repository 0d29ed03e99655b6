// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A fast-clock deployment for integration testing: short windows, instant
//! hardforks, tiny thresholds. Consensus logic is identical to mainnet.

use super::{chain_id_for, ChainConfig, HardforkSchedule};
use crate::blocks::ProtocolVersion;
use crate::types::Timestamp;

pub fn config() -> ChainConfig {
    let mut config = super::mainnet::config();
    config.name = "grove-testnet".into();
    config.chain_id = chain_id_for("grove-testnet");
    config.genesis_time = Timestamp(1_000_002);
    config.init_witness_key =
        crate::crypto::SecretKey::from_seed("grove-testnet-init").public_key();
    config.init_supply = 10_000_000_000;

    config.cashout_window_secs = 60 * 60;
    config.max_cashout_window_secs = 2 * 60 * 60;
    config.reverse_auction_window_secs = 30;
    config.min_root_comment_interval_secs = 12;
    config.recent_rshares_decay_secs = 60 * 60;
    config.min_reply_interval_secs = 3;

    config.conversion_delay_secs = 60;
    config.gbd_interest_interval_secs = 60;
    config.savings_withdraw_delay_secs = 60;
    config.vesting_withdraw_interval_secs = 60;
    config.delegation_return_period_secs = 60;
    config.owner_auth_recovery_secs = 60 * 60;
    config.account_recovery_request_expiration_secs = 12 * 60;
    config.owner_update_limit_secs = 6;

    config.feed_interval_blocks = 20;
    config.liquidity_reward_interval_blocks = 20;
    config.flush_blocks = 100;

    // All hardforks are live shortly after genesis so tests run the final
    // rule set by default.
    config.hardforks = vec![
        HardforkSchedule {
            num: super::HF_VOTE_RETALLY,
            version: ProtocolVersion::new(0, 1, 0),
            time: Timestamp(config.genesis_time.0 + 3),
        },
        HardforkSchedule {
            num: super::HF_CURATION_QUARTER,
            version: ProtocolVersion::new(0, 2, 0),
            time: Timestamp(config.genesis_time.0 + 6),
        },
        HardforkSchedule {
            num: super::HF_SCHEDULE_LAP_CHANGE,
            version: ProtocolVersion::new(0, 3, 0),
            time: Timestamp(config.genesis_time.0 + 9),
        },
        HardforkSchedule {
            num: super::HF_LIQUIDITY_SUNSET,
            version: ProtocolVersion::new(0, 4, 0),
            time: Timestamp(config.genesis_time.0 + 12),
        },
        HardforkSchedule {
            num: super::HF_REWARD_FUNDS,
            version: ProtocolVersion::new(0, 5, 0),
            time: Timestamp(config.genesis_time.0 + 15),
        },
    ];
    config
}
