// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Initial state seeding. Runs on an empty store before any block; the
//! result is the permanent base layer under every undo session.

use crate::chain::{Chain, Error};
use crate::operations::ChainProperties;
use crate::rewards::POST_FUND;
use crate::state::{Account, BlockSummary, RewardFund, Witness};
use crate::types::{AccountName, Asset, Authority, Timestamp};
use tracing::info;

/// Balances sent here burn at the next block boundary.
pub const NULL_ACCOUNT: &str = "null";

pub(crate) fn init_genesis(chain: &mut Chain) -> Result<(), Error> {
    if !chain.store.accounts.is_empty() {
        return Ok(());
    }
    let config = chain.config().clone();
    info!("seeding genesis state for {}", config.name);
    let genesis_time = config.genesis_time;

    // The black hole: nothing can ever sign for it.
    chain.store.accounts.insert(|_| {
        let mut account = Account::starter(
            AccountName::unchecked(NULL_ACCOUNT),
            config.init_witness_key,
            genesis_time,
        );
        account.owner = Authority::impossible();
        account.active = Authority::impossible();
        account.posting = Authority::impossible();
        account.can_vote = false;
        account
    });

    let init_name = AccountName::unchecked(&config.init_witness);
    chain.store.accounts.insert(|_| {
        let mut account = Account::starter(init_name.clone(), config.init_witness_key, genesis_time);
        account.owner = Authority::single_key(config.init_witness_key);
        account.active = Authority::single_key(config.init_witness_key);
        account.posting = Authority::single_key(config.init_witness_key);
        account.balance = Asset::grove(config.init_supply);
        account
    });

    chain.store.witnesses.insert(|_| {
        let mut witness = Witness::new(init_name.clone(), config.init_witness_key, genesis_time);
        witness.running_version = config.binary_version();
        // The seed witness votes for every fork this binary knows, so
        // time alone gates activation until real witnesses take over.
        witness.hardfork_version_vote = config.binary_version();
        witness.hardfork_time_vote = Timestamp::MAX;
        witness
    });

    // TaPoS ring: one row per low-16-bit height class.
    for _ in 0..crate::state::BLOCK_SUMMARY_SLOTS {
        chain.store.block_summaries.insert(|_| BlockSummary {
            block_id: Default::default(),
        });
    }

    let default_props = ChainProperties::default();
    let max_block_size = default_props.maximum_block_size;
    chain.store.dgp.modify(|dgp| {
        dgp.time = genesis_time;
        dgp.current_witness = init_name.clone();
        dgp.current_supply = Asset::grove(config.init_supply);
        dgp.virtual_supply = Asset::grove(config.init_supply);
        dgp.maximum_block_size = max_block_size;
        dgp.current_reserve_ratio = 1;
        dgp.max_virtual_bandwidth = u128::from(max_block_size)
            * config.bandwidth_precision
            * u128::from(config.bandwidth_average_window_secs)
            / u128::from(config.block_interval_secs);
        dgp.gbd_interest_rate = config.gbd_interest_rate;
    });

    chain.store.witness_schedule.modify(|schedule| {
        schedule.current_shuffled_witnesses = vec![init_name.clone()];
        schedule.num_scheduled_witnesses = 1;
        schedule.max_voted_witnesses = config.max_voted_witnesses;
        schedule.max_miner_witnesses = config.max_miner_witnesses;
        schedule.max_runner_witnesses = config.max_runner_witnesses;
        schedule.majority_version = config.binary_version();
        schedule.median_props = default_props.clone();
    });

    chain.store.hardforks.modify(|hf| {
        hf.processed_hardforks = vec![genesis_time];
        hf.last_hardfork = 0;
        hf.next_hardfork = config.binary_version();
        hf.next_hardfork_time = config
            .hardforks
            .first()
            .map(|s| s.time)
            .unwrap_or(Timestamp::MAX);
    });

    let content_constant = config.content_constant;
    chain.store.reward_funds.insert(|_| RewardFund {
        name: POST_FUND.to_owned(),
        reward_balance: Asset::grove(0),
        recent_rshares2: 0,
        percent_content_rewards: crate::operations::PERCENT_100,
        content_constant,
        last_update: genesis_time,
    });

    chain.store.set_revision(0)?;
    Ok(())
}
