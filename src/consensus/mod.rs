// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Witness scheduling. Each round the controller assembles the producer
//! set from three classes (top-voted, proof-of-work queue, stake-weighted
//! virtual-time lottery), recomputes the elected medians, and shuffles the
//! set deterministically from the head timestamp.

use crate::chain::{Chain, Error};
use crate::crypto::sha256;
use crate::operations::ChainProperties;
use crate::state::ScheduleClass;
use crate::types::{AccountName, Timestamp};
use tracing::debug;

/// Time of the slot `slot_num` slots past the head block. Slot 0 is the
/// head block's own time.
pub fn get_slot_time(chain: &Chain, slot_num: u64) -> Timestamp {
    let interval = chain.config().block_interval_secs;
    let dgp = chain.dgp();
    if slot_num == 0 {
        return dgp.time;
    }
    if dgp.head_block_number == 0 {
        // Before any block, slot 1 is one interval past genesis.
        return chain.config().genesis_time + (slot_num as u32) * interval;
    }
    let head_slot_time = dgp.time.0 - dgp.time.0 % interval;
    Timestamp(head_slot_time + (slot_num as u32) * interval)
}

/// Index of the slot containing `when`, zero if it precedes slot 1.
pub fn get_slot_at_time(chain: &Chain, when: Timestamp) -> u64 {
    let first_slot_time = get_slot_time(chain, 1);
    if when < first_slot_time {
        return 0;
    }
    u64::from(when.secs_since(first_slot_time)) / u64::from(chain.config().block_interval_secs) + 1
}

/// The witness entitled to produce at `slot_num` slots past head.
pub fn get_scheduled_witness(chain: &Chain, slot_num: u64) -> AccountName {
    let schedule = chain.store().witness_schedule.get();
    let dgp = chain.dgp();
    let index = (dgp.current_aslot + slot_num) % schedule.current_shuffled_witnesses.len() as u64;
    schedule.current_shuffled_witnesses[index as usize].clone()
}

/// Deterministic in-place shuffle keyed to the block time, identical on
/// every node.
fn shuffle_witnesses(names: &mut [AccountName], now: Timestamp) {
    let now_hi = u64::from(now.0) << 32;
    for i in 0..names.len() {
        let digest = sha256(&(now_hi + i as u64).to_le_bytes());
        let k = u64::from_le_bytes(digest.0[..8].try_into().expect("8 bytes"));
        let remaining = (names.len() - i) as u64;
        let j = i + (k % remaining) as usize;
        names.swap(i, j);
    }
}

fn median_of<T: Ord + Copy>(mut values: Vec<T>) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    Some(values[values.len() / 2])
}

/// At round boundaries, rebuild the shuffled witness set and refresh the
/// elected medians. Median properties become effective for the next
/// round.
pub(crate) fn update_witness_schedule(chain: &mut Chain) -> Result<(), Error> {
    let schedule = chain.store().witness_schedule.get().clone();
    let head = chain.head_block_num();
    if head % u32::from(schedule.num_scheduled_witnesses) != 0 {
        return Ok(());
    }

    let mut selected: Vec<(crate::state::WitnessId, AccountName, ScheduleClass)> = Vec::new();
    fn is_selected(
        selected: &[(crate::state::WitnessId, AccountName, ScheduleClass)],
        name: &AccountName,
    ) -> bool {
        selected.iter().any(|(_, n, _)| n == name)
    }

    // Class one: the top voted, as long as they hold a signing key.
    for ((_, name), &wid) in chain.store().witnesses.indexes.by_vote.iter() {
        if selected.len() >= usize::from(schedule.max_voted_witnesses) {
            break;
        }
        if chain.store().witnesses.get(wid)?.is_active() {
            selected.push((wid, name.clone(), ScheduleClass::Top));
        }
    }
    let num_elected = selected.len();

    // Class two: the proof-of-work queue, oldest work first.
    let miners: Vec<crate::state::WitnessId> = chain
        .store()
        .witnesses
        .indexes
        .by_pow
        .keys()
        .map(|(_, wid)| *wid)
        .take(usize::from(schedule.max_miner_witnesses))
        .collect();
    let num_miners = miners.len();
    for wid in miners {
        let witness = chain.store().witnesses.get(wid)?;
        let name = witness.owner.clone();
        if !is_selected(&selected, &name) {
            selected.push((wid, name, ScheduleClass::Miner));
        }
        chain.store.witnesses.modify(wid, |w| w.pow_worker = 0)?;
        chain.store.dgp.modify(|dgp| {
            dgp.num_pow_witnesses = dgp.num_pow_witnesses.saturating_sub(1)
        });
    }

    // Class three: the virtual-time lottery fills the remaining slots.
    let target = usize::from(schedule.max_voted_witnesses)
        + usize::from(schedule.max_miner_witnesses)
        + usize::from(schedule.max_runner_witnesses);
    let mut new_virtual_time = schedule.current_virtual_time;
    let lap = chain.virtual_schedule_lap();
    let mut num_timeshare = 0usize;
    while selected.len() < target {
        let next = chain
            .store()
            .witnesses
            .indexes
            .by_schedule_time
            .keys()
            .map(|(vst, wid)| (*vst, *wid))
            .find(|(_, wid)| {
                let witness = chain.store().witnesses.get(*wid);
                match witness {
                    Ok(w) => w.is_active() && !is_selected(&selected, &w.owner),
                    Err(_) => false,
                }
            });
        let Some((vst, wid)) = next else { break };
        // The winner's scheduled time becomes the new clock; it re-enters
        // the wheel one lap ahead, scaled by its stake.
        new_virtual_time = vst;
        chain.store.witnesses.modify(wid, |w| {
            w.virtual_position = 0;
            w.virtual_last_update = new_virtual_time;
            w.virtual_scheduled_time =
                new_virtual_time.saturating_add(lap / ((w.votes.max(0) as u128) + 1));
        })?;
        let name = chain.store().witnesses.get(wid)?.owner.clone();
        selected.push((wid, name, ScheduleClass::Timeshare));
        num_timeshare += 1;
    }

    if selected.is_empty() {
        return Err(Error::Consensus("no active witnesses to schedule".into()));
    }

    for (wid, _, class) in &selected {
        let class = *class;
        chain.store.witnesses.modify(*wid, |w| w.schedule = class)?;
    }

    // Medians over the selected set, one property at a time.
    let witnesses: Vec<crate::state::Witness> = selected
        .iter()
        .map(|(wid, _, _)| chain.store().witnesses.get(*wid).cloned())
        .collect::<Result<_, _>>()?;
    let median_props = ChainProperties {
        account_creation_fee: crate::types::Asset::grove(
            median_of(
                witnesses
                    .iter()
                    .map(|w| w.props.account_creation_fee.amount)
                    .collect(),
            )
            .unwrap_or(1),
        ),
        maximum_block_size: median_of(
            witnesses.iter().map(|w| w.props.maximum_block_size).collect(),
        )
        .unwrap_or_default(),
        gbd_interest_rate: median_of(
            witnesses.iter().map(|w| w.props.gbd_interest_rate).collect(),
        )
        .unwrap_or_default(),
    };

    // Majority version: the highest version at least two thirds of the
    // schedule runs.
    let two_thirds = witnesses.len() * 2 / 3 + 1;
    let mut versions: Vec<_> = witnesses.iter().map(|w| w.running_version).collect();
    versions.sort();
    versions.reverse();
    let majority_version = if versions.len() >= two_thirds {
        versions[two_thirds - 1]
    } else {
        schedule.majority_version
    };

    // Hardfork vote: same two-thirds rule over (version, time) pairs.
    let mut hf_votes: Vec<_> = witnesses
        .iter()
        .map(|w| (w.hardfork_version_vote, w.hardfork_time_vote))
        .collect();
    hf_votes.sort();
    hf_votes.reverse();
    if hf_votes.len() >= two_thirds {
        let (hf_version, hf_time) = hf_votes[two_thirds - 1];
        chain.store.hardforks.modify(|hf| {
            hf.next_hardfork = hf_version;
            hf.next_hardfork_time = hf_time;
        });
    }

    let mut shuffled: Vec<AccountName> =
        selected.iter().map(|(_, name, _)| name.clone()).collect();
    let now = chain.head_block_time();
    shuffle_witnesses(&mut shuffled, now);

    let num_scheduled = shuffled.len() as u8;
    let normalization = (num_elected as u32) * u32::from(schedule.top_weight)
        + (num_timeshare as u32) * u32::from(schedule.timeshare_weight)
        + (num_miners as u32) * u32::from(schedule.miner_weight);
    debug!(
        "new round: {} scheduled ({} elected, {} miner, {} timeshare)",
        num_scheduled, num_elected, num_miners, num_timeshare
    );

    chain.store.witness_schedule.modify(|s| {
        s.current_shuffled_witnesses = shuffled;
        s.num_scheduled_witnesses = num_scheduled.max(1);
        s.next_shuffle_block_num = head + u32::from(num_scheduled.max(1));
        s.current_virtual_time = new_virtual_time;
        s.median_props = median_props.clone();
        s.majority_version = majority_version;
        s.witness_pay_normalization_factor = normalization.max(1);
    });
    chain.store.dgp.modify(|dgp| {
        dgp.maximum_block_size = median_props.maximum_block_size;
        dgp.gbd_interest_rate = median_props.gbd_interest_rate;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_is_deterministic_and_complete() {
        let mut a: Vec<AccountName> = (0..7)
            .map(|i| AccountName::unchecked(&format!("wit{i}")))
            .collect();
        let mut b = a.clone();
        shuffle_witnesses(&mut a, Timestamp(12345));
        shuffle_witnesses(&mut b, Timestamp(12345));
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        let mut expected: Vec<AccountName> = (0..7)
            .map(|i| AccountName::unchecked(&format!("wit{i}")))
            .collect();
        expected.sort();
        assert_eq!(sorted, expected);

        let mut c = expected.clone();
        shuffle_witnesses(&mut c, Timestamp(54321));
        assert_ne!(a, c);
    }

    #[test]
    fn median_picks_middle() {
        assert_eq!(median_of(vec![3, 1, 2]), Some(2));
        assert_eq!(median_of(vec![4, 1]), Some(4));
        assert_eq!(median_of(Vec::<u32>::new()), None);
    }
}
