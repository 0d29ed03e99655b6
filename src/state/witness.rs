// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::ProtocolVersion;
use crate::crypto::{Digest, PublicKey};
use crate::db::{ObjectId, StateObject};
use crate::operations::ChainProperties;
use crate::types::{AccountName, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type WitnessId = ObjectId<Witness>;

/// How a witness earned its slot in the current round.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum ScheduleClass {
    /// Among the top voted.
    Top,
    /// Won the stake-weighted virtual-time lottery.
    Timeshare,
    /// Entered through the proof-of-work queue.
    Miner,
    #[default]
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Witness {
    pub owner: AccountName,
    pub created: Timestamp,
    pub url: String,
    pub total_missed: u32,
    pub last_confirmed_block_num: u32,
    /// Nonzero while waiting in the proof-of-work queue.
    pub pow_worker: u64,
    pub last_work: Digest,
    /// `None` means the witness is shut down and cannot be scheduled.
    pub signing_key: Option<PublicKey>,
    pub props: ChainProperties,
    pub gbd_exchange_rate: Option<Price>,
    pub last_gbd_exchange_update: Timestamp,

    /// Sum of vesting-share weight voting for this witness.
    pub votes: i64,
    pub schedule: ScheduleClass,

    pub virtual_last_update: u128,
    pub virtual_position: u128,
    pub virtual_scheduled_time: u128,

    pub running_version: ProtocolVersion,
    pub hardfork_version_vote: ProtocolVersion,
    pub hardfork_time_vote: Timestamp,
}

impl Witness {
    pub fn new(owner: AccountName, signing_key: PublicKey, created: Timestamp) -> Witness {
        Witness {
            owner,
            created,
            url: String::new(),
            total_missed: 0,
            last_confirmed_block_num: 0,
            pow_worker: 0,
            last_work: Digest::default(),
            signing_key: Some(signing_key),
            props: ChainProperties::default(),
            gbd_exchange_rate: None,
            last_gbd_exchange_update: Timestamp(0),
            votes: 0,
            schedule: ScheduleClass::None,
            virtual_last_update: 0,
            virtual_position: 0,
            virtual_scheduled_time: u128::MAX,
            running_version: ProtocolVersion::default(),
            hardfork_version_vote: ProtocolVersion::default(),
            hardfork_time_vote: Timestamp(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.signing_key.is_some()
    }
}

#[derive(Default)]
pub struct WitnessIndexes {
    pub by_name: BTreeMap<AccountName, WitnessId>,
    /// Keyed by negated vote weight so iteration order is best-first.
    pub by_vote: BTreeMap<(i64, AccountName), WitnessId>,
    pub by_schedule_time: BTreeMap<(u128, WitnessId), ()>,
    /// Proof-of-work queue, oldest entry first; zero workers are not
    /// queued.
    pub by_pow: BTreeMap<(u64, WitnessId), ()>,
}

impl StateObject for Witness {
    type Indexes = WitnessIndexes;

    const TYPE_NAME: &'static str = "witness";

    fn index_insert(ix: &mut WitnessIndexes, id: WitnessId, obj: &Witness) {
        ix.by_name.insert(obj.owner.clone(), id);
        ix.by_vote.insert((-obj.votes, obj.owner.clone()), id);
        ix.by_schedule_time.insert((obj.virtual_scheduled_time, id), ());
        if obj.pow_worker > 0 {
            ix.by_pow.insert((obj.pow_worker, id), ());
        }
    }

    fn index_remove(ix: &mut WitnessIndexes, id: WitnessId, obj: &Witness) {
        ix.by_name.remove(&obj.owner);
        ix.by_vote.remove(&(-obj.votes, obj.owner.clone()));
        ix.by_schedule_time.remove(&(obj.virtual_scheduled_time, id));
        if obj.pow_worker > 0 {
            ix.by_pow.remove(&(obj.pow_worker, id));
        }
    }
}

pub type WitnessVoteId = ObjectId<WitnessVote>;

/// One account approving one witness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WitnessVote {
    pub account: AccountName,
    pub witness: AccountName,
}

#[derive(Default)]
pub struct WitnessVoteIndexes {
    pub by_account_witness: BTreeMap<(AccountName, AccountName), WitnessVoteId>,
    pub by_witness_account: BTreeMap<(AccountName, AccountName), WitnessVoteId>,
}

impl StateObject for WitnessVote {
    type Indexes = WitnessVoteIndexes;

    const TYPE_NAME: &'static str = "witness_vote";

    fn index_insert(ix: &mut WitnessVoteIndexes, id: WitnessVoteId, obj: &WitnessVote) {
        ix.by_account_witness
            .insert((obj.account.clone(), obj.witness.clone()), id);
        ix.by_witness_account
            .insert((obj.witness.clone(), obj.account.clone()), id);
    }

    fn index_remove(ix: &mut WitnessVoteIndexes, _id: WitnessVoteId, obj: &WitnessVote) {
        ix.by_account_witness
            .remove(&(obj.account.clone(), obj.witness.clone()));
        ix.by_witness_account
            .remove(&(obj.witness.clone(), obj.account.clone()));
    }
}
