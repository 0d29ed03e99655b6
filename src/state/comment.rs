// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::db::{ObjectId, StateObject};
use crate::operations::BeneficiaryRoute;
use crate::types::{AccountName, Asset, Timestamp};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub type CommentId = ObjectId<Comment>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub author: AccountName,
    pub permlink: String,
    /// `None` for a top-level post.
    pub parent_author: Option<AccountName>,
    pub parent_permlink: String,
    pub category: String,
    pub root_comment: CommentId,
    pub depth: u16,
    pub children: u32,

    pub title: String,
    pub body: String,
    pub json_metadata: String,

    pub created: Timestamp,
    pub last_update: Timestamp,
    pub active: Timestamp,
    pub last_payout: Timestamp,
    /// When accumulated votes pay out; `Timestamp::MAX` once paid.
    pub cashout_time: Timestamp,
    pub max_cashout_time: Timestamp,

    pub net_rshares: i64,
    pub abs_rshares: i64,
    /// Positive rshares only, snapshotted for curation weights.
    pub vote_rshares: i64,
    pub children_abs_rshares: i64,
    /// Rollup of rshares² over this comment and every descendant.
    pub children_rshares2: u128,
    pub total_vote_weight: u64,
    pub reward_weight: u16,
    pub net_votes: i32,

    pub total_payout_value: Asset,
    pub curator_payout_value: Asset,
    pub author_rewards: i64,

    pub max_accepted_payout: Asset,
    pub percent_grove_dollars: u16,
    pub allow_replies: bool,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub beneficiaries: SmallVec<[BeneficiaryRoute; 2]>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_author.is_none()
    }

    /// Key of the parent in the permlink index.
    pub fn parent_key(&self) -> Option<(AccountName, String)> {
        self.parent_author
            .as_ref()
            .map(|author| (author.clone(), self.parent_permlink.clone()))
    }
}

#[derive(Default)]
pub struct CommentIndexes {
    pub by_permlink: BTreeMap<(AccountName, String), CommentId>,
    /// Excludes paid comments, which park at `Timestamp::MAX`.
    pub by_cashout_time: BTreeMap<(Timestamp, CommentId), ()>,
    pub by_parent: BTreeMap<(AccountName, String, CommentId), ()>,
    pub by_root: BTreeMap<(CommentId, CommentId), ()>,
}

impl StateObject for Comment {
    type Indexes = CommentIndexes;

    const TYPE_NAME: &'static str = "comment";

    fn index_insert(ix: &mut CommentIndexes, id: CommentId, obj: &Comment) {
        ix.by_permlink
            .insert((obj.author.clone(), obj.permlink.clone()), id);
        if obj.cashout_time != Timestamp::MAX {
            ix.by_cashout_time.insert((obj.cashout_time, id), ());
        }
        if let Some((parent_author, parent_permlink)) = obj.parent_key() {
            ix.by_parent.insert((parent_author, parent_permlink, id), ());
        }
        ix.by_root.insert((obj.root_comment, id), ());
    }

    fn index_remove(ix: &mut CommentIndexes, id: CommentId, obj: &Comment) {
        ix.by_permlink.remove(&(obj.author.clone(), obj.permlink.clone()));
        ix.by_cashout_time.remove(&(obj.cashout_time, id));
        if let Some((parent_author, parent_permlink)) = obj.parent_key() {
            ix.by_parent.remove(&(parent_author, parent_permlink, id));
        }
        ix.by_root.remove(&(obj.root_comment, id));
    }
}

pub type CommentVoteId = ObjectId<CommentVote>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentVote {
    pub voter: AccountName,
    pub comment: CommentId,
    /// Claim on the curator pool, frozen at vote time.
    pub weight: u64,
    pub rshares: i64,
    pub vote_percent: i16,
    pub last_update: Timestamp,
    pub num_changes: u8,
}

#[derive(Default)]
pub struct CommentVoteIndexes {
    pub by_comment_voter: BTreeMap<(CommentId, AccountName), CommentVoteId>,
}

impl StateObject for CommentVote {
    type Indexes = CommentVoteIndexes;

    const TYPE_NAME: &'static str = "comment_vote";

    fn index_insert(ix: &mut CommentVoteIndexes, id: CommentVoteId, obj: &CommentVote) {
        ix.by_comment_voter.insert((obj.comment, obj.voter.clone()), id);
    }

    fn index_remove(ix: &mut CommentVoteIndexes, _id: CommentVoteId, obj: &CommentVote) {
        ix.by_comment_voter.remove(&(obj.comment, obj.voter.clone()));
    }
}
