// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    CommentOperation, CommentOptionsOperation, DeleteCommentOperation, VoteOperation, PERCENT_100,
};
use crate::rewards::{isqrt, rshares_square};
use crate::state::{Comment, CommentVote};
use crate::types::{AccountName, Asset, Timestamp};

/// Replies may nest this deep.
const MAX_COMMENT_DEPTH: u16 = 6;
const MAX_VOTE_CHANGES: u8 = 5;
/// A full-strength vote spends a fiftieth of current stamina, so voting
/// power sustains about ten full votes a day.
const VOTE_POWER_RESERVE: i64 = 50;

pub(super) fn apply_vote(chain: &mut Chain, op: &VoteOperation) -> Result<(), Error> {
    let now = chain.head_block_time();
    let voter_id = chain.get_account_id(&op.voter)?;
    let voter = chain.store().accounts.get(voter_id)?.clone();
    require!(voter.can_vote, Precondition, "{} declined voting rights", op.voter);

    let comment_id = chain
        .store()
        .find_comment(&op.author, &op.permlink)
        .ok_or_else(|| Error::Precondition(format!("no comment {}/{}", op.author, op.permlink)))?;
    let comment = chain.store().comments.get(comment_id)?.clone();
    require!(comment.allow_votes, Precondition, "votes are not allowed on this comment");
    require!(
        comment.cashout_time != Timestamp::MAX,
        Precondition,
        "comment is past its payout window"
    );
    require!(
        now.secs_since(voter.last_vote_time) >= chain.config().min_vote_interval_secs
            || voter.last_vote_time == Timestamp(0),
        Precondition,
        "voting too quickly"
    );

    // Regenerate stamina linearly since the last vote.
    let regen = u32::from(PERCENT_100) as u64 * u64::from(now.secs_since(voter.last_vote_time))
        / u64::from(chain.config().vote_regeneration_secs);
    let current_power =
        (u64::from(voter.voting_power) + regen).min(u64::from(PERCENT_100)) as u16;
    require!(current_power > 0, Precondition, "no voting power left");

    let abs_weight = i64::from(op.weight.unsigned_abs());
    let used_power =
        ((i64::from(current_power) * abs_weight / i64::from(PERCENT_100)) + VOTE_POWER_RESERVE - 1)
            / VOTE_POWER_RESERVE;
    let effective_vests = voter.effective_vesting_shares().amount.max(0);
    let abs_rshares = (effective_vests as i128 * used_power as i128
        / i128::from(PERCENT_100)) as i64;
    let rshares = if op.weight < 0 { -abs_rshares } else { abs_rshares };

    let existing = chain
        .store()
        .comment_votes
        .indexes
        .by_comment_voter
        .get(&(comment_id, op.voter.clone()))
        .copied();

    let old_square = rshares_square(comment.net_rshares);
    match existing {
        None => {
            require!(
                op.weight != 0,
                Precondition,
                "cannot remove a vote that does not exist"
            );
            chain.store.accounts.modify(voter_id, |a| {
                a.voting_power = current_power - used_power as u16;
                a.last_vote_time = now;
            })?;

            let old_vote_rshares = comment.vote_rshares;
            chain.store.comments.modify(comment_id, |c| {
                c.net_rshares += rshares;
                c.abs_rshares += abs_rshares;
                if rshares > 0 {
                    c.vote_rshares += rshares;
                    c.net_votes += 1;
                } else {
                    c.net_votes -= 1;
                }
            })?;

            // Curation weight is the square-root delta of positive
            // rshares, shaded inside the reverse-auction window.
            let mut weight = 0u64;
            if rshares > 0 && comment.allow_curation_rewards {
                let full = isqrt((old_vote_rshares + rshares) as u128)
                    - isqrt(old_vote_rshares.max(0) as u128);
                let auction = u64::from(chain.config().reverse_auction_window_secs);
                let elapsed = u64::from(now.secs_since(comment.created)).min(auction);
                weight = if auction == 0 { full } else { full * elapsed / auction };
                chain
                    .store
                    .comments
                    .modify(comment_id, |c| c.total_vote_weight += weight)?;
            }

            chain.store.comment_votes.insert(|_| CommentVote {
                voter: op.voter.clone(),
                comment: comment_id,
                weight,
                rshares,
                vote_percent: op.weight,
                last_update: now,
                num_changes: 0,
            });
        }
        Some(vote_id) => {
            let vote = chain.store().comment_votes.get(vote_id)?.clone();
            require!(
                vote.num_changes < MAX_VOTE_CHANGES,
                Precondition,
                "vote changed too many times"
            );
            require!(
                vote.vote_percent != op.weight,
                Precondition,
                "identical vote already cast"
            );
            chain.store.accounts.modify(voter_id, |a| {
                a.voting_power = current_power - used_power as u16;
                a.last_vote_time = now;
            })?;
            chain.store.comments.modify(comment_id, |c| {
                c.net_rshares = c.net_rshares - vote.rshares + rshares;
                c.abs_rshares += abs_rshares;
                // A changed vote forfeits its curation claim.
                c.total_vote_weight -= vote.weight;
                if vote.rshares > 0 && rshares <= 0 {
                    c.net_votes -= 2;
                } else if vote.rshares <= 0 && rshares > 0 {
                    c.net_votes += 2;
                }
            })?;
            chain.store.comment_votes.modify(vote_id, |v| {
                v.rshares = rshares;
                v.vote_percent = op.weight;
                v.weight = 0;
                v.last_update = now;
                v.num_changes += 1;
            })?;
        }
    }

    let net_after = chain.store().comments.get(comment_id)?.net_rshares;
    chain.adjust_rshares2(comment_id, old_square, rshares_square(net_after))?;
    Ok(())
}

pub(super) fn apply_comment(chain: &mut Chain, op: &CommentOperation) -> Result<(), Error> {
    let now = chain.head_block_time();
    let author_id = chain.get_account_id(&op.author)?;
    let author = chain.store().accounts.get(author_id)?.clone();

    let parent = if op.is_root() {
        None
    } else {
        let parent_author = AccountName::unchecked(&op.parent_author);
        let parent_id = chain
            .store()
            .find_comment(&parent_author, &op.parent_permlink)
            .ok_or_else(|| {
                Error::Precondition(format!(
                    "no parent comment {}/{}",
                    op.parent_author, op.parent_permlink
                ))
            })?;
        let parent = chain.store().comments.get(parent_id)?.clone();
        require!(
            parent.depth < MAX_COMMENT_DEPTH,
            Precondition,
            "comment nesting too deep"
        );
        require!(parent.allow_replies, Precondition, "replies are not allowed");
        Some((parent_id, parent))
    };

    let existing = chain.store().find_comment(&op.author, &op.permlink);
    match existing {
        Some(comment_id) => {
            // Edit in place; the payout clock does not reset.
            chain.store.comments.modify(comment_id, |c| {
                c.title = op.title.clone();
                c.body = op.body.clone();
                c.json_metadata = op.json_metadata.clone();
                c.last_update = now;
                c.active = now;
            })?;
        }
        None => {
            if op.is_root() {
                require!(
                    now.secs_since(author.last_root_post)
                        >= chain.config().min_root_comment_interval_secs
                        || author.last_root_post == Timestamp(0),
                    Precondition,
                    "posting too quickly"
                );
            } else {
                require!(
                    now.secs_since(author.last_post) >= chain.config().min_reply_interval_secs
                        || author.last_post == Timestamp(0),
                    Precondition,
                    "replying too quickly"
                );
            }

            let cashout = now + chain.config().cashout_window_secs;
            let max_cashout = now + chain.config().max_cashout_window_secs;
            chain.store.comments.insert(|id| Comment {
                author: op.author.clone(),
                permlink: op.permlink.clone(),
                parent_author: parent.as_ref().map(|(_, p)| p.author.clone()),
                parent_permlink: op.parent_permlink.clone(),
                category: parent
                    .as_ref()
                    .map(|(_, p)| p.category.clone())
                    .unwrap_or_else(|| op.parent_permlink.clone()),
                root_comment: parent.as_ref().map(|(_, p)| p.root_comment).unwrap_or(id),
                depth: parent.as_ref().map(|(_, p)| p.depth + 1).unwrap_or(0),
                children: 0,
                title: op.title.clone(),
                body: op.body.clone(),
                json_metadata: op.json_metadata.clone(),
                created: now,
                last_update: now,
                active: now,
                last_payout: Timestamp(0),
                cashout_time: cashout,
                max_cashout_time: max_cashout,
                net_rshares: 0,
                abs_rshares: 0,
                vote_rshares: 0,
                children_abs_rshares: 0,
                children_rshares2: 0,
                total_vote_weight: 0,
                reward_weight: PERCENT_100,
                net_votes: 0,
                total_payout_value: Asset::gbd(0),
                curator_payout_value: Asset::gbd(0),
                author_rewards: 0,
                max_accepted_payout: Asset::gbd(i64::MAX / 2),
                percent_grove_dollars: PERCENT_100,
                allow_replies: true,
                allow_votes: true,
                allow_curation_rewards: true,
                beneficiaries: Default::default(),
            });

            // Bump the reply counter along the whole ancestor path.
            let mut ancestor = parent.as_ref().map(|(id, _)| *id);
            while let Some(id) = ancestor {
                chain.store.comments.modify(id, |c| c.children += 1)?;
                let parent_key = chain.store().comments.get(id)?.parent_key();
                ancestor = match parent_key {
                    Some((a, p)) => chain.store().find_comment(&a, &p),
                    None => None,
                };
            }

            chain.store.accounts.modify(author_id, |a| {
                a.post_count += 1;
                a.last_post = now;
                if op.parent_author.is_empty() {
                    a.last_root_post = now;
                }
            })?;
        }
    }
    Ok(())
}

pub(super) fn apply_comment_options(
    chain: &mut Chain,
    op: &CommentOptionsOperation,
) -> Result<(), Error> {
    let comment_id = chain
        .store()
        .find_comment(&op.author, &op.permlink)
        .ok_or_else(|| Error::Precondition(format!("no comment {}/{}", op.author, op.permlink)))?;
    let comment = chain.store().comments.get(comment_id)?.clone();
    require!(
        comment.cashout_time != Timestamp::MAX,
        Precondition,
        "comment is past its payout window"
    );
    // Options only tighten, and only before anyone voted.
    require!(
        op.max_accepted_payout.amount <= comment.max_accepted_payout.amount,
        Precondition,
        "cannot raise the maximum payout"
    );
    require!(
        op.percent_grove_dollars <= comment.percent_grove_dollars,
        Precondition,
        "cannot raise the stable percent"
    );
    require!(
        comment.allow_votes || !op.allow_votes,
        Precondition,
        "cannot re-enable votes"
    );
    if !op.beneficiaries.is_empty() {
        require!(
            comment.abs_rshares == 0,
            Precondition,
            "cannot set beneficiaries after votes"
        );
        require!(
            comment.beneficiaries.is_empty(),
            Precondition,
            "beneficiaries already set"
        );
        for route in op.beneficiaries.iter() {
            chain.get_account_id(&route.account)?;
        }
    }
    chain.store.comments.modify(comment_id, |c| {
        c.max_accepted_payout = op.max_accepted_payout;
        c.percent_grove_dollars = op.percent_grove_dollars;
        c.allow_votes = op.allow_votes;
        c.allow_curation_rewards = op.allow_curation_rewards;
        if !op.beneficiaries.is_empty() {
            c.beneficiaries = op.beneficiaries.clone();
        }
    })?;
    Ok(())
}

pub(super) fn apply_delete_comment(
    chain: &mut Chain,
    op: &DeleteCommentOperation,
) -> Result<(), Error> {
    let comment_id = chain
        .store()
        .find_comment(&op.author, &op.permlink)
        .ok_or_else(|| Error::Precondition(format!("no comment {}/{}", op.author, op.permlink)))?;
    let comment = chain.store().comments.get(comment_id)?.clone();
    require!(comment.children == 0, Precondition, "comment has replies");
    require!(
        comment.net_rshares <= 0,
        Precondition,
        "comment has pending upvotes"
    );
    require!(
        comment.cashout_time != Timestamp::MAX,
        Precondition,
        "comment already paid out"
    );

    // Unwind the rollup and the ancestor reply counters.
    chain.adjust_rshares2(comment_id, rshares_square(comment.net_rshares), 0)?;
    let mut ancestor = comment
        .parent_key()
        .and_then(|(a, p)| chain.store().find_comment(&a, &p));
    while let Some(id) = ancestor {
        chain.store.comments.modify(id, |c| c.children -= 1)?;
        let parent_key = chain.store().comments.get(id)?.parent_key();
        ancestor = match parent_key {
            Some((a, p)) => chain.store().find_comment(&a, &p),
            None => None,
        };
    }

    let votes: Vec<_> = chain
        .store()
        .comment_votes
        .indexes
        .by_comment_voter
        .range((comment_id, AccountName::unchecked(""))..)
        .take_while(|((cid, _), _)| *cid == comment_id)
        .map(|(_, vid)| *vid)
        .collect();
    for vid in votes {
        chain.store.comment_votes.remove(vid)?;
    }
    chain.store.comments.remove(comment_id)?;
    Ok(())
}
