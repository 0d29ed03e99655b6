// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Reward-engine scenarios: comment cashouts with curator splits, and the
//! vesting-withdrawal schedule with routes.

mod common;

use common::TestChain;
use grove::operations::{
    CommentOperation, FeedPublishOperation, Operation, SetWithdrawVestingRouteOperation,
    TransferToVestingOperation, VoteOperation, WithdrawVestingOperation, PERCENT_100,
};
use grove::types::{AccountName, Asset, Price, Symbol, Timestamp};

/// Publish a one-to-one stable feed and wait for the median window.
fn establish_feed(net: &mut TestChain) {
    let init = TestChain::key("initwitness");
    net.push_ok(
        vec![Operation::FeedPublish(FeedPublishOperation {
            publisher: AccountName::from("initwitness"),
            exchange_rate: Price::new(Asset::gbd(1000), Asset::grove(1000)),
        })],
        &[&init],
    );
    // The feed interval folds witness rates into the history median.
    net.produce_blocks(21);
    assert!(net
        .chain
        .store()
        .feed_history
        .get()
        .current_median_history
        .is_some());
}

#[test]
fn comment_cashout_pays_author_and_curators() {
    let mut net = TestChain::new();
    establish_feed(&mut net);
    net.create_funded_account("carol", 10_000, 10_000);
    net.create_funded_account("votera", 0, 500_000);
    net.create_funded_account("voterb", 0, 500_000);

    let carol = TestChain::key("carol");
    net.push_ok(
        vec![Operation::Comment(CommentOperation {
            parent_author: String::new(),
            parent_permlink: "life".into(),
            author: AccountName::from("carol"),
            permlink: "first-post".into(),
            title: "first".into(),
            body: "hello".into(),
            json_metadata: String::new(),
        })],
        &[&carol],
    );
    net.produce_block();

    // Voting past the reverse-auction window keeps full curation weight.
    net.produce_for(31);
    for voter in ["votera", "voterb"] {
        let key = TestChain::key(voter);
        net.push_ok(
            vec![Operation::Vote(VoteOperation {
                voter: AccountName::from(voter),
                author: AccountName::from("carol"),
                permlink: "first-post".into(),
                weight: PERCENT_100 as i16,
            })],
            &[&key],
        );
        net.produce_block();
    }

    let comment_id = net
        .chain
        .store()
        .find_comment(&AccountName::from("carol"), "first-post")
        .expect("comment");
    let before = net.chain.store().comments.get(comment_id).unwrap().clone();
    assert!(before.net_rshares > 0);
    assert!(before.total_vote_weight > 0);

    let carol_gbd_before = net.balance("carol", Symbol::GBD);
    let carol_vests_before = net.balance("carol", Symbol::VESTS);
    let votera_vests_before = net.balance("votera", Symbol::VESTS);
    let voterb_vests_before = net.balance("voterb", Symbol::VESTS);

    // Ride out the cashout window.
    let window = net.chain.config().cashout_window_secs;
    net.produce_for(window + 6);

    let after = net.chain.store().comments.get(comment_id).unwrap().clone();
    assert_eq!(after.net_rshares, 0);
    assert_eq!(after.vote_rshares, 0);
    assert_eq!(after.total_vote_weight, 0);
    assert_eq!(after.cashout_time, Timestamp::MAX);
    assert!(after.author_rewards > 0);

    // The author took a stable leg and a vesting leg.
    assert!(net.balance("carol", Symbol::GBD) > carol_gbd_before);
    assert!(net.balance("carol", Symbol::VESTS) > carol_vests_before);

    // Curators split the pool by weight: the earlier voter's share is at
    // least the later one's, and both got something.
    let a_gain = (net.balance("votera", Symbol::VESTS) - votera_vests_before).amount;
    let b_gain = (net.balance("voterb", Symbol::VESTS) - voterb_vests_before).amount;
    assert!(a_gain > 0, "first curator was paid");
    assert!(b_gain > 0, "second curator was paid");
    assert!(a_gain >= b_gain, "earlier vote cannot earn less");

    // Curation is a quarter of the distributed total, modulo rounding
    // dust that stays in the fund.
    let author_side = after.total_payout_value.amount;
    let curator_side = after.curator_payout_value.amount;
    assert!(curator_side > 0);
    let total = author_side + curator_side;
    let expected_curation = total / 4;
    let tolerance = total / 50 + 2;
    assert!(
        (curator_side - expected_curation).abs() <= tolerance,
        "curation share {curator_side} strays from a quarter of {total}"
    );
}

#[test]
fn vesting_withdrawal_routes_and_installments() {
    let mut net = TestChain::new();
    net.create_funded_account("edgar", 10_000, 0);
    net.create_funded_account("dave", 10_000, 0);

    // Stake enough that the installment math is visible.
    let edgar = TestChain::key("edgar");
    net.push_ok(
        vec![Operation::TransferToVesting(TransferToVestingOperation {
            from: AccountName::from("initwitness"),
            to: "edgar".into(),
            amount: Asset::grove(130_000),
        })],
        &[&TestChain::key("initwitness")],
    );
    net.produce_block();

    let vests = net.balance("edgar", Symbol::VESTS);
    assert!(vests.amount > 0);
    let to_withdraw = vests.amount / 10;
    let intervals = net.chain.config().vesting_withdraw_intervals as i64;

    net.push_ok(
        vec![
            Operation::WithdrawVesting(WithdrawVestingOperation {
                account: AccountName::from("edgar"),
                vesting_shares: Asset::vests(to_withdraw),
            }),
            Operation::SetWithdrawVestingRoute(SetWithdrawVestingRouteOperation {
                from_account: AccountName::from("edgar"),
                to_account: AccountName::from("dave"),
                percent: PERCENT_100 / 2,
                auto_vest: true,
            }),
        ],
        &[&edgar],
    );
    net.produce_block();

    let edgar_account = net.account("edgar");
    let rate = edgar_account.vesting_withdraw_rate.amount;
    assert_eq!(rate, (to_withdraw / intervals).max(1));
    let first_due = edgar_account.next_vesting_withdrawal;
    assert_ne!(first_due, Timestamp::MAX);

    let dave_vests_before = net.balance("dave", Symbol::VESTS);
    let edgar_vests_before = net.balance("edgar", Symbol::VESTS);
    let edgar_grove_before = net.balance("edgar", Symbol::GROVE);

    // Cross the first installment boundary.
    while net.chain.head_block_time() < first_due {
        net.produce_block();
    }
    net.produce_block();

    let routed = rate / 2;
    assert_eq!(
        net.balance("dave", Symbol::VESTS),
        dave_vests_before + Asset::vests(routed)
    );
    assert_eq!(
        net.balance("edgar", Symbol::VESTS),
        edgar_vests_before - Asset::vests(rate)
    );
    // The unrouted half converts to liquid at the share price.
    assert!(net.balance("edgar", Symbol::GROVE) > edgar_grove_before);

    let edgar_account = net.account("edgar");
    assert_eq!(edgar_account.withdrawn, rate);
    assert_eq!(
        edgar_account.next_vesting_withdrawal,
        first_due + net.chain.config().vesting_withdraw_interval_secs
    );
}

#[test]
fn reply_pays_from_comment_fund_after_split() {
    let mut net = TestChain::new();
    establish_feed(&mut net);
    net.create_funded_account("carol", 10_000, 10_000);
    net.create_funded_account("erin", 10_000, 100_000);

    let carol = TestChain::key("carol");
    net.push_ok(
        vec![Operation::Comment(CommentOperation {
            parent_author: String::new(),
            parent_permlink: "life".into(),
            author: AccountName::from("carol"),
            permlink: "root".into(),
            title: "t".into(),
            body: "b".into(),
            json_metadata: String::new(),
        })],
        &[&carol],
    );
    net.produce_block();

    let erin = TestChain::key("erin");
    net.push_ok(
        vec![Operation::Comment(CommentOperation {
            parent_author: "carol".into(),
            parent_permlink: "root".into(),
            author: AccountName::from("erin"),
            permlink: "reply".into(),
            title: String::new(),
            body: "nice".into(),
            json_metadata: String::new(),
        })],
        &[&erin],
    );
    net.produce_block();
    net.produce_for(31);
    net.push_ok(
        vec![Operation::Vote(VoteOperation {
            voter: AccountName::from("erin"),
            author: AccountName::from("erin"),
            permlink: "reply".into(),
            weight: PERCENT_100 as i16,
        })],
        &[&erin],
    );

    // All hardforks are live on the testnet, so both funds exist.
    let funds = &net.chain.store().reward_funds.indexes.by_name;
    assert!(funds.contains_key("post"));
    assert!(funds.contains_key("comment"));

    let comment_fund_id = funds["comment"];
    let fund_before = net
        .chain
        .store()
        .reward_funds
        .get(comment_fund_id)
        .unwrap()
        .recent_rshares2;

    let window = net.chain.config().cashout_window_secs;
    net.produce_for(window + 6);

    let reply_id = net
        .chain
        .store()
        .find_comment(&AccountName::from("erin"), "reply")
        .expect("reply");
    let reply = net.chain.store().comments.get(reply_id).unwrap();
    assert_eq!(reply.cashout_time, Timestamp::MAX);
    assert!(reply.author_rewards > 0);
    // The claim was recorded against the comment fund.
    let fund_after = net
        .chain
        .store()
        .reward_funds
        .get(comment_fund_id)
        .unwrap()
        .recent_rshares2;
    assert!(fund_after > fund_before);
}
