// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Exchange and margin scenarios: order matching, margin calls triggered
//! by feed moves, and black-swan global settlement.

mod common;

use common::TestChain;
use grove::operations::{
    AssetCreateOperation, AssetOptions, AssetPublishFeedOperation, AssetSettleOperation,
    BitassetOptions, CallOrderUpdateOperation, LimitOrderCancelOperation,
    LimitOrderCreateOperation, Operation, PriceFeed, TransferOperation, VirtualOperation,
};
use grove::types::{AccountName, Asset, Price, Symbol, Timestamp};

fn usd() -> Symbol {
    Symbol::new("USD").unwrap()
}

fn usd_asset(amount: i64) -> Asset {
    Asset::new(amount, usd())
}

fn feed(usd_per_grove: i64) -> PriceFeed {
    PriceFeed {
        settlement_price: Price::new(usd_asset(usd_per_grove * 1000), Asset::grove(1000)),
        maintenance_collateral_ratio: 1750,
        maximum_short_squeeze_ratio: 1100,
    }
}

/// Issuer, market-issued USD backed by the core asset, and an initial
/// feed of two USD per core unit so positions can open cheaply.
fn setup_bitasset(net: &mut TestChain) {
    net.create_funded_account("alice", 1_000_000, 0);
    net.create_funded_account("bob", 1_000_000, 0);
    let alice = TestChain::key("alice");
    net.push_ok(
        vec![Operation::AssetCreate(AssetCreateOperation {
            issuer: AccountName::from("alice"),
            symbol: usd(),
            precision: 3,
            options: AssetOptions {
                max_supply: 1_000_000_000,
                market_fee_percent: 0,
                max_market_fee: 0,
                whitelist_authorities: Default::default(),
                description: String::new(),
            },
            bitasset_options: Some(BitassetOptions {
                feed_lifetime_secs: 24 * 60 * 60,
                minimum_feeds: 1,
                force_settlement_delay_secs: 60,
                force_settlement_offset_percent: 0,
                short_backing_asset: Symbol::GROVE,
            }),
            is_prediction_market: false,
        })],
        &[&alice],
    );
    let init = TestChain::key("initwitness");
    net.push_ok(
        vec![Operation::AssetPublishFeed(AssetPublishFeedOperation {
            publisher: AccountName::from("initwitness"),
            asset_symbol: usd(),
            feed: feed(2),
        })],
        &[&init],
    );
    net.produce_block();
}

fn open_position(net: &mut TestChain, collateral: i64, debt: i64) {
    let bob = TestChain::key("bob");
    net.push_ok(
        vec![Operation::CallOrderUpdate(CallOrderUpdateOperation {
            funding_account: AccountName::from("bob"),
            delta_collateral: Asset::grove(collateral),
            delta_debt: usd_asset(debt),
        })],
        &[&bob],
    );
    // The borrowed supply moves to the issuer so it can sit on the book.
    net.push_ok(
        vec![Operation::Transfer(TransferOperation {
            from: AccountName::from("bob"),
            to: AccountName::from("alice"),
            amount: usd_asset(debt),
            memo: String::new(),
        })],
        &[&bob],
    );
    let alice = TestChain::key("alice");
    net.push_ok(
        vec![Operation::LimitOrderCreate(LimitOrderCreateOperation {
            owner: AccountName::from("alice"),
            order_id: 7,
            amount_to_sell: usd_asset(debt),
            min_to_receive: Asset::grove(120_000),
            fill_or_kill: false,
            expiration: Timestamp::MAX,
        })],
        &[&alice],
    );
    net.produce_block();
}

fn usd_supply(net: &TestChain) -> i64 {
    let id = net.chain.store().asset_dynamic.indexes.by_symbol[&usd()];
    net.chain
        .store()
        .asset_dynamic
        .get(id)
        .expect("dynamic data")
        .current_supply
}

#[test]
fn margin_call_fills_against_best_bid() {
    let mut net = TestChain::new();
    setup_bitasset(&mut net);
    open_position(&mut net, 150_000, 100_000);

    let bob_before = net.balance("bob", Symbol::GROVE);
    let alice_before = net.balance("alice", Symbol::GROVE);

    // The feed halves: the position falls below maintenance while the
    // resting bid still beats its swan price.
    let init = TestChain::key("initwitness");
    net.push_ok(
        vec![Operation::AssetPublishFeed(AssetPublishFeedOperation {
            publisher: AccountName::from("initwitness"),
            asset_symbol: usd(),
            feed: feed(1),
        })],
        &[&init],
    );
    net.produce_block();

    // The call covered its 100k USD debt with 120k collateral; the rest
    // came home to the borrower.
    assert!(net
        .chain
        .store()
        .call_orders
        .indexes
        .by_account
        .get(&(AccountName::from("bob"), usd()))
        .is_none());
    assert_eq!(
        net.balance("bob", Symbol::GROVE),
        bob_before + Asset::grove(30_000)
    );
    assert_eq!(
        net.balance("alice", Symbol::GROVE),
        alice_before + Asset::grove(120_000)
    );
    // Covered debt burned out of supply.
    assert_eq!(usd_supply(&net), 0);
    assert_eq!(net.balance("alice", usd()), usd_asset(0));

    let vops = net.chain.recent_virtual_ops();
    assert!(vops
        .iter()
        .any(|op| matches!(op, VirtualOperation::FillCallOrder { .. })));
    assert!(vops
        .iter()
        .any(|op| matches!(op, VirtualOperation::FillOrder { .. })));
}

#[test]
fn black_swan_settles_globally() {
    let mut net = TestChain::new();
    setup_bitasset(&mut net);
    // Thin collateral: the squeeze bound is out of reach once the feed
    // halves.
    open_position(&mut net, 105_000, 100_000);

    let init = TestChain::key("initwitness");
    net.push_ok(
        vec![Operation::AssetPublishFeed(AssetPublishFeedOperation {
            publisher: AccountName::from("initwitness"),
            asset_symbol: usd(),
            feed: feed(1),
        })],
        &[&init],
    );
    net.produce_block();

    let bid = net.chain.store().asset_bitassets.indexes.by_symbol[&usd()];
    let bitasset = net
        .chain
        .store()
        .asset_bitassets
        .get(bid)
        .expect("bitasset")
        .clone();
    assert!(bitasset.has_settlement());
    assert_eq!(bitasset.settlement_fund, 105_000);
    let settle_price = bitasset.settlement_price.expect("swan price");
    assert_eq!(settle_price.base, usd_asset(100_000));
    assert_eq!(settle_price.quote, Asset::grove(105_000));
    // Supply survives the swan; holders settle against the fund.
    assert_eq!(usd_supply(&net), 100_000);

    // The issuer pulls its resting order back and settles everything.
    let alice = TestChain::key("alice");
    net.push_ok(
        vec![Operation::LimitOrderCancel(LimitOrderCancelOperation {
            owner: AccountName::from("alice"),
            order_id: 7,
        })],
        &[&alice],
    );
    let alice_grove_before = net.balance("alice", Symbol::GROVE);
    net.push_ok(
        vec![Operation::AssetSettle(AssetSettleOperation {
            account: AccountName::from("alice"),
            amount: usd_asset(100_000),
        })],
        &[&alice],
    );
    net.produce_block();

    assert_eq!(usd_supply(&net), 0);
    assert_eq!(
        net.balance("alice", Symbol::GROVE),
        alice_grove_before + Asset::grove(105_000)
    );
    let bitasset = net
        .chain
        .store()
        .asset_bitassets
        .get(bid)
        .expect("bitasset");
    assert_eq!(bitasset.settlement_fund, 0);
}

#[test]
fn plain_orders_match_at_maker_price() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 1_000_000, 0);
    net.create_funded_account("bob", 1_000_000, 0);
    // Give bob stable tokens to trade with: alice issues a plain asset.
    let alice = TestChain::key("alice");
    net.push_ok(
        vec![Operation::AssetCreate(AssetCreateOperation {
            issuer: AccountName::from("alice"),
            symbol: Symbol::new("TOK").unwrap(),
            precision: 3,
            options: AssetOptions {
                max_supply: 1_000_000_000,
                market_fee_percent: 0,
                max_market_fee: 0,
                whitelist_authorities: Default::default(),
                description: String::new(),
            },
            bitasset_options: None,
            is_prediction_market: false,
        })],
        &[&alice],
    );
    net.push_ok(
        vec![Operation::AssetIssue(grove::operations::AssetIssueOperation {
            issuer: AccountName::from("alice"),
            asset_to_issue: Asset::new(500_000, Symbol::new("TOK").unwrap()),
            issue_to_account: AccountName::from("bob"),
        })],
        &[&alice],
    );
    net.produce_block();

    let tok = Symbol::new("TOK").unwrap();
    // Maker: bob sells 500k TOK for 50k GRV (rate 10 TOK per GRV).
    let bob = TestChain::key("bob");
    net.push_ok(
        vec![Operation::LimitOrderCreate(LimitOrderCreateOperation {
            owner: AccountName::from("bob"),
            order_id: 1,
            amount_to_sell: Asset::new(500_000, tok),
            min_to_receive: Asset::grove(50_000),
            fill_or_kill: false,
            expiration: Timestamp::MAX,
        })],
        &[&bob],
    );
    // Taker: alice pays 10k GRV expecting at least 80k TOK; fills at the
    // maker's better rate.
    net.push_ok(
        vec![Operation::LimitOrderCreate(LimitOrderCreateOperation {
            owner: AccountName::from("alice"),
            order_id: 2,
            amount_to_sell: Asset::grove(10_000),
            min_to_receive: Asset::new(80_000, tok),
            fill_or_kill: false,
            expiration: Timestamp::MAX,
        })],
        &[&alice],
    );
    net.produce_block();

    assert_eq!(net.balance("alice", tok), Asset::new(100_000, tok));
    assert_eq!(net.balance("bob", Symbol::GROVE), Asset::grove(1_000_000 + 10_000));
    // The maker's remainder still rests.
    let maker = net
        .chain
        .store()
        .limit_orders
        .indexes
        .by_account
        .get(&(AccountName::from("bob"), 1))
        .copied()
        .expect("maker still on book");
    assert_eq!(
        net.chain.store().limit_orders.get(maker).unwrap().for_sale,
        400_000
    );
}
