// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Controller-level scenarios: transfers, fork switching, pop/reindex
//! round trips, and the pending pool lifecycle.

mod common;

use common::TestChain;
use grove::chain::skip;
use grove::operations::{Operation, TransferOperation, WitnessUpdateOperation};
use grove::types::{AccountName, Asset, Symbol};

fn transfer(from: &str, to: &str, amount: i64) -> Operation {
    Operation::Transfer(TransferOperation {
        from: AccountName::from(from),
        to: AccountName::from(to),
        amount: Asset::grove(amount),
        memo: String::new(),
    })
}

#[test]
fn basic_transfer_conserves_supply() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);

    let supply_before = net.chain.dgp().current_supply;
    let alice_key = TestChain::key("alice");
    net.push_ok(vec![transfer("alice", "bob", 10_000)], &[&alice_key]);
    net.produce_block();

    assert_eq!(net.balance("alice", Symbol::GROVE), Asset::grove(90_000));
    assert_eq!(net.balance("bob", Symbol::GROVE), Asset::grove(10_000));
    // Two blocks of inflation aside, nothing else moved supply.
    let minted = net.chain.dgp().current_supply - supply_before;
    assert!(minted.amount >= 0);
    let without_inflation = net.balance("alice", Symbol::GROVE)
        + net.balance("bob", Symbol::GROVE);
    assert_eq!(without_inflation, Asset::grove(100_000));
}

#[test]
fn insufficient_funds_rejected() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100, 0);
    net.create_funded_account("bob", 0, 0);
    let alice_key = TestChain::key("alice");
    let err = net
        .push(vec![transfer("alice", "bob", 1_000)], &[&alice_key])
        .unwrap_err();
    assert!(err.to_string().contains("insufficient"));
}

#[test]
fn wrong_signature_rejected() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);
    let bob_key = TestChain::key("bob");
    let err = net
        .push(vec![transfer("alice", "bob", 10)], &[&bob_key])
        .unwrap_err();
    assert!(err.to_string().contains("authority"));
}

#[test]
fn pending_pool_clears_after_inclusion() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);
    let alice_key = TestChain::key("alice");
    net.push_ok(vec![transfer("alice", "bob", 10)], &[&alice_key]);
    assert_eq!(net.chain.pending_transactions().len(), 1);
    net.produce_block();
    assert!(net.chain.pending_transactions().is_empty());
}

#[test]
fn duplicate_transaction_rejected() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);
    let alice_key = TestChain::key("alice");
    let tx = net.tx(vec![transfer("alice", "bob", 10)], &[&alice_key]);
    net.chain.push_transaction(tx.clone(), skip::NOTHING).unwrap();
    let err = net.chain.push_transaction(tx, skip::NOTHING).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn apply_then_pop_restores_state() {
    let mut net = TestChain::new();
    // A lone witness confirms its own blocks instantly, which would pin
    // the head as irreversible; widen the set so the head stays
    // reversible.
    widen_witness_set(&mut net);
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);

    let head_before = net.chain.head_block_id();
    let supply_before = net.chain.dgp().current_supply;
    let alice_before = net.balance("alice", Symbol::GROVE);

    let alice_key = TestChain::key("alice");
    net.push_ok(vec![transfer("alice", "bob", 10_000)], &[&alice_key]);
    net.produce_block();
    assert_ne!(net.chain.head_block_id(), head_before);

    net.chain.pop_block().expect("pop head");
    assert_eq!(net.chain.head_block_id(), head_before);
    assert_eq!(net.chain.dgp().current_supply, supply_before);
    assert_eq!(net.balance("alice", Symbol::GROVE), alice_before);
    // The popped payload is back in the queue.
    assert_eq!(net.chain.pending_transactions().len(), 1);
}

#[test]
fn reindex_reproduces_state() {
    let mut net = TestChain::new();
    net.create_funded_account("alice", 100_000, 0);
    net.create_funded_account("bob", 0, 0);
    let alice_key = TestChain::key("alice");
    net.push_ok(vec![transfer("alice", "bob", 25_000)], &[&alice_key]);
    net.produce_blocks(3);

    let head = net.chain.head_block_id();
    let supply = net.chain.dgp().current_supply;
    let alice = net.balance("alice", Symbol::GROVE);

    net.chain.reindex().expect("reindex");
    assert_eq!(net.chain.head_block_id(), head);
    assert_eq!(net.chain.dgp().current_supply, supply);
    assert_eq!(net.balance("alice", Symbol::GROVE), alice);
}

/// Register two extra producers so irreversibility stalls and the fork
/// database can hold competing branches.
fn widen_witness_set(net: &mut TestChain) {
    for name in ["witforka", "witforkb"] {
        net.create_funded_account(name, 10_000, 0);
        let key = TestChain::key(name);
        net.push_ok(
            vec![Operation::WitnessUpdate(WitnessUpdateOperation {
                owner: AccountName::from(name),
                url: format!("https://{name}.example"),
                block_signing_key: Some(key.public_key()),
                props: Default::default(),
                fee: Asset::grove(0),
            })],
            &[&key],
        );
    }
    net.produce_blocks(4);
    assert!(
        net.chain.store().witness_schedule.get().num_scheduled_witnesses >= 3,
        "witness set did not widen"
    );
}

#[test]
fn fork_switch_adopts_longer_branch() {
    let mut observer = TestChain::new();
    widen_witness_set(&mut observer);
    observer.create_funded_account("alice", 100_000, 0);
    observer.create_funded_account("bob", 0, 0);

    // A second node replays the observer's history so both sit on the
    // same head.
    let mut producer = TestChain::new();
    let head = observer.chain.head_block_num();
    for num in 1..=head {
        let block = observer
            .chain
            .fetch_block_by_number(num)
            .expect("fetch")
            .expect("block exists");
        producer.chain.push_block(block, skip::NOTHING).expect("sync");
    }
    assert_eq!(producer.chain.head_block_id(), observer.chain.head_block_id());

    // The observer extends with a transfer-bearing block at slot 1.
    let alice_key = TestChain::key("alice");
    let tx = observer.tx(
        vec![transfer("alice", "bob", 10_000)],
        &[&alice_key],
    );
    observer
        .chain
        .push_transaction(tx.clone(), skip::NOTHING)
        .expect("queue transfer");
    let local = observer.produce_block();

    // The producer, unaware, builds a heavier empty branch.
    let remote1 = producer.produce_at_slot(2);
    let remote2 = producer.produce_at_slot(1);
    assert_eq!(remote2.block_num(), local.block_num() + 1);

    // Same-height sibling: stored, no switch.
    let switched = observer
        .chain
        .push_block(remote1.clone(), skip::NOTHING)
        .expect("push sibling");
    assert!(!switched);
    assert_eq!(observer.chain.head_block_id(), local.id().unwrap());

    // The taller branch arrives and wins.
    let switched = observer
        .chain
        .push_block(remote2.clone(), skip::NOTHING)
        .expect("push heavier branch");
    assert!(switched);
    assert_eq!(observer.chain.head_block_id(), remote2.id().unwrap());
    // The orphaned transfer is back in the pending pool.
    let pending_ids: Vec<_> = observer
        .chain
        .pending_transactions()
        .iter()
        .map(|t| t.id().unwrap())
        .collect();
    assert!(pending_ids.contains(&tx.id().unwrap()));
}
