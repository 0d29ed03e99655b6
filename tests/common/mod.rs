// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Shared harness for the consensus scenario tests: a testnet chain in a
//! temporary directory, deterministic keys, and helpers to sign
//! transactions and produce blocks for whichever witness is scheduled.

// Each test binary uses its own slice of the harness.
#![allow(dead_code)]

use grove::blocks::SignedBlock;
use grove::chain::{skip, Chain, Error};
use grove::consensus;
use grove::crypto::SecretKey;
use grove::operations::{
    AccountCreateOperation, Operation, TransferOperation, TransferToVestingOperation,
};
use grove::transaction::{SignedTransaction, Transaction};
use grove::types::{AccountName, Asset, Authority};
use grove::ChainConfig;
use tempfile::TempDir;

pub struct TestChain {
    pub chain: Chain,
    _dir: TempDir,
}

impl TestChain {
    pub fn new() -> TestChain {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let dir = tempfile::tempdir().expect("tempdir");
        let chain = Chain::open(ChainConfig::testnet(), dir.path()).expect("open chain");
        TestChain { chain, _dir: dir }
    }

    /// The deterministic key for a named account (or the seed witness).
    pub fn key(name: &str) -> SecretKey {
        if name == "initwitness" {
            SecretKey::from_seed("grove-testnet-init")
        } else {
            SecretKey::from_seed(name)
        }
    }

    pub fn account(&self, name: &str) -> grove::state::Account {
        let id = self
            .chain
            .store()
            .find_account(&AccountName::from(name))
            .expect("account exists");
        self.chain.store().accounts.get(id).expect("account").clone()
    }

    pub fn balance(&self, name: &str, symbol: grove::types::Symbol) -> Asset {
        let id = self
            .chain
            .store()
            .find_account(&AccountName::from(name))
            .expect("account exists");
        self.chain.get_balance(id, symbol).expect("balance")
    }

    /// Sign a transaction against the current head.
    pub fn tx(&self, operations: Vec<Operation>, signers: &[&SecretKey]) -> SignedTransaction {
        let mut transaction = Transaction {
            expiration: self.chain.head_block_time() + 60,
            operations,
            ..Default::default()
        };
        transaction.set_reference_block(&self.chain.head_block_id());
        transaction
            .sign(signers, &self.chain.chain_id())
            .expect("sign transaction")
    }

    pub fn push(&mut self, operations: Vec<Operation>, signers: &[&SecretKey]) -> Result<(), Error> {
        let tx = self.tx(operations, signers);
        self.chain.push_transaction(tx, skip::NOTHING)
    }

    pub fn push_ok(&mut self, operations: Vec<Operation>, signers: &[&SecretKey]) {
        self.push(operations, signers).expect("transaction applies");
    }

    /// Produce the next block with whichever witness owns the next slot.
    pub fn produce_block(&mut self) -> SignedBlock {
        self.produce_at_slot(1)
    }

    /// Produce a block `slot` slots ahead, skipping the slots between.
    pub fn produce_at_slot(&mut self, slot: u64) -> SignedBlock {
        let when = consensus::get_slot_time(&self.chain, slot);
        let witness = consensus::get_scheduled_witness(&self.chain, slot);
        let key = Self::key(witness.as_str());
        self.chain
            .generate_block(when, witness, &key, skip::NOTHING)
            .expect("produce block")
    }

    pub fn produce_blocks(&mut self, count: u32) {
        for _ in 0..count {
            self.produce_block();
        }
    }

    /// Produce until the chain clock has advanced by `seconds`.
    pub fn produce_for(&mut self, seconds: u32) {
        let target = self.chain.head_block_time() + seconds;
        while self.chain.head_block_time() < target {
            self.produce_block();
        }
    }

    /// Create an account under its deterministic key and fund it.
    pub fn create_funded_account(&mut self, name: &str, liquid: i64, vesting: i64) {
        let key = Self::key(name).public_key();
        let init = Self::key("initwitness");
        self.push_ok(
            vec![Operation::AccountCreate(AccountCreateOperation {
                fee: Asset::grove(1),
                creator: AccountName::from("initwitness"),
                new_account_name: AccountName::from(name),
                owner: Authority::single_key(key),
                active: Authority::single_key(key),
                posting: Authority::single_key(key),
                memo_key: key,
                json_metadata: String::new(),
            })],
            &[&init],
        );
        let mut ops = Vec::new();
        if liquid > 0 {
            ops.push(Operation::Transfer(TransferOperation {
                from: AccountName::from("initwitness"),
                to: AccountName::from(name),
                amount: Asset::grove(liquid),
                memo: String::new(),
            }));
        }
        if vesting > 0 {
            ops.push(Operation::TransferToVesting(TransferToVestingOperation {
                from: AccountName::from("initwitness"),
                to: name.to_owned(),
                amount: Asset::grove(vesting),
            }));
        }
        if !ops.is_empty() {
            self.push_ok(ops, &[&init]);
        }
        self.produce_block();
    }
}
