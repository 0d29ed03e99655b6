// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The chain controller. One [`Chain`] value owns the object store, the
//! fork database and the block log, and is the only path through which
//! state mutates. Callers wrap it in [`SharedChain`] and take the write
//! lock for every mutating entry point; evaluation inside the lock is
//! synchronous and deterministic.

pub mod block_log;
mod error;
pub mod fork_db;

mod apply;
mod hardfork;
mod housekeeping;
mod invariants;
mod push;

pub use block_log::BlockLog;
pub use error::Error;
pub(crate) use error::require;
pub use fork_db::ForkDatabase;

use crate::crypto::Digest;
use crate::networks::ChainConfig;
use crate::operations::{VirtualOperation, PERCENT_100};
use crate::state::{
    AccountBalance, AccountId, DynamicGlobalProperties, Store, WitnessId,
};
use crate::transaction::{SignedTransaction, TransactionId};
use crate::types::{AccountName, Asset, Symbol, Timestamp};
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Validation steps that replay and tests may bypass.
pub mod skip {
    pub const NOTHING: u32 = 0;
    pub const WITNESS_SIGNATURE: u32 = 1 << 0;
    pub const TRANSACTION_SIGNATURES: u32 = 1 << 1;
    pub const TRANSACTION_DUPE_CHECK: u32 = 1 << 2;
    pub const TAPOS_CHECK: u32 = 1 << 3;
    pub const MERKLE_CHECK: u32 = 1 << 4;
    pub const WITNESS_SCHEDULE_CHECK: u32 = 1 << 5;
    pub const AUTHORITY_CHECK: u32 = 1 << 6;
    pub const VALIDATE_OPERATIONS: u32 = 1 << 7;
    pub const VALIDATE_INVARIANTS: u32 = 1 << 8;
    pub const BANDWIDTH_CHECK: u32 = 1 << 9;
    pub const BLOCK_SIZE_CHECK: u32 = 1 << 10;

    /// Everything that is safe to skip when replaying our own log.
    pub const REPLAY: u32 = WITNESS_SIGNATURE
        | TRANSACTION_SIGNATURES
        | TRANSACTION_DUPE_CHECK
        | TAPOS_CHECK
        | MERKLE_CHECK
        | AUTHORITY_CHECK
        | VALIDATE_OPERATIONS
        | BANDWIDTH_CHECK;
}

/// What observers see for each applied operation.
#[derive(Clone, Debug)]
pub enum NotifiedOperation {
    User(crate::operations::Operation),
    Virtual(VirtualOperation),
}

#[derive(Clone, Debug)]
pub struct OperationNotification {
    pub trx_id: Option<TransactionId>,
    pub block_num: u32,
    pub timestamp: Timestamp,
    pub op: NotifiedOperation,
}

type OperationObserver = Box<dyn FnMut(&OperationNotification) + Send>;

/// The chain behind its write lock.
pub type SharedChain = Arc<RwLock<Chain>>;

pub struct Chain {
    pub(crate) store: Store,
    pub(crate) fork_db: ForkDatabase,
    pub(crate) block_log: BlockLog,
    config: ChainConfig,

    pending_transactions: Vec<SignedTransaction>,
    pending_session_open: bool,

    /// Id of the transaction currently evaluating, for notifications and
    /// error annotation.
    current_trx_id: Option<TransactionId>,
    /// Virtual operations emitted while applying the current block.
    block_virtual_ops: Vec<VirtualOperation>,
    observers: Vec<OperationObserver>,

    next_flush_block: u32,
    flush_rng: rand::rngs::StdRng,
}

impl Chain {
    /// Open the chain in `data_dir`: seed genesis on an empty log, replay
    /// the log otherwise.
    pub fn open(config: ChainConfig, data_dir: &Path) -> Result<Chain, Error> {
        let block_log = BlockLog::open(data_dir)?;
        let mut chain = Chain {
            store: Store::default(),
            fork_db: ForkDatabase::default(),
            block_log,
            config,
            pending_transactions: Vec::new(),
            pending_session_open: false,
            current_trx_id: None,
            block_virtual_ops: Vec::new(),
            observers: Vec::new(),
            next_flush_block: 0,
            flush_rng: rand::rngs::StdRng::seed_from_u64(0),
        };
        crate::genesis::init_genesis(&mut chain)?;
        if !chain.block_log.is_empty() {
            chain.replay_log()?;
        }
        chain.schedule_next_flush();
        Ok(chain)
    }

    /// Wipe the object store and re-apply every block in the log with the
    /// replay skip set.
    pub fn reindex(&mut self) -> Result<(), Error> {
        info!("reindexing from block log, head {}", self.block_log.head_block_num());
        self.clear_pending();
        self.store = Store::default();
        self.fork_db.reset();
        crate::genesis::init_genesis(self)?;
        self.replay_log()
    }

    fn replay_log(&mut self) -> Result<(), Error> {
        let head = self.block_log.head_block_num();
        // Each block is applied exactly once; the half-open cursor cannot
        // visit the head twice.
        for num in 1..=head {
            let block = self.block_log.read_block(num)?;
            if num % 100_000 == 0 {
                debug!("replay at block {num}");
            }
            self.apply_block_raw(&block, skip::REPLAY | skip::VALIDATE_INVARIANTS)?;
            // Logged blocks are irreversible by definition.
            self.store.commit(u64::from(num));
        }
        if head > 0 {
            self.store
                .dgp
                .modify(|dgp| dgp.last_irreversible_block_num = head);
            let block = self.block_log.read_block(head)?;
            self.fork_db.start_block(block);
        }
        info!("replay complete at block {head}");
        Ok(())
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn chain_id(&self) -> Digest {
        self.config.chain_id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn dgp(&self) -> &DynamicGlobalProperties {
        self.store.dgp.get()
    }

    pub fn head_block_num(&self) -> u32 {
        self.dgp().head_block_number
    }

    pub fn head_block_id(&self) -> crate::blocks::BlockId {
        self.dgp().head_block_id
    }

    pub fn head_block_time(&self) -> Timestamp {
        self.dgp().time
    }

    pub fn pending_transactions(&self) -> &[SignedTransaction] {
        &self.pending_transactions
    }

    /// Monotonic count of applied hardforks; the single conditional every
    /// component gates behavior on.
    pub fn hardfork_level(&self) -> u32 {
        self.store.hardforks.get().last_hardfork
    }

    pub fn has_hardfork(&self, hardfork: u32) -> bool {
        self.hardfork_level() >= hardfork
    }

    /// Register an applied-operation observer. Handlers run synchronously
    /// inside the write lock and must not re-enter the chain.
    pub fn subscribe_operations(&mut self, observer: OperationObserver) {
        self.observers.push(observer);
    }

    /// Virtual operations emitted by the most recently applied block.
    pub fn recent_virtual_ops(&self) -> &[VirtualOperation] {
        &self.block_virtual_ops
    }

    // ---- account and balance helpers used across evaluators ----

    pub fn get_account_id(&self, name: &AccountName) -> Result<AccountId, Error> {
        self.store
            .find_account(name)
            .ok_or_else(|| Error::Precondition(format!("unknown account {name}")))
    }

    pub fn get_witness_id(&self, name: &AccountName) -> Result<WitnessId, Error> {
        self.store
            .find_witness(name)
            .ok_or_else(|| Error::Precondition(format!("unknown witness {name}")))
    }

    pub fn get_balance(&self, id: AccountId, symbol: Symbol) -> Result<Asset, Error> {
        let account = self.store.accounts.get(id)?;
        if symbol == Symbol::GROVE {
            Ok(account.balance)
        } else if symbol == Symbol::GBD {
            Ok(account.gbd_balance)
        } else if symbol == Symbol::VESTS {
            Ok(account.vesting_shares)
        } else {
            let amount = self
                .store
                .account_balances
                .indexes
                .by_owner_symbol
                .get(&(account.name.clone(), symbol))
                .and_then(|bid| self.store.account_balances.get(*bid).ok())
                .map(|b| b.balance)
                .unwrap_or(0);
            Ok(Asset::new(amount, symbol))
        }
    }

    /// Credit or debit a liquid balance. Debits below zero fail; stable
    /// balances accrue interest on touch.
    pub fn adjust_balance(&mut self, id: AccountId, delta: Asset) -> Result<(), Error> {
        if delta.symbol == Symbol::GROVE {
            let balance = self.store.accounts.get(id)?.balance;
            let next = balance
                .checked_add(delta)
                .ok_or_else(|| Error::Fatal("core balance overflow".into()))?;
            require!(
                next.amount >= 0,
                Precondition,
                "insufficient funds: have {balance}, need {}",
                -delta.amount
            );
            self.store.accounts.modify(id, |a| a.balance = next)?;
        } else if delta.symbol == Symbol::GBD {
            self.accrue_gbd_interest(id)?;
            let balance = self.store.accounts.get(id)?.gbd_balance;
            let next = balance
                .checked_add(delta)
                .ok_or_else(|| Error::Fatal("stable balance overflow".into()))?;
            require!(
                next.amount >= 0,
                Precondition,
                "insufficient stable funds: have {balance}, need {}",
                -delta.amount
            );
            self.store.accounts.modify(id, |a| a.gbd_balance = next)?;
        } else if delta.symbol == Symbol::VESTS {
            return Err(Error::Fatal(
                "vesting shares move through create_vesting/withdraw paths".into(),
            ));
        } else {
            self.adjust_user_balance(id, delta.symbol, delta.amount)?;
        }
        Ok(())
    }

    fn adjust_user_balance(&mut self, id: AccountId, symbol: Symbol, delta: i64) -> Result<(), Error> {
        let owner = self.store.accounts.get(id)?.name.clone();
        let key = (owner.clone(), symbol);
        match self.store.account_balances.indexes.by_owner_symbol.get(&key) {
            Some(&bid) => {
                let balance = self.store.account_balances.get(bid)?.balance;
                let next = balance
                    .checked_add(delta)
                    .ok_or_else(|| Error::Fatal("asset balance overflow".into()))?;
                require!(
                    next >= 0,
                    Precondition,
                    "insufficient {symbol}: have {balance}, need {}",
                    -delta
                );
                if next == 0 {
                    self.store.account_balances.remove(bid)?;
                } else {
                    self.store
                        .account_balances
                        .modify(bid, |b| b.balance = next)?;
                }
            }
            None => {
                require!(
                    delta >= 0,
                    Precondition,
                    "insufficient {symbol}: have 0, need {}",
                    -delta
                );
                if delta > 0 {
                    self.store.account_balances.insert(|_| AccountBalance {
                        owner: owner.clone(),
                        symbol,
                        balance: delta,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn adjust_savings_balance(&mut self, id: AccountId, delta: Asset) -> Result<(), Error> {
        let account = self.store.accounts.get(id)?;
        let (balance, is_gbd) = if delta.symbol == Symbol::GROVE {
            (account.savings_balance, false)
        } else if delta.symbol == Symbol::GBD {
            (account.savings_gbd_balance, true)
        } else {
            return Err(Error::Validation(format!(
                "savings do not hold {}",
                delta.symbol
            )));
        };
        let next = balance
            .checked_add(delta)
            .ok_or_else(|| Error::Fatal("savings overflow".into()))?;
        require!(
            next.amount >= 0,
            Precondition,
            "insufficient savings: have {balance}, need {}",
            -delta.amount
        );
        self.store.accounts.modify(id, |a| {
            if is_gbd {
                a.savings_gbd_balance = next;
            } else {
                a.savings_balance = next;
            }
        })?;
        Ok(())
    }

    /// Track circulating supply as balances enter or leave existence.
    pub fn adjust_supply(&mut self, delta: Asset) -> Result<(), Error> {
        if delta.symbol == Symbol::GROVE {
            self.store.dgp.modify(|dgp| {
                dgp.current_supply += delta;
                dgp.virtual_supply += delta;
            });
        } else if delta.symbol == Symbol::GBD {
            let median = self.store.feed_history.get().current_median_history;
            self.store.dgp.modify(|dgp| {
                dgp.current_gbd_supply += delta;
                if let Some(median) = median {
                    dgp.virtual_supply =
                        dgp.current_supply + dgp.current_gbd_supply.convert(&median);
                }
            });
        } else {
            let symbol = delta.symbol;
            let did = self
                .store
                .asset_dynamic
                .indexes
                .by_symbol
                .get(&symbol)
                .copied()
                .ok_or_else(|| Error::Precondition(format!("unknown asset {symbol}")))?;
            self.store.asset_dynamic.modify(did, |d| {
                d.current_supply += delta.amount;
            })?;
        }
        Ok(())
    }

    /// Move liquid core into the vesting fund, crediting shares at the
    /// pre-deposit price. Returns the shares created.
    pub fn create_vesting(&mut self, id: AccountId, amount: Asset) -> Result<Asset, Error> {
        debug_assert_eq!(amount.symbol, Symbol::GROVE);
        let share_price = self.dgp().vesting_share_price();
        let new_vests = amount.convert(&share_price);
        self.store.accounts.modify(id, |a| {
            a.vesting_shares += new_vests;
        })?;
        self.store.dgp.modify(|dgp| {
            dgp.total_vesting_fund += amount;
            dgp.total_vesting_shares += new_vests;
        });
        self.adjust_proxied_witness_votes(id, new_vests.amount)?;
        Ok(new_vests)
    }

    /// Propagate a vote-weight delta up the proxy chain and into witness
    /// vote tallies.
    pub fn adjust_proxied_witness_votes(&mut self, id: AccountId, delta: i64) -> Result<(), Error> {
        if delta == 0 {
            return Ok(());
        }
        let mut deltas = [0i64; crate::state::MAX_PROXY_DEPTH + 1];
        deltas[0] = delta;
        self.apply_proxy_deltas(id, &deltas)
    }

    /// Walk the proxy chain applying per-depth weight deltas; where the
    /// chain ends, the surviving weight lands on that account's witness
    /// votes. `deltas[0]` is the account's own weight change,
    /// `deltas[i+1]` the bucket it proxies from depth `i`.
    pub(crate) fn apply_proxy_deltas(
        &mut self,
        id: AccountId,
        deltas: &[i64; crate::state::MAX_PROXY_DEPTH + 1],
    ) -> Result<(), Error> {
        const DEPTH: usize = crate::state::MAX_PROXY_DEPTH;
        let mut current = id;
        let mut depth = 0usize;
        loop {
            let account = self.store.accounts.get(current)?;
            match account.proxy.clone() {
                Some(proxy) if depth < DEPTH => {
                    let proxy_id = self.get_account_id(&proxy)?;
                    self.store.accounts.modify(proxy_id, |a| {
                        for i in 0..(DEPTH - depth) {
                            a.proxied_vsf_votes[i + depth] += deltas[i];
                        }
                    })?;
                    current = proxy_id;
                    depth += 1;
                }
                Some(_) => break,
                None => {
                    let total: i64 = deltas[..=(DEPTH - depth).min(DEPTH)].iter().sum();
                    self.adjust_witness_votes_of(current, total)?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Apply a weight delta to every witness the account approves.
    pub(crate) fn adjust_witness_votes_of(&mut self, id: AccountId, delta: i64) -> Result<(), Error> {
        let name = self.store.accounts.get(id)?.name.clone();
        let witnesses: Vec<AccountName> = self
            .store
            .witness_votes
            .indexes
            .by_account_witness
            .range((name.clone(), AccountName::unchecked(""))..)
            .take_while(|((account, _), _)| *account == name)
            .map(|((_, witness), _)| witness.clone())
            .collect();
        for witness in witnesses {
            let wid = self.get_witness_id(&witness)?;
            self.adjust_witness_vote(wid, delta)?;
        }
        Ok(())
    }

    /// Change one witness's tally and reschedule its virtual-time slot.
    pub(crate) fn adjust_witness_vote(&mut self, wid: WitnessId, delta: i64) -> Result<(), Error> {
        let lap = self.virtual_schedule_lap();
        let current_virtual_time = self.store.witness_schedule.get().current_virtual_time;
        self.store.witnesses.modify(wid, |w| {
            w.virtual_position += w.votes.max(0) as u128
                * current_virtual_time.saturating_sub(w.virtual_last_update);
            w.virtual_last_update = current_virtual_time;
            w.votes += delta;
            let votes_plus_one = (w.votes.max(0) as u128) + 1;
            w.virtual_scheduled_time = current_virtual_time
                .saturating_add((lap.saturating_sub(w.virtual_position)) / votes_plus_one);
        })?;
        Ok(())
    }

    pub(crate) fn virtual_schedule_lap(&self) -> u128 {
        if self.has_hardfork(crate::networks::HF_SCHEDULE_LAP_CHANGE) {
            u128::from(u64::MAX)
        } else {
            u128::MAX
        }
    }

    /// Accrue stable-asset interest when the payment interval elapsed.
    pub(crate) fn accrue_gbd_interest(&mut self, id: AccountId) -> Result<(), Error> {
        let now = self.head_block_time();
        let account = self.store.accounts.get(id)?;
        let elapsed = now.secs_since(account.gbd_seconds_last_update);
        let gbd_seconds =
            account.gbd_seconds + account.gbd_balance.amount.max(0) as u128 * u128::from(elapsed);
        let due = now.secs_since(account.gbd_last_interest_payment)
            >= self.config.gbd_interest_interval_secs
            && gbd_seconds > 0;
        let rate = self.dgp().gbd_interest_rate;
        let owner = account.name.clone();

        self.store.accounts.modify(id, |a| {
            a.gbd_seconds = gbd_seconds;
            a.gbd_seconds_last_update = now;
        })?;
        if !due {
            return Ok(());
        }

        const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;
        let interest = gbd_seconds / SECONDS_PER_YEAR * u128::from(rate)
            / u128::from(PERCENT_100);
        let interest = Asset::gbd(interest as i64);
        self.store.accounts.modify(id, |a| {
            a.gbd_seconds = 0;
            a.gbd_last_interest_payment = now;
            a.gbd_balance += interest;
        })?;
        if interest.amount > 0 {
            self.adjust_supply(interest)?;
            self.push_virtual_operation(VirtualOperation::Interest {
                owner,
                interest,
            });
        }
        Ok(())
    }

    /// Record a synthetic event and fan it out to observers.
    pub fn push_virtual_operation(&mut self, op: VirtualOperation) {
        let notification = OperationNotification {
            trx_id: self.current_trx_id,
            block_num: self.dgp().head_block_number,
            timestamp: self.dgp().time,
            op: NotifiedOperation::Virtual(op.clone()),
        };
        for observer in &mut self.observers {
            observer(&notification);
        }
        self.block_virtual_ops.push(op);
    }

    pub(crate) fn notify_applied_operation(&mut self, op: &crate::operations::Operation) {
        if self.observers.is_empty() {
            return;
        }
        let notification = OperationNotification {
            trx_id: self.current_trx_id,
            block_num: self.dgp().head_block_number,
            timestamp: self.dgp().time,
            op: NotifiedOperation::User(op.clone()),
        };
        for observer in &mut self.observers {
            observer(&notification);
        }
    }

    // ---- pending pool ----

    pub(crate) fn clear_pending(&mut self) {
        if self.pending_session_open {
            // The pending layer always sits on top of the stack.
            let _ = self.store.undo_session();
            self.pending_session_open = false;
        }
        self.pending_transactions.clear();
    }

    pub(crate) fn schedule_next_flush(&mut self) {
        let window = self.config.flush_blocks;
        if window == 0 {
            self.next_flush_block = u32::MAX;
            return;
        }
        let lo = window * 9 / 10;
        let jitter = self.flush_rng.gen_range(lo..=window);
        self.next_flush_block = self.head_block_num() + jitter;
    }

    pub(crate) fn maybe_flush(&mut self) -> Result<(), Error> {
        if self.head_block_num() >= self.next_flush_block {
            self.block_log.flush()?;
            self.schedule_next_flush();
        }
        Ok(())
    }
}
