// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Block and transaction application. Everything here runs inside a store
//! session owned by the caller: a failing transaction unwinds its own
//! nested session, a failing block unwinds the block session.

use super::{require, skip, Chain, Error};
use crate::blocks::SignedBlock;
use crate::consensus;
use crate::crypto::PublicKey;
use crate::encoding;
use crate::networks::HF_LIQUIDITY_SUNSET;
use crate::operations::VirtualOperation;
use crate::state::{BlockSummary, TransactionObject, BLOCK_SUMMARY_SLOTS};
use crate::transaction::SignedTransaction;
use crate::types::{AccountName, Authority};
use std::collections::BTreeSet;
use tracing::warn;

impl Chain {
    /// Apply a block inside a fresh session. On success the session stays
    /// on the undo stack as the block's revision layer; on failure it is
    /// fully unwound.
    pub(crate) fn apply_block_raw(&mut self, block: &SignedBlock, skip_flags: u32) -> Result<(), Error> {
        let entry_depth = self.store.session_depth();
        self.store.begin_session();
        match self.apply_block_inner(block, skip_flags) {
            Ok(()) => Ok(()),
            Err(err) => {
                // The irreversibility commit may already have consumed the
                // session when the failure struck after it.
                if self.store.session_depth() > entry_depth {
                    self.store.undo_session()?;
                }
                Err(err)
            }
        }
    }

    fn apply_block_inner(&mut self, block: &SignedBlock, skip_flags: u32) -> Result<(), Error> {
        self.block_virtual_ops.clear();
        let block_num = block.block_num();
        let block_id = block.id()?;

        if skip_flags & skip::MERKLE_CHECK == 0 {
            let computed = block.calculate_merkle_root()?;
            require!(
                computed == block.header.transaction_merkle_root,
                Protocol,
                "merkle root mismatch in block {block_num}"
            );
        }
        self.validate_block_header(block, skip_flags)?;

        if skip_flags & skip::BLOCK_SIZE_CHECK == 0 {
            let size = encoding::to_vec(block)?.len();
            let max = self.dgp().maximum_block_size as usize;
            require!(
                size <= max,
                Protocol,
                "block {block_num} size {size} exceeds limit {max}"
            );
        }

        let slot = consensus::get_slot_at_time(self, block.header.timestamp);
        self.update_witness_record(block)?;
        self.update_missed_witnesses(block, slot)?;
        self.update_global_dynamic_data(block, slot)?;

        for tx in &block.transactions {
            self.store.begin_session();
            let result = self.apply_transaction_inner(tx, skip_flags);
            match result {
                Ok(()) => self.store.squash_session()?,
                Err(err) => {
                    self.store.undo_session()?;
                    let id = tx.id().unwrap_or_default();
                    return Err(err.for_transaction(id));
                }
            }
        }

        self.update_signing_witness(block)?;
        self.create_block_summary(&block_id, block_num)?;
        self.clear_expired_transactions()?;

        self.per_block_maintenance()?;
        consensus::update_witness_schedule(self)?;
        self.process_hardforks()?;
        self.update_last_irreversible_block()?;

        if skip_flags & skip::VALIDATE_INVARIANTS == 0 {
            self.validate_invariants()?;
        }
        Ok(())
    }

    fn validate_block_header(&self, block: &SignedBlock, skip_flags: u32) -> Result<(), Error> {
        let dgp = self.dgp();
        let head_num = dgp.head_block_number;
        require!(
            block.header.previous == dgp.head_block_id,
            Protocol,
            "block {} does not extend head {}",
            block.block_num(),
            head_num
        );
        require!(
            block.header.timestamp > dgp.time || head_num == 0,
            Protocol,
            "block timestamp does not advance"
        );
        let slot = consensus::get_slot_at_time(self, block.header.timestamp);
        require!(slot > 0, Protocol, "block timestamp is before the next slot");
        require!(
            consensus::get_slot_time(self, slot) == block.header.timestamp,
            Protocol,
            "block timestamp is not slot aligned"
        );

        if skip_flags & skip::WITNESS_SCHEDULE_CHECK == 0 {
            let scheduled = consensus::get_scheduled_witness(self, slot);
            require!(
                scheduled == block.header.witness,
                Protocol,
                "witness {} produced at {}'s slot",
                block.header.witness,
                scheduled
            );
        }
        if skip_flags & skip::WITNESS_SIGNATURE == 0 {
            let wid = self
                .store
                .find_witness(&block.header.witness)
                .ok_or_else(|| {
                    Error::Protocol(format!("unknown witness {}", block.header.witness))
                })?;
            let witness = self.store.witnesses.get(wid)?;
            let signing_key = witness
                .signing_key
                .ok_or_else(|| Error::Protocol("producing witness is shut down".into()))?;
            let signee = block.signee(&self.config.chain_id)?;
            require!(
                signee == signing_key,
                Protocol,
                "block signed by {} instead of the witness key",
                signee
            );
        }
        Ok(())
    }

    /// Fold the header extensions into the witness record.
    fn update_witness_record(&mut self, block: &SignedBlock) -> Result<(), Error> {
        let Some(wid) = self.store.find_witness(&block.header.witness) else {
            return Ok(());
        };
        if let Some(version) = block.header.reported_version() {
            self.store
                .witnesses
                .modify(wid, |w| w.running_version = version)?;
        }
        if let Some(vote) = block.header.hardfork_vote() {
            self.store.witnesses.modify(wid, |w| {
                w.hardfork_version_vote = vote.hf_version;
                w.hardfork_time_vote = vote.hf_time;
            })?;
        }
        Ok(())
    }

    /// Charge skipped slots to the witnesses that missed them.
    fn update_missed_witnesses(&mut self, block: &SignedBlock, slot: u64) -> Result<(), Error> {
        if self.dgp().head_block_number == 0 || slot <= 1 {
            return Ok(());
        }
        let shutdown_window = self.config.witness_shutdown_blocks;
        let head = self.dgp().head_block_number;
        for missed_slot in 1..slot {
            let name = consensus::get_scheduled_witness(self, missed_slot);
            if name == block.header.witness {
                continue;
            }
            let Some(wid) = self.store.find_witness(&name) else {
                continue;
            };
            self.store.witnesses.modify(wid, |w| w.total_missed += 1)?;
            let witness = self.store.witnesses.get(wid)?;
            let stale = head.saturating_sub(witness.last_confirmed_block_num) > shutdown_window;
            if stale && witness.is_active() && self.has_hardfork(HF_LIQUIDITY_SUNSET) {
                warn!("shutting down witness {name}: too many missed blocks");
                self.store.witnesses.modify(wid, |w| w.signing_key = None)?;
                self.push_virtual_operation(VirtualOperation::ShutdownWitness {
                    witness: name,
                });
            }
        }
        Ok(())
    }

    fn update_global_dynamic_data(&mut self, block: &SignedBlock, slot: u64) -> Result<(), Error> {
        let block_id = block.id()?;
        let block_size = encoding::to_vec(block)?.len() as u32;
        let max_reserve_ratio = self.config.max_reserve_ratio;
        let interval = u128::from(self.config.block_interval_secs);
        let window = u128::from(self.config.bandwidth_average_window_secs);
        let precision = self.config.bandwidth_precision;

        self.store.dgp.modify(|dgp| {
            // One bit per slot: missed slots shift in zeros.
            let shift = slot.min(128) as u32;
            let shifted = if shift >= 128 {
                0
            } else {
                dgp.recent_slots_filled << shift
            };
            dgp.recent_slots_filled = shifted | 1;
            dgp.participation_count = dgp.recent_slots_filled.count_ones() as u8;

            dgp.head_block_number = block.block_num();
            dgp.head_block_id = block_id;
            dgp.time = block.header.timestamp;
            dgp.current_witness = block.header.witness.clone();
            dgp.current_aslot += slot;

            dgp.average_block_size = (99 * dgp.average_block_size + block_size) / 100;
            // Busy blocks shrink the reserve; idle blocks let it creep
            // back toward the ceiling.
            if dgp.average_block_size > dgp.maximum_block_size / 2 {
                dgp.current_reserve_ratio =
                    dgp.current_reserve_ratio.saturating_sub((dgp.current_reserve_ratio / 100).max(1)).max(1);
            } else if dgp.current_reserve_ratio < max_reserve_ratio {
                dgp.current_reserve_ratio += 1;
            }
            dgp.max_virtual_bandwidth = u128::from(dgp.maximum_block_size)
                * u128::from(dgp.current_reserve_ratio)
                * precision
                * window
                / interval;
        });
        Ok(())
    }

    fn update_signing_witness(&mut self, block: &SignedBlock) -> Result<(), Error> {
        let Some(wid) = self.store.find_witness(&block.header.witness) else {
            return Ok(());
        };
        let block_num = block.block_num();
        self.store
            .witnesses
            .modify(wid, |w| w.last_confirmed_block_num = block_num)?;
        Ok(())
    }

    fn create_block_summary(&mut self, block_id: &crate::blocks::BlockId, block_num: u32) -> Result<(), Error> {
        let row = crate::db::ObjectId::<BlockSummary>::new(
            u64::from(block_num) % BLOCK_SUMMARY_SLOTS,
        );
        let id = *block_id;
        self.store
            .block_summaries
            .modify(row, |summary| summary.block_id = id)?;
        Ok(())
    }

    fn clear_expired_transactions(&mut self) -> Result<(), Error> {
        let now = self.head_block_time();
        loop {
            let next = self
                .store
                .transactions
                .indexes
                .by_expiration
                .keys()
                .next()
                .copied();
            let Some((expiration, id)) = next else { break };
            if expiration > now {
                break;
            }
            self.store.transactions.remove(id)?;
        }
        Ok(())
    }

    pub(crate) fn apply_transaction_inner(
        &mut self,
        tx: &SignedTransaction,
        skip_flags: u32,
    ) -> Result<(), Error> {
        let trx_id = tx.id()?;
        self.current_trx_id = Some(trx_id);
        let result = self.apply_transaction_steps(tx, trx_id, skip_flags);
        self.current_trx_id = None;
        result
    }

    fn apply_transaction_steps(
        &mut self,
        tx: &SignedTransaction,
        trx_id: crate::transaction::TransactionId,
        skip_flags: u32,
    ) -> Result<(), Error> {
        require!(
            !tx.transaction.operations.is_empty(),
            Validation,
            "transaction has no operations"
        );
        if skip_flags & skip::VALIDATE_OPERATIONS == 0 {
            for op in &tx.transaction.operations {
                op.validate()?;
            }
        }

        let now = self.head_block_time();
        require!(
            tx.transaction.expiration > now,
            Protocol,
            "transaction expired at {}",
            tx.transaction.expiration
        );
        require!(
            tx.transaction.expiration.secs_since(now)
                <= self.config.max_transaction_expiration_secs,
            Protocol,
            "transaction expiration too far in the future"
        );

        if skip_flags & skip::TAPOS_CHECK == 0 {
            let row = crate::db::ObjectId::<BlockSummary>::new(u64::from(
                tx.transaction.ref_block_num,
            ));
            let summary = self.store.block_summaries.get(row)?;
            require!(
                summary.block_id.tapos_prefix() == tx.transaction.ref_block_prefix,
                Protocol,
                "transaction references an unknown fork"
            );
        }

        if skip_flags & skip::TRANSACTION_DUPE_CHECK == 0 {
            require!(
                self.store.transactions.indexes.by_trx_id.get(&trx_id).is_none(),
                Protocol,
                "duplicate transaction {trx_id}"
            );
            let expiration = tx.transaction.expiration;
            self.store.transactions.insert(|_| TransactionObject {
                trx_id,
                expiration,
            });
        }

        if skip_flags & skip::AUTHORITY_CHECK == 0 {
            self.verify_transaction_authority(tx)?;
        }

        if skip_flags & skip::BANDWIDTH_CHECK == 0 {
            self.charge_transaction_bandwidth(tx)?;
        }

        for op in &tx.transaction.operations {
            crate::evaluator::apply_operation(self, op)?;
            self.notify_applied_operation(op);
        }
        Ok(())
    }

    fn charge_transaction_bandwidth(&mut self, tx: &SignedTransaction) -> Result<(), Error> {
        let size = encoding::to_vec(tx)?.len();
        let class = crate::bandwidth::class_of(tx);
        let mut charged: BTreeSet<AccountName> = BTreeSet::new();
        let mut names = Vec::new();
        for op in &tx.transaction.operations {
            op.required_active(&mut names);
            op.required_posting(&mut names);
            op.required_owner(&mut names);
        }
        for name in names {
            if !charged.insert(name.clone()) {
                continue;
            }
            if let Some(id) = self.store.find_account(&name) {
                self.charge_bandwidth(id, class, size)?;
            }
        }
        Ok(())
    }

    /// Resolve and check every authority the operations demand against
    /// the recovered signature set.
    fn verify_transaction_authority(&mut self, tx: &SignedTransaction) -> Result<(), Error> {
        let signees = tx.signees(&self.config.chain_id)?;
        let mut active = Vec::new();
        let mut posting = Vec::new();
        let mut owner = Vec::new();
        let mut other = Vec::new();
        for op in &tx.transaction.operations {
            op.required_active(&mut active);
            op.required_posting(&mut posting);
            op.required_owner(&mut owner);
            op.required_other(&mut other);
        }
        // A transaction that only proves authority is exempt from the
        // challenge lockout it exists to resolve.
        let proving = tx.transaction.operations.iter().all(|op| op.is_proving());

        // Posting authority is weaker; it cannot ride along with active or
        // owner demands in one transaction.
        if !posting.is_empty() {
            require!(
                active.is_empty() && owner.is_empty() && other.is_empty(),
                AuthorityMissing,
                "posting operations cannot be mixed with stronger authorities"
            );
            for name in &posting {
                if !proving {
                    self.check_account_prevented(name, false)?;
                }
                let auth = self.authority_of(name, AuthorityKind::Posting)?;
                self.require_authority(name, &auth, &signees, AuthorityKind::Posting)?;
            }
            return Ok(());
        }

        for authority in &other {
            require!(
                satisfies(&self.store, authority, &signees, AuthorityKind::Active, 0, self.config.max_sig_check_depth),
                AuthorityMissing,
                "a free-standing authority is not satisfied"
            );
        }
        for name in &active {
            if !proving {
                self.check_account_prevented(name, false)?;
            }
            let auth = self.authority_of(name, AuthorityKind::Active)?;
            self.require_authority(name, &auth, &signees, AuthorityKind::Active)?;
        }
        for name in &owner {
            if !proving {
                self.check_account_prevented(name, true)?;
            }
            let auth = self.authority_of(name, AuthorityKind::Owner)?;
            self.require_authority(name, &auth, &signees, AuthorityKind::Owner)?;
        }
        Ok(())
    }

    /// A challenged account may only prove itself until it does.
    fn check_account_prevented(&self, name: &AccountName, owner: bool) -> Result<(), Error> {
        let Some(id) = self.store.find_account(name) else {
            return Ok(());
        };
        let account = self.store.accounts.get(id)?;
        let prevented = if owner {
            account.owner_challenged
        } else {
            account.active_challenged
        };
        require!(
            !prevented,
            AuthorityMissing,
            "{name} is challenged and must prove its authority first"
        );
        Ok(())
    }

    fn authority_of(&self, name: &AccountName, kind: AuthorityKind) -> Result<Authority, Error> {
        let id = self
            .store
            .find_account(name)
            .ok_or_else(|| Error::Precondition(format!("unknown account {name}")))?;
        let account = self.store.accounts.get(id)?;
        Ok(match kind {
            AuthorityKind::Posting => account.posting.clone(),
            AuthorityKind::Active => account.active.clone(),
            AuthorityKind::Owner => account.owner.clone(),
        })
    }

    fn require_authority(
        &self,
        name: &AccountName,
        authority: &Authority,
        signees: &BTreeSet<PublicKey>,
        kind: AuthorityKind,
    ) -> Result<(), Error> {
        let depth_limit = self.config.max_sig_check_depth;
        if satisfies(&self.store, authority, signees, kind, 0, depth_limit) {
            return Ok(());
        }
        // Owner satisfies active; owner and active both satisfy posting.
        let fallbacks: &[AuthorityKind] = match kind {
            AuthorityKind::Posting => &[AuthorityKind::Active, AuthorityKind::Owner],
            AuthorityKind::Active => &[AuthorityKind::Owner],
            AuthorityKind::Owner => &[],
        };
        for fallback in fallbacks {
            let auth = self.authority_of(name, *fallback)?;
            if satisfies(&self.store, &auth, signees, *fallback, 0, depth_limit) {
                return Ok(());
            }
        }
        Err(Error::AuthorityMissing(format!(
            "missing {kind:?} authority of {name}"
        )))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AuthorityKind {
    Posting,
    Active,
    Owner,
}

/// Weighted-threshold satisfaction with bounded recursion through account
/// authorities.
fn satisfies(
    store: &crate::state::Store,
    authority: &Authority,
    signees: &BTreeSet<PublicKey>,
    kind: AuthorityKind,
    depth: u32,
    depth_limit: u32,
) -> bool {
    let mut total: u64 = 0;
    let threshold = u64::from(authority.weight_threshold);
    if threshold == 0 {
        return true;
    }
    for (key, weight) in &authority.key_auths {
        if signees.contains(key) {
            total += u64::from(*weight);
            if total >= threshold {
                return true;
            }
        }
    }
    if depth >= depth_limit {
        return false;
    }
    for (name, weight) in &authority.account_auths {
        let Some(id) = store.find_account(name) else {
            continue;
        };
        let Ok(account) = store.accounts.get(id) else {
            continue;
        };
        let inner = match kind {
            AuthorityKind::Posting => &account.posting,
            AuthorityKind::Active => &account.active,
            AuthorityKind::Owner => &account.owner,
        };
        if satisfies(store, inner, signees, kind, depth + 1, depth_limit) {
            total += u64::from(*weight);
            if total >= threshold {
                return true;
            }
        }
    }
    false
}
