// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The mutating entry points: block push with fork resolution, pending
//! transaction push, local block production, and the irreversibility
//! march that feeds the block log.

use super::fork_db::ForkItem;
use super::{require, skip, Chain, Error};
use crate::blocks::{BlockHeader, BlockHeaderExtension, HardforkVote, SignedBlock};
use crate::consensus;
use crate::crypto::SecretKey;
use crate::encoding;
use crate::transaction::SignedTransaction;
use crate::types::{AccountName, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Chain {
    /// Accept a block from the network or local production. Returns true
    /// when the head moved (extension or fork switch).
    pub fn push_block(&mut self, block: SignedBlock, skip_flags: u32) -> Result<bool, Error> {
        self.reset_pending_session();
        let result = self.push_block_inner(block, skip_flags);
        self.rebuild_pending(skip_flags);
        self.maybe_flush()?;
        result
    }

    fn push_block_inner(&mut self, block: SignedBlock, skip_flags: u32) -> Result<bool, Error> {
        let head_id = self.head_block_id();
        let item = match self.fork_db.push_block(block) {
            Ok(item) => item,
            Err(super::fork_db::Error::Duplicate(_)) => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        // Log competing production for the same height without switching.
        let siblings = self.fork_db.blocks_at_number(item.num);
        if siblings.len() > 1 {
            warn!(
                "multiple blocks produced at height {}: {} candidates",
                item.num,
                siblings.len()
            );
        }

        if item.block.header.previous == head_id {
            // Plain extension of the main branch.
            match self.apply_block_raw(&item.block, skip_flags) {
                Ok(()) => return Ok(true),
                Err(err) => {
                    self.fork_db.remove(&item.id);
                    self.fork_db.set_head(&head_id);
                    return Err(err);
                }
            }
        }

        let fork_head = self
            .fork_db
            .head()
            .cloned()
            .ok_or_else(|| Error::Consensus("fork database lost its head".into()))?;
        if fork_head.num <= self.head_block_num() {
            // On a shorter or equal branch: retain for later, do nothing.
            return Ok(false);
        }
        if fork_head.id != item.id {
            // The new block filled a gap but some other tip is still best.
            return Ok(false);
        }
        self.switch_forks(fork_head, skip_flags)?;
        Ok(true)
    }

    /// Undo back to the common ancestor, then replay the heavier branch.
    /// If any block of the new branch fails, restore the old branch.
    fn switch_forks(&mut self, new_head: Arc<ForkItem>, skip_flags: u32) -> Result<(), Error> {
        let old_head_id = self.head_block_id();
        info!(
            "switching forks: {} (height {}) over {}",
            new_head.id,
            new_head.num,
            old_head_id
        );
        let (new_branch, old_branch) = self.fork_db.fetch_branch_from(new_head.id, old_head_id)?;

        for _ in 0..old_branch.len() {
            self.pop_block_internal()?;
        }

        for (index, item) in new_branch.iter().rev().enumerate() {
            match self.apply_block_raw(&item.block, skip_flags) {
                Ok(()) => {}
                Err(err) => {
                    warn!("fork block {} failed: {err}; reverting", item.id);
                    // Drop the offending block and everything above it.
                    for bad in new_branch.iter().rev().skip(index) {
                        self.fork_db.remove(&bad.id);
                    }
                    // Unwind the part of the new branch that applied.
                    for _ in 0..index {
                        self.store.undo_session()?;
                    }
                    // Restore the original branch.
                    for old in old_branch.iter().rev() {
                        self.apply_block_raw(&old.block, skip::REPLAY)?;
                    }
                    self.fork_db.set_head(&old_head_id);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Validate and queue a transaction under the pending session so a
    /// later block cheaply rewinds it.
    pub fn push_transaction(&mut self, tx: SignedTransaction, skip_flags: u32) -> Result<(), Error> {
        if !self.pending_session_open {
            self.store.begin_session();
            self.pending_session_open = true;
        }
        self.store.begin_session();
        match self.apply_transaction_inner(&tx, skip_flags) {
            Ok(()) => {
                self.store.squash_session()?;
                self.pending_transactions.push(tx);
                Ok(())
            }
            Err(err) => {
                self.store.undo_session()?;
                let id = tx.id().unwrap_or_default();
                Err(err.for_transaction(id))
            }
        }
    }

    /// Produce and push a block at `when`, re-applying as many pending
    /// transactions as fit.
    pub fn generate_block(
        &mut self,
        when: Timestamp,
        witness: AccountName,
        key: &SecretKey,
        skip_flags: u32,
    ) -> Result<SignedBlock, Error> {
        let slot = consensus::get_slot_at_time(self, when);
        require!(slot > 0, Protocol, "generation time is not past the head");
        if skip_flags & skip::WITNESS_SCHEDULE_CHECK == 0 {
            let scheduled = consensus::get_scheduled_witness(self, slot);
            require!(
                scheduled == witness,
                Protocol,
                "{witness} is not scheduled for that slot ({scheduled} is)"
            );
        }
        let wid = self.get_witness_id(&witness)?;
        if skip_flags & skip::WITNESS_SIGNATURE == 0 {
            let signing_key = self
                .store
                .witnesses
                .get(wid)?
                .signing_key
                .ok_or_else(|| Error::Protocol("witness is shut down".into()))?;
            require!(
                signing_key == key.public_key(),
                Protocol,
                "wrong signing key for {witness}"
            );
        }

        self.reset_pending_session();
        let candidates = std::mem::take(&mut self.pending_transactions);
        let max_block_size = self.dgp().maximum_block_size as usize;
        let mut total_size = 512usize;
        let mut included: Vec<SignedTransaction> = Vec::new();
        let mut postponed: Vec<SignedTransaction> = Vec::new();

        // Trial-apply into a throwaway session to pick what fits.
        self.store.begin_session();
        for tx in candidates {
            if tx.transaction.expiration <= when {
                continue;
            }
            let size = encoding::to_vec(&tx)?.len();
            if total_size + size > max_block_size {
                postponed.push(tx);
                continue;
            }
            self.store.begin_session();
            match self.apply_transaction_inner(&tx, skip_flags) {
                Ok(()) => {
                    self.store.squash_session()?;
                    total_size += size;
                    included.push(tx);
                }
                Err(err) => {
                    self.store.undo_session()?;
                    debug!("dropping pending transaction from block: {err}");
                }
            }
        }
        self.store.undo_session()?;
        self.pending_transactions = included.clone();
        self.pending_transactions.extend(postponed);

        let mut extensions = Vec::new();
        let binary_version = self.config().binary_version();
        let witness_record = self.store.witnesses.get(wid)?;
        if witness_record.running_version != binary_version {
            extensions.push(BlockHeaderExtension::Version(binary_version));
        }
        let hf_state = self.store.hardforks.get();
        if let Some(next) = self.config().hardfork(hf_state.last_hardfork + 1) {
            if witness_record.hardfork_version_vote != next.version
                || witness_record.hardfork_time_vote != next.time
            {
                extensions.push(BlockHeaderExtension::HardforkVote(HardforkVote {
                    hf_version: next.version,
                    hf_time: next.time,
                }));
            }
        }

        let leaves = included
            .iter()
            .map(|tx| tx.digest())
            .collect::<Result<Vec<_>, _>>()?;
        let header = BlockHeader {
            previous: self.head_block_id(),
            timestamp: when,
            witness,
            transaction_merkle_root: crate::blocks::merkle_root(leaves),
            extensions,
        };
        let signature = SignedBlock::sign(header.clone(), key, &self.chain_id())?;
        let block = SignedBlock {
            header,
            witness_signature: signature,
            transactions: included,
        };

        let size = encoding::to_vec(&block)?.len();
        require!(
            size <= max_block_size,
            Protocol,
            "produced block exceeds the size limit"
        );
        self.push_block(block.clone(), skip_flags)?;
        Ok(block)
    }

    /// Look a block up by height: the reversible main branch first, the
    /// block log for anything older.
    pub fn fetch_block_by_number(&mut self, num: u32) -> Result<Option<SignedBlock>, Error> {
        let mut cursor = self.fork_db.head().cloned();
        while let Some(item) = cursor {
            if item.num == num {
                return Ok(Some((*item.block).clone()));
            }
            if item.num < num {
                break;
            }
            cursor = self.fork_db.fetch_block(&item.previous_id()).cloned();
        }
        if num == 0 || num > self.block_log.head_block_num() {
            return Ok(None);
        }
        Ok(Some(self.block_log.read_block(num)?))
    }

    /// Undo the head block; its transactions return to the pending queue.
    pub fn pop_block(&mut self) -> Result<SignedBlock, Error> {
        self.reset_pending_session();
        let block = self.pop_block_internal()?;
        Ok(block)
    }

    fn pop_block_internal(&mut self) -> Result<SignedBlock, Error> {
        let head_id = self.head_block_id();
        let head_num = self.head_block_num();
        require!(
            head_num > self.dgp().last_irreversible_block_num,
            Consensus,
            "undo history is exhausted at the irreversible boundary"
        );
        let item = self
            .fork_db
            .fetch_block(&head_id)
            .cloned()
            .ok_or_else(|| Error::Consensus("head block missing from fork database".into()))?;
        self.store.undo_session()?;
        require!(
            self.head_block_id() == item.block.header.previous,
            Fatal,
            "store head does not match the popped block's parent"
        );
        self.fork_db.set_head(&item.block.header.previous);
        // Popped payloads go back to the front of the pending queue.
        for tx in item.block.transactions.iter().rev() {
            self.pending_transactions.insert(0, tx.clone());
        }
        Ok((*item.block).clone())
    }

    /// Drop the pending session but keep the queued payloads for rebuild.
    fn reset_pending_session(&mut self) {
        if self.pending_session_open {
            let _ = self.store.undo_session();
            self.pending_session_open = false;
        }
    }

    /// Re-validate the pending queue on top of the new head; transactions
    /// that no longer apply (including ones just included in a block)
    /// fall away silently.
    fn rebuild_pending(&mut self, skip_flags: u32) {
        let old = std::mem::take(&mut self.pending_transactions);
        for tx in old {
            if let Err(err) = self.push_transaction(tx, skip_flags) {
                debug!("pending transaction dropped on rebuild: {err}");
            }
        }
    }

    /// Recompute the irreversibility horizon from witness confirmations,
    /// then persist and commit everything that crossed it.
    pub(crate) fn update_last_irreversible_block(&mut self) -> Result<(), Error> {
        let schedule = self.store.witness_schedule.get().clone();
        let mut confirmations: Vec<u32> = schedule
            .current_shuffled_witnesses
            .iter()
            .filter_map(|name| self.store.find_witness(name))
            .filter_map(|wid| self.store.witnesses.get(wid).ok())
            .map(|w| w.last_confirmed_block_num)
            .collect();
        if confirmations.is_empty() {
            return Ok(());
        }
        confirmations.sort_unstable();
        let threshold = self.config.irreversible_threshold_percent.min(100);
        let offset = ((100 - threshold) as usize * confirmations.len()) / 100;
        let candidate = confirmations[offset.min(confirmations.len() - 1)];

        let current = self.dgp().last_irreversible_block_num;
        if candidate <= current {
            return Ok(());
        }
        self.store
            .dgp
            .modify(|dgp| dgp.last_irreversible_block_num = candidate);

        // Persist the newly irreversible main-branch blocks, oldest
        // first. During replay the fork database is empty and the log
        // already has them.
        if let Some(head) = self.fork_db.head().cloned() {
            let mut pending_blocks: Vec<Arc<SignedBlock>> = Vec::new();
            let mut cursor = Some(head);
            let log_head = self.block_log.head_block_num();
            while let Some(item) = cursor {
                if item.num <= log_head {
                    break;
                }
                if item.num <= candidate {
                    pending_blocks.push(item.block.clone());
                }
                cursor = self.fork_db.fetch_block(&item.previous_id()).cloned();
            }
            for block in pending_blocks.iter().rev() {
                self.block_log.append(block)?;
            }
        }

        self.store.commit(u64::from(candidate));
        self.fork_db.set_floor(candidate);
        Ok(())
    }
}
