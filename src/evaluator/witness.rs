// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::crypto::sha256;
use crate::networks::HF_CURATION_QUARTER;
use crate::operations::{
    AccountWitnessProxyOperation, AccountWitnessVoteOperation, FeedPublishOperation,
    Pow2Operation, PowOperation, ReportOverProductionOperation, VirtualOperation,
    WitnessUpdateOperation,
};
use crate::state::{Witness, WitnessVote, MAX_PROXY_DEPTH};
use crate::types::AccountName;

const MAX_ACCOUNT_WITNESS_VOTES: u16 = 30;

pub(super) fn apply_witness_update(
    chain: &mut Chain,
    op: &WitnessUpdateOperation,
) -> Result<(), Error> {
    chain.get_account_id(&op.owner)?;
    let existing = chain.store().find_witness(&op.owner);
    match existing {
        Some(wid) => {
            chain.store.witnesses.modify(wid, |w| {
                w.url = op.url.clone();
                w.signing_key = op.block_signing_key;
                w.props = op.props.clone();
            })?;
        }
        None => {
            // The registration fee burns.
            if op.fee.amount > 0 {
                let owner_id = chain.get_account_id(&op.owner)?;
                chain.adjust_balance(owner_id, -op.fee)?;
                chain.adjust_supply(-op.fee)?;
            }
            let now = chain.head_block_time();
            let key = op.block_signing_key;
            let url = op.url.clone();
            let props = op.props.clone();
            let owner = op.owner.clone();
            chain.store.witnesses.insert(|_| {
                let mut witness = Witness::new(
                    owner.clone(),
                    key.unwrap_or(crate::crypto::PublicKey([0u8; 33])),
                    now,
                );
                witness.signing_key = key;
                witness.url = url.clone();
                witness.props = props.clone();
                witness
            });
        }
    }
    Ok(())
}

pub(super) fn apply_account_witness_vote(
    chain: &mut Chain,
    op: &AccountWitnessVoteOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    let account = chain.store().accounts.get(account_id)?.clone();
    require!(account.can_vote, Precondition, "{} declined voting rights", op.account);
    require!(
        account.proxy.is_none(),
        Precondition,
        "cannot vote directly while a proxy is set"
    );
    let wid = chain.get_witness_id(&op.witness)?;

    let key = (op.account.clone(), op.witness.clone());
    let existing = chain
        .store()
        .witness_votes
        .indexes
        .by_account_witness
        .get(&key)
        .copied();
    let weight = account.witness_vote_weight();

    if op.approve {
        require!(existing.is_none(), Precondition, "already voting for this witness");
        require!(
            account.witnesses_voted_for < MAX_ACCOUNT_WITNESS_VOTES,
            Precondition,
            "voted for too many witnesses"
        );
        chain.store.witness_votes.insert(|_| WitnessVote {
            account: op.account.clone(),
            witness: op.witness.clone(),
        });
        chain
            .store
            .accounts
            .modify(account_id, |a| a.witnesses_voted_for += 1)?;
        chain.adjust_witness_vote(wid, weight)?;
    } else {
        let vote_id =
            existing.ok_or_else(|| Error::Precondition("not voting for this witness".into()))?;
        chain.store.witness_votes.remove(vote_id)?;
        chain
            .store
            .accounts
            .modify(account_id, |a| a.witnesses_voted_for -= 1)?;
        chain.adjust_witness_vote(wid, -weight)?;
    }
    Ok(())
}

pub(super) fn apply_account_witness_proxy(
    chain: &mut Chain,
    op: &AccountWitnessProxyOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    let account = chain.store().accounts.get(account_id)?.clone();
    let new_proxy = if op.proxy.is_empty() {
        None
    } else {
        let name = AccountName::unchecked(&op.proxy);
        chain.get_account_id(&name)?;
        Some(name)
    };
    require!(
        account.proxy != new_proxy,
        Precondition,
        "proxy unchanged"
    );
    // A proxy chain may not loop back.
    let mut cursor = new_proxy.clone();
    let mut depth = 0;
    while let Some(name) = cursor {
        require!(name != op.account, Precondition, "proxy chain would loop");
        require!(depth <= MAX_PROXY_DEPTH, Precondition, "proxy chain too deep");
        let id = chain.get_account_id(&name)?;
        cursor = chain.store().accounts.get(id)?.proxy.clone();
        depth += 1;
    }

    // Pull this account's weight (own stake plus everything proxied to
    // it) out of the old routing, rewire, and push it back in.
    let mut deltas = [0i64; MAX_PROXY_DEPTH + 1];
    deltas[0] = account.vesting_shares.amount;
    for i in 0..MAX_PROXY_DEPTH.min(deltas.len() - 1) {
        deltas[i + 1] = account.proxied_vsf_votes[i];
    }
    let negated = deltas.map(|d| -d);
    chain.apply_proxy_deltas(account_id, &negated)?;
    let proxy_for_store = new_proxy.clone();
    chain
        .store
        .accounts
        .modify(account_id, |a| a.proxy = proxy_for_store)?;
    chain.apply_proxy_deltas(account_id, &deltas)?;
    Ok(())
}

pub(super) fn apply_feed_publish(chain: &mut Chain, op: &FeedPublishOperation) -> Result<(), Error> {
    let wid = chain.get_witness_id(&op.publisher)?;
    let now = chain.head_block_time();
    chain.store.witnesses.modify(wid, |w| {
        w.gbd_exchange_rate = Some(op.exchange_rate);
        w.last_gbd_exchange_update = now;
    })?;
    Ok(())
}

/// Proof-of-work over the previous block id and a nonce; the resulting
/// digest must clear the chain's target.
fn pow_summary(block_id: &crate::blocks::BlockId, worker: &AccountName, nonce: u64) -> u32 {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&block_id.0);
    bytes.extend_from_slice(worker.as_bytes());
    bytes.extend_from_slice(&nonce.to_le_bytes());
    let digest = sha256(&bytes);
    u32::from_be_bytes(digest.0[..4].try_into().expect("4 bytes"))
}

fn enqueue_worker(chain: &mut Chain, worker: &AccountName) -> Result<(), Error> {
    let queue_position = chain.dgp().total_pow + 1;
    let wid = match chain.store().find_witness(worker) {
        Some(wid) => wid,
        None => {
            let now = chain.head_block_time();
            let account_id = chain.get_account_id(worker)?;
            let key = chain.store().accounts.get(account_id)?.memo_key;
            let owner = worker.clone();
            chain
                .store
                .witnesses
                .insert(|_| Witness::new(owner.clone(), key, now))
        }
    };
    require!(
        chain.store().witnesses.get(wid)?.pow_worker == 0,
        Precondition,
        "worker already queued"
    );
    chain
        .store
        .witnesses
        .modify(wid, |w| w.pow_worker = queue_position)?;
    chain.store.dgp.modify(|dgp| {
        dgp.total_pow += 1;
        dgp.num_pow_witnesses += 1;
    });
    Ok(())
}

pub(super) fn apply_pow(chain: &mut Chain, op: &PowOperation) -> Result<(), Error> {
    require!(
        op.block_id == chain.head_block_id(),
        Precondition,
        "work is not on the current head"
    );
    let summary = pow_summary(&op.block_id, &op.worker_account, op.nonce);
    require!(
        summary <= chain.config().min_pow_target,
        Precondition,
        "insufficient work"
    );
    chain.get_account_id(&op.worker_account)?;
    enqueue_worker(chain, &op.worker_account)
}

pub(super) fn apply_pow2(chain: &mut Chain, op: &Pow2Operation) -> Result<(), Error> {
    require!(
        op.prev_block == chain.head_block_id(),
        Precondition,
        "work is not on the current head"
    );
    let summary = pow_summary(&op.prev_block, &op.worker_account, op.nonce);
    require!(
        summary == op.pow_summary,
        Precondition,
        "work summary mismatch"
    );
    require!(
        summary <= chain.config().min_pow_target,
        Precondition,
        "insufficient work"
    );
    chain.get_account_id(&op.worker_account)?;
    enqueue_worker(chain, &op.worker_account)
}

pub(super) fn apply_report_over_production(
    chain: &mut Chain,
    op: &ReportOverProductionOperation,
) -> Result<(), Error> {
    // Retired: double production is handled by governance once the early
    // bootstrap era ends.
    require!(
        !chain.has_hardfork(HF_CURATION_QUARTER),
        Precondition,
        "over-production reports are retired"
    );
    let wid = chain.get_witness_id(&op.first_block.witness)?;
    let witness = chain.store().witnesses.get(wid)?.clone();
    let signing_key = witness
        .signing_key
        .ok_or_else(|| Error::Precondition("witness is shut down".into()))?;
    let chain_id = chain.chain_id();
    let first = op.first_signature.recover(&op.first_block.signing_digest(&chain_id)?)?;
    let second = op
        .second_signature
        .recover(&op.second_block.signing_digest(&chain_id)?)?;
    require!(
        first == signing_key && second == signing_key,
        Precondition,
        "blocks are not both signed by the reported witness"
    );
    require!(
        op.first_block.digest()? != op.second_block.digest()?,
        Precondition,
        "the two headers are identical"
    );
    let name = witness.owner.clone();
    chain.store.witnesses.modify(wid, |w| w.signing_key = None)?;
    chain.push_virtual_operation(VirtualOperation::ShutdownWitness { witness: name });
    Ok(())
}
