// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    EscrowApproveOperation, EscrowDisputeOperation, EscrowReleaseOperation,
    EscrowTransferOperation,
};
use crate::state::{Escrow, EscrowId};
use crate::types::Asset;

fn get_escrow(chain: &Chain, from: &crate::types::AccountName, escrow_id: u32) -> Result<EscrowId, Error> {
    chain
        .store()
        .escrows
        .indexes
        .by_from_id
        .get(&(from.clone(), escrow_id))
        .copied()
        .ok_or_else(|| Error::Precondition(format!("no escrow {escrow_id} from {from}")))
}

pub(super) fn apply_escrow_transfer(
    chain: &mut Chain,
    op: &EscrowTransferOperation,
) -> Result<(), Error> {
    let now = chain.head_block_time();
    require!(
        op.ratification_deadline > now,
        Precondition,
        "ratification deadline has passed"
    );
    let from_id = chain.get_account_id(&op.from)?;
    chain.get_account_id(&op.to)?;
    chain.get_account_id(&op.agent)?;
    require!(
        chain
            .store()
            .escrows
            .indexes
            .by_from_id
            .get(&(op.from.clone(), op.escrow_id))
            .is_none(),
        Precondition,
        "escrow id already in use"
    );

    if op.grove_amount.amount > 0 {
        chain.adjust_balance(from_id, -op.grove_amount)?;
    }
    if op.gbd_amount.amount > 0 {
        chain.adjust_balance(from_id, -op.gbd_amount)?;
    }
    if op.fee.amount > 0 {
        chain.adjust_balance(from_id, -op.fee)?;
    }
    chain.store.escrows.insert(|_| Escrow {
        escrow_id: op.escrow_id,
        from: op.from.clone(),
        to: op.to.clone(),
        agent: op.agent.clone(),
        ratification_deadline: op.ratification_deadline,
        escrow_expiration: op.escrow_expiration,
        grove_balance: op.grove_amount,
        gbd_balance: op.gbd_amount,
        pending_fee: op.fee,
        to_approved: false,
        agent_approved: false,
        disputed: false,
    });
    Ok(())
}

/// Refund every balance (fee included) to the sender and drop the escrow.
fn refund_and_remove(chain: &mut Chain, escrow_id: EscrowId) -> Result<(), Error> {
    let escrow = chain.store.escrows.remove(escrow_id)?;
    let from_id = chain.get_account_id(&escrow.from)?;
    if escrow.grove_balance.amount > 0 {
        chain.adjust_balance(from_id, escrow.grove_balance)?;
    }
    if escrow.gbd_balance.amount > 0 {
        chain.adjust_balance(from_id, escrow.gbd_balance)?;
    }
    if escrow.pending_fee.amount > 0 {
        chain.adjust_balance(from_id, escrow.pending_fee)?;
    }
    Ok(())
}

pub(super) fn apply_escrow_approve(
    chain: &mut Chain,
    op: &EscrowApproveOperation,
) -> Result<(), Error> {
    let escrow_id = get_escrow(chain, &op.from, op.escrow_id)?;
    let escrow = chain.store().escrows.get(escrow_id)?.clone();
    require!(
        escrow.to == op.to && escrow.agent == op.agent,
        Precondition,
        "escrow parties do not match"
    );
    require!(!escrow.is_approved(), Precondition, "escrow already ratified");

    if !op.approve {
        // Any disapproval voids the whole arrangement.
        return refund_and_remove(chain, escrow_id);
    }

    if op.who == escrow.to {
        require!(!escrow.to_approved, Precondition, "receiver already approved");
        chain.store.escrows.modify(escrow_id, |e| e.to_approved = true)?;
    } else {
        require!(!escrow.agent_approved, Precondition, "agent already approved");
        chain
            .store
            .escrows
            .modify(escrow_id, |e| e.agent_approved = true)?;
    }

    let escrow = chain.store().escrows.get(escrow_id)?.clone();
    if escrow.is_approved() {
        // Ratified: the agent earns the fee.
        let agent_id = chain.get_account_id(&escrow.agent)?;
        if escrow.pending_fee.amount > 0 {
            chain.adjust_balance(agent_id, escrow.pending_fee)?;
        }
        chain
            .store
            .escrows
            .modify(escrow_id, |e| e.pending_fee = Asset::grove(0))?;
    }
    Ok(())
}

pub(super) fn apply_escrow_dispute(
    chain: &mut Chain,
    op: &EscrowDisputeOperation,
) -> Result<(), Error> {
    let escrow_id = get_escrow(chain, &op.from, op.escrow_id)?;
    let escrow = chain.store().escrows.get(escrow_id)?;
    require!(
        escrow.to == op.to && escrow.agent == op.agent,
        Precondition,
        "escrow parties do not match"
    );
    require!(escrow.is_approved(), Precondition, "escrow is not ratified yet");
    require!(!escrow.disputed, Precondition, "escrow already disputed");
    require!(
        chain.head_block_time() < escrow.escrow_expiration,
        Precondition,
        "escrow has expired"
    );
    chain.store.escrows.modify(escrow_id, |e| e.disputed = true)?;
    Ok(())
}

pub(super) fn apply_escrow_release(
    chain: &mut Chain,
    op: &EscrowReleaseOperation,
) -> Result<(), Error> {
    let escrow_id = get_escrow(chain, &op.from, op.escrow_id)?;
    let escrow = chain.store().escrows.get(escrow_id)?.clone();
    let now = chain.head_block_time();
    require!(
        escrow.to == op.to && escrow.agent == op.agent,
        Precondition,
        "escrow parties do not match"
    );
    require!(escrow.is_approved(), Precondition, "escrow is not ratified yet");
    require!(
        escrow.grove_balance.amount >= op.grove_amount.amount
            && escrow.gbd_balance.amount >= op.gbd_amount.amount,
        Precondition,
        "release exceeds escrow balance"
    );

    if escrow.disputed {
        require!(
            op.who == escrow.agent,
            Precondition,
            "only the agent releases a disputed escrow"
        );
    } else if now < escrow.escrow_expiration {
        // Before expiration a counterparty can only concede to the other.
        require!(
            (op.who == escrow.from && op.receiver == escrow.to)
                || (op.who == escrow.to && op.receiver == escrow.from),
            Precondition,
            "before expiration funds may only be released to the counterparty"
        );
    } else {
        require!(
            op.who == escrow.from || op.who == escrow.to,
            Precondition,
            "only a counterparty releases an expired escrow"
        );
    }

    let receiver_id = chain.get_account_id(&op.receiver)?;
    if op.grove_amount.amount > 0 {
        chain.adjust_balance(receiver_id, op.grove_amount)?;
    }
    if op.gbd_amount.amount > 0 {
        chain.adjust_balance(receiver_id, op.gbd_amount)?;
    }
    let remaining_grove = escrow.grove_balance - op.grove_amount;
    let remaining_gbd = escrow.gbd_balance - op.gbd_amount;
    if remaining_grove.amount == 0 && remaining_gbd.amount == 0 {
        chain.store.escrows.remove(escrow_id)?;
    } else {
        chain.store.escrows.modify(escrow_id, |e| {
            e.grove_balance = remaining_grove;
            e.gbd_balance = remaining_gbd;
        })?;
    }
    Ok(())
}
