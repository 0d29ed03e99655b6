// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    LimitOrderCancelOperation, LimitOrderCreate2Operation, LimitOrderCreateOperation,
};
use crate::state::LimitOrder;
use crate::types::Price;

fn create_order(
    chain: &mut Chain,
    owner: &crate::types::AccountName,
    order_id: u32,
    amount_to_sell: crate::types::Asset,
    sell_price: Price,
    fill_or_kill: bool,
    expiration: crate::types::Timestamp,
) -> Result<(), Error> {
    let now = chain.head_block_time();
    require!(expiration > now, Precondition, "order already expired");
    let owner_id = chain.get_account_id(owner)?;
    require!(
        chain
            .store()
            .limit_orders
            .indexes
            .by_account
            .get(&(owner.clone(), order_id))
            .is_none(),
        Precondition,
        "order id already in use"
    );
    chain.adjust_balance(owner_id, -amount_to_sell)?;
    let lid = chain.store.limit_orders.insert(|_| LimitOrder {
        created: now,
        expiration,
        seller: owner.clone(),
        order_id,
        for_sale: amount_to_sell.amount,
        sell_price,
    });
    let filled = chain.apply_order(lid)?;
    require!(
        filled || !fill_or_kill,
        Precondition,
        "fill-or-kill order was not fully matched"
    );
    Ok(())
}

pub(super) fn apply_limit_order_create(
    chain: &mut Chain,
    op: &LimitOrderCreateOperation,
) -> Result<(), Error> {
    create_order(
        chain,
        &op.owner,
        op.order_id,
        op.amount_to_sell,
        op.sell_price(),
        op.fill_or_kill,
        op.expiration,
    )
}

pub(super) fn apply_limit_order_create2(
    chain: &mut Chain,
    op: &LimitOrderCreate2Operation,
) -> Result<(), Error> {
    create_order(
        chain,
        &op.owner,
        op.order_id,
        op.amount_to_sell,
        op.exchange_rate,
        op.fill_or_kill,
        op.expiration,
    )
}

pub(super) fn apply_limit_order_cancel(
    chain: &mut Chain,
    op: &LimitOrderCancelOperation,
) -> Result<(), Error> {
    let lid = chain
        .store()
        .limit_orders
        .indexes
        .by_account
        .get(&(op.owner.clone(), op.order_id))
        .copied()
        .ok_or_else(|| Error::Precondition("no such order".into()))?;
    chain.cancel_order(lid, true)
}
