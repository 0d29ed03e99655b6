// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    CancelTransferFromSavingsOperation, ConvertOperation, DelegateVestingSharesOperation,
    SetWithdrawVestingRouteOperation, TransferFromSavingsOperation, TransferOperation,
    TransferToSavingsOperation, TransferToVestingOperation, WithdrawVestingOperation, PERCENT_100,
};
use crate::state::{
    ConvertRequest, SavingsWithdraw, VestingDelegation, VestingDelegationExpiration,
    WithdrawVestingRoute,
};
use crate::types::{Asset, Timestamp};

const MAX_SAVINGS_WITHDRAW_REQUESTS: u16 = 100;
const MAX_WITHDRAW_ROUTES: u16 = 10;

pub(super) fn apply_transfer(chain: &mut Chain, op: &TransferOperation) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from)?;
    let to_id = chain.get_account_id(&op.to)?;
    chain.adjust_balance(from_id, -op.amount)?;
    chain.adjust_balance(to_id, op.amount)?;
    Ok(())
}

pub(super) fn apply_transfer_to_vesting(
    chain: &mut Chain,
    op: &TransferToVestingOperation,
) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from)?;
    let to_id = chain.get_account_id(&op.receiver())?;
    chain.adjust_balance(from_id, -op.amount)?;
    chain.create_vesting(to_id, op.amount)?;
    Ok(())
}

pub(super) fn apply_withdraw_vesting(
    chain: &mut Chain,
    op: &WithdrawVestingOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    let account = chain.store().accounts.get(account_id)?.clone();

    if op.vesting_shares.amount == 0 {
        require!(
            account.vesting_withdraw_rate.amount != 0,
            Precondition,
            "no withdrawal to cancel"
        );
        chain.store.accounts.modify(account_id, |a| {
            a.vesting_withdraw_rate = Asset::vests(0);
            a.next_vesting_withdrawal = Timestamp::MAX;
            a.to_withdraw = 0;
            a.withdrawn = 0;
        })?;
        return Ok(());
    }

    let available = account.vesting_shares - account.delegated_vesting_shares;
    require!(
        available.amount >= op.vesting_shares.amount,
        Precondition,
        "insufficient undelegated vesting shares"
    );
    let intervals = chain.config().vesting_withdraw_intervals as i64;
    let rate = (op.vesting_shares.amount / intervals).max(1);
    let next = chain.head_block_time() + chain.config().vesting_withdraw_interval_secs;
    chain.store.accounts.modify(account_id, |a| {
        a.vesting_withdraw_rate = Asset::vests(rate);
        a.next_vesting_withdrawal = next;
        a.to_withdraw = op.vesting_shares.amount;
        a.withdrawn = 0;
    })?;
    Ok(())
}

pub(super) fn apply_set_withdraw_vesting_route(
    chain: &mut Chain,
    op: &SetWithdrawVestingRouteOperation,
) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from_account)?;
    chain.get_account_id(&op.to_account)?;

    let key = (op.from_account.clone(), op.to_account.clone());
    let existing = chain.store().withdraw_routes.indexes.by_route.get(&key).copied();
    let route_count = chain.store().accounts.get(from_id)?.withdraw_routes;

    match (existing, op.percent) {
        (None, 0) => {
            return Err(Error::Precondition("no route to remove".into()));
        }
        (None, _) => {
            require!(
                route_count < MAX_WITHDRAW_ROUTES,
                Precondition,
                "too many withdraw routes"
            );
            chain.store.withdraw_routes.insert(|_| WithdrawVestingRoute {
                from_account: op.from_account.clone(),
                to_account: op.to_account.clone(),
                percent: op.percent,
                auto_vest: op.auto_vest,
            });
            chain
                .store
                .accounts
                .modify(from_id, |a| a.withdraw_routes += 1)?;
        }
        (Some(route_id), 0) => {
            chain.store.withdraw_routes.remove(route_id)?;
            chain
                .store
                .accounts
                .modify(from_id, |a| a.withdraw_routes -= 1)?;
        }
        (Some(route_id), _) => {
            chain.store.withdraw_routes.modify(route_id, |r| {
                r.percent = op.percent;
                r.auto_vest = op.auto_vest;
            })?;
        }
    }

    // The combined routing must stay within the whole installment.
    let total: u32 = chain
        .store()
        .withdraw_routes
        .indexes
        .by_from
        .range((op.from_account.clone(), crate::db::ObjectId::new(0))..)
        .take_while(|((from, _), _)| *from == op.from_account)
        .filter_map(|((_, id), _)| chain.store().withdraw_routes.get(*id).ok())
        .map(|r| u32::from(r.percent))
        .sum();
    require!(
        total <= u32::from(PERCENT_100),
        Precondition,
        "withdraw routes exceed 100%"
    );
    Ok(())
}

pub(super) fn apply_transfer_to_savings(
    chain: &mut Chain,
    op: &TransferToSavingsOperation,
) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from)?;
    let to_id = chain.get_account_id(&op.to)?;
    chain.adjust_balance(from_id, -op.amount)?;
    chain.adjust_savings_balance(to_id, op.amount)?;
    Ok(())
}

pub(super) fn apply_transfer_from_savings(
    chain: &mut Chain,
    op: &TransferFromSavingsOperation,
) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from)?;
    chain.get_account_id(&op.to)?;
    let requests = chain.store().accounts.get(from_id)?.savings_withdraw_requests;
    require!(
        requests < MAX_SAVINGS_WITHDRAW_REQUESTS,
        Precondition,
        "too many pending savings withdrawals"
    );
    require!(
        chain
            .store()
            .savings_withdraws
            .indexes
            .by_from_rid
            .get(&(op.from.clone(), op.request_id))
            .is_none(),
        Precondition,
        "request id already in use"
    );
    chain.adjust_savings_balance(from_id, -op.amount)?;
    let complete = chain.head_block_time() + chain.config().savings_withdraw_delay_secs;
    chain.store.savings_withdraws.insert(|_| SavingsWithdraw {
        from: op.from.clone(),
        to: op.to.clone(),
        memo: op.memo.clone(),
        request_id: op.request_id,
        amount: op.amount,
        complete,
    });
    chain
        .store
        .accounts
        .modify(from_id, |a| a.savings_withdraw_requests += 1)?;
    Ok(())
}

pub(super) fn apply_cancel_transfer_from_savings(
    chain: &mut Chain,
    op: &CancelTransferFromSavingsOperation,
) -> Result<(), Error> {
    let from_id = chain.get_account_id(&op.from)?;
    let withdraw_id = chain
        .store()
        .savings_withdraws
        .indexes
        .by_from_rid
        .get(&(op.from.clone(), op.request_id))
        .copied()
        .ok_or_else(|| Error::Precondition("no such savings withdrawal".into()))?;
    let withdraw = chain.store.savings_withdraws.remove(withdraw_id)?;
    chain.adjust_savings_balance(from_id, withdraw.amount)?;
    chain
        .store
        .accounts
        .modify(from_id, |a| a.savings_withdraw_requests -= 1)?;
    Ok(())
}

pub(super) fn apply_convert(chain: &mut Chain, op: &ConvertOperation) -> Result<(), Error> {
    let owner_id = chain.get_account_id(&op.owner)?;
    require!(
        chain
            .store()
            .convert_requests
            .indexes
            .by_owner
            .get(&(op.owner.clone(), op.request_id))
            .is_none(),
        Precondition,
        "request id already in use"
    );
    require!(
        chain.store().feed_history.get().current_median_history.is_some(),
        Precondition,
        "no price feed to convert against"
    );
    chain.adjust_balance(owner_id, -op.amount)?;
    // The stable amount sits in the request until the delayed fill; the
    // supply entry moves with it.
    let conversion_date = chain.head_block_time() + chain.config().conversion_delay_secs;
    chain.store.convert_requests.insert(|_| ConvertRequest {
        owner: op.owner.clone(),
        request_id: op.request_id,
        amount: op.amount,
        conversion_date,
    });
    Ok(())
}

pub(super) fn apply_delegate_vesting_shares(
    chain: &mut Chain,
    op: &DelegateVestingSharesOperation,
) -> Result<(), Error> {
    let delegator_id = chain.get_account_id(&op.delegator)?;
    let delegatee_id = chain.get_account_id(&op.delegatee)?;
    let delegator = chain.store().accounts.get(delegator_id)?.clone();

    let key = (op.delegator.clone(), op.delegatee.clone());
    let existing = chain
        .store()
        .vesting_delegations
        .indexes
        .by_delegation
        .get(&key)
        .copied();
    let current = match existing {
        Some(id) => chain.store().vesting_delegations.get(id)?.vesting_shares,
        None => Asset::vests(0),
    };
    let delta = op.vesting_shares - current;

    if delta.amount > 0 {
        let available = delegator.vesting_shares
            - delegator.delegated_vesting_shares
            - Asset::vests(delegator.to_withdraw - delegator.withdrawn);
        require!(
            available.amount >= delta.amount,
            Precondition,
            "insufficient vesting shares to delegate"
        );
        chain
            .store
            .accounts
            .modify(delegator_id, |a| a.delegated_vesting_shares += delta)?;
        chain
            .store
            .accounts
            .modify(delegatee_id, |a| a.received_vesting_shares += delta)?;
        match existing {
            Some(id) => chain
                .store
                .vesting_delegations
                .modify(id, |d| d.vesting_shares = op.vesting_shares)?,
            None => {
                let min_delegation_time = chain.head_block_time();
                chain.store.vesting_delegations.insert(|_| VestingDelegation {
                    delegator: op.delegator.clone(),
                    delegatee: op.delegatee.clone(),
                    vesting_shares: op.vesting_shares,
                    min_delegation_time,
                });
            }
        }
    } else if delta.amount < 0 {
        let returned = -delta;
        // The freed shares stay locked until the return period passes.
        let expiration =
            chain.head_block_time() + chain.config().delegation_return_period_secs;
        chain
            .store
            .delegation_expirations
            .insert(|_| VestingDelegationExpiration {
                delegator: op.delegator.clone(),
                vesting_shares: returned,
                expiration,
            });
        chain
            .store
            .accounts
            .modify(delegatee_id, |a| a.received_vesting_shares += delta)?;
        match existing {
            Some(id) if op.vesting_shares.amount == 0 => {
                chain.store.vesting_delegations.remove(id)?;
            }
            Some(id) => chain
                .store
                .vesting_delegations
                .modify(id, |d| d.vesting_shares = op.vesting_shares)?,
            None => return Err(Error::Precondition("no delegation to reduce".into())),
        }
    } else {
        return Err(Error::Precondition("delegation unchanged".into()));
    }
    Ok(())
}
