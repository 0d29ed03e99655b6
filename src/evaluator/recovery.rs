// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    ChangeRecoveryAccountOperation, RecoverAccountOperation, RequestAccountRecoveryOperation,
};
use crate::state::{AccountRecoveryRequest, ChangeRecoveryAccountRequest, OwnerAuthorityHistory};

pub(super) fn apply_request_account_recovery(
    chain: &mut Chain,
    op: &RequestAccountRecoveryOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account_to_recover)?;
    let account = chain.store().accounts.get(account_id)?.clone();
    require!(
        account.recovery_account.as_ref() == Some(&op.recovery_account),
        Precondition,
        "{} is not the recovery partner of {}",
        op.recovery_account,
        op.account_to_recover
    );
    let existing = chain
        .store()
        .recovery_requests
        .indexes
        .by_account
        .get(&op.account_to_recover)
        .copied();

    if op.new_owner_authority.num_auths() == 0 {
        // An empty authority withdraws the request.
        let request_id =
            existing.ok_or_else(|| Error::Precondition("no request to withdraw".into()))?;
        chain.store.recovery_requests.remove(request_id)?;
        return Ok(());
    }
    require!(
        !op.new_owner_authority.is_impossible(),
        Precondition,
        "cannot recover to an impossible authority"
    );

    let expires =
        chain.head_block_time() + chain.config().account_recovery_request_expiration_secs;
    match existing {
        Some(request_id) => chain.store.recovery_requests.modify(request_id, |r| {
            r.new_owner_authority = op.new_owner_authority.clone();
            r.expires = expires;
        })?,
        None => {
            chain.store.recovery_requests.insert(|_| AccountRecoveryRequest {
                account_to_recover: op.account_to_recover.clone(),
                new_owner_authority: op.new_owner_authority.clone(),
                expires,
            });
        }
    }
    Ok(())
}

pub(super) fn apply_recover_account(
    chain: &mut Chain,
    op: &RecoverAccountOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account_to_recover)?;
    let account = chain.store().accounts.get(account_id)?.clone();
    let now = chain.head_block_time();
    require!(
        now.secs_since(account.last_account_recovery) > chain.config().owner_update_limit_secs,
        Precondition,
        "account was recovered too recently"
    );

    let request_id = chain
        .store()
        .recovery_requests
        .indexes
        .by_account
        .get(&op.account_to_recover)
        .copied()
        .ok_or_else(|| Error::Precondition("no recovery request is pending".into()))?;
    let request = chain.store().recovery_requests.get(request_id)?;
    require!(
        request.new_owner_authority == op.new_owner_authority,
        Precondition,
        "new authority does not match the pending request"
    );

    // The proven recent authority must genuinely be a recent owner.
    let window_ok = account.owner == op.recent_owner_authority
        || chain
            .store()
            .owner_histories
            .indexes
            .by_account
            .range((op.account_to_recover.clone(), crate::db::ObjectId::new(0))..)
            .take_while(|((name, _), _)| *name == op.account_to_recover)
            .filter_map(|((_, id), _)| chain.store().owner_histories.get(*id).ok())
            .any(|h| {
                h.previous_owner_authority == op.recent_owner_authority && h.last_valid_time >= now
            });
    require!(
        window_ok,
        Precondition,
        "recent owner authority is not in the recovery window"
    );

    chain.store.recovery_requests.remove(request_id)?;
    let window = chain.config().owner_auth_recovery_secs;
    chain.store.owner_histories.insert(|_| OwnerAuthorityHistory {
        account: op.account_to_recover.clone(),
        previous_owner_authority: account.owner.clone(),
        last_valid_time: now + window,
    });
    chain.store.accounts.modify(account_id, |a| {
        a.owner = op.new_owner_authority.clone();
        a.last_owner_update = now;
        a.last_account_recovery = now;
    })?;
    Ok(())
}

pub(super) fn apply_change_recovery_account(
    chain: &mut Chain,
    op: &ChangeRecoveryAccountOperation,
) -> Result<(), Error> {
    chain.get_account_id(&op.new_recovery_account)?;
    chain.get_account_id(&op.account_to_recover)?;

    let effective_on = chain.head_block_time() + chain.config().owner_auth_recovery_secs;
    let existing = chain
        .store()
        .change_recovery_requests
        .indexes
        .by_account
        .get(&op.account_to_recover)
        .copied();
    match existing {
        Some(request_id) => {
            chain
                .store
                .change_recovery_requests
                .modify(request_id, |r| {
                    r.recovery_account = op.new_recovery_account.clone();
                    r.effective_on = effective_on;
                })?;
        }
        None => {
            chain
                .store
                .change_recovery_requests
                .insert(|_| ChangeRecoveryAccountRequest {
                    account_to_recover: op.account_to_recover.clone(),
                    recovery_account: op.new_recovery_account.clone(),
                    effective_on,
                });
        }
    }
    Ok(())
}
