// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::genesis::NULL_ACCOUNT;
use crate::operations::{
    AccountCreateOperation, AccountCreateWithDelegationOperation, AccountUpdateOperation,
    ChallengeAuthorityOperation, DeclineVotingRightsOperation, ProveAuthorityOperation,
    ResetAccountOperation, SetResetAccountOperation,
};
use crate::state::{
    Account, DeclineVotingRightsRequest, OwnerAuthorityHistory, VestingDelegation,
};
use crate::types::{Asset, Authority};

fn charge_creation_fee(chain: &mut Chain, op_fee: Asset, creator: crate::state::AccountId) -> Result<(), Error> {
    let median_fee = chain
        .store()
        .witness_schedule
        .get()
        .median_props
        .account_creation_fee;
    require!(
        op_fee.amount >= median_fee.amount,
        Precondition,
        "creation fee {op_fee} below the elected minimum {median_fee}"
    );
    chain.adjust_balance(creator, -op_fee)
}

fn insert_account(
    chain: &mut Chain,
    op_name: &crate::types::AccountName,
    owner: &Authority,
    active: &Authority,
    posting: &Authority,
    memo_key: crate::crypto::PublicKey,
    json_metadata: &str,
    recovery_account: &crate::types::AccountName,
) -> Result<crate::state::AccountId, Error> {
    require!(
        chain.store().find_account(op_name).is_none(),
        Precondition,
        "account {op_name} already exists"
    );
    for authority in [owner, active, posting] {
        for name in authority.account_auths.keys() {
            chain.get_account_id(name)?;
        }
        require!(
            authority.num_auths() <= chain.config().max_authority_membership,
            Precondition,
            "authority has too many members"
        );
    }
    let now = chain.head_block_time();
    let id = chain.store.accounts.insert(|_| {
        let mut account = Account::starter(op_name.clone(), memo_key, now);
        account.owner = owner.clone();
        account.active = active.clone();
        account.posting = posting.clone();
        account.json_metadata = json_metadata.to_owned();
        account.recovery_account = Some(recovery_account.clone());
        account
    });
    Ok(id)
}

pub(super) fn apply_account_create(
    chain: &mut Chain,
    op: &AccountCreateOperation,
) -> Result<(), Error> {
    let creator_id = chain.get_account_id(&op.creator)?;
    charge_creation_fee(chain, op.fee, creator_id)?;
    let new_id = insert_account(
        chain,
        &op.new_account_name,
        &op.owner,
        &op.active,
        &op.posting,
        op.memo_key,
        &op.json_metadata,
        &op.creator,
    )?;
    // The fee seeds the newcomer's stake.
    if op.fee.amount > 0 {
        chain.create_vesting(new_id, op.fee)?;
    }
    Ok(())
}

pub(super) fn apply_account_create_with_delegation(
    chain: &mut Chain,
    op: &AccountCreateWithDelegationOperation,
) -> Result<(), Error> {
    let creator_id = chain.get_account_id(&op.creator)?;
    let creator = chain.store().accounts.get(creator_id)?.clone();
    if op.delegation.amount > 0 {
        let available = creator.vesting_shares - creator.delegated_vesting_shares;
        require!(
            available.amount >= op.delegation.amount,
            Precondition,
            "insufficient vesting shares to delegate"
        );
    }
    charge_creation_fee(chain, op.fee, creator_id)?;
    let new_id = insert_account(
        chain,
        &op.new_account_name,
        &op.owner,
        &op.active,
        &op.posting,
        op.memo_key,
        &op.json_metadata,
        &op.creator,
    )?;
    if op.fee.amount > 0 {
        chain.create_vesting(new_id, op.fee)?;
    }
    if op.delegation.amount > 0 {
        chain
            .store
            .accounts
            .modify(creator_id, |a| a.delegated_vesting_shares += op.delegation)?;
        chain
            .store
            .accounts
            .modify(new_id, |a| a.received_vesting_shares += op.delegation)?;
        let min_delegation_time = chain.head_block_time();
        chain.store.vesting_delegations.insert(|_| VestingDelegation {
            delegator: op.creator.clone(),
            delegatee: op.new_account_name.clone(),
            vesting_shares: op.delegation,
            min_delegation_time,
        });
    }
    Ok(())
}

pub(super) fn apply_account_update(
    chain: &mut Chain,
    op: &AccountUpdateOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    let account = chain.store().accounts.get(account_id)?.clone();
    let now = chain.head_block_time();

    for authority in [&op.owner, &op.active, &op.posting].into_iter().flatten() {
        for name in authority.account_auths.keys() {
            chain.get_account_id(name)?;
        }
        require!(
            authority.num_auths() <= chain.config().max_authority_membership,
            Precondition,
            "authority has too many members"
        );
    }

    if let Some(new_owner) = &op.owner {
        require!(
            now.secs_since(account.last_owner_update) > chain.config().owner_update_limit_secs
                || account.last_owner_update == crate::types::Timestamp(0),
            Precondition,
            "owner authority updated too recently"
        );
        // Retain the outgoing authority so it can prove ownership during
        // the recovery window.
        let window = chain.config().owner_auth_recovery_secs;
        chain.store.owner_histories.insert(|_| OwnerAuthorityHistory {
            account: op.account.clone(),
            previous_owner_authority: account.owner.clone(),
            last_valid_time: now + window,
        });
        let new_owner = new_owner.clone();
        chain.store.accounts.modify(account_id, |a| {
            a.owner = new_owner;
            a.last_owner_update = now;
        })?;
    }
    chain.store.accounts.modify(account_id, |a| {
        if let Some(active) = &op.active {
            a.active = active.clone();
        }
        if let Some(posting) = &op.posting {
            a.posting = posting.clone();
        }
        if let Some(memo_key) = op.memo_key {
            a.memo_key = memo_key;
        }
        if !op.json_metadata.is_empty() {
            a.json_metadata = op.json_metadata.clone();
        }
        a.last_account_update = now;
    })?;
    Ok(())
}

pub(super) fn apply_challenge_authority(
    chain: &mut Chain,
    op: &ChallengeAuthorityOperation,
) -> Result<(), Error> {
    let challenger_id = chain.get_account_id(&op.challenger)?;
    let challenged_id = chain.get_account_id(&op.challenged)?;
    let challenged = chain.store().accounts.get(challenged_id)?.clone();
    let fee = if op.require_owner {
        Asset::grove(chain.config().owner_challenge_fee)
    } else {
        Asset::grove(chain.config().active_challenge_fee)
    };
    if op.require_owner {
        require!(!challenged.owner_challenged, Precondition, "already challenged");
    } else {
        require!(!challenged.active_challenged, Precondition, "already challenged");
    }
    // The fee burns; challenges must cost something.
    chain.adjust_balance(challenger_id, -fee)?;
    chain.adjust_supply(-fee)?;
    chain.store.accounts.modify(challenged_id, |a| {
        if op.require_owner {
            a.owner_challenged = true;
        } else {
            a.active_challenged = true;
        }
    })?;
    Ok(())
}

pub(super) fn apply_prove_authority(
    chain: &mut Chain,
    op: &ProveAuthorityOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.challenged)?;
    let account = chain.store().accounts.get(account_id)?;
    require!(
        account.active_challenged || account.owner_challenged,
        Precondition,
        "account is not challenged"
    );
    let now = chain.head_block_time();
    chain.store.accounts.modify(account_id, |a| {
        a.active_challenged = false;
        a.last_active_proved = now;
        if op.require_owner {
            a.owner_challenged = false;
            a.last_owner_proved = now;
        }
    })?;
    Ok(())
}

pub(super) fn apply_decline_voting_rights(
    chain: &mut Chain,
    op: &DeclineVotingRightsOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    let existing = chain
        .store()
        .decline_voting_requests
        .indexes
        .by_account
        .get(&op.account)
        .copied();
    if op.decline {
        require!(
            chain.store().accounts.get(account_id)?.can_vote,
            Precondition,
            "voting rights already declined"
        );
        require!(existing.is_none(), Precondition, "request already pending");
        let effective_date =
            chain.head_block_time() + chain.config().owner_auth_recovery_secs;
        chain
            .store
            .decline_voting_requests
            .insert(|_| DeclineVotingRightsRequest {
                account: op.account.clone(),
                effective_date,
            });
    } else {
        let request_id =
            existing.ok_or_else(|| Error::Precondition("no request to cancel".into()))?;
        chain.store.decline_voting_requests.remove(request_id)?;
    }
    Ok(())
}

pub(super) fn apply_reset_account(chain: &mut Chain, op: &ResetAccountOperation) -> Result<(), Error> {
    chain.get_account_id(&op.reset_account)?;
    let target_id = chain.get_account_id(&op.account_to_reset)?;
    let target = chain.store().accounts.get(target_id)?.clone();
    require!(
        target.reset_account.as_ref() == Some(&op.reset_account),
        Precondition,
        "{} is not the designated reset account",
        op.reset_account
    );
    // Only a long-dormant account may be reset.
    let dormant_after = chain.config().owner_auth_recovery_secs;
    let last_activity = target
        .last_account_update
        .max(target.last_vote_time)
        .max(target.last_post);
    require!(
        chain.head_block_time().secs_since(last_activity) >= dormant_after,
        Precondition,
        "account is not dormant"
    );
    let now = chain.head_block_time();
    chain.store.accounts.modify(target_id, |a| {
        a.owner = op.new_owner_authority.clone();
        a.last_owner_update = now;
    })?;
    Ok(())
}

pub(super) fn apply_set_reset_account(
    chain: &mut Chain,
    op: &SetResetAccountOperation,
) -> Result<(), Error> {
    let account_id = chain.get_account_id(&op.account)?;
    chain.get_account_id(&op.reset_account)?;
    let account = chain.store().accounts.get(account_id)?;
    let current = account
        .reset_account
        .as_ref()
        .map(|name| name.as_str())
        .unwrap_or(NULL_ACCOUNT);
    require!(
        current == op.current_reset_account || op.current_reset_account.is_empty(),
        Precondition,
        "current reset account mismatch"
    );
    let new_reset = op.reset_account.clone();
    chain
        .store
        .accounts
        .modify(account_id, |a| a.reset_account = Some(new_reset))?;
    Ok(())
}
