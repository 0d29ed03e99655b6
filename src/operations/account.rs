// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError};
use crate::crypto::PublicKey;
use crate::types::{is_valid_account_name, AccountName, Asset, Authority, Symbol};
use serde::{Deserialize, Serialize};

fn validate_new_account_authorities(
    owner: &Authority,
    active: &Authority,
    posting: &Authority,
) -> Result<(), ValidationError> {
    for (label, auth) in [("owner", owner), ("active", active), ("posting", posting)] {
        check!(auth.validate(), "invalid {label} authority");
    }
    Ok(())
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AccountCreateOperation {
    /// Paid by the creator and converted into the new account's vesting.
    pub fee: Asset,
    pub creator: AccountName,
    pub new_account_name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountCreateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.creator), "invalid creator name");
        check!(
            is_valid_account_name(&self.new_account_name),
            "invalid new account name"
        );
        check!(self.fee.symbol == Symbol::GROVE, "fee must be the core asset");
        check!(self.fee.amount >= 0, "fee cannot be negative");
        validate_new_account_authorities(&self.owner, &self.active, &self.posting)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AccountCreateWithDelegationOperation {
    pub fee: Asset,
    pub delegation: Asset,
    pub creator: AccountName,
    pub new_account_name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountCreateWithDelegationOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.creator), "invalid creator name");
        check!(
            is_valid_account_name(&self.new_account_name),
            "invalid new account name"
        );
        check!(self.fee.symbol == Symbol::GROVE, "fee must be the core asset");
        check!(self.fee.amount >= 0, "fee cannot be negative");
        check!(
            self.delegation.symbol == Symbol::VESTS,
            "delegation must be vesting shares"
        );
        check!(self.delegation.amount >= 0, "delegation cannot be negative");
        validate_new_account_authorities(&self.owner, &self.active, &self.posting)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AccountUpdateOperation {
    pub account: AccountName,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub posting: Option<Authority>,
    pub memo_key: Option<PublicKey>,
    pub json_metadata: String,
}

impl AccountUpdateOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        for (label, auth) in [
            ("owner", &self.owner),
            ("active", &self.active),
            ("posting", &self.posting),
        ] {
            if let Some(auth) = auth {
                check!(auth.validate(), "invalid {label} authority");
            }
        }
        if !self.json_metadata.is_empty() {
            check!(
                serde_json::from_str::<serde_json::Value>(&self.json_metadata).is_ok(),
                "json_metadata is not valid json"
            );
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DeclineVotingRightsOperation {
    pub account: AccountName,
    pub decline: bool,
}

impl DeclineVotingRightsOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        Ok(())
    }
}

/// Replace a compromised account's owner authority with one supplied by
/// its designated reset account after prolonged inactivity.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ResetAccountOperation {
    pub reset_account: AccountName,
    pub account_to_reset: AccountName,
    pub new_owner_authority: Authority,
}

impl ResetAccountOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.reset_account),
            "invalid reset account"
        );
        check!(
            is_valid_account_name(&self.account_to_reset),
            "invalid account to reset"
        );
        check!(
            self.new_owner_authority.validate(),
            "invalid new owner authority"
        );
        check!(
            !self.new_owner_authority.is_impossible(),
            "new owner authority cannot be impossible"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SetResetAccountOperation {
    pub account: AccountName,
    pub current_reset_account: String,
    pub reset_account: AccountName,
}

impl SetResetAccountOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.account), "invalid account name");
        check!(
            is_valid_account_name(&self.reset_account),
            "invalid reset account"
        );
        check!(
            self.current_reset_account.is_empty()
                || is_valid_account_name(&self.current_reset_account),
            "invalid current reset account"
        );
        check!(
            self.current_reset_account != self.reset_account.as_str(),
            "reset account unchanged"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChallengeAuthorityOperation {
    pub challenger: AccountName,
    pub challenged: AccountName,
    pub require_owner: bool,
}

impl ChallengeAuthorityOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.challenger), "invalid challenger");
        check!(is_valid_account_name(&self.challenged), "invalid challenged");
        check!(
            self.challenger != self.challenged,
            "cannot challenge yourself"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProveAuthorityOperation {
    pub challenged: AccountName,
    pub require_owner: bool,
}

impl ProveAuthorityOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.challenged), "invalid challenged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn account_create_checks_fee_symbol() {
        let key = SecretKey::from_seed("k").public_key();
        let op = AccountCreateOperation {
            fee: Asset::gbd(1),
            creator: AccountName::from("alice"),
            new_account_name: AccountName::from("newbie"),
            owner: Authority::single_key(key),
            active: Authority::single_key(key),
            posting: Authority::single_key(key),
            memo_key: key,
            json_metadata: String::new(),
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn self_challenge_rejected() {
        let op = ChallengeAuthorityOperation {
            challenger: AccountName::from("alice"),
            challenged: AccountName::from("alice"),
            require_owner: false,
        };
        assert!(op.validate().is_err());
    }
}
