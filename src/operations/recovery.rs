// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError};
use crate::types::{is_valid_account_name, AccountName, Authority};
use serde::{Deserialize, Serialize};

/// Filed by the recovery partner; opens a bounded window during which the
/// owner can be rotated to the requested authority.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RequestAccountRecoveryOperation {
    pub recovery_account: AccountName,
    pub account_to_recover: AccountName,
    /// Empty authority cancels an outstanding request.
    pub new_owner_authority: Authority,
}

impl RequestAccountRecoveryOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.recovery_account),
            "invalid recovery account"
        );
        check!(
            is_valid_account_name(&self.account_to_recover),
            "invalid account to recover"
        );
        check!(
            self.new_owner_authority.num_auths() == 0 || self.new_owner_authority.validate(),
            "invalid new owner authority"
        );
        Ok(())
    }
}

/// Completes a recovery: proves both the requested new authority and a
/// recent owner authority.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RecoverAccountOperation {
    pub account_to_recover: AccountName,
    pub new_owner_authority: Authority,
    pub recent_owner_authority: Authority,
}

impl RecoverAccountOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.account_to_recover),
            "invalid account to recover"
        );
        check!(
            self.new_owner_authority != self.recent_owner_authority,
            "cannot recover to the compromised authority"
        );
        check!(
            !self.new_owner_authority.is_impossible(),
            "new owner authority cannot be impossible"
        );
        check!(self.new_owner_authority.validate(), "invalid new authority");
        check!(
            self.recent_owner_authority.validate(),
            "invalid recent authority"
        );
        Ok(())
    }
}

/// Takes effect after the owner-authority retention window elapses.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountOperation {
    pub account_to_recover: AccountName,
    pub new_recovery_account: AccountName,
}

impl ChangeRecoveryAccountOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            is_valid_account_name(&self.account_to_recover),
            "invalid account name"
        );
        check!(
            is_valid_account_name(&self.new_recovery_account),
            "invalid new recovery account"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn recovery_to_same_authority_rejected() {
        let auth = Authority::single_key(SecretKey::from_seed("k").public_key());
        let op = RecoverAccountOperation {
            account_to_recover: AccountName::from("alice"),
            new_owner_authority: auth.clone(),
            recent_owner_authority: auth,
        };
        assert!(op.validate().is_err());
    }
}
