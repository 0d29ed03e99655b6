// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

/// An on-chain account name. Lowercase labels separated by dots; each label
/// starts with a letter, may contain dashes, and is at least three
/// characters long. Total length 3..=16.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(name: &str) -> Option<AccountName> {
        if is_valid_account_name(name) {
            Some(AccountName(name.to_owned()))
        } else {
            None
        }
    }

    /// Construct without validation. Genesis and tests only; operation
    /// validation rejects invalid names before they reach the store.
    pub fn unchecked(name: &str) -> AccountName {
        AccountName(name.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for AccountName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> AccountName {
        AccountName::unchecked(name)
    }
}

pub fn is_valid_account_name(name: &str) -> bool {
    const MIN_LEN: usize = 3;
    const MAX_LEN: usize = 16;
    if name.len() < MIN_LEN || name.len() > MAX_LEN {
        return false;
    }
    name.split('.').all(|label| {
        let bytes = label.as_bytes();
        bytes.len() >= MIN_LEN
            && bytes[0].is_ascii_lowercase()
            && bytes[bytes.len() - 1] != b'-'
            && bytes
                .iter()
                .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}

/// A weighted-threshold signing descriptor. Satisfied when the weights of
/// the provided keys, plus recursively satisfied account authorities, reach
/// the threshold.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: BTreeMap<AccountName, u16>,
    pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
    /// Single-key authority with threshold one.
    pub fn single_key(key: PublicKey) -> Authority {
        let mut key_auths = BTreeMap::new();
        key_auths.insert(key, 1);
        Authority {
            weight_threshold: 1,
            account_auths: BTreeMap::new(),
            key_auths,
        }
    }

    /// An authority no combination of signatures can satisfy. Used to lock
    /// an account (e.g. the null account).
    pub fn impossible() -> Authority {
        Authority {
            weight_threshold: 1,
            account_auths: BTreeMap::new(),
            key_auths: BTreeMap::new(),
        }
    }

    pub fn is_impossible(&self) -> bool {
        let total: u64 = self
            .account_auths
            .values()
            .chain(self.key_auths.values())
            .map(|&w| u64::from(w))
            .sum();
        total < u64::from(self.weight_threshold)
    }

    pub fn num_auths(&self) -> usize {
        self.account_auths.len() + self.key_auths.len()
    }

    /// Structural validity: names well-formed, threshold nonzero.
    pub fn validate(&self) -> bool {
        self.weight_threshold > 0
            && self
                .account_auths
                .keys()
                .all(|name| is_valid_account_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn account_name_rules() {
        assert!(is_valid_account_name("alice"));
        assert!(is_valid_account_name("alice.bob"));
        assert!(is_valid_account_name("abc-1"));
        assert!(!is_valid_account_name("al"));
        assert!(!is_valid_account_name("Alice"));
        assert!(!is_valid_account_name("alice-"));
        assert!(!is_valid_account_name("1alice"));
        assert!(!is_valid_account_name("alice..bob"));
        assert!(!is_valid_account_name("averyveryverylongname"));
    }

    #[test]
    fn impossible_authority() {
        assert!(Authority::impossible().is_impossible());
        let auth = Authority::single_key(SecretKey::from_seed("k").public_key());
        assert!(!auth.is_impossible());
        assert!(auth.validate());
    }
}
