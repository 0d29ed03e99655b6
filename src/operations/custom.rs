// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError};
use crate::types::{is_valid_account_name, AccountName};
use serde::{Deserialize, Serialize};

pub const MAX_CUSTOM_DATA_LEN: usize = 8192;
pub const MAX_CUSTOM_JSON_ID_LEN: usize = 32;

fn validate_auth_names(names: &[AccountName]) -> Result<(), ValidationError> {
    for name in names {
        check!(is_valid_account_name(name), "invalid auth name {name}");
    }
    Ok(())
}

/// Opaque payload for off-chain consumers; consensus only checks the
/// authorities and size.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CustomOperation {
    pub required_auths: Vec<AccountName>,
    pub id: u16,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

impl CustomOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(!self.required_auths.is_empty(), "at least one auth required");
        check!(self.data.len() <= MAX_CUSTOM_DATA_LEN, "custom data too long");
        validate_auth_names(&self.required_auths)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CustomJsonOperation {
    pub required_auths: Vec<AccountName>,
    pub required_posting_auths: Vec<AccountName>,
    pub id: String,
    pub json: String,
}

impl CustomJsonOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            !self.required_auths.is_empty() || !self.required_posting_auths.is_empty(),
            "at least one auth required"
        );
        check!(self.id.len() <= MAX_CUSTOM_JSON_ID_LEN, "id too long");
        check!(self.json.len() <= MAX_CUSTOM_DATA_LEN, "json too long");
        check!(
            serde_json::from_str::<serde_json::Value>(&self.json).is_ok(),
            "payload is not valid json"
        );
        validate_auth_names(&self.required_auths)?;
        validate_auth_names(&self.required_posting_auths)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CustomBinaryOperation {
    pub required_owner_auths: Vec<AccountName>,
    pub required_active_auths: Vec<AccountName>,
    pub required_posting_auths: Vec<AccountName>,
    pub id: String,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

impl CustomBinaryOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(
            !self.required_owner_auths.is_empty()
                || !self.required_active_auths.is_empty()
                || !self.required_posting_auths.is_empty(),
            "at least one auth required"
        );
        check!(self.id.len() <= MAX_CUSTOM_JSON_ID_LEN, "id too long");
        check!(self.data.len() <= MAX_CUSTOM_DATA_LEN, "custom data too long");
        validate_auth_names(&self.required_owner_auths)?;
        validate_auth_names(&self.required_active_auths)?;
        validate_auth_names(&self.required_posting_auths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_json_must_parse() {
        let op = CustomJsonOperation {
            required_auths: vec![],
            required_posting_auths: vec![AccountName::from("alice")],
            id: "follow".into(),
            json: "[\"follow\",{\"a\":1}]".into(),
        };
        assert!(op.validate().is_ok());
        let bad = CustomJsonOperation {
            json: "nope{".into(),
            ..op
        };
        assert!(bad.validate().is_err());
    }
}
