// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{check, ValidationError, PERCENT_100};
use crate::types::{is_valid_account_name, AccountName, Asset, Symbol};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub const MAX_PERMLINK_LEN: usize = 256;
pub const MAX_TITLE_LEN: usize = 256;
/// Maximum number of beneficiary routes on one comment.
pub const MAX_COMMENT_BENEFICIARIES: usize = 8;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct VoteOperation {
    pub voter: AccountName,
    pub author: AccountName,
    pub permlink: String,
    /// Signed vote strength in basis points; negative is a downvote, zero
    /// removes a previous vote.
    pub weight: i16,
}

impl VoteOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.voter), "invalid voter name");
        check!(is_valid_account_name(&self.author), "invalid author name");
        check!(
            self.weight.unsigned_abs() <= PERCENT_100,
            "vote weight out of range: {}",
            self.weight
        );
        check!(
            !self.permlink.is_empty() && self.permlink.len() < MAX_PERMLINK_LEN,
            "bad permlink length"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CommentOperation {
    /// Empty for a top-level post.
    pub parent_author: String,
    /// For a top-level post this is the category.
    pub parent_permlink: String,
    pub author: AccountName,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

impl CommentOperation {
    pub fn is_root(&self) -> bool {
        self.parent_author.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.author), "invalid author name");
        check!(
            self.parent_author.is_empty() || is_valid_account_name(&self.parent_author),
            "invalid parent author"
        );
        check!(
            !self.permlink.is_empty() && self.permlink.len() < MAX_PERMLINK_LEN,
            "bad permlink length"
        );
        check!(
            !self.parent_permlink.is_empty() && self.parent_permlink.len() < MAX_PERMLINK_LEN,
            "bad parent permlink length"
        );
        check!(self.title.len() <= MAX_TITLE_LEN, "title too long");
        check!(!self.body.is_empty(), "body must not be empty");
        if !self.json_metadata.is_empty() {
            check!(
                serde_json::from_str::<serde_json::Value>(&self.json_metadata).is_ok(),
                "json_metadata is not valid json"
            );
        }
        Ok(())
    }
}

/// A share of a comment's author reward redirected to another account.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BeneficiaryRoute {
    pub account: AccountName,
    pub weight: u16,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CommentOptionsOperation {
    pub author: AccountName,
    pub permlink: String,
    /// Cap on the total payout; the stable-asset sentinel for "unlimited"
    /// is the default.
    pub max_accepted_payout: Asset,
    /// Portion of the author reward paid in the stable asset, in basis
    /// points of one half of the payout.
    pub percent_grove_dollars: u16,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub beneficiaries: SmallVec<[BeneficiaryRoute; 2]>,
}

impl CommentOptionsOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.author), "invalid author name");
        check!(
            self.max_accepted_payout.symbol == Symbol::GBD,
            "max_accepted_payout must be denominated in the stable asset"
        );
        check!(
            self.max_accepted_payout.amount >= 0,
            "max_accepted_payout cannot be negative"
        );
        check!(
            self.percent_grove_dollars <= PERCENT_100,
            "percent_grove_dollars out of range"
        );
        check!(
            self.beneficiaries.len() <= MAX_COMMENT_BENEFICIARIES,
            "too many beneficiaries"
        );
        let mut total: u32 = 0;
        let mut prev: Option<&AccountName> = None;
        for route in &self.beneficiaries {
            check!(
                is_valid_account_name(&route.account),
                "invalid beneficiary name"
            );
            check!(route.weight as u32 <= PERCENT_100 as u32, "beneficiary weight too large");
            if let Some(prev) = prev {
                check!(
                    prev < &route.account,
                    "beneficiaries must be sorted and unique"
                );
            }
            prev = Some(&route.account);
            total += u32::from(route.weight);
        }
        check!(
            total <= u32::from(PERCENT_100),
            "beneficiary weights exceed 100%"
        );
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DeleteCommentOperation {
    pub author: AccountName,
    pub permlink: String,
}

impl DeleteCommentOperation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check!(is_valid_account_name(&self.author), "invalid author name");
        check!(
            !self.permlink.is_empty() && self.permlink.len() < MAX_PERMLINK_LEN,
            "bad permlink length"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn beneficiaries_must_be_sorted_unique() {
        let mut op = CommentOptionsOperation {
            author: AccountName::from("carol"),
            permlink: "post".into(),
            max_accepted_payout: Asset::gbd(1_000_000_000),
            percent_grove_dollars: PERCENT_100,
            allow_votes: true,
            allow_curation_rewards: true,
            beneficiaries: smallvec![
                BeneficiaryRoute {
                    account: AccountName::from("bob"),
                    weight: 100,
                },
                BeneficiaryRoute {
                    account: AccountName::from("alice"),
                    weight: 100,
                },
            ],
        };
        assert!(op.validate().is_err());
        op.beneficiaries.reverse();
        assert!(op.validate().is_ok());
        op.beneficiaries[0].weight = PERCENT_100;
        op.beneficiaries[1].weight = PERCENT_100;
        assert!(op.validate().is_err());
    }

    #[test]
    fn comment_rejects_bad_metadata() {
        let op = CommentOperation {
            parent_author: String::new(),
            parent_permlink: "cat".into(),
            author: AccountName::from("carol"),
            permlink: "post".into(),
            title: "t".into(),
            body: "b".into(),
            json_metadata: "{not json".into(),
        };
        assert!(op.validate().is_err());
    }
}
