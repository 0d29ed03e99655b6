// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Synthetic operations. Never carried in transactions; the controller
//! emits them while applying blocks so observers (history, market and
//! follow indexes) see every state-changing event in one stream.

use crate::types::{AccountName, Asset};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum VirtualOperation {
    FillOrder {
        current_owner: AccountName,
        current_order_id: u32,
        current_pays: Asset,
        open_owner: AccountName,
        open_order_id: u32,
        open_pays: Asset,
    },
    FillCallOrder {
        owner: AccountName,
        debt_paid: Asset,
        collateral_paid: Asset,
    },
    FillSettlement {
        owner: AccountName,
        settled: Asset,
        received: Asset,
    },
    AuthorReward {
        author: AccountName,
        permlink: String,
        gbd_payout: Asset,
        grove_payout: Asset,
        vesting_payout: Asset,
    },
    CurationReward {
        curator: AccountName,
        reward: Asset,
        comment_author: AccountName,
        comment_permlink: String,
    },
    CommentReward {
        author: AccountName,
        permlink: String,
        payout: Asset,
    },
    CommentBenefactorReward {
        benefactor: AccountName,
        author: AccountName,
        permlink: String,
        reward: Asset,
    },
    ProducerReward {
        producer: AccountName,
        vesting_shares: Asset,
    },
    LiquidityReward {
        owner: AccountName,
        payout: Asset,
    },
    Interest {
        owner: AccountName,
        interest: Asset,
    },
    FillConvertRequest {
        owner: AccountName,
        request_id: u32,
        amount_in: Asset,
        amount_out: Asset,
    },
    FillVestingWithdraw {
        from_account: AccountName,
        to_account: AccountName,
        withdrawn: Asset,
        deposited: Asset,
    },
    FillTransferFromSavings {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        request_id: u32,
        memo: String,
    },
    ReturnVestingDelegation {
        account: AccountName,
        vesting_shares: Asset,
    },
    ShutdownWitness {
        witness: AccountName,
    },
    Hardfork {
        hardfork_id: u32,
    },
}
