// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Value types shared across the chain: amounts, prices, authorities and
//! timestamps.

mod asset;
mod authority;
mod time;

pub use asset::{Asset, Price, Symbol};
pub use authority::{is_valid_account_name, AccountName, Authority};
pub use time::Timestamp;
