// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chain state records and the [`Store`] that holds them. Every record is
//! a plain value addressed by a stable id; cross-references go through ids
//! or names, never pointers.

mod account;
mod asset;
mod comment;
mod market;
mod misc;
mod props;
mod store;
mod witness;

pub use account::*;
pub use asset::*;
pub use comment::*;
pub use market::*;
pub use misc::*;
pub use props::*;
pub use store::Store;
pub use witness::*;
