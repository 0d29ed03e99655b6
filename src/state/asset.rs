// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::db::{ObjectId, StateObject};
use crate::operations::{AssetOptions, BitassetOptions, PriceFeed};
use crate::types::{AccountName, Price, Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type AssetId = ObjectId<AssetObject>;

/// Static description of a user-issued asset. The frequently-mutated
/// supply and fee tallies live in [`AssetDynamicData`] so the undo journal
/// stays small for hot paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetObject {
    pub symbol: Symbol,
    pub issuer: AccountName,
    pub precision: u8,
    pub options: AssetOptions,
    pub is_market_issued: bool,
    pub created: Timestamp,
}

#[derive(Default)]
pub struct AssetIndexes {
    pub by_symbol: BTreeMap<Symbol, AssetId>,
}

impl StateObject for AssetObject {
    type Indexes = AssetIndexes;

    const TYPE_NAME: &'static str = "asset";

    fn index_insert(ix: &mut AssetIndexes, id: AssetId, obj: &AssetObject) {
        ix.by_symbol.insert(obj.symbol, id);
    }

    fn index_remove(ix: &mut AssetIndexes, _id: AssetId, obj: &AssetObject) {
        ix.by_symbol.remove(&obj.symbol);
    }
}

pub type AssetDynamicDataId = ObjectId<AssetDynamicData>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetDynamicData {
    pub symbol: Symbol,
    pub current_supply: i64,
    /// Market fees collected and not yet claimed by the issuer.
    pub accumulated_fees: i64,
    pub fee_pool: i64,
}

#[derive(Default)]
pub struct AssetDynamicDataIndexes {
    pub by_symbol: BTreeMap<Symbol, AssetDynamicDataId>,
}

impl StateObject for AssetDynamicData {
    type Indexes = AssetDynamicDataIndexes;

    const TYPE_NAME: &'static str = "asset_dynamic_data";

    fn index_insert(ix: &mut AssetDynamicDataIndexes, id: AssetDynamicDataId, obj: &AssetDynamicData) {
        ix.by_symbol.insert(obj.symbol, id);
    }

    fn index_remove(ix: &mut AssetDynamicDataIndexes, _id: AssetDynamicDataId, obj: &AssetDynamicData) {
        ix.by_symbol.remove(&obj.symbol);
    }
}

pub type AssetBitassetDataId = ObjectId<AssetBitassetData>;

/// Feed and settlement state of a market-issued asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetBitassetData {
    pub symbol: Symbol,
    pub options: BitassetOptions,
    /// Designated publishers; when empty, the active witnesses publish.
    pub feed_producers: BTreeSet<AccountName>,
    pub feeds: BTreeMap<AccountName, (Timestamp, PriceFeed)>,
    pub current_feed: Option<PriceFeed>,
    pub current_feed_publication_time: Timestamp,
    /// Set only after a black swan or an issuer global settlement: debt
    /// per unit of collateral at which holders draw from the fund.
    pub settlement_price: Option<Price>,
    pub settlement_fund: i64,
    pub force_settled_volume: i64,
    pub is_prediction_market: bool,
}

impl AssetBitassetData {
    pub fn has_settlement(&self) -> bool {
        self.settlement_price.is_some()
    }

    pub fn feed_is_valid(&self, now: Timestamp) -> bool {
        match &self.current_feed {
            Some(feed) => {
                feed.is_valid()
                    && now.secs_since(self.current_feed_publication_time)
                        < self.options.feed_lifetime_secs
            }
            None => false,
        }
    }

    /// Recompute the median feed from live publications.
    pub fn update_median_feed(&mut self, now: Timestamp) {
        let lifetime = self.options.feed_lifetime_secs;
        self.feeds
            .retain(|_, (published, _)| now.secs_since(*published) < lifetime);
        if self.feeds.len() < usize::from(self.options.minimum_feeds) {
            self.current_feed = None;
            return;
        }
        let mut prices: Vec<&PriceFeed> = self.feeds.values().map(|(_, f)| f).collect();
        prices.sort_by(|a, b| a.settlement_price.cmp(&b.settlement_price));
        let median = prices[prices.len() / 2].clone();
        self.current_feed = Some(median);
        self.current_feed_publication_time = now;
    }
}

#[derive(Default)]
pub struct AssetBitassetDataIndexes {
    pub by_symbol: BTreeMap<Symbol, AssetBitassetDataId>,
}

impl StateObject for AssetBitassetData {
    type Indexes = AssetBitassetDataIndexes;

    const TYPE_NAME: &'static str = "asset_bitasset_data";

    fn index_insert(
        ix: &mut AssetBitassetDataIndexes,
        id: AssetBitassetDataId,
        obj: &AssetBitassetData,
    ) {
        ix.by_symbol.insert(obj.symbol, id);
    }

    fn index_remove(
        ix: &mut AssetBitassetDataIndexes,
        _id: AssetBitassetDataId,
        obj: &AssetBitassetData,
    ) {
        ix.by_symbol.remove(&obj.symbol);
    }
}
