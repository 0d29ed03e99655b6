// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::db::{ObjectId, StateObject};
use crate::types::{AccountName, Asset, Price, Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type LimitOrderId = ObjectId<LimitOrder>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitOrder {
    pub created: Timestamp,
    pub expiration: Timestamp,
    pub seller: AccountName,
    pub order_id: u32,
    /// Remaining amount, denominated in `sell_price.base`.
    pub for_sale: i64,
    pub sell_price: Price,
}

impl LimitOrder {
    pub fn amount_for_sale(&self) -> Asset {
        Asset::new(self.for_sale, self.sell_price.base.symbol)
    }

    pub fn amount_to_receive(&self) -> Asset {
        self.amount_for_sale().convert(&self.sell_price)
    }

    pub fn sells(&self) -> Symbol {
        self.sell_price.base.symbol
    }

    pub fn receives(&self) -> Symbol {
        self.sell_price.quote.symbol
    }
}

#[derive(Default)]
pub struct LimitOrderIndexes {
    pub by_account: BTreeMap<(AccountName, u32), LimitOrderId>,
    /// Orders of one market pair cluster together; within the pair the
    /// best (highest) price is the range's tail.
    pub by_price: BTreeMap<(Price, LimitOrderId), ()>,
    pub by_expiration: BTreeMap<(Timestamp, LimitOrderId), ()>,
}

impl StateObject for LimitOrder {
    type Indexes = LimitOrderIndexes;

    const TYPE_NAME: &'static str = "limit_order";

    fn index_insert(ix: &mut LimitOrderIndexes, id: LimitOrderId, obj: &LimitOrder) {
        ix.by_account.insert((obj.seller.clone(), obj.order_id), id);
        ix.by_price.insert((obj.sell_price, id), ());
        ix.by_expiration.insert((obj.expiration, id), ());
    }

    fn index_remove(ix: &mut LimitOrderIndexes, id: LimitOrderId, obj: &LimitOrder) {
        ix.by_account.remove(&(obj.seller.clone(), obj.order_id));
        ix.by_price.remove(&(obj.sell_price, id));
        ix.by_expiration.remove(&(obj.expiration, id));
    }
}

pub type CallOrderId = ObjectId<CallOrder>;

/// Fixed-point scale for the collateral/debt ratio index key.
pub const RATIO_PRECISION: u128 = 1_000_000;

/// A borrower's collateralized debt position in one market-issued asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallOrder {
    pub borrower: AccountName,
    /// Debt in the market-issued asset.
    pub debt: i64,
    pub debt_symbol: Symbol,
    /// Collateral held in the backing asset.
    pub collateral: i64,
    pub collateral_symbol: Symbol,
}

impl CallOrder {
    pub fn debt_asset(&self) -> Asset {
        Asset::new(self.debt, self.debt_symbol)
    }

    pub fn collateral_asset(&self) -> Asset {
        Asset::new(self.collateral, self.collateral_symbol)
    }

    /// Collateralization scaled by [`RATIO_PRECISION`]; the least
    /// collateralized position has the smallest value.
    pub fn collateral_ratio(&self) -> u128 {
        if self.debt <= 0 {
            return u128::MAX;
        }
        (self.collateral as u128 * RATIO_PRECISION) / self.debt as u128
    }

    /// Price offering this position's collateral for its debt.
    pub fn collateralization_price(&self) -> Price {
        Price::new(self.collateral_asset(), self.debt_asset())
    }
}

#[derive(Default)]
pub struct CallOrderIndexes {
    pub by_account: BTreeMap<(AccountName, Symbol), CallOrderId>,
    /// Least collateralized first within each debt asset.
    pub by_ratio: BTreeMap<(Symbol, u128, CallOrderId), ()>,
}

impl StateObject for CallOrder {
    type Indexes = CallOrderIndexes;

    const TYPE_NAME: &'static str = "call_order";

    fn index_insert(ix: &mut CallOrderIndexes, id: CallOrderId, obj: &CallOrder) {
        ix.by_account
            .insert((obj.borrower.clone(), obj.debt_symbol), id);
        ix.by_ratio
            .insert((obj.debt_symbol, obj.collateral_ratio(), id), ());
    }

    fn index_remove(ix: &mut CallOrderIndexes, id: CallOrderId, obj: &CallOrder) {
        ix.by_account.remove(&(obj.borrower.clone(), obj.debt_symbol));
        ix.by_ratio
            .remove(&(obj.debt_symbol, obj.collateral_ratio(), id));
    }
}

pub type ForceSettlementId = ObjectId<ForceSettlement>;

/// A pending holder-initiated settlement, executed after the asset's
/// settlement delay at the then-current feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForceSettlement {
    pub owner: AccountName,
    pub settlement_id: u32,
    pub balance: Asset,
    pub settlement_date: Timestamp,
}

#[derive(Default)]
pub struct ForceSettlementIndexes {
    pub by_account: BTreeMap<(AccountName, u32), ForceSettlementId>,
    pub by_expiration: BTreeMap<(Timestamp, ForceSettlementId), ()>,
}

impl StateObject for ForceSettlement {
    type Indexes = ForceSettlementIndexes;

    const TYPE_NAME: &'static str = "force_settlement";

    fn index_insert(ix: &mut ForceSettlementIndexes, id: ForceSettlementId, obj: &ForceSettlement) {
        ix.by_account.insert((obj.owner.clone(), obj.settlement_id), id);
        ix.by_expiration.insert((obj.settlement_date, id), ());
    }

    fn index_remove(ix: &mut ForceSettlementIndexes, id: ForceSettlementId, obj: &ForceSettlement) {
        ix.by_account.remove(&(obj.owner.clone(), obj.settlement_id));
        ix.by_expiration.remove(&(obj.settlement_date, id));
    }
}

pub type LiquidityRewardId = ObjectId<LiquidityReward>;

/// Decaying trade-volume tally backing the periodic liquidity payout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiquidityReward {
    pub owner: AccountName,
    pub grove_volume: i64,
    pub gbd_volume: i64,
    pub weight: u128,
    pub last_update: Timestamp,
}

impl LiquidityReward {
    /// Volume weight favors balanced two-sided liquidity.
    pub fn compute_weight(&self) -> u128 {
        let g = self.grove_volume.max(0) as u128;
        let d = self.gbd_volume.max(0) as u128;
        (g * d).saturating_sub(if g > d { (g - d) * (g - d) } else { (d - g) * (d - g) })
    }
}

#[derive(Default)]
pub struct LiquidityRewardIndexes {
    pub by_owner: BTreeMap<AccountName, LiquidityRewardId>,
    /// Keyed by complemented weight so the heaviest provider is first.
    pub by_volume_weight: BTreeMap<(u128, LiquidityRewardId), ()>,
}

impl StateObject for LiquidityReward {
    type Indexes = LiquidityRewardIndexes;

    const TYPE_NAME: &'static str = "liquidity_reward";

    fn index_insert(ix: &mut LiquidityRewardIndexes, id: LiquidityRewardId, obj: &LiquidityReward) {
        ix.by_owner.insert(obj.owner.clone(), id);
        ix.by_volume_weight.insert((u128::MAX - obj.weight, id), ());
    }

    fn index_remove(ix: &mut LiquidityRewardIndexes, id: LiquidityRewardId, obj: &LiquidityReward) {
        ix.by_owner.remove(&obj.owner);
        ix.by_volume_weight.remove(&(u128::MAX - obj.weight, id));
    }
}
