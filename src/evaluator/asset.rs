// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::{require, Chain, Error};
use crate::operations::{
    AssetClaimFeesOperation, AssetCreateOperation, AssetForceSettleOperation,
    AssetFundFeePoolOperation, AssetGlobalSettleOperation, AssetIssueOperation,
    AssetPublishFeedOperation, AssetReserveOperation, AssetSettleOperation,
    AssetUpdateBitassetOperation, AssetUpdateFeedProducersOperation, AssetUpdateOperation,
    CallOrderUpdateOperation, COLLATERAL_RATIO_DENOM,
};
use crate::state::{
    AssetBitassetData, AssetDynamicData, AssetObject, CallOrder, ForceSettlement,
};
use crate::types::{Asset, Symbol, Timestamp};

fn get_asset(chain: &Chain, symbol: Symbol) -> Result<crate::state::AssetId, Error> {
    chain
        .store()
        .assets
        .indexes
        .by_symbol
        .get(&symbol)
        .copied()
        .ok_or_else(|| Error::Precondition(format!("unknown asset {symbol}")))
}

fn get_dynamic(chain: &Chain, symbol: Symbol) -> Result<crate::state::AssetDynamicDataId, Error> {
    chain
        .store()
        .asset_dynamic
        .indexes
        .by_symbol
        .get(&symbol)
        .copied()
        .ok_or_else(|| Error::Fatal(format!("asset {symbol} lacks dynamic data")))
}

fn get_bitasset(chain: &Chain, symbol: Symbol) -> Result<crate::state::AssetBitassetDataId, Error> {
    chain
        .store()
        .asset_bitassets
        .indexes
        .by_symbol
        .get(&symbol)
        .copied()
        .ok_or_else(|| Error::Precondition(format!("{symbol} is not market issued")))
}

fn require_issuer(chain: &Chain, symbol: Symbol, issuer: &crate::types::AccountName) -> Result<(), Error> {
    let asset_id = get_asset(chain, symbol)?;
    let asset = chain.store().assets.get(asset_id)?;
    require!(
        &asset.issuer == issuer,
        Precondition,
        "{} does not issue {symbol}",
        issuer
    );
    Ok(())
}

pub(super) fn apply_asset_create(chain: &mut Chain, op: &AssetCreateOperation) -> Result<(), Error> {
    chain.get_account_id(&op.issuer)?;
    require!(
        chain.store().assets.indexes.by_symbol.get(&op.symbol).is_none(),
        Precondition,
        "asset {} already exists",
        op.symbol
    );
    if let Some(bitasset) = &op.bitasset_options {
        if bitasset.short_backing_asset != Symbol::GROVE {
            get_asset(chain, bitasset.short_backing_asset)?;
        }
    }
    let now = chain.head_block_time();
    chain.store.assets.insert(|_| AssetObject {
        symbol: op.symbol,
        issuer: op.issuer.clone(),
        precision: op.precision,
        options: op.options.clone(),
        is_market_issued: op.bitasset_options.is_some(),
        created: now,
    });
    chain.store.asset_dynamic.insert(|_| AssetDynamicData {
        symbol: op.symbol,
        current_supply: 0,
        accumulated_fees: 0,
        fee_pool: 0,
    });
    if let Some(options) = &op.bitasset_options {
        chain.store.asset_bitassets.insert(|_| AssetBitassetData {
            symbol: op.symbol,
            options: options.clone(),
            feed_producers: Default::default(),
            feeds: Default::default(),
            current_feed: None,
            current_feed_publication_time: Timestamp(0),
            settlement_price: None,
            settlement_fund: 0,
            force_settled_volume: 0,
            is_prediction_market: op.is_prediction_market,
        });
    }
    Ok(())
}

pub(super) fn apply_asset_issue(chain: &mut Chain, op: &AssetIssueOperation) -> Result<(), Error> {
    let symbol = op.asset_to_issue.symbol;
    require_issuer(chain, symbol, &op.issuer)?;
    let asset_id = get_asset(chain, symbol)?;
    require!(
        !chain.store().assets.get(asset_id)?.is_market_issued,
        Precondition,
        "market-issued supply only enters through call orders"
    );
    let did = get_dynamic(chain, symbol)?;
    let dynamic = chain.store().asset_dynamic.get(did)?;
    let max_supply = chain.store().assets.get(asset_id)?.options.max_supply;
    require!(
        dynamic.current_supply + op.asset_to_issue.amount <= max_supply,
        Precondition,
        "issue would exceed the maximum supply"
    );
    let to_id = chain.get_account_id(&op.issue_to_account)?;
    chain.adjust_supply(op.asset_to_issue)?;
    chain.adjust_balance(to_id, op.asset_to_issue)?;
    Ok(())
}

pub(super) fn apply_asset_reserve(chain: &mut Chain, op: &AssetReserveOperation) -> Result<(), Error> {
    let symbol = op.amount_to_reserve.symbol;
    let asset_id = get_asset(chain, symbol)?;
    require!(
        !chain.store().assets.get(asset_id)?.is_market_issued,
        Precondition,
        "market-issued supply cannot be reserved"
    );
    let payer_id = chain.get_account_id(&op.payer)?;
    chain.adjust_balance(payer_id, -op.amount_to_reserve)?;
    chain.adjust_supply(-op.amount_to_reserve)?;
    Ok(())
}

pub(super) fn apply_asset_update(chain: &mut Chain, op: &AssetUpdateOperation) -> Result<(), Error> {
    require_issuer(chain, op.asset_to_update, &op.issuer)?;
    let asset_id = get_asset(chain, op.asset_to_update)?;
    if let Some(new_issuer) = &op.new_issuer {
        chain.get_account_id(new_issuer)?;
    }
    chain.store.assets.modify(asset_id, |a| {
        if let Some(new_issuer) = &op.new_issuer {
            a.issuer = new_issuer.clone();
        }
        a.options = op.new_options.clone();
    })?;
    Ok(())
}

pub(super) fn apply_asset_update_bitasset(
    chain: &mut Chain,
    op: &AssetUpdateBitassetOperation,
) -> Result<(), Error> {
    require_issuer(chain, op.asset_to_update, &op.issuer)?;
    let bid = get_bitasset(chain, op.asset_to_update)?;
    let bitasset = chain.store().asset_bitassets.get(bid)?;
    require!(
        !bitasset.has_settlement(),
        Precondition,
        "asset is globally settled"
    );
    require!(
        bitasset.options.short_backing_asset == op.new_options.short_backing_asset
            || chain.store().asset_dynamic.get(get_dynamic(chain, op.asset_to_update)?)?.current_supply == 0,
        Precondition,
        "cannot change the backing asset of a live market"
    );
    chain
        .store
        .asset_bitassets
        .modify(bid, |b| b.options = op.new_options.clone())?;
    Ok(())
}

pub(super) fn apply_asset_update_feed_producers(
    chain: &mut Chain,
    op: &AssetUpdateFeedProducersOperation,
) -> Result<(), Error> {
    require_issuer(chain, op.asset_to_update, &op.issuer)?;
    for producer in &op.new_feed_producers {
        chain.get_account_id(producer)?;
    }
    let bid = get_bitasset(chain, op.asset_to_update)?;
    let now = chain.head_block_time();
    chain.store.asset_bitassets.modify(bid, |b| {
        b.feed_producers = op.new_feed_producers.clone();
        // Feeds from dropped producers no longer count.
        b.feeds
            .retain(|publisher, _| op.new_feed_producers.contains(publisher));
        b.update_median_feed(now);
    })?;
    Ok(())
}

pub(super) fn apply_asset_fund_fee_pool(
    chain: &mut Chain,
    op: &AssetFundFeePoolOperation,
) -> Result<(), Error> {
    get_asset(chain, op.asset_symbol)?;
    let from_id = chain.get_account_id(&op.from_account)?;
    chain.adjust_balance(from_id, -op.amount)?;
    let did = get_dynamic(chain, op.asset_symbol)?;
    chain
        .store
        .asset_dynamic
        .modify(did, |d| d.fee_pool += op.amount.amount)?;
    Ok(())
}

pub(super) fn apply_asset_global_settle(
    chain: &mut Chain,
    op: &AssetGlobalSettleOperation,
) -> Result<(), Error> {
    require_issuer(chain, op.asset_to_settle, &op.issuer)?;
    let bid = get_bitasset(chain, op.asset_to_settle)?;
    let bitasset = chain.store().asset_bitassets.get(bid)?;
    require!(
        !bitasset.has_settlement(),
        Precondition,
        "asset is already settled"
    );
    require!(
        bitasset.is_prediction_market || bitasset.feed_is_valid(chain.head_block_time()),
        Precondition,
        "cannot settle without a valid feed"
    );
    chain.globally_settle(op.asset_to_settle)?;
    Ok(())
}

pub(super) fn apply_asset_settle(chain: &mut Chain, op: &AssetSettleOperation) -> Result<(), Error> {
    let bid = get_bitasset(chain, op.amount.symbol)?;
    require!(
        chain.store().asset_bitassets.get(bid)?.has_settlement(),
        Precondition,
        "asset is not globally settled"
    );
    let account_id = chain.get_account_id(&op.account)?;
    chain.settle_from_fund(account_id, op.amount)?;
    Ok(())
}

pub(super) fn apply_asset_force_settle(
    chain: &mut Chain,
    op: &AssetForceSettleOperation,
) -> Result<(), Error> {
    let symbol = op.amount.symbol;
    let bid = get_bitasset(chain, symbol)?;
    let bitasset = chain.store().asset_bitassets.get(bid)?.clone();
    let account_id = chain.get_account_id(&op.account)?;
    if bitasset.has_settlement() {
        // After a swan there is no delay; draw from the fund directly.
        chain.settle_from_fund(account_id, op.amount)?;
        return Ok(());
    }
    require!(
        bitasset.feed_is_valid(chain.head_block_time()),
        Precondition,
        "no valid feed to settle against"
    );
    require!(
        chain
            .store()
            .force_settlements
            .indexes
            .by_account
            .get(&(op.account.clone(), op.settlement_id))
            .is_none(),
        Precondition,
        "settlement id already in use"
    );
    chain.adjust_balance(account_id, -op.amount)?;
    let settlement_date =
        chain.head_block_time() + bitasset.options.force_settlement_delay_secs;
    chain.store.force_settlements.insert(|_| ForceSettlement {
        owner: op.account.clone(),
        settlement_id: op.settlement_id,
        balance: op.amount,
        settlement_date,
    });
    Ok(())
}

pub(super) fn apply_asset_publish_feed(
    chain: &mut Chain,
    op: &AssetPublishFeedOperation,
) -> Result<(), Error> {
    chain.get_account_id(&op.publisher)?;
    let bid = get_bitasset(chain, op.asset_symbol)?;
    let bitasset = chain.store().asset_bitassets.get(bid)?;
    require!(
        !bitasset.has_settlement(),
        Precondition,
        "feeds are frozen after global settlement"
    );
    let authorized = if bitasset.feed_producers.is_empty() {
        chain.store().find_witness(&op.publisher).is_some()
    } else {
        bitasset.feed_producers.contains(&op.publisher)
    };
    require!(authorized, Precondition, "{} may not publish this feed", op.publisher);
    require!(
        op.feed.settlement_price.quote.symbol == bitasset.options.short_backing_asset,
        Validation,
        "feed must price against the backing asset"
    );
    let now = chain.head_block_time();
    chain.store.asset_bitassets.modify(bid, |b| {
        b.feeds.insert(op.publisher.clone(), (now, op.feed.clone()));
        b.update_median_feed(now);
    })?;
    // A moved feed can put positions under water.
    chain.check_call_orders(op.asset_symbol)?;
    Ok(())
}

pub(super) fn apply_asset_claim_fees(
    chain: &mut Chain,
    op: &AssetClaimFeesOperation,
) -> Result<(), Error> {
    let symbol = op.amount_to_claim.symbol;
    require_issuer(chain, symbol, &op.issuer)?;
    let did = get_dynamic(chain, symbol)?;
    require!(
        chain.store().asset_dynamic.get(did)?.accumulated_fees >= op.amount_to_claim.amount,
        Precondition,
        "claim exceeds accumulated fees"
    );
    let issuer_id = chain.get_account_id(&op.issuer)?;
    chain
        .store
        .asset_dynamic
        .modify(did, |d| d.accumulated_fees -= op.amount_to_claim.amount)?;
    chain.adjust_balance(issuer_id, op.amount_to_claim)?;
    Ok(())
}

pub(super) fn apply_call_order_update(
    chain: &mut Chain,
    op: &CallOrderUpdateOperation,
) -> Result<(), Error> {
    let debt_symbol = op.delta_debt.symbol;
    let bid = get_bitasset(chain, debt_symbol)?;
    let bitasset = chain.store().asset_bitassets.get(bid)?.clone();
    require!(
        !bitasset.has_settlement(),
        Precondition,
        "no new positions after global settlement"
    );
    let now = chain.head_block_time();
    require!(
        bitasset.feed_is_valid(now),
        Precondition,
        "no valid feed for this asset"
    );
    require!(
        op.delta_collateral.symbol == bitasset.options.short_backing_asset,
        Validation,
        "collateral must be the backing asset"
    );
    let feed = bitasset.current_feed.expect("feed checked valid");

    let account_id = chain.get_account_id(&op.funding_account)?;
    let key = (op.funding_account.clone(), debt_symbol);
    let existing = chain.store().call_orders.indexes.by_account.get(&key).copied();
    let (old_debt, old_collateral) = match existing {
        Some(id) => {
            let call = chain.store().call_orders.get(id)?;
            (call.debt, call.collateral)
        }
        None => (0, 0),
    };
    let new_debt = old_debt + op.delta_debt.amount;
    let new_collateral = old_collateral + op.delta_collateral.amount;
    require!(new_debt >= 0, Precondition, "cannot cover more debt than owed");
    require!(new_collateral >= 0, Precondition, "negative collateral");

    // Move the collateral (withdrawals are a negative delta).
    if op.delta_collateral.amount != 0 {
        chain.adjust_balance(account_id, -op.delta_collateral)?;
    }
    // Mint or burn the debt.
    if op.delta_debt.amount > 0 {
        chain.adjust_supply(op.delta_debt)?;
        chain.adjust_balance(account_id, op.delta_debt)?;
    } else if op.delta_debt.amount < 0 {
        chain.adjust_balance(account_id, op.delta_debt)?;
        chain.adjust_supply(op.delta_debt)?;
    }

    if new_debt == 0 {
        require!(
            new_collateral == 0,
            Precondition,
            "closing a position returns all collateral"
        );
        if let Some(id) = existing {
            chain.store.call_orders.remove(id)?;
        }
        return Ok(());
    }
    require!(
        new_collateral > 0,
        Precondition,
        "a live position needs collateral"
    );

    // Opening or increasing risk must start above maintenance.
    let collateral_value = Asset::new(new_collateral, op.delta_collateral.symbol)
        .convert(&feed.settlement_price);
    let healthy = collateral_value.amount as i128 * i128::from(COLLATERAL_RATIO_DENOM)
        >= new_debt as i128 * i128::from(feed.maintenance_collateral_ratio);
    require!(
        healthy || (op.delta_debt.amount <= 0 && op.delta_collateral.amount >= 0),
        Precondition,
        "position would be undercollateralized"
    );

    match existing {
        Some(id) => chain.store.call_orders.modify(id, |c| {
            c.debt = new_debt;
            c.collateral = new_collateral;
        })?,
        None => {
            chain.store.call_orders.insert(|_| CallOrder {
                borrower: op.funding_account.clone(),
                debt: new_debt,
                debt_symbol,
                collateral: new_collateral,
                collateral_symbol: op.delta_collateral.symbol,
            });
        }
    }
    Ok(())
}
