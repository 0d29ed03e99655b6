// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The on-chain exchange: limit-order matching, margin calls against
//! collateralized debt positions, and global settlement when a position
//! cannot cover its debt.

use crate::chain::{require, Chain, Error};
use crate::operations::{VirtualOperation, COLLATERAL_RATIO_DENOM, PERCENT_100};
use crate::state::{CallOrderId, LimitOrderId};
use crate::types::{Asset, Price, Symbol};
use tracing::{debug, warn};

impl Chain {
    /// Best resting order selling `sells` for `receives`, by price.
    pub(crate) fn best_order(
        &self,
        sells: Symbol,
        receives: Symbol,
    ) -> Option<(Price, LimitOrderId)> {
        let lo = (Price::min(sells, receives), crate::db::ObjectId::new(0));
        let hi = (Price::max(sells, receives), crate::db::ObjectId::new(u64::MAX));
        self.store
            .limit_orders
            .indexes
            .by_price
            .range(lo..=hi)
            .next_back()
            .map(|((price, id), _)| (*price, *id))
    }

    /// Match a freshly inserted order against the book. Returns true when
    /// the order was completely filled (and removed).
    pub(crate) fn apply_order(&mut self, order_id: LimitOrderId) -> Result<bool, Error> {
        let (sells, receives) = {
            let order = self.store.limit_orders.get(order_id)?;
            (order.sells(), order.receives())
        };
        // A new bid can enable a pending margin call on either asset.
        self.check_call_orders(sells)?;
        self.check_call_orders(receives)?;
        if !self.store.limit_orders.contains(order_id) {
            return Ok(true);
        }

        loop {
            let Ok(taker) = self.store.limit_orders.get(order_id) else {
                return Ok(true);
            };
            let taker = taker.clone();
            let Some((maker_price, maker_id)) = self.best_order(receives, sells) else {
                break;
            };
            // The maker price, read as what the taker receives per unit
            // sold, must meet the taker's limit.
            if maker_price < taker.sell_price.invert() {
                break;
            }
            let maker_for_sale = self.store.limit_orders.get(maker_id)?.amount_for_sale();
            // Fill at the maker's price; the smaller side sets the size.
            let taker_receives_full = taker.amount_for_sale().convert(&maker_price);
            let (taker_pays, maker_pays) = if taker_receives_full.amount <= maker_for_sale.amount
            {
                (taker.amount_for_sale(), taker_receives_full)
            } else {
                (maker_for_sale.convert(&maker_price), maker_for_sale)
            };
            if maker_pays.is_zero() {
                // The taker's remainder rounds to nothing at this price.
                self.cancel_order(order_id, true)?;
                break;
            }
            if taker_pays.is_zero() {
                self.cancel_order(maker_id, true)?;
                continue;
            }
            let maker = self.store.limit_orders.get(maker_id)?.clone();
            self.push_virtual_operation(VirtualOperation::FillOrder {
                current_owner: taker.seller.clone(),
                current_order_id: taker.order_id,
                current_pays: taker_pays,
                open_owner: maker.seller.clone(),
                open_order_id: maker.order_id,
                open_pays: maker_pays,
            });
            self.fill_limit_order(maker_id, maker_pays, taker_pays)?;
            self.fill_limit_order(order_id, taker_pays, maker_pays)?;
            self.check_call_orders(sells)?;
            self.check_call_orders(receives)?;
        }
        Ok(!self.store.limit_orders.contains(order_id))
    }

    /// Pay out one side of a fill; removes exhausted or dust orders.
    fn fill_limit_order(
        &mut self,
        order_id: LimitOrderId,
        pays: Asset,
        receives: Asset,
    ) -> Result<(), Error> {
        let order = self.store.limit_orders.get(order_id)?.clone();
        debug_assert_eq!(pays.symbol, order.sells());
        let owner_id = self.get_account_id(&order.seller)?;
        let fee = self.pay_market_fees(receives)?;
        self.adjust_balance(owner_id, receives - fee)?;
        self.update_liquidity_volume(&order.seller, receives)?;

        if pays.amount >= order.for_sale {
            self.store.limit_orders.remove(order_id)?;
        } else {
            self.store
                .limit_orders
                .modify(order_id, |o| o.for_sale -= pays.amount)?;
            let rest = self.store.limit_orders.get(order_id)?;
            if rest.amount_to_receive().is_zero() {
                self.cancel_order(order_id, true)?;
            }
        }
        Ok(())
    }

    /// Refund and delete a resting order.
    pub(crate) fn cancel_order(&mut self, order_id: LimitOrderId, refund: bool) -> Result<(), Error> {
        let order = self.store.limit_orders.remove(order_id)?;
        if refund {
            let owner_id = self.get_account_id(&order.seller)?;
            self.adjust_balance(owner_id, order.amount_for_sale())?;
        }
        Ok(())
    }

    /// Market-issued assets levy a fee on the receiving side of a fill.
    fn pay_market_fees(&mut self, receives: Asset) -> Result<Asset, Error> {
        let Some(&asset_id) = self.store.assets.indexes.by_symbol.get(&receives.symbol) else {
            return Ok(Asset::new(0, receives.symbol));
        };
        let options = self.store.assets.get(asset_id)?.options.clone();
        if options.market_fee_percent == 0 {
            return Ok(Asset::new(0, receives.symbol));
        }
        let mut fee =
            receives.amount * i64::from(options.market_fee_percent) / i64::from(PERCENT_100);
        if options.max_market_fee > 0 {
            fee = fee.min(options.max_market_fee);
        }
        if fee > 0 {
            let did = self
                .store
                .asset_dynamic
                .indexes
                .by_symbol
                .get(&receives.symbol)
                .copied()
                .ok_or_else(|| Error::Fatal("asset without dynamic data".into()))?;
            self.store
                .asset_dynamic
                .modify(did, |d| d.accumulated_fees += fee)?;
        }
        Ok(Asset::new(fee, receives.symbol))
    }

    /// Track two-sided core/stable volume for the liquidity bounty.
    fn update_liquidity_volume(
        &mut self,
        owner: &crate::types::AccountName,
        receives: Asset,
    ) -> Result<(), Error> {
        if receives.symbol != Symbol::GROVE && receives.symbol != Symbol::GBD {
            return Ok(());
        }
        let now = self.head_block_time();
        let lr_id = match self.store.liquidity_rewards.indexes.by_owner.get(owner) {
            Some(&id) => id,
            None => self
                .store
                .liquidity_rewards
                .insert(|_| crate::state::LiquidityReward {
                    owner: owner.clone(),
                    grove_volume: 0,
                    gbd_volume: 0,
                    weight: 0,
                    last_update: now,
                }),
        };
        self.store.liquidity_rewards.modify(lr_id, |lr| {
            if receives.symbol == Symbol::GROVE {
                lr.grove_volume += receives.amount;
            } else {
                lr.gbd_volume += receives.amount;
            }
            lr.weight = lr.compute_weight();
            lr.last_update = now;
        })?;
        Ok(())
    }

    /// Inspect the least-collateralized position of `symbol`; execute
    /// margin calls against the book, or trip the black swan when the
    /// position cannot cover at the squeeze bound.
    pub(crate) fn check_call_orders(&mut self, symbol: Symbol) -> Result<(), Error> {
        let Some(&bid) = self.store.asset_bitassets.indexes.by_symbol.get(&symbol) else {
            return Ok(());
        };
        let now = self.head_block_time();
        let bitasset = self.store.asset_bitassets.get(bid)?;
        if bitasset.has_settlement() || !bitasset.feed_is_valid(now) {
            return Ok(());
        }
        let feed = bitasset.current_feed.clone().expect("feed checked valid");
        let backing = bitasset.options.short_backing_asset;

        loop {
            let least = self
                .store
                .call_orders
                .indexes
                .by_ratio
                .range((symbol, 0, crate::db::ObjectId::new(0))..)
                .take_while(|((s, _, _), _)| *s == symbol)
                .map(|((_, _, id), _)| *id)
                .next();
            let Some(call_id) = least else { break };
            let call = self.store.call_orders.get(call_id)?.clone();
            if call.debt <= 0 {
                break;
            }

            // Value the collateral in debt units at the feed.
            let collateral_value = call.collateral_asset().convert(&feed.settlement_price);
            let maintained = collateral_value.amount as i128
                * i128::from(COLLATERAL_RATIO_DENOM)
                >= call.debt as i128 * i128::from(feed.maintenance_collateral_ratio);
            if maintained {
                break;
            }

            // The swan price is the position's own debt per collateral;
            // any bid at or above it can take the call.
            let swan_price = Price::new(call.debt_asset(), call.collateral_asset());
            let best = self.best_order(symbol, backing);
            let eligible = best
                .map(|(price, _)| price >= swan_price)
                .unwrap_or(false);

            if !eligible {
                // No bid can cover the call; if even the squeeze bound is
                // out of reach, the asset globally settles.
                let covered_at_squeeze = collateral_value.amount as i128
                    * i128::from(COLLATERAL_RATIO_DENOM)
                    >= call.debt as i128 * i128::from(feed.maximum_short_squeeze_ratio);
                if !covered_at_squeeze {
                    warn!("black swan on {symbol}: least-collateralized call cannot cover");
                    self.globally_settle(symbol)?;
                }
                break;
            }

            let (order_price, order_id) = best.expect("eligible bid");
            let order = self.store.limit_orders.get(order_id)?.clone();
            // The maker provides debt tokens; size by the smaller side.
            let debt_filled = order.for_sale.min(call.debt);
            let collateral_paid = Asset::new(debt_filled, symbol).convert(&order_price);
            let collateral_paid = Asset::new(
                collateral_paid.amount.min(call.collateral),
                backing,
            );

            // The maker's debt tokens are destroyed against the position.
            self.push_virtual_operation(VirtualOperation::FillOrder {
                current_owner: call.borrower.clone(),
                current_order_id: 0,
                current_pays: collateral_paid,
                open_owner: order.seller.clone(),
                open_order_id: order.order_id,
                open_pays: Asset::new(debt_filled, symbol),
            });
            self.fill_limit_order(
                order_id,
                Asset::new(debt_filled, symbol),
                collateral_paid,
            )?;
            self.adjust_supply(Asset::new(-debt_filled, symbol))?;

            let remaining_debt = call.debt - debt_filled;
            if remaining_debt == 0 {
                // Fully covered: the borrower keeps the leftover
                // collateral.
                let leftover = call.collateral - collateral_paid.amount;
                let borrower_id = self.get_account_id(&call.borrower)?;
                self.store.call_orders.remove(call_id)?;
                if leftover > 0 {
                    self.adjust_balance(borrower_id, Asset::new(leftover, backing))?;
                }
            } else {
                self.store.call_orders.modify(call_id, |c| {
                    c.debt = remaining_debt;
                    c.collateral -= collateral_paid.amount;
                })?;
            }
            self.push_virtual_operation(VirtualOperation::FillCallOrder {
                owner: call.borrower.clone(),
                debt_paid: Asset::new(debt_filled, symbol),
                collateral_paid,
            });
            debug!(
                "margin call on {}: covered {} with {}",
                call.borrower, debt_filled, collateral_paid
            );
        }
        Ok(())
    }

    /// Global settlement: every position of the asset is cancelled at the
    /// least-collateralized position's price; gathered collateral becomes
    /// the settlement fund holders draw from. Supply is untouched.
    pub(crate) fn globally_settle(&mut self, symbol: Symbol) -> Result<(), Error> {
        let bid = self
            .store
            .asset_bitassets
            .indexes
            .by_symbol
            .get(&symbol)
            .copied()
            .ok_or_else(|| Error::Fatal(format!("{symbol} is not market issued")))?;
        let backing = self.store.asset_bitassets.get(bid)?.options.short_backing_asset;

        let calls: Vec<CallOrderId> = self
            .store
            .call_orders
            .indexes
            .by_ratio
            .range((symbol, 0, crate::db::ObjectId::new(0))..)
            .take_while(|((s, _, _), _)| *s == symbol)
            .map(|((_, _, id), _)| *id)
            .collect();
        let Some(&worst_id) = calls.first() else {
            return Ok(());
        };
        let worst = self.store.call_orders.get(worst_id)?.clone();
        // Settlement executes at the worst position's collateralization.
        let settle_price = Price::new(worst.debt_asset(), worst.collateral_asset());

        let mut fund = 0i64;
        let mut settled_debt = 0i64;
        for call_id in calls {
            let call = self.store.call_orders.remove(call_id)?;
            let owed = call.debt_asset().convert(&settle_price.invert());
            let pay = owed.amount.min(call.collateral);
            let leftover = call.collateral - pay;
            fund += pay;
            settled_debt += call.debt;
            if leftover > 0 {
                let borrower_id = self.get_account_id(&call.borrower)?;
                self.adjust_balance(borrower_id, Asset::new(leftover, backing))?;
            }
        }

        self.store.asset_bitassets.modify(bid, |b| {
            b.settlement_price = Some(Price::new(
                Asset::new(settled_debt.max(1), symbol),
                Asset::new(fund.max(1), backing),
            ));
            b.settlement_fund = fund;
        })?;
        warn!("{symbol} globally settled: fund {fund} {backing}, debt {settled_debt}");
        Ok(())
    }

    /// Instant settlement against the fund of a settled asset.
    pub(crate) fn settle_from_fund(
        &mut self,
        account_id: crate::state::AccountId,
        amount: Asset,
    ) -> Result<Asset, Error> {
        let bid = self
            .store
            .asset_bitassets
            .indexes
            .by_symbol
            .get(&amount.symbol)
            .copied()
            .ok_or_else(|| Error::Precondition(format!("{} is not market issued", amount.symbol)))?;
        let bitasset = self.store.asset_bitassets.get(bid)?.clone();
        let settlement_price = bitasset
            .settlement_price
            .ok_or_else(|| Error::Precondition("asset is not settled".into()))?;
        let backing = bitasset.options.short_backing_asset;

        let receive = amount.convert(&settlement_price);
        let receive = Asset::new(receive.amount.min(bitasset.settlement_fund), backing);
        require!(
            receive.amount > 0,
            Precondition,
            "settlement would receive nothing"
        );

        self.adjust_balance(account_id, -amount)?;
        self.adjust_supply(-amount)?;
        self.adjust_balance(account_id, receive)?;
        self.store
            .asset_bitassets
            .modify(bid, |b| b.settlement_fund -= receive.amount)?;
        let owner = self.store.accounts.get(account_id)?.name.clone();
        self.push_virtual_operation(VirtualOperation::FillSettlement {
            owner,
            settled: amount,
            received: receive,
        });
        Ok(receive)
    }

    /// Execute one due force settlement at the feed, against the least
    /// collateralized positions.
    pub(crate) fn execute_force_settlement(
        &mut self,
        settlement_id: crate::state::ForceSettlementId,
    ) -> Result<(), Error> {
        let settlement = self.store.force_settlements.remove(settlement_id)?;
        let symbol = settlement.balance.symbol;
        let owner_id = self.get_account_id(&settlement.owner)?;
        let Some(&bid) = self.store.asset_bitassets.indexes.by_symbol.get(&symbol) else {
            // Asset vanished; refund.
            self.adjust_balance(owner_id, settlement.balance)?;
            return Ok(());
        };
        let bitasset = self.store.asset_bitassets.get(bid)?.clone();
        if bitasset.has_settlement() {
            // Swan happened while waiting: draw from the fund instead.
            self.adjust_balance(owner_id, settlement.balance)?;
            self.settle_from_fund(owner_id, settlement.balance)?;
            return Ok(());
        }
        let now = self.head_block_time();
        if !bitasset.feed_is_valid(now) {
            self.adjust_balance(owner_id, settlement.balance)?;
            return Ok(());
        }
        let feed = bitasset.current_feed.expect("feed checked valid");
        let backing = bitasset.options.short_backing_asset;
        // Feed price shaded by the settlement offset.
        let offset = bitasset.options.force_settlement_offset_percent;
        let collateral_per_debt = feed.settlement_price.invert();
        let mut remaining = settlement.balance.amount;
        let mut received = 0i64;

        while remaining > 0 {
            let least = self
                .store
                .call_orders
                .indexes
                .by_ratio
                .range((symbol, 0, crate::db::ObjectId::new(0))..)
                .take_while(|((s, _, _), _)| *s == symbol)
                .map(|((_, _, id), _)| *id)
                .next();
            let Some(call_id) = least else { break };
            let call = self.store.call_orders.get(call_id)?.clone();
            let fill = remaining.min(call.debt);
            let gross = Asset::new(fill, symbol).convert(&collateral_per_debt).amount;
            let shaded = gross - gross * i64::from(offset) / i64::from(PERCENT_100);
            let collateral_out = shaded.min(call.collateral);
            if call.debt == fill {
                let leftover = call.collateral - collateral_out;
                let borrower_id = self.get_account_id(&call.borrower)?;
                self.store.call_orders.remove(call_id)?;
                if leftover > 0 {
                    self.adjust_balance(borrower_id, Asset::new(leftover, backing))?;
                }
            } else {
                self.store.call_orders.modify(call_id, |c| {
                    c.debt -= fill;
                    c.collateral -= collateral_out;
                })?;
            }
            remaining -= fill;
            received += collateral_out;
        }

        let settled = settlement.balance.amount - remaining;
        if settled > 0 {
            self.adjust_supply(Asset::new(-settled, symbol))?;
            self.adjust_balance(owner_id, Asset::new(received, backing))?;
            self.push_virtual_operation(VirtualOperation::FillSettlement {
                owner: settlement.owner.clone(),
                settled: Asset::new(settled, symbol),
                received: Asset::new(received, backing),
            });
        }
        if remaining > 0 {
            // Nothing left to settle against; return the residue.
            self.adjust_balance(owner_id, Asset::new(remaining, symbol))?;
        }
        Ok(())
    }
}
