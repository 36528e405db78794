//! Internal market order matching.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::{LIQUIDITY_TIMEOUT_SEC, MIN_LIQUIDITY_REWARD_PERIOD_SEC};
use ec_state_store::{LimitOrder, LiquidityRewardBalance};
use shared_types::operations::VirtualOperation;
use shared_types::{AccountName, Asset, AssetSymbol};
use std::cmp::Ordering;

type OrderId = (AccountName, u32);

/// Total order over prices of one market side: steeper asks first, ties by
/// seller/order id ascending.
fn better_price(a: &LimitOrder, b: &LimitOrder) -> Ordering {
    b.sell_price
        .cmp_same_pair(&a.sell_price)
        .then_with(|| a.id_tuple().cmp(&b.id_tuple()))
}

trait IdTuple {
    fn id_tuple(&self) -> OrderId;
}

impl IdTuple for LimitOrder {
    fn id_tuple(&self) -> OrderId {
        (self.seller.clone(), self.order_id)
    }
}

impl Database {
    /// Match a freshly inserted order against the opposite side of the
    /// book. Returns `true` if the new order filled completely.
    pub(crate) fn apply_order(&mut self, order_id: &OrderId) -> Result<bool, ChainError> {
        let new_order = self.state.limit_orders.get(order_id)?.clone();
        let sell_symbol = new_order.sell_price.base.symbol;

        // Candidates: the other side, best price first. The scan is over the
        // whole book but the book only carries the EMBER/EUSD pair.
        let mut candidates: Vec<LimitOrder> = self
            .state
            .limit_orders
            .iter()
            .filter(|o| o.sell_price.base.symbol != sell_symbol)
            .cloned()
            .collect();
        candidates.sort_by(better_price);

        for old_order in candidates {
            if !self.state.limit_orders.contains(order_id) {
                break;
            }
            let current = self.state.limit_orders.get(order_id)?.clone();

            // The books cross while the old order bids at least the new
            // order's ask.
            let min_price = current.sell_price.invert();
            if old_order.sell_price.cmp_same_pair(&min_price) == Ordering::Less {
                break;
            }

            // Match at the older order's price.
            let finished = self.match_orders(&current, &old_order)? & 0x1 != 0;
            if finished {
                break;
            }
        }

        Ok(!self.state.limit_orders.contains(order_id))
    }

    /// Fill both sides at the old order's price. Bit 0 of the result means
    /// the new order was fully filled, bit 1 the old one.
    fn match_orders(&mut self, new_order: &LimitOrder, old_order: &LimitOrder) -> Result<u8, ChainError> {
        let match_price = old_order.sell_price;
        assert_eq!(
            new_order.sell_price.quote.symbol, old_order.sell_price.base.symbol,
            "orders are on the same side of the book"
        );
        assert!(new_order.for_sale > 0 && old_order.for_sale > 0);

        let new_for_sale = new_order.amount_for_sale();
        let old_for_sale = old_order.amount_for_sale();

        let (new_pays, new_receives, old_pays, old_receives);
        if new_for_sale <= old_for_sale * match_price {
            // The new order is the smaller side.
            old_receives = new_for_sale;
            new_receives = new_for_sale * match_price;
        } else {
            // The old order fills completely; rounding may leave both sides
            // equal without creating or destroying anything.
            new_receives = old_for_sale;
            old_receives = old_for_sale * match_price;
        }
        old_pays = new_receives;
        new_pays = old_receives;

        assert!(
            new_pays == new_order.amount_for_sale() || old_pays == old_order.amount_for_sale(),
            "at least one side must fill"
        );

        // Resting time on the book earns market-maker volume (legacy).
        let age = self.head_block_time().saturating_sub(old_order.created);
        if !self.has_hardfork(12) && age >= MIN_LIQUIDITY_REWARD_PERIOD_SEC {
            if old_receives.symbol == AssetSymbol::Ember {
                self.adjust_liquidity_reward(&old_order.seller, old_receives, false)?;
                self.adjust_liquidity_reward(&new_order.seller, -old_receives, false)?;
            } else {
                self.adjust_liquidity_reward(&old_order.seller, new_receives, true)?;
                self.adjust_liquidity_reward(&new_order.seller, -new_receives, true)?;
            }
        }

        self.push_virtual_operation(VirtualOperation::FillOrder {
            current_owner: new_order.seller.clone(),
            current_order_id: new_order.order_id,
            current_pays: new_pays,
            open_owner: old_order.seller.clone(),
            open_order_id: old_order.order_id,
            open_pays: old_pays,
        });

        let mut result = 0u8;
        result |= u8::from(self.fill_order(&new_order.id_tuple(), new_pays, new_receives)?);
        result |= u8::from(self.fill_order(&old_order.id_tuple(), old_pays, old_receives)?) << 1;
        assert!(result != 0, "a match must fill at least one side");
        Ok(result)
    }

    /// Settle one side of a fill. Returns `true` if the order is gone.
    fn fill_order(
        &mut self,
        order_id: &OrderId,
        pays: Asset,
        receives: Asset,
    ) -> Result<bool, ChainError> {
        let order = self.state.limit_orders.get(order_id)?.clone();
        assert_eq!(order.amount_for_sale().symbol, pays.symbol);
        assert_ne!(pays.symbol, receives.symbol);

        self.adjust_balance(&order.seller, receives)?;

        if pays == order.amount_for_sale() {
            self.state.limit_orders.remove(order_id)?;
            Ok(true)
        } else {
            self.state
                .limit_orders
                .modify(order_id, |o| o.for_sale -= pays.amount)?;
            // A residual too small to buy anything at the ask refunds to the
            // seller.
            if self.state.limit_orders.get(order_id)?.amount_to_receive().amount == 0 {
                self.cancel_order(order_id)?;
                return Ok(true);
            }
            Ok(false)
        }
    }

    /// Refund and remove an order.
    pub(crate) fn cancel_order(&mut self, order_id: &OrderId) -> Result<(), ChainError> {
        let order = self.state.limit_orders.remove(order_id)?;
        self.adjust_balance(&order.seller, order.amount_for_sale())?;
        Ok(())
    }

    pub(crate) fn adjust_liquidity_reward(
        &mut self,
        owner: &AccountName,
        volume: Asset,
        is_eusd: bool,
    ) -> Result<(), ChainError> {
        let now = self.head_block_time();
        let balanced = self.has_hardfork(10);

        if self.state.liquidity_rewards.contains(owner) {
            self.state.liquidity_rewards.modify(owner, |r| {
                if now.saturating_sub(r.last_update) >= LIQUIDITY_TIMEOUT_SEC {
                    r.eusd_volume = 0;
                    r.ember_volume = 0;
                    r.weight = 0;
                }
                if is_eusd {
                    r.eusd_volume += volume.amount;
                } else {
                    r.ember_volume += volume.amount;
                }
                r.update_weight(balanced);
                r.last_update = now;
            })?;
        } else {
            let mut row = LiquidityRewardBalance {
                owner: owner.clone(),
                ember_volume: 0,
                eusd_volume: 0,
                weight: 0,
                last_update: now,
            };
            if is_eusd {
                row.eusd_volume = volume.amount;
            } else {
                row.ember_volume = volume.amount;
            }
            row.update_weight(balanced);
            self.state.liquidity_rewards.create(row)?;
        }
        Ok(())
    }
}
