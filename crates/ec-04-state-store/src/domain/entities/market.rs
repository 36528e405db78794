//! Market-side entities: limit orders, conversions, escrows, savings.

use crate::domain::table::StateObject;
use serde::{Deserialize, Serialize};
use shared_types::{AccountName, Asset, Price, TimePointSec};

/// An open order on the internal EMBER/EUSD market.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub created: TimePointSec,
    pub expiration: TimePointSec,
    pub seller: AccountName,
    pub order_id: u32,
    pub for_sale: i64,
    pub sell_price: Price,
}

impl LimitOrder {
    pub fn amount_for_sale(&self) -> Asset {
        Asset::new(self.for_sale, self.sell_price.base.symbol)
    }

    pub fn amount_to_receive(&self) -> Asset {
        self.amount_for_sale() * self.sell_price
    }
}

impl StateObject for LimitOrder {
    type Id = (AccountName, u32);
    type Key = TimePointSec;

    fn id(&self) -> Self::Id {
        (self.seller.clone(), self.order_id)
    }

    /// Ordered by expiration for the per-block expiry sweep.
    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.expiration]
    }
}

/// An EUSD-to-EMBER conversion waiting out its delay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub owner: AccountName,
    pub request_id: u32,
    pub amount: Asset,
    pub conversion_date: TimePointSec,
}

impl StateObject for ConvertRequest {
    type Id = (AccountName, u32);
    type Key = TimePointSec;

    fn id(&self) -> Self::Id {
        (self.owner.clone(), self.request_id)
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.conversion_date]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub escrow_id: u32,

    pub eusd_balance: Asset,
    pub ember_balance: Asset,
    pub pending_fee: Asset,

    pub ratification_deadline: TimePointSec,
    pub escrow_expiration: TimePointSec,

    pub to_approved: bool,
    pub agent_approved: bool,
    pub disputed: bool,
}

impl Escrow {
    pub fn is_approved(&self) -> bool {
        self.to_approved && self.agent_approved
    }
}

impl StateObject for Escrow {
    type Id = (AccountName, u32);
    type Key = (bool, TimePointSec);

    fn id(&self) -> Self::Id {
        (self.from.clone(), self.escrow_id)
    }

    /// Unratified escrows sort first, then by deadline, so the expiry sweep
    /// stops at the first approved row.
    fn keys(&self) -> Vec<(bool, TimePointSec)> {
        vec![(self.is_approved(), self.ratification_deadline)]
    }
}

/// A savings withdrawal in its three-day cooldown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsWithdraw {
    pub from: AccountName,
    pub to: AccountName,
    pub memo: String,
    pub request_id: u32,
    pub amount: Asset,
    pub complete: TimePointSec,
}

impl StateObject for SavingsWithdraw {
    type Id = (AccountName, u32);
    type Key = TimePointSec;

    fn id(&self) -> Self::Id {
        (self.from.clone(), self.request_id)
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.complete]
    }
}

/// Market-making volume accrued toward the hourly liquidity reward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityRewardBalance {
    pub owner: AccountName,
    pub ember_volume: i64,
    pub eusd_volume: i64,
    pub weight: u128,
    pub last_update: TimePointSec,
}

impl LiquidityRewardBalance {
    /// Recompute the reward weight. Before the weight hardfork the product
    /// rewarded one-sided volume; after it only two-sided volume counts.
    pub fn update_weight(&mut self, balanced: bool) {
        self.weight = if balanced {
            let min = self.ember_volume.min(self.eusd_volume).max(0) as u128;
            min * min
        } else {
            (self.ember_volume.max(0) as u128) * (self.eusd_volume.max(0) as u128)
        };
    }
}

impl StateObject for LiquidityRewardBalance {
    type Id = AccountName;
    type Key = ();

    fn id(&self) -> AccountName {
        self.owner.clone()
    }
}
