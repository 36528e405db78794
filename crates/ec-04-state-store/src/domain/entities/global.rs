//! Singletons and consensus bookkeeping rows.

use crate::domain::table::StateObject;
use ec_chain_params::{DEFAULT_EUSD_INTEREST_RATE, MAX_BLOCK_SIZE};
use ec_reward_math::CurveId;
use serde::{Deserialize, Serialize};
use shared_types::operations::PERCENT_100;
use shared_types::{AccountName, Asset, BlockId, Price, TimePointSec, TransactionId};
use std::collections::VecDeque;

/// Singleton: the dynamic global properties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: BlockId,
    pub time: TimePointSec,
    pub current_witness: AccountName,
    pub current_aslot: u64,

    /// 128-slot participation bitset; bit 0 is the newest slot.
    pub recent_slots_filled: u128,
    pub participation_count: u8,

    pub current_supply: Asset,
    pub current_eusd_supply: Asset,
    pub virtual_supply: Asset,

    pub total_vesting_fund_ember: Asset,
    pub total_vesting_shares: Asset,
    pub total_reward_fund_ember: Asset,
    pub pending_rewarded_vesting_shares: Asset,
    pub pending_rewarded_vesting_ember: Asset,

    pub eusd_interest_rate: u16,
    pub eusd_print_rate: u16,
    pub maximum_block_size: u32,
    pub last_irreversible_block_num: u32,
    pub vote_power_reserve_rate: u32,
}

impl GlobalProperties {
    pub fn genesis(genesis_time: TimePointSec, init_supply: i64, current_witness: AccountName) -> Self {
        GlobalProperties {
            head_block_number: 0,
            head_block_id: [0u8; 20],
            time: genesis_time,
            current_witness,
            current_aslot: 0,
            recent_slots_filled: u128::MAX,
            participation_count: 128,
            current_supply: Asset::ember(init_supply),
            current_eusd_supply: Asset::eusd(0),
            virtual_supply: Asset::ember(init_supply),
            total_vesting_fund_ember: Asset::ember(0),
            total_vesting_shares: Asset::vests(0),
            total_reward_fund_ember: Asset::ember(0),
            pending_rewarded_vesting_shares: Asset::vests(0),
            pending_rewarded_vesting_ember: Asset::ember(0),
            eusd_interest_rate: DEFAULT_EUSD_INTEREST_RATE,
            eusd_print_rate: PERCENT_100,
            maximum_block_size: MAX_BLOCK_SIZE,
            last_irreversible_block_num: 0,
            vote_power_reserve_rate: 40,
        }
    }

    /// EMBER per vesting share for deposits and withdrawals.
    pub fn vesting_share_price(&self) -> Price {
        if self.total_vesting_fund_ember.amount == 0 {
            // Bootstrap rate: one milli-EMBER buys one micro-share block.
            Price::new(Asset::ember(1), Asset::vests(1_000))
        } else {
            Price::new(self.total_vesting_fund_ember, self.total_vesting_shares)
        }
    }

    /// Share price used when crediting pending rewards.
    pub fn reward_vesting_share_price(&self) -> Price {
        let fund = self.total_vesting_fund_ember + self.pending_rewarded_vesting_ember;
        let shares = self.total_vesting_shares + self.pending_rewarded_vesting_shares;
        if fund.amount == 0 {
            Price::new(Asset::ember(1), Asset::vests(1_000))
        } else {
            Price::new(fund, shares)
        }
    }
}

impl StateObject for GlobalProperties {
    type Id = ();
    type Key = ();

    fn id(&self) {}
}

/// Singleton: the feed window and its running median.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHistory {
    pub current_median_history: Price,
    pub price_history: VecDeque<Price>,
}

impl StateObject for FeedHistory {
    type Id = ();
    type Key = ();

    fn id(&self) {}
}

/// Singleton: which hardforks have been applied and which is due next.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardforkProperties {
    pub processed_hardforks: Vec<TimePointSec>,
    pub last_hardfork: u32,
    pub current_hardfork_version: shared_types::ProtocolVersion,
    pub next_hardfork: shared_types::ProtocolVersion,
    pub next_hardfork_time: TimePointSec,
}

impl StateObject for HardforkProperties {
    type Id = ();
    type Key = ();

    fn id(&self) {}
}

/// One slot of the 65536-entry TaPoS ring, keyed by `block_num & 0xFFFF`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub slot: u16,
    pub block_id: BlockId,
}

impl StateObject for BlockSummary {
    type Id = u16;
    type Key = ();

    fn id(&self) -> u16 {
        self.slot
    }
}

/// A recently applied transaction, kept until expiration for dedup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub trx_id: TransactionId,
    pub expiration: TimePointSec,
    pub packed_trx: Vec<u8>,
}

impl StateObject for TransactionRecord {
    type Id = TransactionId;
    type Key = TimePointSec;

    fn id(&self) -> TransactionId {
        self.trx_id
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.expiration]
    }
}

/// A content reward fund.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardFund {
    pub name: String,
    pub reward_balance: Asset,
    pub recent_claims: u128,
    pub last_update: TimePointSec,
    pub content_constant: u128,
    pub percent_curation_rewards: u16,
    pub percent_content_rewards: u16,
    pub author_reward_curve: CurveId,
    pub curation_reward_curve: CurveId,
}

impl StateObject for RewardFund {
    type Id = String;
    type Key = ();

    fn id(&self) -> String {
        self.name.clone()
    }
}
