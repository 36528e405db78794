//! Consensus constants.
//!
//! Values marked "legacy" back the pre-HF16 code paths that a replay from
//! genesis still crosses.

use shared_types::{Asset, TimePointSec};

pub use shared_types::operations::{PERCENT_1, PERCENT_100};

/// Seconds between scheduled blocks.
pub const BLOCK_INTERVAL: u32 = 3;
pub const BLOCKS_PER_HOUR: u32 = 60 * 60 / BLOCK_INTERVAL;
pub const BLOCKS_PER_DAY: u32 = 24 * 60 * 60 / BLOCK_INTERVAL;
pub const BLOCKS_PER_YEAR: u32 = 365 * 24 * 60 * 60 / BLOCK_INTERVAL;

pub const GENESIS_TIME: TimePointSec = TimePointSec(1_531_629_413);

/// Witness round size: 20 voted slots plus 1 timeshare slot.
pub const MAX_WITNESSES: usize = 21;
pub const MAX_VOTED_WITNESSES: usize = 20;
pub const MAX_TIMESHARE_WITNESSES: usize = 1;
/// Witnesses that must run a version before its hardfork can be voted in.
pub const HARDFORK_REQUIRED_WITNESSES: usize = 17;

/// Blocks below the threshold position in the schedule are irreversible.
pub const IRREVERSIBLE_THRESHOLD: u16 = 75 * PERCENT_1;

pub const MINER_ACCOUNT: &str = "genesis";
pub const NULL_ACCOUNT: &str = "null";
pub const TEMP_ACCOUNT: &str = "temp";
pub const INIT_MINER_NAME: &str = "miner";
pub const NUM_INIT_MINERS: usize = 21;
pub const NUM_INIT_EXTRAS: usize = 4;

pub const MAX_TIME_UNTIL_EXPIRATION: u32 = 60 * 60;
pub const MAX_PROXY_RECURSION_DEPTH: usize = 4;
pub const MAX_SIG_CHECK_DEPTH: u32 = 2;
pub const MAX_WITNESSES_VOTED_FOR: u16 = 30;

pub const MIN_UNDO_HISTORY: u32 = 10;
pub const MAX_UNDO_HISTORY: u32 = 10_000;

pub const MIN_BLOCK_SIZE: usize = 115;
pub const MAX_TRANSACTION_SIZE: usize = 1024 * 64;
pub const MIN_BLOCK_SIZE_LIMIT: u32 = MAX_TRANSACTION_SIZE as u32;
pub const MAX_BLOCK_SIZE: u32 = MAX_TRANSACTION_SIZE as u32 * 256;

/// Weekly tranches a vesting withdrawal is spread over.
pub const VESTING_WITHDRAW_INTERVALS: u32 = 13;
pub const VESTING_WITHDRAW_INTERVALS_PRE_HF16: u32 = 104;
pub const VESTING_WITHDRAW_INTERVAL_SECONDS: u32 = 60 * 60 * 24 * 7;
pub const MAX_WITHDRAW_ROUTES: usize = 10;

pub const SAVINGS_WITHDRAW_TIME_SEC: u32 = 60 * 60 * 24 * 3;
pub const SAVINGS_WITHDRAW_REQUEST_LIMIT: u32 = 100;

pub const OWNER_AUTH_RECOVERY_PERIOD_SEC: u32 = 60 * 60 * 24 * 30;
pub const OWNER_UPDATE_LIMIT_SEC: u32 = 60 * 60;

pub const VOTE_REGENERATION_SECONDS: u32 = 5 * 60 * 60 * 24;
pub const MAX_VOTE_CHANGES: i8 = 5;
pub const REVERSE_AUCTION_WINDOW_SECONDS: u32 = 60 * 30;
pub const MIN_VOTE_INTERVAL_SEC: u32 = 3;
pub const VOTE_DUST_THRESHOLD: i64 = 0;
pub const UPVOTE_LOCKOUT_SECONDS: u32 = 60 * 60 * 12;

pub const MIN_ROOT_COMMENT_INTERVAL_SEC: u32 = 60 * 5;
pub const MIN_REPLY_INTERVAL_SEC: u32 = 20;
pub const MAX_COMMENT_DEPTH: u16 = 0xFFFF;
pub const SOFT_MAX_COMMENT_DEPTH: u16 = 0xFF;

pub const CASHOUT_WINDOW_SECONDS: u32 = 60 * 60 * 24 * 7;
pub const CASHOUT_WINDOW_SECONDS_PRE_HF12: u32 = 60 * 60 * 24;
pub const CASHOUT_WINDOW_SECONDS_PRE_HF17: u32 = 60 * 60 * 12;
pub const SECOND_CASHOUT_WINDOW: u32 = 60 * 60 * 24 * 30;
pub const MAX_CASHOUT_WINDOW_SECONDS: u32 = 60 * 60 * 24 * 14;

/// Instantaneous inflation starts at 9.78% and narrows by 0.01% every
/// 250 000 blocks down to a 0.95% floor.
pub const INFLATION_RATE_START_PERCENT: u16 = 978;
pub const INFLATION_RATE_STOP_PERCENT: u16 = 95;
pub const INFLATION_NARROWING_PERIOD: u32 = 250_000;

/// Of each block's inflation: 75% content, 15% vesting fund, 10% producer.
pub const CONTENT_REWARD_PERCENT: u16 = 75 * PERCENT_1;
pub const VESTING_FUND_PERCENT: u16 = 15 * PERCENT_1;

pub const POST_REWARD_FUND_NAME: &str = "post";
pub const CONTENT_CONSTANT: u128 = 2_000_000_000_000;
pub const RECENT_CLAIMS_DECAY_RATE_HF17_SEC: u64 = 60 * 60 * 24 * 30;
pub const RECENT_CLAIMS_DECAY_RATE_HF19_SEC: u64 = 60 * 60 * 24 * 15;

/// Payouts whose EUSD value is below this round to zero.
pub const MIN_PAYOUT_EUSD: Asset = Asset::eusd(20);

/// EUSD printing throttles between these market-cap percentages.
pub const EUSD_START_PERCENT: u16 = 2 * PERCENT_1;
pub const EUSD_STOP_PERCENT: u16 = 5 * PERCENT_1;
pub const EUSD_INTEREST_COMPOUND_INTERVAL_SEC: u64 = 60 * 60 * 24 * 30;
pub const DEFAULT_EUSD_INTEREST_RATE: u16 = 10 * PERCENT_1;
pub const SECONDS_PER_YEAR: u64 = 60 * 60 * 24 * 365;

pub const FEED_INTERVAL_BLOCKS: u32 = BLOCKS_PER_HOUR;
pub const FEED_HISTORY_WINDOW: usize = 12 * 7;
pub const FEED_HISTORY_WINDOW_PRE_HF16: usize = 24 * 7;
pub const MAX_FEED_AGE_SECONDS: u32 = 60 * 60 * 24 * 7;
/// Conversions wait until the price has history behind it.
pub const MIN_FEEDS: usize = MAX_WITNESSES / 3;
pub const CONVERSION_DELAY_SEC: u32 = FEED_HISTORY_WINDOW as u32 * 60 * 60 / 2;
pub const CONVERSION_DELAY_PRE_HF16_SEC: u32 = 60 * 60 * 24 * 7;

pub const LIQUIDITY_REWARD_PERIOD_SEC: u32 = 60 * 60;
pub const LIQUIDITY_REWARD_BLOCKS: u32 = LIQUIDITY_REWARD_PERIOD_SEC / BLOCK_INTERVAL;
pub const MIN_LIQUIDITY_REWARD_PERIOD_SEC: u64 = 60;
pub const LIQUIDITY_TIMEOUT_SEC: u64 = 60 * 60 * 24 * 7;
pub const MIN_LIQUIDITY_REWARD: Asset = Asset::ember(1_000 * LIQUIDITY_REWARD_BLOCKS as i64);

/// Vesting deposits start a week in; miner voting a month in.
pub const START_VESTING_BLOCK: u32 = BLOCKS_PER_DAY * 7;
pub const START_MINER_VOTING_BLOCK: u32 = BLOCKS_PER_DAY * 30;

pub const MIN_PRODUCER_REWARD: Asset = Asset::ember(1_000);
pub const MIN_CONTENT_REWARD: Asset = Asset::ember(1_000);
pub const MIN_CURATE_REWARD: Asset = Asset::ember(1_000);

// Legacy APR payout constants, precomputed as
// expm1(log1p(1) / periods_per_year) << shift / 100000. The shifts are the
// largest values keeping multiplier * 2^64 * 100000 under 2^128.
pub const APR_PERCENT_MULTIPLY_PER_BLOCK: u64 = 0x5ccc_e802_de5f;
pub const APR_PERCENT_SHIFT_PER_BLOCK: u8 = 87;
pub const APR_PERCENT_MULTIPLY_PER_HOUR: u64 = 0x6cc1_39a1_5cbd;
pub const APR_PERCENT_SHIFT_PER_HOUR: u8 = 77;

/// Legacy APR splits; each unit is 1% APR including the 9x vesting match.
pub const CONTENT_APR_PERCENT: u16 = 3875;
pub const CURATE_APR_PERCENT: u16 = 3875;
pub const LIQUIDITY_APR_PERCENT: u16 = 750;
pub const PRODUCER_APR_PERCENT: u16 = 750;

/// Virtual schedule lap lengths; the second applies from HF2 on.
pub const VIRTUAL_SCHEDULE_LAP_LENGTH: u128 = u64::MAX as u128;
pub const VIRTUAL_SCHEDULE_LAP_LENGTH2: u128 = u128::MAX;

pub const BLOCKCHAIN_PRECISION: u64 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_block_counts() {
        assert_eq!(BLOCKS_PER_HOUR, 1_200);
        assert_eq!(BLOCKS_PER_DAY, 28_800);
        assert_eq!(BLOCKS_PER_YEAR, 10_512_000);
    }

    #[test]
    fn test_witness_slots_add_up() {
        assert_eq!(MAX_VOTED_WITNESSES + MAX_TIMESHARE_WITNESSES, MAX_WITNESSES);
    }

    #[test]
    fn test_inflation_split_leaves_producer_share() {
        let producer = PERCENT_100 - CONTENT_REWARD_PERCENT - VESTING_FUND_PERCENT;
        assert_eq!(producer, 10 * PERCENT_1);
    }

    #[test]
    fn test_genesis_accounts_divide_reference_supply() {
        // The reference genesis seeds 1_000_000_000_000 base units.
        assert_eq!(1_000_000_000_000i64 % (NUM_INIT_MINERS + NUM_INIT_EXTRAS) as i64, 0);
    }
}
