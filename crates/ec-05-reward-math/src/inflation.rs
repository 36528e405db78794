//! Per-block issuance and the EUSD print rate.

use ec_chain_params::{
    APR_PERCENT_MULTIPLY_PER_BLOCK, APR_PERCENT_SHIFT_PER_BLOCK, BLOCKS_PER_YEAR,
    EUSD_START_PERCENT, EUSD_STOP_PERCENT, INFLATION_NARROWING_PERIOD,
    INFLATION_RATE_START_PERCENT, INFLATION_RATE_STOP_PERCENT, PERCENT_100,
};

/// Instantaneous inflation rate in basis points at a block height: starts at
/// 9.78% and narrows by 0.01% every 250k blocks, flooring at 0.95%.
pub fn current_inflation_rate(head_block_num: u32) -> u16 {
    let adjustment = head_block_num / INFLATION_NARROWING_PERIOD;
    INFLATION_RATE_START_PERCENT
        .saturating_sub(adjustment.min(u32::from(u16::MAX)) as u16)
        .max(INFLATION_RATE_STOP_PERCENT)
}

/// New EMBER issued by one block against the current virtual supply.
pub fn inflation_per_block(virtual_supply: i64, head_block_num: u32) -> i64 {
    let rate = i128::from(current_inflation_rate(head_block_num));
    let new_supply =
        i128::from(virtual_supply) * rate / (i128::from(PERCENT_100) * i128::from(BLOCKS_PER_YEAR));
    new_supply as i64
}

/// The pre-HF16 APR payout: `supply * percent * mult >> shift`, where the
/// multiplier has the per-block compounding and the 1e5 scale folded in.
pub fn legacy_apr_reward_per_block(virtual_supply: i64, apr_percent: u16) -> i64 {
    let mut reward = virtual_supply as u128;
    reward *= u128::from(apr_percent);
    reward *= u128::from(APR_PERCENT_MULTIPLY_PER_BLOCK);
    reward >>= APR_PERCENT_SHIFT_PER_BLOCK;
    reward as i64
}

/// EUSD print rate from the stable token's share of market cap, linearly
/// clamped between the start and stop percentages.
///
/// `eusd_in_ember` is the EUSD supply valued at the median; `virtual_supply`
/// already includes it.
pub fn eusd_print_rate(eusd_in_ember: i64, virtual_supply: i64) -> u16 {
    debug_assert!(virtual_supply > 0);
    let percent_eusd =
        (u128::from(eusd_in_ember as u64) * u128::from(PERCENT_100) / virtual_supply as u128) as u16;

    if percent_eusd <= EUSD_START_PERCENT {
        PERCENT_100
    } else if percent_eusd >= EUSD_STOP_PERCENT {
        0
    } else {
        (EUSD_STOP_PERCENT - percent_eusd) * PERCENT_100 / (EUSD_STOP_PERCENT - EUSD_START_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflation_narrows_to_floor() {
        assert_eq!(current_inflation_rate(0), 978);
        assert_eq!(current_inflation_rate(250_000), 977);
        assert_eq!(current_inflation_rate(7_000_000), 978 - 28);
        // Far future: pinned at the floor.
        assert_eq!(current_inflation_rate(u32::MAX), 95);
    }

    #[test]
    fn test_inflation_per_block_magnitude() {
        // 9.78% of 1e12 spread over a year of blocks.
        let per_block = inflation_per_block(1_000_000_000_000, 0);
        let per_year = per_block as i128 * i128::from(BLOCKS_PER_YEAR);
        let expected = 1_000_000_000_000i128 * 978 / 10_000;
        // Truncation loses less than one block's worth per block.
        assert!(per_year <= expected);
        assert!(per_year > expected - i128::from(BLOCKS_PER_YEAR));
    }

    #[test]
    fn test_print_rate_clamps() {
        // 1% of market cap: full print rate.
        assert_eq!(eusd_print_rate(1, 100), PERCENT_100);
        // 10% of market cap: stopped.
        assert_eq!(eusd_print_rate(10, 100), 0);
        // Halfway between 2% and 5%: half rate.
        assert_eq!(eusd_print_rate(35, 1_000), PERCENT_100 / 2);
    }

    #[test]
    fn test_legacy_apr_reward_is_small_against_supply() {
        let reward = legacy_apr_reward_per_block(1_000_000_000_000, 3875);
        assert!(reward > 0);
        // Well under one ten-thousandth of supply per block.
        assert!(reward < 1_000_000_000_000 / 10_000);
    }
}
