//! Comment payout share computation.

use crate::curve::{evaluate_reward_curve, CurveId};
use ec_chain_params::{MIN_PAYOUT_EUSD, PERCENT_100};
use primitive_types::U256;
use shared_types::{Asset, AssetSymbol, Price};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewardError {
    #[error("comment has no positive rshares")]
    NoRshares,

    #[error("reward fund has no claims")]
    NoClaims,

    #[error("payout exceeds the representable amount")]
    PayoutOverflow,
}

/// Everything the payout division needs about a comment and its fund.
#[derive(Clone, Debug)]
pub struct CommentRewardContext {
    pub rshares: i64,
    /// Basis points; posts over the bandwidth budget earn a reduced weight.
    pub reward_weight: u16,
    pub max_eusd: Asset,
    pub total_claims: u128,
    pub reward_fund_ember: Asset,
    pub curve: CurveId,
    pub content_constant: u128,
    pub current_median: Price,
}

/// Convert EMBER to EUSD at the median, zero when no feed exists.
pub fn to_eusd(median: &Price, ember: Asset) -> Asset {
    debug_assert_eq!(ember.symbol, AssetSymbol::Ember);
    if median.is_null() {
        Asset::eusd(0)
    } else {
        ember * *median
    }
}

/// Convert EUSD to EMBER at the median, zero when no feed exists.
pub fn to_ember(median: &Price, eusd: Asset) -> Asset {
    debug_assert_eq!(eusd.symbol, AssetSymbol::Eusd);
    if median.is_null() {
        Asset::ember(0)
    } else {
        eusd * *median
    }
}

/// A payout whose EUSD value is under the dust threshold rounds to zero.
pub fn is_payout_dust(median: &Price, ember_payout: u64) -> bool {
    to_eusd(median, Asset::ember(ember_payout as i64)) < MIN_PAYOUT_EUSD
}

/// The EMBER a comment claims from its fund this cycle.
///
/// `reward_balance * curve(rshares) * reward_weight / total_claims`, dust
/// rounded to zero, capped by the comment's max accepted payout converted
/// through the median.
pub fn ember_reward(ctx: &CommentRewardContext) -> Result<u64, RewardError> {
    if ctx.rshares <= 0 {
        return Err(RewardError::NoRshares);
    }
    if ctx.total_claims == 0 {
        return Err(RewardError::NoClaims);
    }

    let rf = U256::from(ctx.reward_fund_ember.amount as u64);
    let total_claims = U256::from(ctx.total_claims);

    let mut claim = U256::from(evaluate_reward_curve(
        ctx.rshares as u128,
        ctx.curve,
        ctx.content_constant,
    ));
    claim = claim * U256::from(ctx.reward_weight) / U256::from(PERCENT_100);

    let payout_u256 = rf * claim / total_claims;
    if payout_u256 > U256::from(i64::MAX as u64) {
        return Err(RewardError::PayoutOverflow);
    }
    let mut payout = payout_u256.as_u64();

    if is_payout_dust(&ctx.current_median, payout) {
        payout = 0;
    }

    let max_ember = to_ember(&ctx.current_median, ctx.max_eusd);
    payout = payout.min(max_ember.amount as u64);

    Ok(payout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec_chain_params::CONTENT_CONSTANT;

    fn median() -> Price {
        // 1.000 EUSD per 1.000 EMBER
        Price::new(Asset::eusd(1_000), Asset::ember(1_000))
    }

    fn ctx(rshares: i64, total_claims: u128, fund: i64) -> CommentRewardContext {
        CommentRewardContext {
            rshares,
            reward_weight: PERCENT_100,
            max_eusd: Asset::eusd(1_000_000_000),
            total_claims,
            reward_fund_ember: Asset::ember(fund),
            curve: CurveId::Quadratic,
            content_constant: CONTENT_CONSTANT,
            current_median: median(),
        }
    }

    #[test]
    fn test_sole_comment_takes_whole_fund() {
        // recent_claims equals this comment's own claim, so the division
        // hands over the entire balance.
        let claims = evaluate_reward_curve(1_000, CurveId::Quadratic, CONTENT_CONSTANT);
        let reward = ember_reward(&ctx(1_000, claims, 100_000)).unwrap();
        assert_eq!(reward, 100_000);
    }

    #[test]
    fn test_half_share() {
        let claims = evaluate_reward_curve(1_000, CurveId::Quadratic, CONTENT_CONSTANT);
        let reward = ember_reward(&ctx(1_000, claims * 2, 100_000)).unwrap();
        assert_eq!(reward, 50_000);
    }

    #[test]
    fn test_max_accepted_payout_caps() {
        let claims = evaluate_reward_curve(1_000, CurveId::Quadratic, CONTENT_CONSTANT);
        let mut c = ctx(1_000, claims, 100_000);
        c.max_eusd = Asset::eusd(1_000);
        assert_eq!(ember_reward(&c).unwrap(), 1_000);
    }

    #[test]
    fn test_dust_rounds_to_zero() {
        let claims = evaluate_reward_curve(1_000, CurveId::Quadratic, CONTENT_CONSTANT);
        // Fund of 10 base units: payout would be 10, dust threshold is 20.
        assert_eq!(ember_reward(&ctx(1_000, claims, 10)).unwrap(), 0);
    }

    #[test]
    fn test_nonpositive_rshares_rejected() {
        assert_eq!(ember_reward(&ctx(0, 1, 1)), Err(RewardError::NoRshares));
        assert_eq!(ember_reward(&ctx(-5, 1, 1)), Err(RewardError::NoRshares));
    }

    #[test]
    fn test_reward_weight_scales_claim() {
        let claims = evaluate_reward_curve(1_000, CurveId::Quadratic, CONTENT_CONSTANT);
        let mut c = ctx(1_000, claims, 100_000);
        c.reward_weight = PERCENT_100 / 2;
        assert_eq!(ember_reward(&c).unwrap(), 50_000);
    }
}
