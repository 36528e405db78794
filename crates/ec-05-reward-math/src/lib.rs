//! # Reward Math (ec-05)
//!
//! Pure integer math behind the reward engine: curve evaluation, comment
//! payout shares, per-block inflation and the EUSD print rate.
//!
//! Everything here is consensus-critical. The functions operate on native
//! `u128` fixed-width integers, widening to `primitive_types::U256` only
//! where a product can exceed 128 bits, and every narrowing carries an
//! explicit assert. No floating point anywhere.

pub mod curve;
pub mod inflation;
pub mod payout;

pub use curve::{approx_sqrt, evaluate_reward_curve, find_msb, CurveId};
pub use inflation::{current_inflation_rate, eusd_print_rate, inflation_per_block, legacy_apr_reward_per_block};
pub use payout::{ember_reward, is_payout_dust, to_ember, to_eusd, CommentRewardContext, RewardError};
