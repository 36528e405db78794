//! Reward curve evaluation.
//!
//! The curve maps a comment's net rshares to its claim on a reward fund.
//! Results feed `recent_claims` decay and the payout division, so the exact
//! bit patterns matter: two nodes disagreeing in the last bit here fork.

use serde::{Deserialize, Serialize};

/// Which curve a reward fund pays along.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveId {
    /// (r + s)^2 - s^2
    Quadratic,
    /// r * 2^64 / (2s + r), bounded below one lap
    QuadraticCuration,
    /// r
    Linear,
    /// integer approximation of sqrt(r)
    SquareRoot,
}

/// Position of the most significant set bit. `u` must be nonzero.
pub fn find_msb(u: u128) -> u8 {
    debug_assert!(u != 0, "find_msb of zero");
    127 - u.leading_zeros() as u8
}

/// MSB-anchored square root approximation on 128-bit input.
///
/// Splits the argument into its top bit and mantissa, halves the exponent
/// and shifts the mantissa into place. Accurate to about half a bit, and
/// exactly reproducible, which is what consensus needs.
pub fn approx_sqrt(x: u128) -> u64 {
    if x == 0 {
        return 0;
    }

    let msb_x = find_msb(x);
    let msb_z = msb_x >> 1;

    let msb_x_bit = 1u128 << msb_x;
    let msb_z_bit = 1u64 << msb_z;

    let mantissa_mask = msb_x_bit - 1;
    let mantissa_x = x & mantissa_mask;

    let mantissa_z_hi = if msb_x & 1 == 1 { msb_z_bit } else { 0 };
    let mantissa_z_lo = (mantissa_x >> (msb_x - msb_z)) as u64;
    let mantissa_z = (mantissa_z_hi | mantissa_z_lo) >> 1;

    msb_z_bit | mantissa_z
}

/// Evaluate a reward curve at `rshares`.
pub fn evaluate_reward_curve(rshares: u128, curve: CurveId, content_constant: u128) -> u128 {
    match curve {
        CurveId::Quadratic => {
            let rshares_plus_s = rshares.wrapping_add(content_constant);
            rshares_plus_s
                .wrapping_mul(rshares_plus_s)
                .wrapping_sub(content_constant.wrapping_mul(content_constant))
        }
        CurveId::QuadraticCuration => {
            let two_alpha = content_constant.wrapping_mul(2);
            // The numerator keeps only the low 64 bits of rshares, shifted a
            // full lap up.
            let numerator = (rshares as u64 as u128) << 64;
            numerator / (two_alpha + rshares)
        }
        CurveId::Linear => rshares,
        CurveId::SquareRoot => u128::from(approx_sqrt(rshares)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec_chain_params::CONTENT_CONSTANT;

    #[test]
    fn test_find_msb() {
        assert_eq!(find_msb(1), 0);
        assert_eq!(find_msb(2), 1);
        assert_eq!(find_msb(3), 1);
        assert_eq!(find_msb(1u128 << 64), 64);
        assert_eq!(find_msb(u128::MAX), 127);
    }

    #[test]
    fn test_approx_sqrt_exact_squares() {
        assert_eq!(approx_sqrt(0), 0);
        assert_eq!(approx_sqrt(1), 1);
        assert_eq!(approx_sqrt(4), 2);
        assert_eq!(approx_sqrt(16), 4);
        assert_eq!(approx_sqrt(1u128 << 64), 1u64 << 32);
    }

    #[test]
    fn test_approx_sqrt_is_monotone_nearby() {
        let mut prev = 0;
        for x in (0u128..10_000).step_by(37) {
            let s = approx_sqrt(x);
            assert!(s >= prev, "sqrt must not decrease: {x}");
            prev = s;
        }
    }

    #[test]
    fn test_quadratic_curve() {
        // (r + s)^2 - s^2 = r^2 + 2rs
        let r = 1_000u128;
        let expected = r * r + 2 * r * CONTENT_CONSTANT;
        assert_eq!(
            evaluate_reward_curve(r, CurveId::Quadratic, CONTENT_CONSTANT),
            expected
        );
    }

    #[test]
    fn test_linear_curve_is_identity() {
        assert_eq!(evaluate_reward_curve(42, CurveId::Linear, CONTENT_CONSTANT), 42);
    }

    #[test]
    fn test_quadratic_curation_bounded_by_lap() {
        let v = evaluate_reward_curve(u64::MAX as u128, CurveId::QuadraticCuration, CONTENT_CONSTANT);
        assert!(v < 1u128 << 64);
    }

    #[test]
    fn test_square_root_curve() {
        assert_eq!(
            evaluate_reward_curve(1_000_000, CurveId::SquareRoot, CONTENT_CONSTANT),
            u128::from(approx_sqrt(1_000_000))
        );
    }
}
