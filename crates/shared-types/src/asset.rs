//! Assets and prices.
//!
//! Amounts are signed 64-bit integers in base units (precision 1000 for the
//! liquid symbols, 1_000_000 for vesting shares). All conversions truncate,
//! matching the chain's integer semantics: converting through a price never
//! creates value.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("symbol mismatch: {0:?} vs {1:?}")]
    SymbolMismatch(AssetSymbol, AssetSymbol),

    #[error("asset amount overflow")]
    Overflow,
}

/// The three protocol symbols.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetSymbol {
    /// Core token.
    Ember,
    /// Protocol stable token, convertible at the feed median.
    Eusd,
    /// Vesting shares.
    Vests,
}

impl AssetSymbol {
    pub fn precision(self) -> u32 {
        match self {
            AssetSymbol::Ember | AssetSymbol::Eusd => 3,
            AssetSymbol::Vests => 6,
        }
    }
}

/// An amount of one symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub amount: i64,
    pub symbol: AssetSymbol,
}

impl Asset {
    pub const fn new(amount: i64, symbol: AssetSymbol) -> Self {
        Asset { amount, symbol }
    }

    pub const fn ember(amount: i64) -> Self {
        Asset::new(amount, AssetSymbol::Ember)
    }

    pub const fn eusd(amount: i64) -> Self {
        Asset::new(amount, AssetSymbol::Eusd)
    }

    pub const fn vests(amount: i64) -> Self {
        Asset::new(amount, AssetSymbol::Vests)
    }

    fn expect_same(self, other: Asset) -> AssetSymbol {
        assert_eq!(
            self.symbol, other.symbol,
            "asset arithmetic across symbols: {:?} vs {:?}",
            self.symbol, other.symbol
        );
        self.symbol
    }
}

impl Add for Asset {
    type Output = Asset;

    fn add(self, rhs: Asset) -> Asset {
        let symbol = self.expect_same(rhs);
        Asset::new(self.amount.checked_add(rhs.amount).expect("asset overflow"), symbol)
    }
}

impl Sub for Asset {
    type Output = Asset;

    fn sub(self, rhs: Asset) -> Asset {
        let symbol = self.expect_same(rhs);
        Asset::new(self.amount.checked_sub(rhs.amount).expect("asset underflow"), symbol)
    }
}

impl AddAssign for Asset {
    fn add_assign(&mut self, rhs: Asset) {
        *self = *self + rhs;
    }
}

impl SubAssign for Asset {
    fn sub_assign(&mut self, rhs: Asset) {
        *self = *self - rhs;
    }
}

impl Neg for Asset {
    type Output = Asset;

    fn neg(self) -> Asset {
        Asset::new(-self.amount, self.symbol)
    }
}

impl PartialOrd for Asset {
    fn partial_cmp(&self, other: &Asset) -> Option<Ordering> {
        if self.symbol != other.symbol {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10i64.pow(self.symbol.precision());
        write!(
            f,
            "{}.{:0width$} {:?}",
            self.amount / scale,
            (self.amount % scale).unsigned_abs(),
            self.symbol,
            width = self.symbol.precision() as usize
        )
    }
}

/// A price quoted as `base / quote`, e.g. EUSD per EMBER.
///
/// The null price (either side zero) means "no feed"; conversions through a
/// null price are identity-on-zero and must be guarded by callers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub base: Asset,
    pub quote: Asset,
}

impl Default for Price {
    fn default() -> Self {
        Price::null()
    }
}

impl Price {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Price { base, quote }
    }

    /// The "no feed yet" sentinel.
    pub fn null() -> Self {
        Price {
            base: Asset::ember(0),
            quote: Asset::ember(0),
        }
    }

    pub fn is_null(&self) -> bool {
        self.base.amount == 0 || self.quote.amount == 0
    }

    /// Swap base and quote.
    pub fn invert(self) -> Price {
        Price {
            base: self.quote,
            quote: self.base,
        }
    }

    /// Total order for prices over the same symbol pair, by cross
    /// multiplication in 128-bit space.
    pub fn cmp_same_pair(&self, other: &Price) -> Ordering {
        assert_eq!(self.base.symbol, other.base.symbol, "price pair mismatch");
        assert_eq!(self.quote.symbol, other.quote.symbol, "price pair mismatch");
        let lhs = i128::from(self.base.amount) * i128::from(other.quote.amount);
        let rhs = i128::from(other.base.amount) * i128::from(self.quote.amount);
        lhs.cmp(&rhs)
    }
}

impl Mul<Price> for Asset {
    type Output = Asset;

    /// Convert an asset across the price's symbol pair, truncating.
    fn mul(self, p: Price) -> Asset {
        if self.symbol == p.base.symbol {
            assert!(p.base.amount > 0, "conversion through a null price");
            let amount =
                i128::from(self.amount) * i128::from(p.quote.amount) / i128::from(p.base.amount);
            Asset::new(i64::try_from(amount).expect("price conversion overflow"), p.quote.symbol)
        } else if self.symbol == p.quote.symbol {
            assert!(p.quote.amount > 0, "conversion through a null price");
            let amount =
                i128::from(self.amount) * i128::from(p.base.amount) / i128::from(p.quote.amount);
            Asset::new(i64::try_from(amount).expect("price conversion overflow"), p.base.symbol)
        } else {
            panic!(
                "cannot convert {:?} through a {:?}/{:?} price",
                self.symbol, p.base.symbol, p.quote.symbol
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_arithmetic() {
        let a = Asset::ember(1_000);
        let b = Asset::ember(250);
        assert_eq!(a + b, Asset::ember(1_250));
        assert_eq!(a - b, Asset::ember(750));
        assert_eq!(-b, Asset::ember(-250));
    }

    #[test]
    #[should_panic(expected = "asset arithmetic across symbols")]
    fn test_mixed_symbol_add_panics() {
        let _ = Asset::ember(1) + Asset::eusd(1);
    }

    #[test]
    fn test_price_conversion_truncates() {
        // 1.000 EUSD buys 4.000 EMBER
        let p = Price::new(Asset::eusd(1_000), Asset::ember(4_000));
        assert_eq!(Asset::eusd(500) * p, Asset::ember(2_000));
        assert_eq!(Asset::ember(4_000) * p, Asset::eusd(1_000));
        // 3 base units of EMBER are worth 0.75 milli-EUSD -> truncates to 0
        assert_eq!(Asset::ember(3) * p, Asset::eusd(0));
    }

    #[test]
    fn test_price_ordering() {
        let cheap = Price::new(Asset::eusd(1_000), Asset::ember(4_000));
        let dear = Price::new(Asset::eusd(1_000), Asset::ember(2_000));
        // More EUSD per EMBER sorts higher.
        assert_eq!(cheap.cmp_same_pair(&dear), Ordering::Less);
        assert_eq!(dear.cmp_same_pair(&cheap), Ordering::Greater);
        assert_eq!(cheap.cmp_same_pair(&cheap), Ordering::Equal);
    }

    #[test]
    fn test_null_price() {
        assert!(Price::null().is_null());
        let p = Price::new(Asset::eusd(1_000), Asset::ember(4_000));
        assert!(!p.is_null());
    }
}
