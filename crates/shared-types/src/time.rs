//! Wall-clock seconds as used by block headers and expirations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A point in time with one-second resolution, seconds since the Unix epoch.
///
/// `TimePointSec::MAX` is the "never" sentinel used for paid-out comment
/// cashout times and completed vesting withdrawals.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimePointSec(pub u32);

impl TimePointSec {
    pub const MIN: TimePointSec = TimePointSec(0);
    pub const MAX: TimePointSec = TimePointSec(u32::MAX);

    pub fn new(secs: u32) -> Self {
        TimePointSec(secs)
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    /// Whole seconds elapsed since `earlier`, zero if `earlier` is later.
    pub fn saturating_sub(self, earlier: TimePointSec) -> u64 {
        u64::from(self.0.saturating_sub(earlier.0))
    }
}

impl Add<u32> for TimePointSec {
    type Output = TimePointSec;

    fn add(self, secs: u32) -> TimePointSec {
        TimePointSec(self.0.saturating_add(secs))
    }
}

impl Sub<u32> for TimePointSec {
    type Output = TimePointSec;

    fn sub(self, secs: u32) -> TimePointSec {
        TimePointSec(self.0.saturating_sub(secs))
    }
}

impl fmt::Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == TimePointSec::MAX {
            write!(f, "never")
        } else {
            write!(f, "{}s", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_arithmetic() {
        let t = TimePointSec::new(100);
        assert_eq!((t + 50).secs(), 150);
        assert_eq!((t - 200).secs(), 0);
        assert_eq!(TimePointSec::MAX + 1, TimePointSec::MAX);
    }

    #[test]
    fn test_elapsed() {
        let a = TimePointSec::new(30);
        let b = TimePointSec::new(100);
        assert_eq!(b.saturating_sub(a), 70);
        assert_eq!(a.saturating_sub(b), 0);
    }
}
