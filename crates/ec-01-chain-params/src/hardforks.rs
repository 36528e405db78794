//! The ordered hardfork schedule.
//!
//! A hardfork is `(index, activation time, version)`. Whether a fork has been
//! *applied* is chain state (`processed_hardforks` on the hardfork property
//! row); this table only says when each one becomes due and which protocol
//! version carries it.

use crate::constants::GENESIS_TIME;
use shared_types::{ProtocolVersion, TimePointSec};
use thiserror::Error;

/// Number of configured hardforks. Index 0 is genesis.
pub const NUM_HARDFORKS: u32 = 19;

/// The version this build speaks.
pub const BLOCKCHAIN_VERSION: ProtocolVersion = ProtocolVersion::new(0, 19, 5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("hardfork {0} is beyond the configured table")]
    UnknownHardfork(u32),
}

/// Activation times and versions for hardforks `0..=NUM_HARDFORKS`.
#[derive(Clone, Debug)]
pub struct HardforkSchedule {
    times: Vec<TimePointSec>,
    versions: Vec<ProtocolVersion>,
}

impl HardforkSchedule {
    /// The production schedule. Hardforks 1..=19 activate at fixed, strictly
    /// increasing times after genesis.
    pub fn mainnet() -> Self {
        let day = 60 * 60 * 24;
        let spacing: [u32; 19] = [
            7, 14, 21, 30, 45, 60, 75, 90, 110, 130, 150, 170, 200, 230, 260, 290, 330, 370, 410,
        ];
        let mut times = vec![GENESIS_TIME];
        times.extend(spacing.iter().map(|d| GENESIS_TIME + d * day));
        Self::with_times(times)
    }

    /// Every hardfork due at `time`. Used by replays and the test suites so
    /// chains start at current rules after the first block.
    pub fn all_at(time: TimePointSec) -> Self {
        Self::with_times(vec![time; NUM_HARDFORKS as usize + 1])
    }

    fn with_times(times: Vec<TimePointSec>) -> Self {
        assert_eq!(times.len(), NUM_HARDFORKS as usize + 1);
        let versions = (0..=NUM_HARDFORKS)
            .map(|i| ProtocolVersion::new(0, i as u8, 0))
            .collect();
        HardforkSchedule { times, versions }
    }

    pub fn time(&self, hardfork: u32) -> Result<TimePointSec, ScheduleError> {
        self.times
            .get(hardfork as usize)
            .copied()
            .ok_or(ScheduleError::UnknownHardfork(hardfork))
    }

    pub fn version(&self, hardfork: u32) -> Result<ProtocolVersion, ScheduleError> {
        self.versions
            .get(hardfork as usize)
            .copied()
            .ok_or(ScheduleError::UnknownHardfork(hardfork))
    }

    /// The hardfork version of the newest configured fork.
    pub fn current_hardfork_version(&self) -> ProtocolVersion {
        self.versions[NUM_HARDFORKS as usize].hardfork()
    }

    pub fn len(&self) -> u32 {
        NUM_HARDFORKS
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_times_are_increasing() {
        let schedule = HardforkSchedule::mainnet();
        for i in 1..=NUM_HARDFORKS {
            assert!(
                schedule.time(i).unwrap() > schedule.time(i - 1).unwrap(),
                "hardfork {i} must activate after {prev}",
                prev = i - 1
            );
        }
    }

    #[test]
    fn test_unknown_hardfork_is_an_error() {
        let schedule = HardforkSchedule::mainnet();
        assert_eq!(
            schedule.time(NUM_HARDFORKS + 1),
            Err(ScheduleError::UnknownHardfork(NUM_HARDFORKS + 1))
        );
    }

    #[test]
    fn test_all_at_puts_everything_due() {
        let t = TimePointSec::new(42);
        let schedule = HardforkSchedule::all_at(t);
        for i in 0..=NUM_HARDFORKS {
            assert_eq!(schedule.time(i).unwrap(), t);
        }
    }

    #[test]
    fn test_versions_track_indices() {
        let schedule = HardforkSchedule::mainnet();
        assert_eq!(schedule.version(17).unwrap(), ProtocolVersion::new(0, 17, 0));
        assert_eq!(schedule.current_hardfork_version(), ProtocolVersion::new(0, 19, 0));
    }
}
