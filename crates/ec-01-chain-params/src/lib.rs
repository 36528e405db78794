//! # Chain Parameters (ec-01)
//!
//! Compile-time consensus constants and the ordered hardfork schedule.
//! Everything in this crate is part of the protocol: changing a value here
//! is a hardfork.

pub mod constants;
pub mod hardforks;

pub use constants::*;
pub use hardforks::{HardforkSchedule, ScheduleError, BLOCKCHAIN_VERSION, NUM_HARDFORKS};
