//! # Witness Schedule (ec-06)
//!
//! Selects the witnesses for each round and shuffles them into slot order.
//!
//! A round is `num_scheduled_witnesses` blocks. At the top of each round the
//! scheduler picks the top-voted witnesses, fills the timeshare slot from
//! the virtual schedule (a lottery where a witness's position advances in
//! proportion to its votes), recomputes the pay normalization factor and the
//! majority running version, and shuffles the selection deterministically
//! from the head time.

pub mod schedule;

pub use schedule::{reset_virtual_schedule_time, update_majority_version, update_witness_schedule};
