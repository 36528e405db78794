//! # Fork Database (ec-03)
//!
//! An in-memory tree of the blocks near the head, keyed by block id with
//! parent links. It answers "which branch is longest", "where do these two
//! branches meet" and "what is on the main branch at height n" while the
//! engine applies, pops and re-applies blocks around forks.
//!
//! ## Invariants
//!
//! - Exactly one head. The head is the item with the greatest block number;
//!   on a tie the earlier arrival wins.
//! - Every stored block except the root links to a stored parent; an
//!   unlinkable push is rejected.
//! - Blocks older than `head.num - max_size` are pruned; `max_size` tracks
//!   `head - irreversible + 1`.

pub mod fork_db;

pub use fork_db::{ForkDatabase, ForkDbError, ForkItem};
