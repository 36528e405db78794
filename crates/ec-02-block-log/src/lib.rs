//! # Block Log (ec-02)
//!
//! The durable, append-only sequence of irreversible blocks.
//!
//! ## Format
//!
//! Two files. `block_log` holds records of the form
//!
//! ```text
//! u32-le payload length | bincode(SignedBlock) | u64-le record start offset
//! ```
//!
//! so the log can be walked forward (length prefix) and the head recovered
//! backward (trailing offset). `block_log.index` holds one u64-le start
//! offset per block number, so `read_block_by_num` is a single seek.
//!
//! A torn tail from a crash is detected on open by replaying the index
//! against the log length; both files are truncated back to the last whole
//! record.

pub mod log;

pub use log::{BlockLog, BlockLogError};
