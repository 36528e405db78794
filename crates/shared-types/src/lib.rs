//! # Shared Types Crate
//!
//! All protocol-level types shared across the emberchain subsystem crates:
//! assets and prices, account names, block/transaction ids, wall-clock
//! seconds, signed blocks and transactions, and the operation enum.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-subsystem type is defined here.
//! - **Deterministic encoding**: all wire-visible types derive serde and are
//!   framed with bincode; ids are fixed-width byte arrays.
//! - **No entity references**: entities refer to each other by stable keys
//!   (`AccountName`, `(author, permlink)` pairs), never by pointer.

pub mod asset;
pub mod block;
pub mod crypto;
pub mod ids;
pub mod operations;
pub mod time;
pub mod transaction;

pub use asset::{Asset, AssetError, AssetSymbol, Price};
pub use block::{
    BlockHeader, BlockHeaderExtension, HardforkVersionVote, ProtocolVersion, SignedBlock,
};
pub use crypto::{chain_id, Digest, PublicKey, Signature};
pub use ids::{block_num_from_id, AccountName, BlockId, NameError, TransactionId};
pub use operations::{
    AuthorityKind, BeneficiaryRoute, Operation, OperationError, VirtualOperation,
};
pub use time::TimePointSec;
pub use transaction::SignedTransaction;
