//! # Chain Engine (ec-07)
//!
//! The deterministic heart of the node: accepts candidate blocks and
//! transactions, validates them against chain rules, applies their effects
//! atomically to the state store, maintains the fork tree, advances the
//! irreversibility marker and replays deterministically from the block log.
//!
//! ## Structure
//!
//! - [`database`] — the `Database` orchestrator: push/apply/pop paths, the
//!   per-block maintenance pipeline, fork switching, hardfork processing and
//!   the supply invariant checker.
//! - [`evaluators`] — one evaluator per user operation, dispatched through
//!   the registry port.
//! - [`domain`] — skip flags, the error taxonomy, the notification bus.
//! - [`ports`] — seams to external collaborators: signature verification and
//!   the evaluator registry contract.
//! - [`shared`] — the single-writer `RwLock` wrapper.

pub mod database;
pub mod domain;
pub mod evaluators;
pub mod ports;
pub mod shared;

pub use database::{Database, GenesisConfig};
pub use domain::error::ChainError;
pub use domain::notifications::{NotificationBus, OperationNotification};
pub use domain::skip_flags::SkipFlags;
pub use ports::registry::{Evaluator, EvaluatorRegistry};
pub use ports::signing::{HashSignatureVerifier, KeyPair, SignatureVerifier};
pub use shared::SharedDatabase;
