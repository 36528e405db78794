//! # State Store (ec-04)
//!
//! The versioned, typed state store behind the chain engine. Every entity
//! the chain knows about lives in one of the store's tables; all mutation
//! goes through `create`/`modify`/`remove` so the undo machinery can rewind
//! any prefix of history back to the last irreversible block.
//!
//! ## Sessions
//!
//! Mutations happen inside nested undo sessions. A session is opened with
//! [`StateStore::begin_session`]; the caller then either:
//!
//! - leaves it on the stack (a successfully applied block keeps its session
//!   as undo history),
//! - [`StateStore::squash`]es it into its parent (a transaction merging into
//!   the pending-pool session), or
//! - [`StateStore::undo`]es it (any failure path).
//!
//! [`StateStore::commit`] discards undo history up to a revision once the
//! corresponding block is irreversible. After a full apply,
//! `revision() == head_block_num()`; after `undo_all()`,
//! `revision() == last_irreversible_block_num`.

pub mod domain;
pub mod store;

pub use domain::errors::StoreError;
pub use domain::table::{StateObject, Table};
pub use domain::entities::*;
pub use store::StateStore;
