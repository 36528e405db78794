//! The single-writer lock around a [`Database`].
//!
//! All write paths (block push, transaction push, production) take the
//! exclusive lock for the whole call; readers share the lock and observe a
//! consistent head. In-flight sessions are never visible to readers because
//! writers hold the lock across the entire apply.

use crate::database::Database;
use parking_lot::RwLock;
use std::sync::Arc;

/// A cloneable handle to a shared, lock-guarded database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<RwLock<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        SharedDatabase { inner: Arc::new(RwLock::new(db)) }
    }

    /// Run a read-only closure under the shared lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&Database) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a mutating closure under the exclusive lock.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut Database) -> R) -> R {
        f(&mut self.inner.write())
    }
}
