//! Validation skip bits for replay, reindex and tests.

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A set of validation steps to skip. Replays and everything below the last
/// checkpoint run with most bits set; live application runs with none.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipFlags(pub u32);

impl SkipFlags {
    pub const NOTHING: SkipFlags = SkipFlags(0);
    pub const WITNESS_SIGNATURE: SkipFlags = SkipFlags(1 << 0);
    pub const TRANSACTION_SIGNATURES: SkipFlags = SkipFlags(1 << 1);
    pub const TRANSACTION_DUPE_CHECK: SkipFlags = SkipFlags(1 << 2);
    pub const TAPOS_CHECK: SkipFlags = SkipFlags(1 << 3);
    pub const MERKLE_CHECK: SkipFlags = SkipFlags(1 << 4);
    pub const WITNESS_SCHEDULE_CHECK: SkipFlags = SkipFlags(1 << 5);
    pub const AUTHORITY_CHECK: SkipFlags = SkipFlags(1 << 6);
    pub const VALIDATE: SkipFlags = SkipFlags(1 << 7);
    pub const VALIDATE_INVARIANTS: SkipFlags = SkipFlags(1 << 8);
    pub const BLOCK_LOG: SkipFlags = SkipFlags(1 << 9);
    pub const FORK_DB: SkipFlags = SkipFlags(1 << 10);
    pub const BLOCK_SIZE_CHECK: SkipFlags = SkipFlags(1 << 11);
    pub const UNDO_HISTORY_CHECK: SkipFlags = SkipFlags(1 << 12);

    /// The reindex/replay set: trust the log, skip everything re-derivable.
    pub fn replay() -> SkipFlags {
        SkipFlags::WITNESS_SIGNATURE
            | SkipFlags::TRANSACTION_SIGNATURES
            | SkipFlags::TRANSACTION_DUPE_CHECK
            | SkipFlags::TAPOS_CHECK
            | SkipFlags::MERKLE_CHECK
            | SkipFlags::WITNESS_SCHEDULE_CHECK
            | SkipFlags::AUTHORITY_CHECK
            | SkipFlags::VALIDATE
            | SkipFlags::VALIDATE_INVARIANTS
            | SkipFlags::BLOCK_LOG
    }

    /// Forced below the highest checkpoint; the merkle check stays on so
    /// transactions are still validated against block headers.
    pub fn below_checkpoint() -> SkipFlags {
        SkipFlags::WITNESS_SIGNATURE
            | SkipFlags::TRANSACTION_SIGNATURES
            | SkipFlags::TRANSACTION_DUPE_CHECK
            | SkipFlags::FORK_DB
            | SkipFlags::BLOCK_SIZE_CHECK
            | SkipFlags::TAPOS_CHECK
            | SkipFlags::AUTHORITY_CHECK
            | SkipFlags::UNDO_HISTORY_CHECK
            | SkipFlags::WITNESS_SCHEDULE_CHECK
            | SkipFlags::VALIDATE
            | SkipFlags::VALIDATE_INVARIANTS
    }

    pub fn contains(self, other: SkipFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SkipFlags {
    type Output = SkipFlags;

    fn bitor(self, rhs: SkipFlags) -> SkipFlags {
        SkipFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SkipFlags {
    fn bitor_assign(&mut self, rhs: SkipFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SkipFlags {
    type Output = SkipFlags;

    fn bitand(self, rhs: SkipFlags) -> SkipFlags {
        SkipFlags(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let flags = SkipFlags::MERKLE_CHECK | SkipFlags::TAPOS_CHECK;
        assert!(flags.contains(SkipFlags::MERKLE_CHECK));
        assert!(!flags.contains(SkipFlags::AUTHORITY_CHECK));
        assert!(flags.contains(SkipFlags::NOTHING));
    }

    #[test]
    fn test_checkpoint_set_keeps_merkle_on() {
        assert!(!SkipFlags::below_checkpoint().contains(SkipFlags::MERKLE_CHECK));
    }
}
