//! The engine's error taxonomy.
//!
//! Recoverable errors unwind the active undo session and leave state
//! byte-identical to before the call. Fatal errors (`UndoHistoryExhausted`,
//! `UnknownHardfork`, `PopEmptyChain`, invariant violations while producing)
//! mean the node cannot continue without operator action.

use ec_block_log::BlockLogError;
use ec_fork_database::ForkDbError;
use ec_state_store::StoreError;
use shared_types::operations::OperationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("structurally invalid: {0}")]
    StructuralInvalid(#[from] OperationError),

    #[error("invalid block header: {0}")]
    BlockValidation(String),

    #[error("duplicate transaction")]
    DuplicateTransaction,

    #[error("transaction expired")]
    Expired,

    #[error("transaction expiration too far in the future")]
    PrematureExpiration,

    #[error("transaction reference block prefix mismatch")]
    TaposMismatch,

    #[error("missing {kind} authority of {account}")]
    MissingAuthority { account: String, kind: &'static str },

    #[error("merkle root does not match block contents")]
    MerkleMismatch,

    #[error("operation rejected: {0}")]
    EvaluatorReject(String),

    #[error("no evaluator registered for operation {0}")]
    NoEvaluator(&'static str),

    #[error("undo history exhausted; add a checkpoint to continue")]
    UndoHistoryExhausted,

    #[error("chain would advance beyond the configured hardfork table")]
    UnknownHardfork,

    #[error("cannot pop a block from a zero-height chain")]
    PopEmptyChain,

    #[error("block did not match checkpoint at height {0}")]
    CheckpointMismatch(u32),

    #[error("supply invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ForkDb(#[from] ForkDbError),

    #[error(transparent)]
    BlockLog(#[from] BlockLogError),
}

/// Assert an evaluator precondition.
macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::domain::error::ChainError::EvaluatorReject(format!($($arg)*)));
        }
    };
}
pub(crate) use require;
