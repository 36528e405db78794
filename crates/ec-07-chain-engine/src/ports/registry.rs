//! The evaluator registry: the engine's contract with operation business
//! logic. The engine dispatches on the operation's variant tag and never
//! inspects operation semantics itself.

use crate::database::Database;
use crate::domain::error::ChainError;
use shared_types::Operation;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Business logic for one operation kind.
pub trait Evaluator: Send + Sync {
    /// Apply the operation's effects to state. Runs inside the caller's
    /// undo session; any error unwinds cleanly.
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError>;
}

/// Dispatch table from operation variant tag to evaluator.
#[derive(Default, Clone)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<&'static str, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        EvaluatorRegistry::default()
    }

    /// Register `evaluator` for the operation tag `name`. Re-registration
    /// replaces, so plugins may override individual operations.
    pub fn register(&mut self, name: &'static str, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.insert(name, evaluator);
    }

    pub fn get(&self, op: &Operation) -> Result<Arc<dyn Evaluator>, ChainError> {
        self.evaluators
            .get(op.name())
            .cloned()
            .ok_or(ChainError::NoEvaluator(op.name()))
    }
}
