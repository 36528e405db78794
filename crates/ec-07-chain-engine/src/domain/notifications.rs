//! The observer bus.
//!
//! Indexers and plugins hook the seven chain events. Observers run inline on
//! the apply path, so a throwing observer must never unwind into consensus:
//! every callback is panic-isolated and failures are logged and dropped.

use shared_types::{Operation, SignedBlock, SignedTransaction, TransactionId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Context delivered with pre/post operation events.
pub struct OperationNotification<'a> {
    pub trx_id: TransactionId,
    pub block: u32,
    pub trx_in_block: u32,
    pub op_in_trx: u16,
    pub op: &'a Operation,
}

type BlockObserver = Box<dyn Fn(&SignedBlock) + Send + Sync>;
type TransactionObserver = Box<dyn Fn(&SignedTransaction) + Send + Sync>;
type OperationObserver = Box<dyn Fn(&OperationNotification<'_>) + Send + Sync>;

/// Registered observers for every chain event.
#[derive(Default)]
pub struct NotificationBus {
    pre_apply_block: Vec<BlockObserver>,
    applied_block: Vec<BlockObserver>,
    pre_apply_transaction: Vec<TransactionObserver>,
    applied_transaction: Vec<TransactionObserver>,
    on_pending_transaction: Vec<TransactionObserver>,
    pre_apply_operation: Vec<OperationObserver>,
    post_apply_operation: Vec<OperationObserver>,
}

macro_rules! notify {
    ($event:literal, $observers:expr, $arg:expr) => {
        for observer in $observers.iter() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer($arg))) {
                let what = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("opaque panic");
                error!(event = $event, what, "observer failed; continuing");
            }
        }
    };
}

impl NotificationBus {
    pub fn new() -> Self {
        NotificationBus::default()
    }

    pub fn on_pre_apply_block(&mut self, f: impl Fn(&SignedBlock) + Send + Sync + 'static) {
        self.pre_apply_block.push(Box::new(f));
    }

    pub fn on_applied_block(&mut self, f: impl Fn(&SignedBlock) + Send + Sync + 'static) {
        self.applied_block.push(Box::new(f));
    }

    pub fn on_pre_apply_transaction(
        &mut self,
        f: impl Fn(&SignedTransaction) + Send + Sync + 'static,
    ) {
        self.pre_apply_transaction.push(Box::new(f));
    }

    pub fn on_applied_transaction(
        &mut self,
        f: impl Fn(&SignedTransaction) + Send + Sync + 'static,
    ) {
        self.applied_transaction.push(Box::new(f));
    }

    pub fn on_pending_transaction(
        &mut self,
        f: impl Fn(&SignedTransaction) + Send + Sync + 'static,
    ) {
        self.on_pending_transaction.push(Box::new(f));
    }

    pub fn on_pre_apply_operation(
        &mut self,
        f: impl Fn(&OperationNotification<'_>) + Send + Sync + 'static,
    ) {
        self.pre_apply_operation.push(Box::new(f));
    }

    pub fn on_post_apply_operation(
        &mut self,
        f: impl Fn(&OperationNotification<'_>) + Send + Sync + 'static,
    ) {
        self.post_apply_operation.push(Box::new(f));
    }

    pub fn notify_pre_apply_block(&self, block: &SignedBlock) {
        notify!("pre_apply_block", self.pre_apply_block, block);
    }

    pub fn notify_applied_block(&self, block: &SignedBlock) {
        notify!("applied_block", self.applied_block, block);
    }

    pub fn notify_pre_apply_transaction(&self, trx: &SignedTransaction) {
        notify!("pre_apply_transaction", self.pre_apply_transaction, trx);
    }

    pub fn notify_applied_transaction(&self, trx: &SignedTransaction) {
        notify!("on_applied_transaction", self.applied_transaction, trx);
    }

    pub fn notify_pending_transaction(&self, trx: &SignedTransaction) {
        notify!("on_pending_transaction", self.on_pending_transaction, trx);
    }

    pub fn notify_pre_apply_operation(&self, note: &OperationNotification<'_>) {
        notify!("pre_apply_operation", self.pre_apply_operation, note);
    }

    pub fn notify_post_apply_operation(&self, note: &OperationNotification<'_>) {
        notify!("post_apply_operation", self.post_apply_operation, note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AccountName, BlockHeader, Signature, TimePointSec};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn block() -> SignedBlock {
        SignedBlock {
            header: BlockHeader {
                previous: [0u8; 20],
                timestamp: TimePointSec::new(3),
                witness: AccountName::new("genesis").unwrap(),
                transaction_merkle_root: [0u8; 20],
                extensions: Vec::new(),
            },
            witness_signature: Signature::empty(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_observers_fire_in_registration_order() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut bus = NotificationBus::new();
        for expected in 0..3 {
            let calls = calls.clone();
            bus.on_applied_block(move |_| {
                assert_eq!(calls.fetch_add(1, Ordering::SeqCst), expected);
            });
        }
        bus.notify_applied_block(&block());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_observer_does_not_poison_the_bus() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut bus = NotificationBus::new();
        bus.on_applied_block(|_| panic!("indexer bug"));
        {
            let calls = calls.clone();
            bus.on_applied_block(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.notify_applied_block(&block());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
