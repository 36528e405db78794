//! The `Database` orchestrator: chain state plus the machinery that moves it.

mod apply;
mod balances;
mod cashout;
mod hardforks;
mod invariants;
mod maintenance;
mod market;
#[cfg(test)]
mod tests;
mod votes;

use crate::domain::error::ChainError;
use crate::domain::notifications::{NotificationBus, OperationNotification};
use crate::domain::skip_flags::SkipFlags;
use crate::evaluators;
use crate::ports::registry::EvaluatorRegistry;
use crate::ports::signing::{HashSignatureVerifier, KeyPair, SignatureVerifier};
use ec_block_log::BlockLog;
use ec_chain_params::{
    BLOCK_INTERVAL, GENESIS_TIME, INIT_MINER_NAME, MINER_ACCOUNT, NULL_ACCOUNT, NUM_INIT_EXTRAS,
    NUM_INIT_MINERS, PERCENT_100, TEMP_ACCOUNT,
};
use ec_chain_params::HardforkSchedule;
use ec_fork_database::ForkDatabase;
use ec_state_store::{
    Account, BlockSummary, FeedHistory, GlobalProperties, HardforkProperties, StateStore,
    Witness, WitnessScheduleState,
};
use shared_types::crypto::chain_id;
use shared_types::{
    AccountName, BlockId, Digest, Operation, SignedTransaction, TimePointSec, TransactionId,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Genesis parameters for `open`.
#[derive(Clone)]
pub struct GenesisConfig {
    pub initial_supply: i64,
    pub genesis_time: TimePointSec,
    pub hardfork_schedule: HardforkSchedule,
    /// Force hardforks through at genesis, without witness votes. Part of
    /// the genesis ritual so a replay reproduces the identical state.
    pub forced_hardfork: Option<u32>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        GenesisConfig {
            initial_supply: 0,
            genesis_time: GENESIS_TIME,
            hardfork_schedule: HardforkSchedule::mainnet(),
            forced_hardfork: None,
        }
    }
}

/// The block/transaction application engine.
///
/// A `Database` is the single logical writer over its state store; wrap it
/// in [`crate::shared::SharedDatabase`] to share it between producer and
/// reader threads.
pub struct Database {
    pub state: StateStore,
    pub(crate) fork_db: ForkDatabase,
    pub(crate) block_log: BlockLog,
    pub(crate) evaluators: EvaluatorRegistry,
    pub(crate) observers: NotificationBus,
    pub(crate) verifier: Arc<dyn SignatureVerifier>,

    pub(crate) hardfork_schedule: HardforkSchedule,
    chain_id: Digest,
    data_dir: PathBuf,

    pub(crate) skip_flags: SkipFlags,
    pub(crate) checkpoints: BTreeMap<u32, BlockId>,
    pub(crate) shared_merkle: BTreeMap<u32, TransactionId>,
    flush_blocks: u32,
    next_flush_block: u32,

    pub(crate) pending_tx: Vec<SignedTransaction>,
    pub(crate) popped_tx: Vec<SignedTransaction>,
    pub(crate) pending_session_open: bool,
    pub(crate) producing: bool,

    pub(crate) current_trx_id: TransactionId,
    pub(crate) current_block_num: u32,
    pub(crate) current_trx_in_block: u32,
    pub(crate) current_op_in_trx: u16,
}

impl Database {
    /// Open the chain at `data_dir`, initializing genesis state on first
    /// run, rewinding undo state to the last irreversible block, and seeding
    /// the fork database from the block log head.
    pub fn open(data_dir: &Path, genesis: GenesisConfig) -> Result<Database, ChainError> {
        let block_log = BlockLog::open(data_dir)?;

        let mut db = Database {
            state: StateStore::new(),
            fork_db: ForkDatabase::new(),
            block_log,
            evaluators: evaluators::default_registry(),
            observers: NotificationBus::new(),
            verifier: Arc::new(HashSignatureVerifier),
            hardfork_schedule: genesis.hardfork_schedule.clone(),
            chain_id: chain_id(),
            data_dir: data_dir.to_owned(),
            skip_flags: SkipFlags::NOTHING,
            checkpoints: BTreeMap::new(),
            shared_merkle: BTreeMap::new(),
            flush_blocks: 0,
            next_flush_block: 0,
            pending_tx: Vec::new(),
            popped_tx: Vec::new(),
            pending_session_open: false,
            producing: false,
            current_trx_id: [0u8; 20],
            current_block_num: 0,
            current_trx_in_block: 0,
            current_op_in_trx: 0,
        };

        db.init_genesis(&genesis)?;
        if let Some(hardfork) = genesis.forced_hardfork {
            db.set_hardfork(hardfork)?;
        }
        db.state.undo_all();
        if db.state.revision() != i64::from(db.head_block_num()) {
            return Err(ChainError::BlockValidation(
                "state revision does not match head block after rewind".into(),
            ));
        }

        if db.head_block_num() > 0 {
            let head = db
                .block_log
                .read_block_by_num(db.head_block_num())?
                .filter(|b| b.id() == db.head_block_id())
                .ok_or_else(|| {
                    ChainError::BlockValidation(
                        "chain state does not match block log; reindex required".into(),
                    )
                })?;
            db.fork_db.start_block(head);
        }

        db.init_hardforks()?;
        Ok(db)
    }

    /// Rebuild state by replaying every block in the log.
    pub fn reindex(data_dir: &Path, genesis: GenesisConfig) -> Result<Database, ChainError> {
        info!("reindexing blockchain");
        let mut db = Database::open(data_dir, genesis)?;
        db.fork_db.reset();

        let Some(log_head_num) = db.block_log.head().map(|b| b.block_num()) else {
            return Ok(db);
        };

        let skip = SkipFlags::replay();
        let mut offset = 0;
        loop {
            let (block, next) = db.block_log.read_block(offset)?;
            let num = block.block_num();
            if num % 100_000 == 0 {
                info!(block = num, of = log_head_num, "replaying");
            }
            db.apply_block(&block, skip)?;
            if num == log_head_num {
                break;
            }
            offset = next;
        }
        db.state.set_revision(i64::from(db.head_block_num()));

        if let Some(head) = db.block_log.head().cloned() {
            db.fork_db.start_block(head);
        }
        info!(head = db.head_block_num(), "reindex complete");
        Ok(db)
    }

    /// Flush and shut down cleanly.
    pub fn close(mut self) -> Result<(), ChainError> {
        self.clear_pending();
        self.block_log.flush()?;
        Ok(())
    }

    fn init_genesis(&mut self, genesis: &GenesisConfig) -> Result<(), ChainError> {
        if self.state.globals.find(&()).is_some() {
            return Ok(());
        }

        let init_key = KeyPair::from_seed("init_key").public();
        let t = genesis.genesis_time;

        let miner = AccountName::new(MINER_ACCOUNT).expect("reserved name is valid");
        let null = AccountName::new(NULL_ACCOUNT).expect("reserved name is valid");
        let temp = AccountName::new(TEMP_ACCOUNT).expect("reserved name is valid");
        for name in [&miner, &null, &temp] {
            self.state.accounts.create(Account::new(name.clone(), t))?;
        }

        let init_count = NUM_INIT_MINERS + NUM_INIT_EXTRAS;
        for i in 0..init_count {
            let name = if i == 0 {
                AccountName::new(INIT_MINER_NAME).expect("init miner name is valid")
            } else {
                AccountName::new(&format!("{INIT_MINER_NAME}{i}")).expect("init miner name is valid")
            };
            let mut account = Account::new(name.clone(), t);
            account.owner_key = init_key;
            account.active_key = init_key;
            account.posting_key = init_key;
            account.memo_key = init_key;
            account.balance = shared_types::Asset::ember(
                genesis.initial_supply / init_count as i64,
            );
            self.state.accounts.create(account)?;
            self.state.witnesses.create(Witness::new(name, init_key, t))?;
        }

        let first_witness = AccountName::new(INIT_MINER_NAME).expect("init miner name is valid");
        self.state.globals.create(GlobalProperties::genesis(
            t,
            genesis.initial_supply,
            first_witness.clone(),
        ))?;

        self.state.feed.create(FeedHistory::default())?;
        for slot in 0..=u16::MAX {
            self.state.block_summaries.create(BlockSummary { slot, block_id: [0u8; 20] })?;
        }
        self.state.hardfork_props.create(HardforkProperties {
            processed_hardforks: vec![t],
            ..HardforkProperties::default()
        })?;
        self.state.witness_schedule.create(WitnessScheduleState {
            current_shuffled_witnesses: vec![first_witness],
            ..WitnessScheduleState::default()
        })?;

        Ok(())
    }

    // --- accessors ------------------------------------------------------

    pub fn chain_id(&self) -> Digest {
        self.chain_id
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn head_block_num(&self) -> u32 {
        self.state.head_block_num()
    }

    pub fn head_block_time(&self) -> TimePointSec {
        self.state.head_block_time()
    }

    pub fn head_block_id(&self) -> BlockId {
        self.state.head_block_id()
    }

    pub fn last_irreversible_block_num(&self) -> u32 {
        self.state.gpo().last_irreversible_block_num
    }

    pub fn fork_db(&self) -> &ForkDatabase {
        &self.fork_db
    }

    pub fn block_log_mut(&mut self) -> &mut BlockLog {
        &mut self.block_log
    }

    pub fn observers_mut(&mut self) -> &mut NotificationBus {
        &mut self.observers
    }

    pub fn evaluators_mut(&mut self) -> &mut EvaluatorRegistry {
        &mut self.evaluators
    }

    pub fn set_verifier(&mut self, verifier: Arc<dyn SignatureVerifier>) {
        self.verifier = verifier;
    }

    pub fn is_producing(&self) -> bool {
        self.producing
    }

    pub fn skip_flags(&self) -> SkipFlags {
        self.skip_flags
    }

    pub fn set_skip_flags(&mut self, skip: SkipFlags) {
        self.skip_flags = skip;
    }

    pub fn has_hardfork(&self, hardfork: u32) -> bool {
        self.state.has_hardfork(hardfork)
    }

    /// Percentage of the last 128 slots that produced a block.
    pub fn witness_participation_rate(&self) -> u32 {
        let gpo = self.state.gpo();
        u32::from(PERCENT_100) * gpo.recent_slots_filled.count_ones() / 128
    }

    // --- checkpoints ----------------------------------------------------

    pub fn add_checkpoints(&mut self, checkpoints: BTreeMap<u32, BlockId>) {
        self.checkpoints.extend(checkpoints);
    }

    pub fn before_last_checkpoint(&self) -> bool {
        self.checkpoints
            .keys()
            .next_back()
            .is_some_and(|last| *last >= self.head_block_num())
    }

    /// Tolerance entries for historically mis-signed blocks: when a block
    /// number appears here with the locally computed merkle root, the merkle
    /// and active-authority failures on that block are waived.
    pub fn add_shared_merkle(&mut self, overrides: BTreeMap<u32, TransactionId>) {
        self.shared_merkle.extend(overrides);
    }

    // --- slots ----------------------------------------------------------

    /// The producer owed the slot `slot_num` blocks after head.
    pub fn get_scheduled_witness(&self, slot_num: u32) -> AccountName {
        let gpo = self.state.gpo();
        let wso = self.state.schedule();
        let current_aslot = gpo.current_aslot + u64::from(slot_num);
        wso.current_shuffled_witnesses
            [(current_aslot % wso.current_shuffled_witnesses.len() as u64) as usize]
            .clone()
    }

    /// Wall-clock time of the slot `slot_num` blocks after head. Slot 0 is
    /// the head block's own slot.
    pub fn get_slot_time(&self, slot_num: u32) -> TimePointSec {
        if slot_num == 0 {
            return TimePointSec::MIN;
        }

        if self.head_block_num() == 0 {
            // The first block is one interval past genesis.
            return self.head_block_time() + slot_num * BLOCK_INTERVAL;
        }

        let head_slot = self.head_block_time().secs() / BLOCK_INTERVAL;
        TimePointSec::new(head_slot * BLOCK_INTERVAL) + slot_num * BLOCK_INTERVAL
    }

    /// Which future slot `when` falls into; 0 when `when` precedes slot 1.
    pub fn get_slot_at_time(&self, when: TimePointSec) -> u32 {
        let first_slot = self.get_slot_time(1);
        if when < first_slot {
            return 0;
        }
        (when.secs() - first_slot.secs()) / BLOCK_INTERVAL + 1
    }

    // --- flushing -------------------------------------------------------

    /// Flush roughly every `flush_blocks` blocks, jittered so a fleet does
    /// not stall in lockstep.
    pub fn set_flush_interval(&mut self, flush_blocks: u32) {
        self.flush_blocks = flush_blocks;
        self.next_flush_block = 0;
    }

    pub(crate) fn maybe_flush(&mut self, block_num: u32) {
        if self.flush_blocks == 0 {
            return;
        }
        if self.next_flush_block == 0 {
            let lep = block_num + 1 + self.flush_blocks * 9 / 10;
            let rep = block_num + 1 + self.flush_blocks;
            let span = rep - lep;
            let jitter = if span > 0 { rand::random::<u32>() % span } else { 0 };
            self.next_flush_block = lep + jitter;
        }
        if self.next_flush_block == block_num {
            self.next_flush_block = 0;
            if let Err(e) = self.block_log.flush() {
                tracing::warn!(error = %e, "periodic flush failed");
            }
        }
    }

    // --- notifications --------------------------------------------------

    pub(crate) fn notify_pre_apply_operation(&self, op: &Operation) {
        let note = OperationNotification {
            trx_id: self.current_trx_id,
            block: self.current_block_num,
            trx_in_block: self.current_trx_in_block,
            op_in_trx: self.current_op_in_trx,
            op,
        };
        self.observers.notify_pre_apply_operation(&note);
    }

    pub(crate) fn notify_post_apply_operation(&self, op: &Operation) {
        let note = OperationNotification {
            trx_id: self.current_trx_id,
            block: self.current_block_num,
            trx_in_block: self.current_trx_in_block,
            op_in_trx: self.current_op_in_trx,
            op,
        };
        self.observers.notify_post_apply_operation(&note);
    }

    /// Emit a virtual operation to observers. Virtual operations are never
    /// stored; indexers see them between the pre/post hooks of real ones.
    pub(crate) fn push_virtual_operation(
        &self,
        op: shared_types::operations::VirtualOperation,
    ) {
        let op = Operation::Virtual(op);
        debug_assert!(op.is_virtual());
        self.notify_pre_apply_operation(&op);
        self.notify_post_apply_operation(&op);
    }

    /// Run `f` under temporary skip flags, restoring them on every path.
    pub(crate) fn with_skip_flags<R>(
        &mut self,
        skip: SkipFlags,
        f: impl FnOnce(&mut Database) -> Result<R, ChainError>,
    ) -> Result<R, ChainError> {
        let old = self.skip_flags;
        self.skip_flags = skip;
        let result = f(self);
        self.skip_flags = old;
        result
    }
}
