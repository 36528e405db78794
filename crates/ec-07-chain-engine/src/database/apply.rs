//! Push/apply paths: blocks, transactions, fork switching, production.

use super::Database;
use crate::domain::error::ChainError;
use crate::domain::skip_flags::SkipFlags;
use crate::ports::signing::KeyPair;
use ec_chain_params::{
    BLOCKCHAIN_VERSION, MAX_BLOCK_SIZE, MAX_TIME_UNTIL_EXPIRATION, MIN_BLOCK_SIZE,
};
use ec_state_store::TransactionRecord;
use shared_types::operations::AuthorityKind;
use shared_types::transaction::tapos_prefix;
use shared_types::{
    AccountName, BlockHeaderExtension, HardforkVersionVote, Operation, PublicKey, SignedBlock,
    SignedTransaction, TimePointSec,
};
use tracing::{error, info, warn};

impl Database {
    /// Push a candidate block. Returns `true` if it caused a fork switch.
    /// Any failure unwinds every partial change.
    pub fn push_block(&mut self, new_block: &SignedBlock, skip: SkipFlags) -> Result<bool, ChainError> {
        self.with_skip_flags(skip, |db| {
            let pending = std::mem::take(&mut db.pending_tx);
            db.reset_pending_session();
            let result = db.push_block_inner(new_block);
            db.restore_pending(pending);
            result
        })
    }

    fn push_block_inner(&mut self, new_block: &SignedBlock) -> Result<bool, ChainError> {
        let skip = self.skip_flags;

        if !skip.contains(SkipFlags::FORK_DB) {
            let new_head = self.fork_db.push_block(new_block.clone())?;
            self.maybe_warn_multiple_production(new_head.num);

            // The longest chain no longer builds on our head: switch forks.
            if new_head.data.header.previous != self.head_block_id() {
                if new_head.num > self.head_block_num() {
                    return self.switch_forks(&new_head.id);
                }
                return Ok(false);
            }
        }

        self.state.begin_session();
        match self.apply_block(new_block, skip) {
            Ok(()) => Ok(false),
            Err(e) => {
                error!(error = %e, num = new_block.block_num(), "failed to push new block");
                if self.state.session_depth() > 0 {
                    self.state.undo();
                }
                self.fork_db.remove(&new_block.id());
                Err(e)
            }
        }
    }

    fn switch_forks(&mut self, new_head_id: &shared_types::BlockId) -> Result<bool, ChainError> {
        let skip = self.skip_flags;
        info!(num = %self.head_block_num(), "switching to fork");
        let head_id = self.head_block_id();
        let (branch_new, branch_old) = self.fork_db.fetch_branch_from(new_head_id, &head_id)?;

        let common_ancestor = branch_old
            .last()
            .map(|item| item.previous)
            .unwrap_or(head_id);

        // Pop the old branch back to the common ancestor.
        while self.head_block_id() != common_ancestor {
            self.rewind_one_block()?;
        }

        // Apply the new branch oldest-first, one session per block.
        let items = branch_new;
        for pos in (0..items.len()).rev() {
            let block = items[pos].data.clone();
            self.state.begin_session();
            if let Err(except) = self.apply_block(&block, skip) {
                warn!(error = %except, "exception while switching forks");
                if self.state.session_depth() > 0 {
                    self.state.undo();
                }

                // The failed block and everything above it are invalid.
                for bad in items.iter().take(pos + 1) {
                    self.fork_db.remove(&bad.id);
                }

                // Rewind whatever of the new branch we applied.
                while self.head_block_id() != common_ancestor {
                    self.rewind_one_block()?;
                }

                // Restore the old branch exactly.
                for item in branch_old.iter().rev() {
                    let block = item.data.clone();
                    self.state.begin_session();
                    self.apply_block(&block, skip)?;
                }
                if let Some(old_tip) = branch_old.first() {
                    let _ = self.fork_db.set_head(&old_tip.id);
                }
                return Err(except);
            }
        }
        let _ = self.fork_db.set_head(new_head_id);
        Ok(true)
    }

    /// Undo the state head block without moving the fork-db head, recycling
    /// its transactions. Used while walking between branches.
    fn rewind_one_block(&mut self) -> Result<(), ChainError> {
        let head_id = self.head_block_id();
        let head_block = match self.fork_db.fetch_block(&head_id) {
            Some(item) => item.data,
            None => self
                .block_log
                .read_block_by_num(self.head_block_num())?
                .filter(|b| b.id() == head_id)
                .ok_or(ChainError::PopEmptyChain)?,
        };
        if self.state.session_depth() == 0 {
            return Err(ChainError::PopEmptyChain);
        }
        self.state.undo();

        let mut recycled = head_block.transactions;
        recycled.append(&mut self.popped_tx);
        self.popped_tx = recycled;
        Ok(())
    }

    fn maybe_warn_multiple_production(&self, height: u32) {
        let blocks = self.fork_db.fetch_block_by_number(height);
        if blocks.len() > 1 {
            let producers: Vec<(String, u32)> = blocks
                .iter()
                .map(|b| (b.data.header.witness.to_string(), b.data.header.timestamp.secs()))
                .collect();
            warn!(height, ?producers, "block num collision due to a fork");
        }
    }

    /// Push a transaction into the pending pool.
    pub fn push_transaction(
        &mut self,
        trx: &SignedTransaction,
        skip: SkipFlags,
    ) -> Result<(), ChainError> {
        if trx.pack_size() > (self.state.gpo().maximum_block_size as usize).saturating_sub(256) {
            return Err(ChainError::BlockValidation("transaction too large".into()));
        }
        self.producing = true;
        let result = self.with_skip_flags(skip, |db| db.push_transaction_inner(trx));
        self.producing = false;
        result
    }

    fn push_transaction_inner(&mut self, trx: &SignedTransaction) -> Result<(), ChainError> {
        // The first push after a block starts the pending session; a nested
        // session isolates this one transaction.
        if !self.pending_session_open {
            self.state.begin_session();
            self.pending_session_open = true;
        }

        self.state.begin_session();
        match self.apply_transaction_inner(trx) {
            Ok(()) => {
                self.pending_tx.push(trx.clone());
                self.state.squash();
                self.observers.notify_pending_transaction(trx);
                Ok(())
            }
            Err(e) => {
                self.state.undo();
                Err(e)
            }
        }
    }

    /// Validate a transaction against head state without keeping effects.
    pub fn validate_transaction(&mut self, trx: &SignedTransaction) -> Result<(), ChainError> {
        self.state.begin_session();
        let result = self.apply_transaction_inner(trx);
        self.state.undo();
        result
    }

    pub(crate) fn reset_pending_session(&mut self) {
        if self.pending_session_open {
            self.state.undo();
            self.pending_session_open = false;
        }
        self.pending_tx.clear();
    }

    /// Drop all pending transactions and their session.
    pub fn clear_pending(&mut self) {
        self.reset_pending_session();
        self.popped_tx.clear();
    }

    fn restore_pending(&mut self, old_pending: Vec<SignedTransaction>) {
        let recycled: Vec<SignedTransaction> =
            self.popped_tx.drain(..).chain(old_pending).collect();
        for trx in recycled {
            if self.state.transaction_records.contains(&trx.id()) {
                continue;
            }
            if let Err(e) = self.push_transaction_inner(&trx) {
                tracing::debug!(error = %e, "pending transaction no longer valid");
            }
        }
    }

    /// Produce and push a block for `when`, signing with `key`.
    pub fn generate_block(
        &mut self,
        when: TimePointSec,
        witness_owner: &AccountName,
        key: &KeyPair,
        skip: SkipFlags,
    ) -> Result<SignedBlock, ChainError> {
        self.with_skip_flags(skip, |db| db.generate_block_inner(when, witness_owner, key))
    }

    fn generate_block_inner(
        &mut self,
        when: TimePointSec,
        witness_owner: &AccountName,
        key: &KeyPair,
    ) -> Result<SignedBlock, ChainError> {
        let skip = self.skip_flags;

        let slot_num = self.get_slot_at_time(when);
        if slot_num == 0 {
            return Err(ChainError::BlockValidation("generation time is in the past".into()));
        }
        let scheduled = self.get_scheduled_witness(slot_num);
        if scheduled != *witness_owner {
            return Err(ChainError::BlockValidation(format!(
                "witness {witness_owner} is not scheduled for slot {slot_num}"
            )));
        }
        let witness = self.state.get_witness(witness_owner)?.clone();
        if !skip.contains(SkipFlags::WITNESS_SIGNATURE) && witness.signing_key != key.public() {
            return Err(ChainError::BlockValidation("wrong block signing key".into()));
        }

        let mut pending_block = SignedBlock {
            header: shared_types::BlockHeader {
                previous: self.head_block_id(),
                timestamp: when,
                witness: witness_owner.clone(),
                transaction_merkle_root: [0u8; 20],
                extensions: Vec::new(),
            },
            witness_signature: shared_types::Signature::empty(),
            transactions: Vec::new(),
        };

        // Report our version, and vote for the next configured hardfork if
        // the chain has not reached it yet.
        if self.has_hardfork(5) {
            if witness.running_version != BLOCKCHAIN_VERSION {
                pending_block
                    .header
                    .extensions
                    .push(BlockHeaderExtension::Version(BLOCKCHAIN_VERSION));
            }
            let hfp = self.state.hardforks().clone();
            let next = hfp.last_hardfork + 1;
            if hfp.current_hardfork_version < self.hardfork_schedule.current_hardfork_version() {
                if let (Ok(next_version), Ok(next_time)) = (
                    self.hardfork_schedule.version(next),
                    self.hardfork_schedule.time(next),
                ) {
                    if witness.hardfork_version_vote != next_version
                        || witness.hardfork_time_vote != next_time
                    {
                        pending_block.header.extensions.push(
                            BlockHeaderExtension::HardforkVote(HardforkVersionVote {
                                hf_version: next_version,
                                hf_time: next_time,
                            }),
                        );
                    }
                }
            }
        }

        // Rebuild the pending state against `when`: time-based semantics may
        // have shifted since the transactions arrived.
        let maximum_block_size = self.state.gpo().maximum_block_size as usize;
        let mut total_block_size = pending_block.pack_size() + 4;
        let mut postponed = 0usize;

        self.reset_pending_session_keeping_list();
        self.state.begin_session();
        self.pending_session_open = true;

        let candidates = std::mem::take(&mut self.pending_tx);
        for trx in &candidates {
            if trx.expiration < when {
                continue;
            }
            let new_total_size = total_block_size + trx.pack_size();
            if new_total_size >= maximum_block_size {
                postponed += 1;
                continue;
            }

            self.state.begin_session();
            match self.apply_transaction_inner(trx) {
                Ok(()) => {
                    self.state.squash();
                    total_block_size += trx.pack_size();
                    pending_block.transactions.push(trx.clone());
                }
                Err(_) => {
                    // Not re-applied; it will not make it into the block.
                    self.state.undo();
                }
            }
        }
        self.pending_tx = candidates;
        if postponed > 0 {
            warn!(postponed, "postponed transactions due to block size limit");
        }

        self.reset_pending_session_keeping_list();

        pending_block.header.transaction_merkle_root = pending_block.calculate_merkle_root();
        if !skip.contains(SkipFlags::WITNESS_SIGNATURE) {
            pending_block.witness_signature = key.sign(&pending_block.sig_digest());
        }

        if !skip.contains(SkipFlags::BLOCK_SIZE_CHECK)
            && pending_block.pack_size() > MAX_BLOCK_SIZE as usize
        {
            return Err(ChainError::BlockValidation("generated block too large".into()));
        }

        self.push_block(&pending_block, skip)?;
        Ok(pending_block)
    }

    /// Like `reset_pending_session` but the transaction list survives.
    fn reset_pending_session_keeping_list(&mut self) {
        if self.pending_session_open {
            self.state.undo();
            self.pending_session_open = false;
        }
    }

    /// Undo the head block, recycling its transactions into the pending
    /// pool.
    pub fn pop_block(&mut self) -> Result<(), ChainError> {
        self.reset_pending_session_keeping_list();
        self.fork_db.pop_block().map_err(|_| ChainError::PopEmptyChain)?;
        self.rewind_one_block()
    }

    /// Apply a block under `skip`, enforcing checkpoints and scheduling the
    /// opportunistic flush.
    pub fn apply_block(&mut self, next_block: &SignedBlock, skip: SkipFlags) -> Result<(), ChainError> {
        let block_num = next_block.block_num();
        let mut skip = skip;

        if !self.checkpoints.is_empty() {
            if let Some(expected) = self.checkpoints.get(&block_num) {
                if next_block.id() != *expected {
                    return Err(ChainError::CheckpointMismatch(block_num));
                }
            }
            if self
                .checkpoints
                .keys()
                .next_back()
                .is_some_and(|last| *last >= block_num)
            {
                skip = SkipFlags::below_checkpoint();
            }
        }

        self.with_skip_flags(skip, |db| db.apply_block_inner(next_block))?;

        if self.producing || !skip.contains(SkipFlags::VALIDATE_INVARIANTS) {
            if let Err(e) = self.validate_invariants() {
                if self.producing {
                    return Err(e);
                }
                error!(error = %e, block_num, "invariant check failed");
            }
        }

        self.maybe_flush(block_num);
        Ok(())
    }

    fn apply_block_inner(&mut self, next_block: &SignedBlock) -> Result<(), ChainError> {
        self.observers.notify_pre_apply_block(next_block);

        let next_block_num = next_block.block_num();
        let skip = self.skip_flags;

        if !skip.contains(SkipFlags::MERKLE_CHECK) {
            let merkle_root = next_block.calculate_merkle_root();
            if next_block.header.transaction_merkle_root != merkle_root {
                // A configured override tolerates historical mis-merkled
                // blocks whose local root is known.
                let tolerated = self
                    .shared_merkle
                    .get(&next_block_num)
                    .is_some_and(|expected| *expected == merkle_root);
                if !tolerated {
                    return Err(ChainError::MerkleMismatch);
                }
            }
        }

        let signing_witness = self.validate_block_header(skip, next_block)?;

        self.current_block_num = next_block_num;
        self.current_trx_in_block = 0;

        let block_size = next_block.pack_size();
        if self.has_hardfork(12) && !skip.contains(SkipFlags::BLOCK_SIZE_CHECK) {
            let max = self.state.gpo().maximum_block_size as usize;
            if block_size > max {
                return Err(ChainError::BlockValidation(format!(
                    "block size {block_size} exceeds maximum {max}"
                )));
            }
        }
        if block_size < MIN_BLOCK_SIZE {
            error!(next_block_num, block_size, "block size is too small");
        }

        // Evaluators can see who included the transaction.
        let block_witness = next_block.header.witness.clone();
        self.state.modify_gpo(|g| g.current_witness = block_witness);

        self.process_header_extensions(next_block)?;

        if self.has_hardfork(5) {
            let witness = self.state.get_witness(&next_block.header.witness)?;
            let hardfork_state = self.state.hardforks();
            if witness.running_version < hardfork_state.current_hardfork_version {
                return Err(ChainError::BlockValidation(format!(
                    "block produced by witness {} not running current hardfork",
                    witness.owner
                )));
            }
        }

        // No per-transaction undo here: the whole block applies or the whole
        // block unwinds.
        for trx in &next_block.transactions {
            self.apply_transaction(trx, skip)?;
            self.current_trx_in_block += 1;
        }

        self.update_global_dynamic_data(next_block)?;
        self.update_signing_witness(&signing_witness, next_block)?;

        self.update_last_irreversible_block()?;

        self.create_block_summary(next_block)?;
        self.clear_expired_transactions()?;
        self.clear_expired_orders()?;
        self.clear_expired_delegations()?;
        ec_witness_schedule::update_witness_schedule(&mut self.state);

        self.update_median_feed()?;
        self.update_virtual_supply()?;

        self.clear_null_account_balance()?;
        self.process_funds()?;
        self.process_conversions()?;
        self.process_comment_cashout()?;
        self.process_vesting_withdrawals()?;
        self.process_savings_withdraws()?;
        self.pay_liquidity_reward()?;
        self.update_virtual_supply()?;

        self.account_recovery_processing()?;
        self.expire_escrow_ratification()?;
        self.process_decline_voting_rights()?;

        self.process_hardforks()?;

        self.observers.notify_applied_block(next_block);
        Ok(())
    }

    fn process_header_extensions(&mut self, next_block: &SignedBlock) -> Result<(), ChainError> {
        for extension in &next_block.header.extensions {
            match extension {
                BlockHeaderExtension::Void => {}
                BlockHeaderExtension::Version(reported) => {
                    let witness = next_block.header.witness.clone();
                    let current = self.state.get_witness(&witness)?.running_version;
                    if *reported != current {
                        let reported = *reported;
                        self.state
                            .witnesses
                            .modify(&witness, |w| w.running_version = reported)?;
                    }
                }
                BlockHeaderExtension::HardforkVote(vote) => {
                    let witness = next_block.header.witness.clone();
                    let wit = self.state.get_witness(&witness)?;
                    if vote.hf_version != wit.hardfork_version_vote
                        || vote.hf_time != wit.hardfork_time_vote
                    {
                        let vote = *vote;
                        self.state.witnesses.modify(&witness, |w| {
                            w.hardfork_version_vote = vote.hf_version;
                            w.hardfork_time_vote = vote.hf_time;
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn validate_block_header(
        &self,
        skip: SkipFlags,
        next_block: &SignedBlock,
    ) -> Result<AccountName, ChainError> {
        if self.head_block_id() != next_block.header.previous {
            return Err(ChainError::BlockValidation("previous id does not match head".into()));
        }
        if self.head_block_time() >= next_block.header.timestamp {
            return Err(ChainError::BlockValidation("timestamp must advance".into()));
        }
        let witness = self.state.get_witness(&next_block.header.witness)?;

        if !skip.contains(SkipFlags::WITNESS_SIGNATURE) {
            let recovered = self
                .verifier
                .recover(&next_block.sig_digest(), &next_block.witness_signature);
            if recovered != Some(witness.signing_key) {
                return Err(ChainError::BlockValidation("invalid witness signature".into()));
            }
        }

        if !skip.contains(SkipFlags::WITNESS_SCHEDULE_CHECK) {
            let slot_num = self.get_slot_at_time(next_block.header.timestamp);
            if slot_num == 0 {
                return Err(ChainError::BlockValidation("block timestamp is in the past".into()));
            }
            let scheduled = self.get_scheduled_witness(slot_num);
            if witness.owner != scheduled {
                return Err(ChainError::BlockValidation(format!(
                    "witness {} produced a block at slot {slot_num} scheduled for {scheduled}",
                    witness.owner
                )));
            }
        }

        Ok(next_block.header.witness.clone())
    }

    /// Apply a transaction under `skip` and notify observers.
    pub fn apply_transaction(
        &mut self,
        trx: &SignedTransaction,
        skip: SkipFlags,
    ) -> Result<(), ChainError> {
        self.with_skip_flags(skip, |db| db.apply_transaction_inner(trx))?;
        self.observers.notify_applied_transaction(trx);
        Ok(())
    }

    pub(crate) fn apply_transaction_inner(&mut self, trx: &SignedTransaction) -> Result<(), ChainError> {
        self.current_trx_id = trx.id();
        let skip = self.skip_flags;

        if !skip.contains(SkipFlags::VALIDATE) {
            /* issue #505 explains why this skip_flag check stands alone */
            if trx.operations.is_empty() {
                return Err(ChainError::BlockValidation("transaction has no operations".into()));
            }
            for op in &trx.operations {
                op.validate()?;
            }
        }

        let trx_id = trx.id();
        if !skip.contains(SkipFlags::TRANSACTION_DUPE_CHECK)
            && self.state.transaction_records.contains(&trx_id)
        {
            return Err(ChainError::DuplicateTransaction);
        }

        if !skip.contains(SkipFlags::TRANSACTION_SIGNATURES)
            && !skip.contains(SkipFlags::AUTHORITY_CHECK)
        {
            self.check_authority(trx)?;
        }

        // On block 1 nothing can be expired and TaPoS has nothing to refer
        // to.
        if self.head_block_num() > 0 {
            if !skip.contains(SkipFlags::TAPOS_CHECK) {
                let summary = self.state.block_summaries.get(&trx.ref_block_num)?;
                if trx.ref_block_prefix != tapos_prefix(&summary.block_id) {
                    return Err(ChainError::TaposMismatch);
                }
            }

            let now = self.head_block_time();
            if trx.expiration > now + MAX_TIME_UNTIL_EXPIRATION {
                return Err(ChainError::PrematureExpiration);
            }
            if self.has_hardfork(9) && now >= trx.expiration {
                return Err(ChainError::Expired);
            }
            if now > trx.expiration {
                return Err(ChainError::Expired);
            }
        }

        if !skip.contains(SkipFlags::TRANSACTION_DUPE_CHECK) {
            self.state.transaction_records.create(TransactionRecord {
                trx_id,
                expiration: trx.expiration,
                packed_trx: bincode::serialize(trx).expect("transaction serialization cannot fail"),
            })?;
        }

        self.observers.notify_pre_apply_transaction(trx);

        self.current_op_in_trx = 0;
        for op in &trx.operations {
            self.apply_operation(op)?;
            self.current_op_in_trx += 1;
        }
        self.current_trx_id = [0u8; 20];

        Ok(())
    }

    pub(crate) fn apply_operation(&mut self, op: &Operation) -> Result<(), ChainError> {
        self.notify_pre_apply_operation(op);
        let evaluator = self.evaluators.get(op)?;
        evaluator.apply(self, op)?;
        self.notify_post_apply_operation(op);
        Ok(())
    }

    fn check_authority(&self, trx: &SignedTransaction) -> Result<(), ChainError> {
        let digest = trx.sig_digest(&self.chain_id());
        let mut signed_by: Vec<PublicKey> = Vec::with_capacity(trx.signatures.len());
        for sig in &trx.signatures {
            if let Some(key) = self.verifier.recover(&digest, sig) {
                signed_by.push(key);
            }
        }

        for op in &trx.operations {
            for (account, kind) in op.required_authorities() {
                if account.as_str() == ec_chain_params::TEMP_ACCOUNT {
                    // The wildcard account: anyone may act for it.
                    continue;
                }
                let row = self.state.get_account(&account)?;
                let satisfied = match kind {
                    AuthorityKind::Owner => signed_by.contains(&row.owner_key),
                    AuthorityKind::Active => {
                        signed_by.contains(&row.active_key) || signed_by.contains(&row.owner_key)
                    }
                    AuthorityKind::Posting => {
                        signed_by.contains(&row.posting_key)
                            || signed_by.contains(&row.active_key)
                            || signed_by.contains(&row.owner_key)
                    }
                };
                if !satisfied {
                    // A configured merkle override for the next block also
                    // waives a missing active authority there.
                    let tolerated = kind == AuthorityKind::Active
                        && self.shared_merkle.contains_key(&(self.head_block_num() + 1));
                    if !tolerated {
                        return Err(ChainError::MissingAuthority {
                            account: account.to_string(),
                            kind: match kind {
                                AuthorityKind::Owner => "owner",
                                AuthorityKind::Active => "active",
                                AuthorityKind::Posting => "posting",
                            },
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
