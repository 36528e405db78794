//! The concrete state store: one table per entity plus session coordination.

use crate::domain::entities::*;
use crate::domain::errors::StoreError;
use crate::domain::table::Table;
use sha2::{Digest as _, Sha256};
use shared_types::{AccountName, BlockId, TimePointSec};

macro_rules! for_each_table {
    ($self:ident, $m:ident) => {
        $self.globals.$m();
        $self.feed.$m();
        $self.hardfork_props.$m();
        $self.witness_schedule.$m();
        $self.accounts.$m();
        $self.witnesses.$m();
        $self.witness_votes.$m();
        $self.withdraw_routes.$m();
        $self.vesting_delegations.$m();
        $self.delegation_expirations.$m();
        $self.comments.$m();
        $self.comment_votes.$m();
        $self.limit_orders.$m();
        $self.convert_requests.$m();
        $self.escrows.$m();
        $self.savings_withdraws.$m();
        $self.liquidity_rewards.$m();
        $self.reward_funds.$m();
        $self.transaction_records.$m();
        $self.block_summaries.$m();
        $self.decline_voting_requests.$m();
        $self.change_recovery_requests.$m();
    };
}

/// All chain state. Owns every entity; callers hold keys, never references.
#[derive(Clone, Debug, Default)]
pub struct StateStore {
    pub globals: Table<GlobalProperties>,
    pub feed: Table<FeedHistory>,
    pub hardfork_props: Table<HardforkProperties>,
    pub witness_schedule: Table<WitnessScheduleState>,

    pub accounts: Table<Account>,
    pub witnesses: Table<Witness>,
    pub witness_votes: Table<WitnessVote>,
    pub withdraw_routes: Table<WithdrawVestingRoute>,
    pub vesting_delegations: Table<VestingDelegation>,
    pub delegation_expirations: Table<VestingDelegationExpiration>,

    pub comments: Table<Comment>,
    pub comment_votes: Table<CommentVote>,

    pub limit_orders: Table<LimitOrder>,
    pub convert_requests: Table<ConvertRequest>,
    pub escrows: Table<Escrow>,
    pub savings_withdraws: Table<SavingsWithdraw>,
    pub liquidity_rewards: Table<LiquidityRewardBalance>,
    pub reward_funds: Table<RewardFund>,

    pub transaction_records: Table<TransactionRecord>,
    pub block_summaries: Table<BlockSummary>,
    pub decline_voting_requests: Table<DeclineVotingRightsRequest>,
    pub change_recovery_requests: Table<ChangeRecoveryAccountRequest>,

    revision: i64,
    depth: usize,
}

impl StateStore {
    pub fn new() -> Self {
        StateStore::default()
    }

    // --- singleton accessors -------------------------------------------

    pub fn gpo(&self) -> &GlobalProperties {
        self.globals.get(&()).expect("global properties are created at genesis")
    }

    pub fn modify_gpo<F: FnOnce(&mut GlobalProperties)>(&mut self, f: F) {
        self.globals.modify(&(), f).expect("global properties are created at genesis");
    }

    pub fn feed_history(&self) -> &FeedHistory {
        self.feed.get(&()).expect("feed history is created at genesis")
    }

    pub fn modify_feed<F: FnOnce(&mut FeedHistory)>(&mut self, f: F) {
        self.feed.modify(&(), f).expect("feed history is created at genesis");
    }

    pub fn hardforks(&self) -> &HardforkProperties {
        self.hardfork_props.get(&()).expect("hardfork properties are created at genesis")
    }

    pub fn modify_hardforks<F: FnOnce(&mut HardforkProperties)>(&mut self, f: F) {
        self.hardfork_props.modify(&(), f).expect("hardfork properties are created at genesis");
    }

    pub fn schedule(&self) -> &WitnessScheduleState {
        self.witness_schedule.get(&()).expect("witness schedule is created at genesis")
    }

    pub fn modify_schedule<F: FnOnce(&mut WitnessScheduleState)>(&mut self, f: F) {
        self.witness_schedule.modify(&(), f).expect("witness schedule is created at genesis");
    }

    pub fn head_block_num(&self) -> u32 {
        self.gpo().head_block_number
    }

    pub fn head_block_time(&self) -> TimePointSec {
        self.gpo().time
    }

    pub fn head_block_id(&self) -> BlockId {
        self.gpo().head_block_id
    }

    pub fn get_account(&self, name: &AccountName) -> Result<&Account, StoreError> {
        self.accounts.get(name)
    }

    pub fn get_witness(&self, name: &AccountName) -> Result<&Witness, StoreError> {
        self.witnesses.get(name)
    }

    /// Whether hardfork `i` has been applied.
    pub fn has_hardfork(&self, hardfork: u32) -> bool {
        self.hardforks().processed_hardforks.len() as u32 > hardfork
    }

    // --- sessions -------------------------------------------------------

    /// Open a nested undo session. The matching close is one of
    /// [`undo`](Self::undo), [`squash`](Self::squash) or simply leaving the
    /// layer as history for [`commit`](Self::commit) to retire.
    pub fn begin_session(&mut self) {
        for_each_table!(self, begin_undo);
        self.depth += 1;
        self.revision += 1;
    }

    /// Roll back the innermost session.
    pub fn undo(&mut self) {
        assert!(self.depth > 0, "undo without an open session");
        for_each_table!(self, undo);
        self.depth -= 1;
        self.revision -= 1;
    }

    /// Merge the innermost session into its parent.
    pub fn squash(&mut self) {
        assert!(self.depth > 1, "squash requires a parent session");
        for_each_table!(self, squash);
        self.depth -= 1;
        self.revision -= 1;
    }

    /// Discard undo history up to and including `revision`.
    pub fn commit(&mut self, revision: i64) {
        while self.depth > 0 && self.first_revision() <= revision {
            for_each_table!(self, commit_one);
            self.depth -= 1;
        }
    }

    /// Roll back every open session.
    pub fn undo_all(&mut self) {
        while self.depth > 0 {
            self.undo();
        }
    }

    /// The revision of the oldest undoable session.
    fn first_revision(&self) -> i64 {
        self.revision - self.depth as i64 + 1
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Pin the revision counter; only legal with no open sessions.
    pub fn set_revision(&mut self, revision: i64) {
        assert_eq!(self.depth, 0, "cannot set revision with open sessions");
        self.revision = revision;
    }

    pub fn session_depth(&self) -> usize {
        self.depth
    }

    /// Deterministic digest of every row in every table. Two nodes that
    /// applied the same blocks must agree on this byte for byte.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.globals.rows_bytes());
        hasher.update(self.feed.rows_bytes());
        hasher.update(self.hardfork_props.rows_bytes());
        hasher.update(self.witness_schedule.rows_bytes());
        hasher.update(self.accounts.rows_bytes());
        hasher.update(self.witnesses.rows_bytes());
        hasher.update(self.witness_votes.rows_bytes());
        hasher.update(self.withdraw_routes.rows_bytes());
        hasher.update(self.vesting_delegations.rows_bytes());
        hasher.update(self.delegation_expirations.rows_bytes());
        hasher.update(self.comments.rows_bytes());
        hasher.update(self.comment_votes.rows_bytes());
        hasher.update(self.limit_orders.rows_bytes());
        hasher.update(self.convert_requests.rows_bytes());
        hasher.update(self.escrows.rows_bytes());
        hasher.update(self.savings_withdraws.rows_bytes());
        hasher.update(self.liquidity_rewards.rows_bytes());
        hasher.update(self.reward_funds.rows_bytes());
        hasher.update(self.transaction_records.rows_bytes());
        hasher.update(self.block_summaries.rows_bytes());
        hasher.update(self.decline_voting_requests.rows_bytes());
        hasher.update(self.change_recovery_requests.rows_bytes());
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Asset;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn seeded_store() -> StateStore {
        let mut state = StateStore::new();
        state
            .globals
            .create(GlobalProperties::genesis(TimePointSec::new(0), 1_000, name("genesis")))
            .unwrap();
        state.feed.create(FeedHistory::default()).unwrap();
        state.hardfork_props.create(HardforkProperties::default()).unwrap();
        state.witness_schedule.create(WitnessScheduleState::default()).unwrap();
        state
            .accounts
            .create(Account::new(name("alice"), TimePointSec::new(0)))
            .unwrap();
        state
    }

    #[test]
    fn test_sessions_roll_back_across_tables() {
        let mut state = seeded_store();
        let digest_before = state.state_digest();

        state.begin_session();
        state.modify_gpo(|g| g.head_block_number = 9);
        state
            .accounts
            .modify(&name("alice"), |a| a.balance = Asset::ember(777))
            .unwrap();
        state
            .accounts
            .create(Account::new(name("bob"), TimePointSec::new(1)))
            .unwrap();
        state.undo();

        assert_eq!(state.state_digest(), digest_before);
        assert_eq!(state.head_block_num(), 0);
        assert!(state.accounts.find(&name("bob")).is_none());
    }

    #[test]
    fn test_revision_tracks_sessions() {
        let mut state = seeded_store();
        state.set_revision(5);

        state.begin_session();
        assert_eq!(state.revision(), 6);
        state.begin_session();
        assert_eq!(state.revision(), 7);
        state.squash();
        assert_eq!(state.revision(), 6);
        state.undo();
        assert_eq!(state.revision(), 5);
    }

    #[test]
    fn test_commit_retires_oldest_sessions() {
        let mut state = seeded_store();

        state.begin_session(); // revision 1
        state.modify_gpo(|g| g.head_block_number = 1);
        state.begin_session(); // revision 2
        state.modify_gpo(|g| g.head_block_number = 2);

        state.commit(1);
        assert_eq!(state.session_depth(), 1);

        state.undo_all();
        // Block 1 is now permanent, block 2 rolled back.
        assert_eq!(state.head_block_num(), 1);
        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_squash_keeps_child_changes_in_parent() {
        let mut state = seeded_store();

        state.begin_session();
        state.begin_session();
        state
            .accounts
            .modify(&name("alice"), |a| a.balance = Asset::ember(123))
            .unwrap();
        state.squash();

        assert_eq!(state.get_account(&name("alice")).unwrap().balance, Asset::ember(123));
        state.undo();
        assert_eq!(state.get_account(&name("alice")).unwrap().balance, Asset::ember(0));
    }

    #[test]
    fn test_has_hardfork() {
        let mut state = seeded_store();
        assert!(!state.has_hardfork(0));
        state.modify_hardforks(|h| h.processed_hardforks.push(TimePointSec::new(0)));
        assert!(state.has_hardfork(0));
        assert!(!state.has_hardfork(1));
    }
}
