//! Hardfork gating and one-shot migrations.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::{
    hardforks::BLOCKCHAIN_VERSION, FEED_HISTORY_WINDOW, NUM_HARDFORKS, PERCENT_1, PERCENT_100,
    POST_REWARD_FUND_NAME, CASHOUT_WINDOW_SECONDS, CONTENT_CONSTANT, MINER_ACCOUNT, NULL_ACCOUNT,
    TEMP_ACCOUNT, VESTING_WITHDRAW_INTERVALS_PRE_HF16,
};
use ec_reward_math::CurveId;
use ec_state_store::RewardFund;
use shared_types::operations::VirtualOperation;
use shared_types::{AccountName, Asset, PublicKey, TimePointSec};
use tracing::{info, warn};

impl Database {
    /// Sanity-check the configured table against chain state on open.
    pub(crate) fn init_hardforks(&mut self) -> Result<(), ChainError> {
        let hardforks = self.state.hardforks();
        if hardforks.last_hardfork > NUM_HARDFORKS {
            return Err(ChainError::UnknownHardfork);
        }
        let applied_version = self
            .hardfork_schedule
            .version(hardforks.last_hardfork)
            .map_err(|_| ChainError::UnknownHardfork)?;
        if applied_version > BLOCKCHAIN_VERSION {
            return Err(ChainError::BlockValidation(
                "node version is older than the last applied hardfork".into(),
            ));
        }
        Ok(())
    }

    /// Apply every hardfork that has become due by the head time.
    pub(crate) fn process_hardforks(&mut self) -> Result<(), ChainError> {
        if self.has_hardfork(5) {
            // From HF5 on, activation requires the witness majority vote
            // recorded on the hardfork property row.
            loop {
                let hardforks = self.state.hardforks().clone();
                let current = self
                    .hardfork_schedule
                    .version(hardforks.last_hardfork)
                    .map_err(|_| ChainError::UnknownHardfork)?;
                if current >= hardforks.next_hardfork
                    || hardforks.next_hardfork_time > self.head_block_time()
                {
                    break;
                }
                if hardforks.last_hardfork < NUM_HARDFORKS {
                    self.apply_hardfork(hardforks.last_hardfork + 1)?;
                } else {
                    return Err(ChainError::UnknownHardfork);
                }
            }
        } else {
            loop {
                let hardforks = self.state.hardforks().clone();
                if hardforks.last_hardfork >= NUM_HARDFORKS || hardforks.last_hardfork >= 5 {
                    break;
                }
                let next_time = self
                    .hardfork_schedule
                    .time(hardforks.last_hardfork + 1)
                    .map_err(|_| ChainError::UnknownHardfork)?;
                if next_time > self.head_block_time() {
                    break;
                }
                self.apply_hardfork(hardforks.last_hardfork + 1)?;
            }
        }
        Ok(())
    }

    /// Force hardforks through without witness votes. Replay and test paths.
    pub fn set_hardfork(&mut self, hardfork: u32) -> Result<(), ChainError> {
        let last = self.state.hardforks().last_hardfork;
        for i in (last + 1)..=hardfork.min(NUM_HARDFORKS) {
            if i <= 5 {
                self.apply_hardfork(i)?;
            } else {
                let version = self
                    .hardfork_schedule
                    .version(i)
                    .map_err(|_| ChainError::UnknownHardfork)?;
                let now = self.head_block_time();
                self.state.modify_hardforks(|hpo| {
                    hpo.next_hardfork = version;
                    hpo.next_hardfork_time = now;
                });
                self.apply_hardfork(i)?;
            }
        }
        Ok(())
    }

    pub(crate) fn apply_hardfork(&mut self, hardfork: u32) -> Result<(), ChainError> {
        info!(hardfork, block = self.head_block_num(), "applying hardfork");

        match hardfork {
            1 => self.perform_vesting_split(1_000_000)?,
            2 | 3 => self.retally_witness_votes()?,
            4 => ec_witness_schedule::reset_virtual_schedule_time(&mut self.state),
            6 => {
                self.retally_witness_vote_counts(false)?;
                self.retally_comment_children()?;
            }
            8 => self.retally_witness_vote_counts(true)?,
            10 => self.retally_liquidity_weight()?,
            12 => {
                self.migrate_cashout_windows()?;
                // Reserved accounts lose their (never valid) posting keys.
                for reserved in [MINER_ACCOUNT, NULL_ACCOUNT, TEMP_ACCOUNT] {
                    let name = AccountName::new(reserved).expect("reserved name is valid");
                    self.state
                        .accounts
                        .modify(&name, |a| a.posting_key = PublicKey::null())?;
                }
            }
            16 => {
                self.state.modify_feed(|fho| {
                    while fho.price_history.len() > FEED_HISTORY_WINDOW {
                        fho.price_history.pop_front();
                    }
                });
            }
            17 => self.create_post_reward_fund()?,
            19 => {
                self.state.modify_gpo(|gpo| gpo.vote_power_reserve_rate = 10);
                self.state
                    .reward_funds
                    .modify(&POST_REWARD_FUND_NAME.to_string(), |rfo| {
                        rfo.author_reward_curve = CurveId::Linear;
                        rfo.curation_reward_curve = CurveId::SquareRoot;
                    })?;

                // Drop empty delegation rows.
                let empty: Vec<_> = self
                    .state
                    .vesting_delegations
                    .iter()
                    .filter(|d| d.vesting_shares.amount == 0)
                    .map(|d| (d.delegator.clone(), d.delegatee.clone()))
                    .collect();
                for id in empty {
                    self.state.vesting_delegations.remove(&id)?;
                }
            }
            5 | 7 | 9 | 11 | 13 | 14 | 15 | 18 => {}
            _ => return Err(ChainError::UnknownHardfork),
        }

        let time = self
            .hardfork_schedule
            .time(hardfork)
            .map_err(|_| ChainError::UnknownHardfork)?;
        let version = self
            .hardfork_schedule
            .version(hardfork)
            .map_err(|_| ChainError::UnknownHardfork)?;

        let hfp = self.state.hardforks().clone();
        if hardfork != hfp.last_hardfork + 1 || hfp.processed_hardforks.len() as u32 != hardfork {
            return Err(ChainError::BlockValidation(format!(
                "hardfork {hardfork} applied out of order after {}",
                hfp.last_hardfork
            )));
        }
        self.state.modify_hardforks(|hfp| {
            hfp.processed_hardforks.push(time);
            hfp.last_hardfork = hardfork;
            hfp.current_hardfork_version = version;
        });

        self.push_virtual_operation(VirtualOperation::Hardfork { hardfork_id: hardfork });
        Ok(())
    }

    /// HF1: multiply every vesting position by `magnitude`.
    fn perform_vesting_split(&mut self, magnitude: i64) -> Result<(), ChainError> {
        self.state.modify_gpo(|d| d.total_vesting_shares.amount *= magnitude);

        for name in self.state.accounts.ids() {
            self.state.accounts.modify(&name, |a| {
                a.vesting_shares.amount *= magnitude;
                a.withdrawn *= magnitude;
                a.to_withdraw *= magnitude;
                a.vesting_withdraw_rate = Asset::vests(
                    a.to_withdraw / i64::from(VESTING_WITHDRAW_INTERVALS_PRE_HF16),
                );
                if a.vesting_withdraw_rate.amount == 0 {
                    a.vesting_withdraw_rate.amount = 1;
                }
                for proxied in a.proxied_vsf_votes.iter_mut() {
                    *proxied *= i128::from(magnitude);
                }
            })?;
        }

        for id in self.state.comments.ids() {
            self.state.comments.modify(&id, |c| {
                c.net_rshares *= magnitude;
                c.abs_rshares *= magnitude;
                c.vote_rshares *= magnitude;
            })?;
        }
        Ok(())
    }

    /// HF2/3: rebuild every witness's vote total from scratch.
    pub(crate) fn retally_witness_votes(&mut self) -> Result<(), ChainError> {
        for name in self.state.witnesses.ids() {
            self.state.witnesses.modify(&name, |w| {
                w.votes = 0;
                w.virtual_position = 0;
            })?;
        }

        for name in self.state.accounts.ids() {
            let account = self.state.get_account(&name)?.clone();
            if !account.proxy.is_none() {
                continue;
            }
            let witnesses: Vec<AccountName> = self
                .state
                .witness_votes
                .range((name.clone(), AccountName::none())..)
                .take_while(|v| v.account == name)
                .map(|v| v.witness.clone())
                .collect();
            for witness in witnesses {
                self.adjust_witness_vote(&witness, account.witness_vote_weight())?;
            }
        }
        Ok(())
    }

    /// HF6/8: recount `witnesses_voted_for` per account.
    fn retally_witness_vote_counts(&mut self, force: bool) -> Result<(), ChainError> {
        for name in self.state.accounts.ids() {
            let account = self.state.get_account(&name)?.clone();
            let mut voted_for = 0u16;
            if force || !account.proxy.is_none() {
                voted_for = self
                    .state
                    .witness_votes
                    .range((name.clone(), AccountName::none())..)
                    .take_while(|v| v.account == name)
                    .count() as u16;
            }
            if account.witnesses_voted_for != voted_for {
                self.state
                    .accounts
                    .modify(&name, |a| a.witnesses_voted_for = voted_for)?;
            }
        }
        Ok(())
    }

    /// HF6: rebuild the children counters along every parent chain.
    fn retally_comment_children(&mut self) -> Result<(), ChainError> {
        for id in self.state.comments.ids() {
            self.state.comments.modify(&id, |c| c.children = 0)?;
        }

        for id in self.state.comments.ids() {
            let comment = self.state.comments.get(&id)?.clone();
            if comment.parent_author.is_none() {
                continue;
            }
            let mut parent =
                Some((comment.parent_author.clone(), comment.parent_permlink.clone()));
            while let Some(parent_id) = parent {
                match self.state.comments.find(&parent_id).cloned() {
                    Some(p) => {
                        self.state.comments.modify(&parent_id, |c| c.children += 1)?;
                        parent = (!p.parent_author.is_none())
                            .then(|| (p.parent_author.clone(), p.parent_permlink.clone()));
                    }
                    None => {
                        warn!("comment parent missing during children retally");
                        parent = None;
                    }
                }
            }
        }
        Ok(())
    }

    /// HF10: recompute liquidity weights under the balanced-volume rule.
    fn retally_liquidity_weight(&mut self) -> Result<(), ChainError> {
        for owner in self.state.liquidity_rewards.ids() {
            self.state
                .liquidity_rewards
                .modify(&owner, |r| r.update_weight(true))?;
        }
        Ok(())
    }

    /// HF12: pin every live root post to the shortened cashout window.
    fn migrate_cashout_windows(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        for id in self.state.comments.ids() {
            let comment = self.state.comments.get(&id)?.clone();
            if !comment.parent_author.is_none() {
                continue;
            }
            if comment.last_payout == TimePointSec::MIN
                && comment.cashout_time == TimePointSec::MAX
            {
                self.state.comments.modify(&id, |c| {
                    c.cashout_time = now + ec_chain_params::CASHOUT_WINDOW_SECONDS_PRE_HF17;
                })?;
            } else if comment.last_payout > TimePointSec::MIN {
                self.state.comments.modify(&id, |c| {
                    c.cashout_time =
                        c.last_payout + ec_chain_params::SECOND_CASHOUT_WINDOW;
                })?;
            }
        }
        Ok(())
    }

    /// HF17: move the global content pot into the `post` reward fund and
    /// give live comments the week-long window.
    fn create_post_reward_fund(&mut self) -> Result<(), ChainError> {
        let gpo = self.state.gpo().clone();
        let now = self.head_block_time();

        self.state.reward_funds.create(RewardFund {
            name: POST_REWARD_FUND_NAME.to_string(),
            reward_balance: gpo.total_reward_fund_ember,
            recent_claims: 0,
            last_update: now,
            content_constant: CONTENT_CONSTANT,
            percent_curation_rewards: 25 * PERCENT_1,
            percent_content_rewards: PERCENT_100,
            author_reward_curve: CurveId::Quadratic,
            curation_reward_curve: CurveId::QuadraticCuration,
        })?;

        self.state.modify_gpo(|g| {
            g.total_reward_fund_ember = Asset::ember(0);
        });

        // Every unpaid comment keeps its window or is stretched to a week
        // from creation, whichever is later.
        for id in self.state.comments.ids() {
            let comment = self.state.comments.get(&id)?.clone();
            if comment.cashout_time == TimePointSec::MAX {
                continue;
            }
            let floor = comment.created + CASHOUT_WINDOW_SECONDS;
            if comment.cashout_time < floor {
                self.state.comments.modify(&id, |c| c.cashout_time = floor)?;
            }
        }
        Ok(())
    }
}
