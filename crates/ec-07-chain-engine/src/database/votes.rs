//! Witness vote weight propagation, with proxying.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::{
    MAX_PROXY_RECURSION_DEPTH, VIRTUAL_SCHEDULE_LAP_LENGTH, VIRTUAL_SCHEDULE_LAP_LENGTH2,
};
use shared_types::AccountName;

impl Database {
    /// Apply a per-depth vote delta through an account's proxy chain.
    /// `delta[i]` is weight that already sits `i` proxy hops deep.
    pub(crate) fn adjust_proxied_witness_votes(
        &mut self,
        account: &AccountName,
        delta: &[i128; MAX_PROXY_RECURSION_DEPTH + 1],
        depth: usize,
    ) -> Result<(), ChainError> {
        let proxy = self.state.get_account(account)?.proxy.clone();
        if !proxy.is_none() {
            // Nested proxies bottom out; the vote simply stops propagating.
            if depth >= MAX_PROXY_RECURSION_DEPTH {
                return Ok(());
            }
            self.state.accounts.modify(&proxy, |a| {
                for i in (0..MAX_PROXY_RECURSION_DEPTH - depth).rev() {
                    a.proxied_vsf_votes[i + depth] += delta[i];
                }
            })?;
            self.adjust_proxied_witness_votes(&proxy, delta, depth + 1)
        } else {
            let total_delta: i128 = delta[..=MAX_PROXY_RECURSION_DEPTH - depth].iter().sum();
            self.adjust_witness_votes(account, total_delta)
        }
    }

    /// Apply a flat vote delta through an account's proxy chain.
    pub(crate) fn adjust_proxied_witness_votes_scalar(
        &mut self,
        account: &AccountName,
        delta: i128,
        ) -> Result<(), ChainError> {
        self.adjust_proxied_witness_votes_scalar_at(account, delta, 0)
    }

    fn adjust_proxied_witness_votes_scalar_at(
        &mut self,
        account: &AccountName,
        delta: i128,
        depth: usize,
    ) -> Result<(), ChainError> {
        let proxy = self.state.get_account(account)?.proxy.clone();
        if !proxy.is_none() {
            if depth >= MAX_PROXY_RECURSION_DEPTH {
                return Ok(());
            }
            self.state
                .accounts
                .modify(&proxy, |a| a.proxied_vsf_votes[depth] += delta)?;
            self.adjust_proxied_witness_votes_scalar_at(&proxy, delta, depth + 1)
        } else {
            self.adjust_witness_votes(account, delta)
        }
    }

    /// Move `delta` across every witness this account approves.
    pub(crate) fn adjust_witness_votes(
        &mut self,
        account: &AccountName,
        delta: i128,
    ) -> Result<(), ChainError> {
        let witnesses: Vec<AccountName> = self
            .state
            .witness_votes
            .range((account.clone(), AccountName::none())..)
            .take_while(|v| v.account == *account)
            .map(|v| v.witness.clone())
            .collect();
        for witness in witnesses {
            self.adjust_witness_vote(&witness, delta)?;
        }
        Ok(())
    }

    /// Adjust one witness's approval and its virtual-schedule position.
    pub(crate) fn adjust_witness_vote(
        &mut self,
        witness: &AccountName,
        delta: i128,
    ) -> Result<(), ChainError> {
        let wso = self.state.schedule().clone();
        let total_vesting = self.state.gpo().total_vesting_shares.amount;
        let has_hf2 = self.has_hardfork(2);
        let has_hf4 = self.has_hardfork(4);

        let mut over_voted = false;
        self.state.witnesses.modify(witness, |w| {
            let delta_pos = (w.votes as u128)
                .wrapping_mul(wso.current_virtual_time.wrapping_sub(w.virtual_last_update));
            w.virtual_position = w.virtual_position.wrapping_add(delta_pos);

            w.virtual_last_update = wso.current_virtual_time;
            w.votes = (i128::from(w.votes) + delta) as i64;
            over_voted = w.votes > total_vesting;

            let lap = if has_hf2 {
                VIRTUAL_SCHEDULE_LAP_LENGTH2
            } else {
                VIRTUAL_SCHEDULE_LAP_LENGTH
            };
            w.virtual_scheduled_time = w
                .virtual_last_update
                .wrapping_add(lap.wrapping_sub(w.virtual_position) / (w.votes as u128 + 1));

            // A low-vote witness can overflow into the past; push it a lap
            // out instead.
            if has_hf4 && w.virtual_scheduled_time < wso.current_virtual_time {
                w.virtual_scheduled_time = u128::MAX;
            }
        })?;

        if over_voted {
            return Err(ChainError::InvariantViolation(format!(
                "witness {witness} has more votes than vesting shares exist"
            )));
        }
        Ok(())
    }

    /// Drop every witness approval an account holds.
    pub(crate) fn clear_witness_votes(&mut self, account: &AccountName) -> Result<(), ChainError> {
        let ids: Vec<(AccountName, AccountName)> = self
            .state
            .witness_votes
            .range((account.clone(), AccountName::none())..)
            .take_while(|v| v.account == *account)
            .map(|v| (v.account.clone(), v.witness.clone()))
            .collect();
        for id in ids {
            self.state.witness_votes.remove(&id)?;
        }
        if self.has_hardfork(6) {
            self.state
                .accounts
                .modify(account, |a| a.witnesses_voted_for = 0)?;
        }
        Ok(())
    }
}
