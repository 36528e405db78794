//! Witness registration, approvals, proxies and price feeds.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{
    MAX_PROXY_RECURSION_DEPTH, MAX_WITNESSES_VOTED_FOR, OWNER_AUTH_RECOVERY_PERIOD_SEC,
};
use ec_state_store::{DeclineVotingRightsRequest, Witness, WitnessVote};
use shared_types::Operation;

pub struct WitnessUpdateEvaluator;

impl Evaluator for WitnessUpdateEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::WitnessUpdate { owner, url, block_signing_key, props } => {
            db.state.get_account(owner)?;

            if db.state.witnesses.contains(owner) {
                db.state.witnesses.modify(owner, |w| {
                    w.url = url.clone();
                    w.signing_key = *block_signing_key;
                    w.props = props.clone();
                })?;
            } else {
                let now = db.head_block_time();
                let mut witness = Witness::new(owner.clone(), *block_signing_key, now);
                witness.url = url.clone();
                witness.props = props.clone();
                db.state.witnesses.create(witness)?;
            }
            Ok(())
        })
    }
}

pub struct AccountWitnessVoteEvaluator;

impl Evaluator for AccountWitnessVoteEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::AccountWitnessVote { account, witness, approve } => {
            let voter = db.state.get_account(account)?.clone();
            require!(voter.can_vote, "{account} has declined its voting rights");
            require!(
                voter.proxy.is_none(),
                "cannot vote for witnesses directly while a proxy is set"
            );
            db.state.get_witness(witness)?;

            let id = (account.clone(), witness.clone());
            match (db.state.witness_votes.contains(&id), approve) {
                (false, true) => {
                    require!(
                        voter.witnesses_voted_for < MAX_WITNESSES_VOTED_FOR,
                        "{account} has voted for too many witnesses"
                    );
                    db.state.witness_votes.create(WitnessVote {
                        account: account.clone(),
                        witness: witness.clone(),
                    })?;
                    db.state
                        .accounts
                        .modify(account, |a| a.witnesses_voted_for += 1)?;
                    db.adjust_witness_vote(witness, voter.witness_vote_weight())?;
                }
                (true, false) => {
                    db.state.witness_votes.remove(&id)?;
                    db.state
                        .accounts
                        .modify(account, |a| a.witnesses_voted_for -= 1)?;
                    db.adjust_witness_vote(witness, -voter.witness_vote_weight())?;
                }
                (false, false) => {
                    return Err(ChainError::EvaluatorReject(format!(
                        "{account} has no vote for {witness} to remove"
                    )))
                }
                (true, true) => {
                    return Err(ChainError::EvaluatorReject(format!(
                        "{account} already approves {witness}"
                    )))
                }
            }
            Ok(())
        })
    }
}

pub struct AccountWitnessProxyEvaluator;

impl Evaluator for AccountWitnessProxyEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::AccountWitnessProxy { account, proxy } => {
            let row = db.state.get_account(account)?.clone();
            require!(row.can_vote, "{account} has declined its voting rights");
            require!(row.proxy != *proxy, "proxy is unchanged");

            // Pull this account's weight out through the old route.
            let mut delta = [0i128; MAX_PROXY_RECURSION_DEPTH + 1];
            delta[0] = -i128::from(row.vesting_shares.amount);
            for (i, proxied) in row.proxied_vsf_votes.iter().enumerate() {
                delta[i + 1] = -proxied;
            }
            db.adjust_proxied_witness_votes(account, &delta, 0)?;

            if !proxy.is_none() {
                let new_proxy = db.state.get_account(proxy)?.clone();

                // Refuse proxy cycles at any depth.
                let mut cycle_check = new_proxy.clone();
                for _ in 0..MAX_PROXY_RECURSION_DEPTH {
                    require!(
                        cycle_check.name != *account,
                        "setting this proxy would create a cycle"
                    );
                    if cycle_check.proxy.is_none() {
                        break;
                    }
                    cycle_check = db.state.get_account(&cycle_check.proxy)?.clone();
                }

                db.state.accounts.modify(account, |a| a.proxy = proxy.clone())?;

                for d in delta.iter_mut() {
                    *d = -*d;
                }
                db.adjust_proxied_witness_votes(account, &delta, 0)?;
            } else {
                db.state.accounts.modify(account, |a| a.proxy = shared_types::AccountName::none())?;

                for d in delta.iter_mut() {
                    *d = -*d;
                }
                db.adjust_proxied_witness_votes(account, &delta, 0)?;
            }
            Ok(())
        })
    }
}

pub struct FeedPublishEvaluator;

impl Evaluator for FeedPublishEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::FeedPublish { publisher, exchange_rate } => {
            require!(
                db.state.witnesses.contains(publisher),
                "{publisher} is not a witness"
            );
            let now = db.head_block_time();
            let rate = *exchange_rate;
            db.state.witnesses.modify(publisher, |w| {
                w.eusd_exchange_rate = rate;
                w.last_eusd_exchange_update = now;
            })?;
            Ok(())
        })
    }
}

pub struct DeclineVotingRightsEvaluator;

impl Evaluator for DeclineVotingRightsEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::DeclineVotingRights { account, decline } => {
            let row = db.state.get_account(account)?;
            require!(row.can_vote, "{account} has already declined its voting rights");

            let pending = db.state.decline_voting_requests.contains(account);
            if *decline {
                require!(!pending, "decline request already pending");
                let now = db.head_block_time();
                db.state.decline_voting_requests.create(DeclineVotingRightsRequest {
                    account: account.clone(),
                    effective_date: now + OWNER_AUTH_RECOVERY_PERIOD_SEC,
                })?;
            } else {
                require!(pending, "no decline request to cancel");
                db.state.decline_voting_requests.remove(account)?;
            }
            Ok(())
        })
    }
}
