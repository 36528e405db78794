//! Reward claims, delegations and custom payloads.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::VESTING_WITHDRAW_INTERVAL_SECONDS;
use ec_state_store::{VestingDelegation, VestingDelegationExpiration};
use shared_types::{Asset, Operation};

pub struct ClaimRewardBalanceEvaluator;

impl Evaluator for ClaimRewardBalanceEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::ClaimRewardBalance { account, reward_ember, reward_eusd, reward_vests } => {
            let row = db.state.get_account(account)?.clone();
            require!(
                row.reward_ember_balance >= *reward_ember
                    && row.reward_eusd_balance >= *reward_eusd
                    && row.reward_vesting_balance >= *reward_vests,
                "{account} claims more than its pending rewards"
            );

            if reward_ember.amount > 0 {
                db.adjust_reward_balance(account, -*reward_ember)?;
                db.adjust_balance(account, *reward_ember)?;
            }
            if reward_eusd.amount > 0 {
                db.adjust_reward_balance(account, -*reward_eusd)?;
                db.adjust_balance(account, *reward_eusd)?;
            }
            if reward_vests.amount > 0 {
                // The claimed shares carry a proportional slice of the
                // pending vesting fund with them.
                let ember_portion = Asset::ember(
                    (i128::from(row.reward_vesting_ember.amount)
                        * i128::from(reward_vests.amount)
                        / i128::from(row.reward_vesting_balance.amount)) as i64,
                );

                db.state.accounts.modify(account, |a| {
                    a.vesting_shares += *reward_vests;
                    a.reward_vesting_balance -= *reward_vests;
                    a.reward_vesting_ember -= ember_portion;
                })?;
                db.state.modify_gpo(|g| {
                    g.total_vesting_shares += *reward_vests;
                    g.total_vesting_fund_ember += ember_portion;
                    g.pending_rewarded_vesting_shares -= *reward_vests;
                    g.pending_rewarded_vesting_ember -= ember_portion;
                });
                db.adjust_proxied_witness_votes_scalar(account, i128::from(reward_vests.amount))?;
            }
            Ok(())
        })
    }
}

pub struct DelegateVestingSharesEvaluator;

impl Evaluator for DelegateVestingSharesEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::DelegateVestingShares { delegator, delegatee, vesting_shares } => {
            db.state.get_account(delegatee)?;
            let delegator_row = db.state.get_account(delegator)?.clone();
            let id = (delegator.clone(), delegatee.clone());
            let existing = db.state.vesting_delegations.find(&id).cloned();
            let now = db.head_block_time();

            let available = delegator_row.vesting_shares.amount
                - delegator_row.delegated_vesting_shares.amount
                - (delegator_row.to_withdraw - delegator_row.withdrawn);

            match existing {
                None => {
                    require!(vesting_shares.amount > 0, "no delegation to remove");
                    require!(
                        available >= vesting_shares.amount,
                        "{delegator} does not have enough undelegated shares"
                    );
                    db.state.vesting_delegations.create(VestingDelegation {
                        delegator: delegator.clone(),
                        delegatee: delegatee.clone(),
                        vesting_shares: *vesting_shares,
                        min_delegation_time: now,
                    })?;
                    db.state.accounts.modify(delegator, |a| {
                        a.delegated_vesting_shares += *vesting_shares;
                    })?;
                    db.state.accounts.modify(delegatee, |a| {
                        a.received_vesting_shares += *vesting_shares;
                    })?;
                }
                Some(old) if vesting_shares.amount > old.vesting_shares.amount => {
                    let delta = *vesting_shares - old.vesting_shares;
                    require!(
                        available >= delta.amount,
                        "{delegator} does not have enough undelegated shares"
                    );
                    db.state.vesting_delegations.modify(&id, |d| {
                        d.vesting_shares = *vesting_shares;
                    })?;
                    db.state.accounts.modify(delegator, |a| {
                        a.delegated_vesting_shares += delta;
                    })?;
                    db.state.accounts.modify(delegatee, |a| {
                        a.received_vesting_shares += delta;
                    })?;
                }
                Some(old) => {
                    require!(
                        vesting_shares.amount < old.vesting_shares.amount,
                        "the delegation already has this size"
                    );
                    let freed = old.vesting_shares - *vesting_shares;

                    // Freed shares stay locked against re-delegation until
                    // the return window passes.
                    let expiration = now + VESTING_WITHDRAW_INTERVAL_SECONDS;
                    let exp_id = (delegator.clone(), expiration);
                    if db.state.delegation_expirations.contains(&exp_id) {
                        db.state
                            .delegation_expirations
                            .modify(&exp_id, |e| e.vesting_shares += freed)?;
                    } else {
                        db.state.delegation_expirations.create(VestingDelegationExpiration {
                            delegator: delegator.clone(),
                            vesting_shares: freed,
                            expiration,
                        })?;
                    }

                    if vesting_shares.amount == 0 {
                        db.state.vesting_delegations.remove(&id)?;
                    } else {
                        db.state.vesting_delegations.modify(&id, |d| {
                            d.vesting_shares = *vesting_shares;
                        })?;
                    }
                    db.state.accounts.modify(delegatee, |a| {
                        a.received_vesting_shares -= freed;
                    })?;
                }
            }
            Ok(())
        })
    }
}

pub struct CustomEvaluator;

impl Evaluator for CustomEvaluator {
    /// Custom payloads carry no consensus semantics; plugins interpret them
    /// off the notification bus.
    fn apply(&self, _db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::Custom { .. } => Ok(()))
    }
}
