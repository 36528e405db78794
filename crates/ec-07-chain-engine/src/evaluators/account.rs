//! Account lifecycle evaluators.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{OWNER_AUTH_RECOVERY_PERIOD_SEC, OWNER_UPDATE_LIMIT_SEC};
use ec_state_store::{Account, ChangeRecoveryAccountRequest};
use shared_types::operations::ChainProperties;
use shared_types::Operation;

pub struct AccountCreateEvaluator;

impl Evaluator for AccountCreateEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::AccountCreate { fee, creator, new_account_name, owner, active, posting, memo_key } => {
            let creation_fee = ChainProperties::default().account_creation_fee;
            require!(
                *fee >= creation_fee,
                "account creation fee {fee} is below the required {creation_fee}"
            );

            let creator_row = db.state.get_account(creator)?;
            require!(
                creator_row.balance >= *fee,
                "{creator} cannot cover the account creation fee"
            );
            require!(
                !db.state.accounts.contains(new_account_name),
                "account {new_account_name} already exists"
            );

            db.adjust_balance(creator, -*fee)?;

            let now = db.head_block_time();
            let mut account = Account::new(new_account_name.clone(), now);
            account.owner_key = *owner;
            account.active_key = *active;
            account.posting_key = *posting;
            account.memo_key = *memo_key;
            account.recovery_account = creator.clone();
            db.state.accounts.create(account)?;

            // The fee seeds the new account's vesting position.
            if fee.amount > 0 {
                db.create_vesting(new_account_name, *fee, false)?;
            }
            Ok(())
        })
    }
}

pub struct AccountUpdateEvaluator;

impl Evaluator for AccountUpdateEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::AccountUpdate { account, owner, active, posting, memo_key } => {
            let row = db.state.get_account(account)?.clone();
            let now = db.head_block_time();

            if owner.is_some() {
                require!(
                    now > row.last_owner_update + OWNER_UPDATE_LIMIT_SEC,
                    "owner authority can only change once per hour"
                );
            }

            db.state.accounts.modify(account, |a| {
                if let Some(key) = owner {
                    a.owner_key = *key;
                    a.last_owner_update = now;
                }
                if let Some(key) = active {
                    a.active_key = *key;
                }
                if let Some(key) = posting {
                    a.posting_key = *key;
                }
                if let Some(key) = memo_key {
                    a.memo_key = *key;
                }
            })?;
            Ok(())
        })
    }
}

pub struct ChangeRecoveryAccountEvaluator;

impl Evaluator for ChangeRecoveryAccountEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::ChangeRecoveryAccount { account_to_recover, new_recovery_account } => {
            db.state.get_account(new_recovery_account)?;
            let account = db.state.get_account(account_to_recover)?.clone();
            let now = db.head_block_time();

            match db.state.change_recovery_requests.find(account_to_recover) {
                None => {
                    require!(
                        account.recovery_account != *new_recovery_account,
                        "recovery account is already {new_recovery_account}"
                    );
                    db.state.change_recovery_requests.create(ChangeRecoveryAccountRequest {
                        account_to_recover: account_to_recover.clone(),
                        recovery_account: new_recovery_account.clone(),
                        effective_on: now + OWNER_AUTH_RECOVERY_PERIOD_SEC,
                    })?;
                }
                Some(_) => {
                    if account.recovery_account != *new_recovery_account {
                        db.state.change_recovery_requests.modify(account_to_recover, |r| {
                            r.recovery_account = new_recovery_account.clone();
                            r.effective_on = now + OWNER_AUTH_RECOVERY_PERIOD_SEC;
                        })?;
                    } else {
                        // Changing back cancels the pending request.
                        db.state.change_recovery_requests.remove(account_to_recover)?;
                    }
                }
            }
            Ok(())
        })
    }
}
