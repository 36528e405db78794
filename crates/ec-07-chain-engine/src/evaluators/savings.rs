//! Savings evaluators. Savings funds sit behind a three-day withdrawal
//! delay so a stolen active key cannot drain them instantly.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{SAVINGS_WITHDRAW_REQUEST_LIMIT, SAVINGS_WITHDRAW_TIME_SEC};
use ec_state_store::SavingsWithdraw;
use shared_types::{AssetSymbol, Operation};

pub struct TransferToSavingsEvaluator;

impl Evaluator for TransferToSavingsEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::TransferToSavings { from, to, amount, .. } => {
            db.state.get_account(to)?;
            let account = db.state.get_account(from)?;
            let balance = match amount.symbol {
                AssetSymbol::Ember => account.balance,
                AssetSymbol::Eusd => account.eusd_balance,
                AssetSymbol::Vests => unreachable!("validated as liquid"),
            };
            require!(balance >= *amount, "{from} has insufficient funds");

            db.adjust_balance(from, -*amount)?;
            db.adjust_savings_balance(to, *amount)?;
            Ok(())
        })
    }
}

pub struct TransferFromSavingsEvaluator;

impl Evaluator for TransferFromSavingsEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::TransferFromSavings { from, request_id, to, amount, memo } => {
            db.state.get_account(to)?;
            let account = db.state.get_account(from)?;
            require!(
                account.savings_withdraw_requests < SAVINGS_WITHDRAW_REQUEST_LIMIT,
                "{from} has too many pending savings withdrawals"
            );
            let balance = match amount.symbol {
                AssetSymbol::Ember => account.savings_balance,
                AssetSymbol::Eusd => account.savings_eusd_balance,
                AssetSymbol::Vests => unreachable!("validated as liquid"),
            };
            require!(balance >= *amount, "{from} has insufficient savings");

            let id = (from.clone(), *request_id);
            require!(
                !db.state.savings_withdraws.contains(&id),
                "withdrawal request {request_id} already exists"
            );

            db.adjust_savings_balance(from, -*amount)?;
            let now = db.head_block_time();
            db.state.savings_withdraws.create(SavingsWithdraw {
                from: from.clone(),
                to: to.clone(),
                memo: memo.clone(),
                request_id: *request_id,
                amount: *amount,
                complete: now + SAVINGS_WITHDRAW_TIME_SEC,
            })?;
            db.state
                .accounts
                .modify(from, |a| a.savings_withdraw_requests += 1)?;
            Ok(())
        })
    }
}

pub struct CancelTransferFromSavingsEvaluator;

impl Evaluator for CancelTransferFromSavingsEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::CancelTransferFromSavings { from, request_id } => {
            let id = (from.clone(), *request_id);
            require!(
                db.state.savings_withdraws.contains(&id),
                "withdrawal request {request_id} does not exist"
            );
            let withdraw = db.state.savings_withdraws.remove(&id)?;
            db.adjust_savings_balance(from, withdraw.amount)?;
            db.state
                .accounts
                .modify(from, |a| a.savings_withdraw_requests -= 1)?;
            Ok(())
        })
    }
}
