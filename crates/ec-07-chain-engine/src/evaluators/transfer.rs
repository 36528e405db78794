//! Token movement evaluators: transfers, vesting deposits, withdrawals.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{
    MAX_WITHDRAW_ROUTES, VESTING_WITHDRAW_INTERVALS, VESTING_WITHDRAW_INTERVAL_SECONDS,
};
use ec_state_store::WithdrawVestingRoute;
use shared_types::{Asset, AssetSymbol, Operation, TimePointSec};

pub struct TransferEvaluator;

impl Evaluator for TransferEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::Transfer { from, to, amount, .. } => {
            db.state.get_account(to)?;
            let balance = match amount.symbol {
                AssetSymbol::Ember => db.state.get_account(from)?.balance,
                AssetSymbol::Eusd => db.state.get_account(from)?.eusd_balance,
                AssetSymbol::Vests => {
                    return Err(ChainError::EvaluatorReject(
                        "vesting shares are not transferable".into(),
                    ))
                }
            };
            require!(balance >= *amount, "{from} has insufficient funds");

            db.adjust_balance(from, -*amount)?;
            db.adjust_balance(to, *amount)?;
            Ok(())
        })
    }
}

pub struct TransferToVestingEvaluator;

impl Evaluator for TransferToVestingEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::TransferToVesting { from, to, amount } => {
            let balance = db.state.get_account(from)?.balance;
            require!(balance >= *amount, "{from} has insufficient funds");

            let target = if to.is_none() { from } else { to };
            db.state.get_account(target)?;

            db.adjust_balance(from, -*amount)?;
            db.create_vesting(target, *amount, false)?;
            Ok(())
        })
    }
}

pub struct WithdrawVestingEvaluator;

impl Evaluator for WithdrawVestingEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::WithdrawVesting { account, vesting_shares } => {
            let row = db.state.get_account(account)?.clone();

            require!(
                row.vesting_shares.amount - row.delegated_vesting_shares.amount
                    >= vesting_shares.amount,
                "{account} does not own enough undelegated vesting shares"
            );

            if vesting_shares.amount == 0 {
                require!(
                    row.vesting_withdraw_rate.amount != 0,
                    "withdrawal is not active"
                );
                db.state.accounts.modify(account, |a| {
                    a.vesting_withdraw_rate = Asset::vests(0);
                    a.next_vesting_withdrawal = TimePointSec::MAX;
                    a.to_withdraw = 0;
                    a.withdrawn = 0;
                })?;
                return Ok(());
            }

            let mut new_rate =
                Asset::vests(vesting_shares.amount / i64::from(VESTING_WITHDRAW_INTERVALS));
            if new_rate.amount == 0 {
                new_rate.amount = 1;
            }
            require!(
                row.vesting_withdraw_rate != new_rate,
                "this withdrawal is already in progress"
            );

            let now = db.head_block_time();
            let to_withdraw = vesting_shares.amount;
            db.state.accounts.modify(account, |a| {
                a.vesting_withdraw_rate = new_rate;
                a.next_vesting_withdrawal = now + VESTING_WITHDRAW_INTERVAL_SECONDS;
                a.to_withdraw = to_withdraw;
                a.withdrawn = 0;
            })?;
            Ok(())
        })
    }
}

pub struct SetWithdrawVestingRouteEvaluator;

impl Evaluator for SetWithdrawVestingRouteEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::SetWithdrawVestingRoute { from_account, to_account, percent, auto_vest } => {
            db.state.get_account(to_account)?;
            let from_row = db.state.get_account(from_account)?.clone();
            let id = (from_account.clone(), to_account.clone());

            match db.state.withdraw_routes.find(&id) {
                None => {
                    if *percent == 0 {
                        return Err(ChainError::EvaluatorReject(
                            "cannot create a zero-percent route".into(),
                        ));
                    }
                    require!(
                        usize::from(from_row.withdraw_routes) < MAX_WITHDRAW_ROUTES,
                        "{from_account} already has the maximum number of withdraw routes"
                    );
                    db.state.withdraw_routes.create(WithdrawVestingRoute {
                        from_account: from_account.clone(),
                        to_account: to_account.clone(),
                        percent: *percent,
                        auto_vest: *auto_vest,
                    })?;
                    db.state
                        .accounts
                        .modify(from_account, |a| a.withdraw_routes += 1)?;
                }
                Some(_) if *percent == 0 => {
                    db.state.withdraw_routes.remove(&id)?;
                    db.state
                        .accounts
                        .modify(from_account, |a| a.withdraw_routes -= 1)?;
                }
                Some(_) => {
                    db.state.withdraw_routes.modify(&id, |route| {
                        route.percent = *percent;
                        route.auto_vest = *auto_vest;
                    })?;
                }
            }

            // The routes for one account may never claim more than 100%.
            let total: u32 = db
                .state
                .withdraw_routes
                .range((from_account.clone(), shared_types::AccountName::none())..)
                .take_while(|r| r.from_account == *from_account)
                .map(|r| u32::from(r.percent))
                .sum();
            require!(
                total <= u32::from(ec_chain_params::PERCENT_100),
                "withdraw routes exceed 100%"
            );
            Ok(())
        })
    }
}
