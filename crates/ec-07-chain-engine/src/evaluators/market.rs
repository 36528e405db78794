//! Market evaluators: conversions and limit orders.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::CONVERSION_DELAY_SEC;
use ec_state_store::{ConvertRequest, LimitOrder};
use shared_types::{AssetSymbol, Operation, Price};

pub struct ConvertEvaluator;

impl Evaluator for ConvertEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::Convert { owner, request_id, amount } => {
            require!(
                !db.feed_median().is_null(),
                "conversions are disabled until a price feed exists"
            );
            let balance = db.state.get_account(owner)?.eusd_balance;
            require!(balance >= *amount, "{owner} has insufficient EUSD");

            let id = (owner.clone(), *request_id);
            require!(
                !db.state.convert_requests.contains(&id),
                "conversion request {request_id} already exists"
            );

            db.adjust_balance(owner, -*amount)?;
            let now = db.head_block_time();
            db.state.convert_requests.create(ConvertRequest {
                owner: owner.clone(),
                request_id: *request_id,
                amount: *amount,
                conversion_date: now + CONVERSION_DELAY_SEC,
            })?;
            Ok(())
        })
    }
}

pub struct LimitOrderCreateEvaluator;

impl Evaluator for LimitOrderCreateEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::LimitOrderCreate { owner, order_id, amount_to_sell, min_to_receive, fill_or_kill, expiration } => {
            let now = db.head_block_time();
            require!(*expiration > now, "the order would expire immediately");

            let account = db.state.get_account(owner)?;
            let balance = match amount_to_sell.symbol {
                AssetSymbol::Ember => account.balance,
                AssetSymbol::Eusd => account.eusd_balance,
                AssetSymbol::Vests => {
                    return Err(ChainError::EvaluatorReject(
                        "vesting shares cannot be sold".into(),
                    ))
                }
            };
            require!(balance >= *amount_to_sell, "{owner} has insufficient funds");

            let id = (owner.clone(), *order_id);
            require!(
                !db.state.limit_orders.contains(&id),
                "order {order_id} already exists"
            );

            db.adjust_balance(owner, -*amount_to_sell)?;
            db.state.limit_orders.create(LimitOrder {
                created: now,
                expiration: *expiration,
                seller: owner.clone(),
                order_id: *order_id,
                for_sale: amount_to_sell.amount,
                sell_price: Price::new(*amount_to_sell, *min_to_receive),
            })?;

            let filled = db.apply_order(&id)?;
            require!(
                !*fill_or_kill || filled,
                "fill-or-kill order was not fully filled"
            );
            Ok(())
        })
    }
}

pub struct LimitOrderCancelEvaluator;

impl Evaluator for LimitOrderCancelEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::LimitOrderCancel { owner, order_id } => {
            let id = (owner.clone(), *order_id);
            require!(
                db.state.limit_orders.contains(&id),
                "order {order_id} does not exist"
            );
            db.cancel_order(&id)?;
            Ok(())
        })
    }
}
