//! Escrow evaluators.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_state_store::Escrow;
use shared_types::{Asset, AssetSymbol, Operation};

pub struct EscrowTransferEvaluator;

impl Evaluator for EscrowTransferEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::EscrowTransfer { from, to, agent, escrow_id, eusd_amount, ember_amount, fee, ratification_deadline, escrow_expiration, .. } => {
            db.state.get_account(to)?;
            db.state.get_account(agent)?;
            let now = db.head_block_time();
            require!(*ratification_deadline > now, "the ratification deadline has passed");
            require!(*escrow_expiration > now, "the escrow would already be expired");

            let account = db.state.get_account(from)?;
            let mut ember_needed = *ember_amount;
            let mut eusd_needed = *eusd_amount;
            match fee.symbol {
                AssetSymbol::Ember => ember_needed += *fee,
                AssetSymbol::Eusd => eusd_needed += *fee,
                AssetSymbol::Vests => unreachable!("validated as liquid"),
            }
            require!(
                account.balance >= ember_needed && account.eusd_balance >= eusd_needed,
                "{from} cannot fund the escrow"
            );

            let id = (from.clone(), *escrow_id);
            require!(!db.state.escrows.contains(&id), "escrow {escrow_id} already exists");

            if ember_needed.amount > 0 {
                db.adjust_balance(from, -ember_needed)?;
            }
            if eusd_needed.amount > 0 {
                db.adjust_balance(from, -eusd_needed)?;
            }

            db.state.escrows.create(Escrow {
                from: from.clone(),
                to: to.clone(),
                agent: agent.clone(),
                escrow_id: *escrow_id,
                eusd_balance: *eusd_amount,
                ember_balance: *ember_amount,
                pending_fee: *fee,
                ratification_deadline: *ratification_deadline,
                escrow_expiration: *escrow_expiration,
                to_approved: false,
                agent_approved: false,
                disputed: false,
            })?;
            Ok(())
        })
    }
}

pub struct EscrowApproveEvaluator;

impl Evaluator for EscrowApproveEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::EscrowApprove { from, to, agent, who, escrow_id, approve } => {
            let id = (from.clone(), *escrow_id);
            let escrow = db.state.escrows.get(&id)?.clone();
            require!(escrow.to == *to && escrow.agent == *agent, "escrow parties do not match");
            require!(
                *who == escrow.to || *who == escrow.agent,
                "only the recipient or agent ratify an escrow"
            );

            if !*approve {
                // Any rejection unwinds the whole escrow.
                let escrow = db.state.escrows.remove(&id)?;
                db.adjust_balance(from, escrow.ember_balance)?;
                db.adjust_balance(from, escrow.eusd_balance)?;
                db.adjust_balance(from, escrow.pending_fee)?;
                return Ok(());
            }

            if *who == escrow.to {
                require!(!escrow.to_approved, "{who} has already approved");
                db.state.escrows.modify(&id, |e| e.to_approved = true)?;
            } else {
                require!(!escrow.agent_approved, "{who} has already approved");
                db.state.escrows.modify(&id, |e| e.agent_approved = true)?;
            }

            // Full ratification releases the agent's fee.
            let escrow = db.state.escrows.get(&id)?.clone();
            if escrow.is_approved() && escrow.pending_fee.amount > 0 {
                db.adjust_balance(agent, escrow.pending_fee)?;
                db.state.escrows.modify(&id, |e| {
                    e.pending_fee = Asset::new(0, e.pending_fee.symbol);
                })?;
            }
            Ok(())
        })
    }
}

pub struct EscrowDisputeEvaluator;

impl Evaluator for EscrowDisputeEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::EscrowDispute { from, to, agent, who, escrow_id } => {
            let id = (from.clone(), *escrow_id);
            let escrow = db.state.escrows.get(&id)?.clone();
            require!(escrow.to == *to && escrow.agent == *agent, "escrow parties do not match");
            require!(
                *who == escrow.from || *who == escrow.to,
                "only the sender or recipient may dispute"
            );
            require!(escrow.is_approved(), "the escrow was never fully ratified");
            require!(!escrow.disputed, "the escrow is already disputed");
            let now = db.head_block_time();
            require!(now < escrow.escrow_expiration, "the escrow has expired");

            db.state.escrows.modify(&id, |e| e.disputed = true)?;
            Ok(())
        })
    }
}

pub struct EscrowReleaseEvaluator;

impl Evaluator for EscrowReleaseEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::EscrowRelease { from, to, agent, who, receiver, escrow_id, eusd_amount, ember_amount } => {
            let id = (from.clone(), *escrow_id);
            let escrow = db.state.escrows.get(&id)?.clone();
            require!(escrow.to == *to && escrow.agent == *agent, "escrow parties do not match");
            require!(escrow.is_approved(), "the escrow was never fully ratified");
            require!(
                escrow.ember_balance >= *ember_amount && escrow.eusd_balance >= *eusd_amount,
                "release exceeds the escrowed funds"
            );

            let now = db.head_block_time();
            if escrow.disputed {
                require!(*who == escrow.agent, "only the agent releases a disputed escrow");
            } else if now < escrow.escrow_expiration {
                // Before expiration each side may only concede to the other.
                if *who == escrow.from {
                    require!(*receiver == escrow.to, "the sender may only release to the recipient");
                } else if *who == escrow.to {
                    require!(*receiver == escrow.from, "the recipient may only return to the sender");
                } else {
                    return Err(ChainError::EvaluatorReject(
                        "the agent cannot release an undisputed escrow early".into(),
                    ));
                }
            } else {
                require!(
                    *who == escrow.from || *who == escrow.to,
                    "only the sender or recipient release an expired escrow"
                );
            }

            if ember_amount.amount > 0 {
                db.adjust_balance(receiver, *ember_amount)?;
            }
            if eusd_amount.amount > 0 {
                db.adjust_balance(receiver, *eusd_amount)?;
            }
            db.state.escrows.modify(&id, |e| {
                e.ember_balance -= *ember_amount;
                e.eusd_balance -= *eusd_amount;
            })?;

            let escrow = db.state.escrows.get(&id)?;
            if escrow.ember_balance.amount == 0 && escrow.eusd_balance.amount == 0 {
                db.state.escrows.remove(&id)?;
            }
            Ok(())
        })
    }
}
