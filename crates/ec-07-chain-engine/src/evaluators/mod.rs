//! One evaluator per user operation, registered by variant tag.

mod account;
mod comment;
mod escrow;
mod market;
mod misc;
mod savings;
mod transfer;
mod vote;
mod witness;

use crate::ports::registry::EvaluatorRegistry;
use std::sync::Arc;

/// The full evaluator set for this chain.
pub fn default_registry() -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::new();

    registry.register("account_create", Arc::new(account::AccountCreateEvaluator));
    registry.register("account_update", Arc::new(account::AccountUpdateEvaluator));
    registry.register(
        "change_recovery_account",
        Arc::new(account::ChangeRecoveryAccountEvaluator),
    );

    registry.register("transfer", Arc::new(transfer::TransferEvaluator));
    registry.register("transfer_to_vesting", Arc::new(transfer::TransferToVestingEvaluator));
    registry.register("withdraw_vesting", Arc::new(transfer::WithdrawVestingEvaluator));
    registry.register(
        "set_withdraw_vesting_route",
        Arc::new(transfer::SetWithdrawVestingRouteEvaluator),
    );

    registry.register("witness_update", Arc::new(witness::WitnessUpdateEvaluator));
    registry.register("account_witness_vote", Arc::new(witness::AccountWitnessVoteEvaluator));
    registry.register("account_witness_proxy", Arc::new(witness::AccountWitnessProxyEvaluator));
    registry.register("feed_publish", Arc::new(witness::FeedPublishEvaluator));
    registry.register(
        "decline_voting_rights",
        Arc::new(witness::DeclineVotingRightsEvaluator),
    );

    registry.register("comment", Arc::new(comment::CommentEvaluator));
    registry.register("comment_options", Arc::new(comment::CommentOptionsEvaluator));
    registry.register("delete_comment", Arc::new(comment::DeleteCommentEvaluator));
    registry.register("vote", Arc::new(vote::VoteEvaluator));

    registry.register("convert", Arc::new(market::ConvertEvaluator));
    registry.register("limit_order_create", Arc::new(market::LimitOrderCreateEvaluator));
    registry.register("limit_order_cancel", Arc::new(market::LimitOrderCancelEvaluator));

    registry.register("transfer_to_savings", Arc::new(savings::TransferToSavingsEvaluator));
    registry.register("transfer_from_savings", Arc::new(savings::TransferFromSavingsEvaluator));
    registry.register(
        "cancel_transfer_from_savings",
        Arc::new(savings::CancelTransferFromSavingsEvaluator),
    );

    registry.register("escrow_transfer", Arc::new(escrow::EscrowTransferEvaluator));
    registry.register("escrow_approve", Arc::new(escrow::EscrowApproveEvaluator));
    registry.register("escrow_dispute", Arc::new(escrow::EscrowDisputeEvaluator));
    registry.register("escrow_release", Arc::new(escrow::EscrowReleaseEvaluator));

    registry.register("claim_reward_balance", Arc::new(misc::ClaimRewardBalanceEvaluator));
    registry.register(
        "delegate_vesting_shares",
        Arc::new(misc::DelegateVestingSharesEvaluator),
    );
    registry.register("custom", Arc::new(misc::CustomEvaluator));

    registry
}

/// Destructure the expected operation variant or reject: the registry
/// guarantees the match, so a miss is a wiring bug, not a user error.
macro_rules! expect_op {
    ($op:expr, $variant:pat => $body:expr) => {
        match $op {
            $variant => $body,
            other => Err(crate::domain::error::ChainError::EvaluatorReject(format!(
                "operation {} routed to the wrong evaluator",
                other.name()
            ))),
        }
    };
}
pub(crate) use expect_op;
