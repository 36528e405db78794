//! The vote evaluator: voting power, rshares and curation weights.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{
    MAX_VOTE_CHANGES, MIN_VOTE_INTERVAL_SEC, PERCENT_100, POST_REWARD_FUND_NAME,
    REVERSE_AUCTION_WINDOW_SECONDS, UPVOTE_LOCKOUT_SECONDS, VOTE_DUST_THRESHOLD,
    VOTE_REGENERATION_SECONDS,
};
use ec_reward_math::evaluate_reward_curve;
use ec_state_store::{CommentId, CommentVote};
use shared_types::{Operation, TimePointSec};

pub struct VoteEvaluator;

impl Evaluator for VoteEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::Vote { voter, author, permlink, weight } => {
            let comment_id: CommentId = (author.clone(), permlink.clone());
            let comment = db.state.comments.get(&comment_id)?.clone();
            let voter_row = db.state.get_account(voter)?.clone();
            let now = db.head_block_time();

            require!(voter_row.can_vote, "{voter} has declined its voting rights");
            require!(comment.allow_votes, "votes are not allowed on this comment");
            require!(
                comment.cashout_time != TimePointSec::MAX,
                "this comment is past its final payout"
            );
            if comment.cashout_time.saturating_sub(now) < u64::from(UPVOTE_LOCKOUT_SECONDS) {
                require!(*weight <= 0, "upvotes are locked out near payout");
            }

            let elapsed = now.saturating_sub(voter_row.last_vote_time);
            require!(
                elapsed >= u64::from(MIN_VOTE_INTERVAL_SEC),
                "votes are limited to one per {MIN_VOTE_INTERVAL_SEC} seconds"
            );

            // Regenerate voting power linearly over the regeneration window.
            let regenerated = (u64::from(PERCENT_100) * elapsed
                / u64::from(VOTE_REGENERATION_SECONDS)) as u16;
            let current_power =
                voter_row.voting_power.saturating_add(regenerated).min(PERCENT_100);
            require!(current_power > 0, "{voter} has no voting power left");

            let abs_weight = i64::from(weight.unsigned_abs());
            let mut used_power =
                i64::from(current_power) * abs_weight / i64::from(PERCENT_100);
            let max_vote_denom = i64::from(db.state.gpo().vote_power_reserve_rate)
                * i64::from(VOTE_REGENERATION_SECONDS)
                / (60 * 60 * 24);
            used_power = (used_power + max_vote_denom - 1) / max_vote_denom;
            require!(
                used_power <= i64::from(current_power),
                "{voter} lacks the power for this vote"
            );

            let abs_rshares = i128::from(voter_row.effective_vesting_shares())
                * i128::from(used_power)
                / i128::from(PERCENT_100);
            let abs_rshares = abs_rshares as i64;
            require!(
                abs_rshares > VOTE_DUST_THRESHOLD || *weight == 0,
                "the vote is too small to register"
            );
            let rshares = if *weight < 0 { -abs_rshares } else { abs_rshares };

            let vote_id = ((comment_id.clone()), voter.clone());
            let existing = db.state.comment_votes.find(&vote_id).cloned();

            match existing {
                None => {
                    require!(*weight != 0, "a new vote cannot have zero weight");

                    db.state.accounts.modify(voter, |a| {
                        a.voting_power = current_power - used_power as u16;
                        a.last_vote_time = now;
                    })?;

                    let old_vote_rshares = comment.vote_rshares;
                    db.state.comments.modify(&comment_id, |c| {
                        c.net_rshares += rshares;
                        c.abs_rshares += abs_rshares;
                        if rshares > 0 {
                            c.vote_rshares += rshares;
                        }
                        c.net_votes += if rshares > 0 { 1 } else { -1 };
                    })?;

                    // Curation weight: this vote's share of the curve growth,
                    // discounted by the reverse auction.
                    let mut vote_weight = 0u64;
                    if rshares > 0 && comment.allow_curation_rewards {
                        let fund = db
                            .state
                            .reward_funds
                            .find(&POST_REWARD_FUND_NAME.to_string())
                            .cloned();
                        if let Some(fund) = fund {
                            let old_weight = evaluate_reward_curve(
                                old_vote_rshares as u128,
                                fund.curation_reward_curve,
                                fund.content_constant,
                            ) as u64;
                            let new_weight = evaluate_reward_curve(
                                (old_vote_rshares + rshares) as u128,
                                fund.curation_reward_curve,
                                fund.content_constant,
                            ) as u64;
                            let full_weight = new_weight.saturating_sub(old_weight);

                            let age = now.saturating_sub(comment.created);
                            vote_weight = if age < u64::from(REVERSE_AUCTION_WINDOW_SECONDS) {
                                (u128::from(full_weight) * u128::from(age)
                                    / u128::from(REVERSE_AUCTION_WINDOW_SECONDS))
                                    as u64
                            } else {
                                full_weight
                            };
                        }
                    }

                    db.state.comments.modify(&comment_id, |c| {
                        c.total_vote_weight += vote_weight;
                    })?;

                    db.state.comment_votes.create(CommentVote {
                        comment: comment_id,
                        voter: voter.clone(),
                        weight: vote_weight,
                        rshares,
                        vote_percent: *weight,
                        last_update: now,
                        num_changes: 0,
                    })?;
                }
                Some(old_vote) => {
                    require!(
                        old_vote.num_changes >= 0,
                        "this vote was consumed by a payout"
                    );
                    require!(
                        old_vote.num_changes < MAX_VOTE_CHANGES,
                        "this vote has been changed too many times"
                    );
                    require!(
                        old_vote.vote_percent != *weight,
                        "the vote already has this weight"
                    );

                    db.state.accounts.modify(voter, |a| {
                        a.voting_power = current_power - used_power as u16;
                        a.last_vote_time = now;
                    })?;

                    db.state.comments.modify(&comment_id, |c| {
                        c.net_rshares -= old_vote.rshares;
                        c.net_rshares += rshares;
                        c.abs_rshares += abs_rshares;
                        // An edited vote forfeits its curation weight.
                        c.total_vote_weight -= old_vote.weight;
                        match (old_vote.rshares > 0, rshares > 0) {
                            (true, false) => c.net_votes -= 2,
                            (false, true) => c.net_votes += 2,
                            _ => {}
                        }
                    })?;

                    db.state.comment_votes.modify(&vote_id, |v| {
                        v.rshares = rshares;
                        v.vote_percent = *weight;
                        v.last_update = now;
                        v.weight = 0;
                        v.num_changes += 1;
                    })?;
                }
            }
            Ok(())
        })
    }
}
