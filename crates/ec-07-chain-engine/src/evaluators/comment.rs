//! Content creation evaluators.

use super::expect_op;
use crate::database::Database;
use crate::domain::error::{require, ChainError};
use crate::ports::registry::Evaluator;
use ec_chain_params::{
    CASHOUT_WINDOW_SECONDS, CASHOUT_WINDOW_SECONDS_PRE_HF12, CASHOUT_WINDOW_SECONDS_PRE_HF17,
    MIN_REPLY_INTERVAL_SEC, MIN_ROOT_COMMENT_INTERVAL_SEC, SOFT_MAX_COMMENT_DEPTH,
};
use ec_state_store::{Comment, CommentId};
use shared_types::{AccountName, Operation, TimePointSec};

pub struct CommentEvaluator;

impl Evaluator for CommentEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::Comment { parent_author, parent_permlink, author, permlink, title, body, json_metadata } => {
            let id: CommentId = (author.clone(), permlink.clone());
            let now = db.head_block_time();

            if db.state.comments.contains(&id) {
                // An edit; rshares and payout schedule stay untouched.
                db.state.comments.modify(&id, |c| {
                    c.title = title.clone();
                    c.body = body.clone();
                    c.json_metadata = json_metadata.clone();
                    c.last_update = now;
                })?;
                return Ok(());
            }

            let account = db.state.get_account(author)?.clone();
            let parent = if parent_author.is_none() {
                require!(
                    now.saturating_sub(account.last_root_post)
                        >= u64::from(MIN_ROOT_COMMENT_INTERVAL_SEC),
                    "root posts are limited to one per {MIN_ROOT_COMMENT_INTERVAL_SEC} seconds"
                );
                None
            } else {
                require!(
                    now.saturating_sub(account.last_post) >= u64::from(MIN_REPLY_INTERVAL_SEC),
                    "replies are limited to one per {MIN_REPLY_INTERVAL_SEC} seconds"
                );
                let parent_id: CommentId = (parent_author.clone(), parent_permlink.clone());
                let parent = db.state.comments.get(&parent_id)?.clone();
                require!(
                    parent.depth < SOFT_MAX_COMMENT_DEPTH,
                    "comment nesting is too deep"
                );
                Some(parent)
            };

            let mut comment = Comment::new(author.clone(), permlink.clone(), now);
            comment.title = title.clone();
            comment.body = body.clone();
            comment.json_metadata = json_metadata.clone();

            if db.has_hardfork(17) {
                comment.cashout_time = now + CASHOUT_WINDOW_SECONDS;
            } else if parent.is_none() {
                comment.cashout_time = now
                    + if db.has_hardfork(12) {
                        CASHOUT_WINDOW_SECONDS_PRE_HF17
                    } else {
                        CASHOUT_WINDOW_SECONDS_PRE_HF12
                    };
            } else {
                comment.cashout_time = TimePointSec::MAX;
            }

            if let Some(parent) = &parent {
                comment.parent_author = parent.author.clone();
                comment.parent_permlink = parent.permlink.clone();
                comment.root_comment = parent.root_comment.clone();
                comment.depth = parent.depth + 1;
            } else {
                comment.parent_permlink = parent_permlink.clone();
            }

            db.state.comments.create(comment)?;

            db.state.accounts.modify(author, |a| {
                a.last_post = now;
                if parent_author.is_none() {
                    a.last_root_post = now;
                }
            })?;

            // Bump the children counter up the whole discussion.
            let mut cursor = parent.map(|p| p.comment_id());
            while let Some(parent_id) = cursor {
                let parent_row = db.state.comments.get(&parent_id)?.clone();
                db.state.comments.modify(&parent_id, |c| c.children += 1)?;
                cursor = (!parent_row.parent_author.is_none()).then(|| {
                    (parent_row.parent_author.clone(), parent_row.parent_permlink.clone())
                });
            }
            Ok(())
        })
    }
}

pub struct CommentOptionsEvaluator;

impl Evaluator for CommentOptionsEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::CommentOptions { author, permlink, max_accepted_payout, percent_eusd, allow_votes, allow_curation_rewards, beneficiaries } => {
            let id: CommentId = (author.clone(), permlink.clone());
            let comment = db.state.comments.get(&id)?.clone();

            // Options can only tighten, never loosen.
            require!(
                comment.max_accepted_payout >= *max_accepted_payout,
                "the maximum payout can only be lowered"
            );
            require!(
                comment.percent_eusd >= *percent_eusd,
                "the EUSD split can only be lowered"
            );
            require!(
                comment.allow_votes || !*allow_votes,
                "votes cannot be re-enabled"
            );
            require!(
                comment.allow_curation_rewards || !*allow_curation_rewards,
                "curation rewards cannot be re-enabled"
            );
            if !beneficiaries.is_empty() {
                require!(
                    comment.beneficiaries.is_empty(),
                    "beneficiaries are already set"
                );
                require!(
                    comment.abs_rshares == 0,
                    "beneficiaries must be set before any votes"
                );
            }

            for route in beneficiaries {
                db.state.get_account(&route.account)?;
            }

            db.state.comments.modify(&id, |c| {
                c.max_accepted_payout = *max_accepted_payout;
                c.percent_eusd = *percent_eusd;
                c.allow_votes = *allow_votes;
                c.allow_curation_rewards = *allow_curation_rewards;
                if !beneficiaries.is_empty() {
                    c.beneficiaries = beneficiaries.clone();
                }
            })?;
            Ok(())
        })
    }
}

pub struct DeleteCommentEvaluator;

impl Evaluator for DeleteCommentEvaluator {
    fn apply(&self, db: &mut Database, op: &Operation) -> Result<(), ChainError> {
        expect_op!(op, Operation::DeleteComment { author, permlink } => {
            let id: CommentId = (author.clone(), permlink.clone());
            let comment = db.state.comments.get(&id)?.clone();

            require!(comment.children == 0, "a comment with replies cannot be deleted");
            require!(
                comment.net_rshares <= 0,
                "a comment with positive votes cannot be deleted"
            );
            if db.has_hardfork(19) {
                require!(
                    comment.cashout_time != TimePointSec::MAX,
                    "a paid-out comment cannot be deleted"
                );
            }

            // Drop its votes first.
            let votes: Vec<(CommentId, AccountName)> = db
                .state
                .comment_votes
                .range((id.clone(), AccountName::none())..)
                .take_while(|v| v.comment == id)
                .map(|v| (v.comment.clone(), v.voter.clone()))
                .collect();
            for vote_id in votes {
                db.state.comment_votes.remove(&vote_id)?;
            }

            // And walk the children counters back down.
            let mut cursor = (!comment.parent_author.is_none())
                .then(|| (comment.parent_author.clone(), comment.parent_permlink.clone()));
            while let Some(parent_id) = cursor {
                let parent_row = db.state.comments.get(&parent_id)?.clone();
                db.state.comments.modify(&parent_id, |c| c.children -= 1)?;
                cursor = (!parent_row.parent_author.is_none()).then(|| {
                    (parent_row.parent_author.clone(), parent_row.parent_permlink.clone())
                });
            }

            db.state.comments.remove(&id)?;
            Ok(())
        })
    }
}
