//! Comment reward payout.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::{
    PERCENT_100, RECENT_CLAIMS_DECAY_RATE_HF17_SEC, RECENT_CLAIMS_DECAY_RATE_HF19_SEC,
    SECOND_CASHOUT_WINDOW,
};
use ec_reward_math::{ember_reward, evaluate_reward_curve, CommentRewardContext, RewardError};
use ec_state_store::CommentId;
use primitive_types::U256;
use shared_types::operations::VirtualOperation;
use shared_types::{AccountName, Asset, TimePointSec};

struct FundContext {
    name: String,
    recent_claims: u128,
    reward_balance: Asset,
    ember_awarded: i64,
}

impl Database {
    /// Pay out every comment whose cashout time has arrived.
    ///
    /// Two passes per fund: first every due comment's curve value joins
    /// `recent_claims` so each claim is divided by the same denominator,
    /// then each comment is paid against that snapshot.
    pub(crate) fn process_comment_cashout(&mut self) -> Result<(), ChainError> {
        // No content is paid before the fund system exists.
        if !self.has_hardfork(17) {
            return Ok(());
        }

        let now = self.head_block_time();
        let decay_rate = if self.has_hardfork(19) {
            RECENT_CLAIMS_DECAY_RATE_HF19_SEC
        } else {
            RECENT_CLAIMS_DECAY_RATE_HF17_SEC
        };

        let mut funds: Vec<FundContext> = Vec::new();
        for name in self.state.reward_funds.ids() {
            self.state.reward_funds.modify(&name, |rfo| {
                let elapsed = now.saturating_sub(rfo.last_update);
                let decayed = U256::from(rfo.recent_claims) * U256::from(elapsed)
                    / U256::from(decay_rate);
                rfo.recent_claims -= decayed.as_u128();
                rfo.last_update = now;
            })?;
            let fund = self.state.reward_funds.get(&name)?;
            funds.push(FundContext {
                name: name.clone(),
                recent_claims: fund.recent_claims,
                reward_balance: fund.reward_balance,
                ember_awarded: 0,
            });
        }

        // First pass: accumulate the claims of everything due this block.
        let mut due: Vec<CommentId> = Vec::new();
        for (cashout, id) in self.state.comments.index_iter() {
            if *cashout > now {
                break;
            }
            due.push(id.clone());
        }
        for id in &due {
            let comment = self.state.comments.get(id)?;
            if comment.net_rshares > 0 {
                let fund = self.fund_context_for(&funds)?;
                let rf = self.state.reward_funds.get(&funds[fund].name)?;
                funds[fund].recent_claims += evaluate_reward_curve(
                    comment.net_rshares as u128,
                    rf.author_reward_curve,
                    rf.content_constant,
                );
            }
        }

        // Second pass: pay each comment against the snapshot.
        for id in &due {
            let fund = self.fund_context_for(&funds)?;
            let claimed = self.cashout_comment_helper(
                id,
                funds[fund].recent_claims,
                funds[fund].reward_balance,
            )?;
            funds[fund].ember_awarded += claimed;
        }

        for ctx in funds {
            self.state.reward_funds.modify(&ctx.name, |rfo| {
                rfo.recent_claims = ctx.recent_claims;
                rfo.reward_balance -= Asset::ember(ctx.ember_awarded);
            })?;
        }
        Ok(())
    }

    /// Which fund pays a comment. All comments pay from the post fund.
    fn fund_context_for(&self, funds: &[FundContext]) -> Result<usize, ChainError> {
        debug_assert!(!funds.is_empty(), "cashout without a reward fund");
        Ok(0)
    }

    fn cashout_comment_helper(
        &mut self,
        comment_id: &CommentId,
        total_claims: u128,
        reward_fund_ember: Asset,
    ) -> Result<i64, ChainError> {
        let comment = self.state.comments.get(comment_id)?.clone();
        let now = self.head_block_time();
        let mut claimed_reward = 0i64;

        if comment.net_rshares > 0 {
            let fund_name = self.state.reward_funds.ids().remove(0);
            let rf = self.state.reward_funds.get(&fund_name)?.clone();

            let ctx = CommentRewardContext {
                rshares: comment.net_rshares,
                reward_weight: comment.reward_weight,
                max_eusd: comment.max_accepted_payout,
                total_claims,
                reward_fund_ember,
                curve: rf.author_reward_curve,
                content_constant: rf.content_constant,
                current_median: self.feed_median(),
            };
            let reward_tokens = match ember_reward(&ctx) {
                Ok(r) => r as i64,
                Err(RewardError::NoClaims) => 0,
                Err(e) => {
                    return Err(ChainError::EvaluatorReject(format!(
                        "comment payout failed: {e}"
                    )))
                }
            };

            if reward_tokens > 0 {
                let curation_percent = self.get_curation_rewards_percent(&fund_name)?;
                let mut curation_tokens =
                    reward_tokens * i64::from(curation_percent) / i64::from(PERCENT_100);
                let mut author_tokens = reward_tokens - curation_tokens;

                author_tokens += self.pay_curators(&comment, &mut curation_tokens)?;
                claimed_reward = author_tokens + curation_tokens;

                let mut total_beneficiary = 0i64;
                for route in &comment.beneficiaries {
                    let benefactor_tokens =
                        author_tokens * i64::from(route.weight) / i64::from(PERCENT_100);
                    let reward = self.create_vesting(
                        &route.account,
                        Asset::ember(benefactor_tokens),
                        true,
                    )?;
                    self.push_virtual_operation(VirtualOperation::CommentBenefactorReward {
                        benefactor: route.account.clone(),
                        author: comment.author.clone(),
                        permlink: comment.permlink.clone(),
                        reward,
                    });
                    total_beneficiary += benefactor_tokens;
                }
                author_tokens -= total_beneficiary;

                let eusd_ember =
                    author_tokens * i64::from(comment.percent_eusd) / (2 * i64::from(PERCENT_100));
                let vesting_ember = author_tokens - eusd_ember;

                let vesting_payout =
                    self.create_vesting(&comment.author, Asset::ember(vesting_ember), true)?;
                let (eusd_payout, kept_ember) =
                    self.create_eusd(&comment.author, Asset::ember(eusd_ember), true)?;

                self.adjust_total_payout(
                    comment_id,
                    eusd_payout + self.to_eusd(kept_ember + Asset::ember(vesting_ember)),
                    self.to_eusd(Asset::ember(curation_tokens)),
                    self.to_eusd(Asset::ember(total_beneficiary)),
                )?;

                self.push_virtual_operation(VirtualOperation::AuthorReward {
                    author: comment.author.clone(),
                    permlink: comment.permlink.clone(),
                    eusd_payout,
                    ember_payout: kept_ember,
                    vesting_payout,
                });
                self.push_virtual_operation(VirtualOperation::CommentReward {
                    author: comment.author.clone(),
                    permlink: comment.permlink.clone(),
                    payout: self.to_eusd(Asset::ember(claimed_reward)),
                });

                self.state
                    .comments
                    .modify(comment_id, |c| c.author_rewards += author_tokens)?;
                self.state
                    .accounts
                    .modify(&comment.author, |a| a.posting_rewards += author_tokens)?;
            }
        }

        let has_hf17 = self.has_hardfork(17);
        let has_hf12 = self.has_hardfork(12);
        self.state.comments.modify(comment_id, |c| {
            // Negative rshares hang around for the next upvote.
            if c.net_rshares > 0 {
                c.net_rshares = 0;
            }
            c.children_abs_rshares = 0;
            c.abs_rshares = 0;
            c.vote_rshares = 0;
            c.total_vote_weight = 0;
            c.max_cashout_time = TimePointSec::MAX;

            if has_hf17 {
                c.cashout_time = TimePointSec::MAX;
            } else if c.parent_author.is_none() {
                if has_hf12 && c.last_payout == TimePointSec::MIN {
                    c.cashout_time = now + SECOND_CASHOUT_WINDOW;
                } else {
                    c.cashout_time = TimePointSec::MAX;
                }
            }

            c.last_payout = now;
        })?;

        self.push_virtual_operation(VirtualOperation::CommentPayoutUpdate {
            author: comment.author.clone(),
            permlink: comment.permlink.clone(),
        });

        // Spend or clear the votes behind this payout.
        let votes: Vec<(CommentId, AccountName)> = self
            .state
            .comment_votes
            .range((comment_id.clone(), AccountName::none())..)
            .take_while(|v| v.comment == *comment_id)
            .map(|v| (v.comment.clone(), v.voter.clone()))
            .collect();
        let final_payout =
            self.calculate_discussion_payout_time(comment_id)? == TimePointSec::MAX;
        for vote_id in votes {
            if !final_payout {
                self.state.comment_votes.modify(&vote_id, |v| v.num_changes = -1)?;
            } else {
                self.state.comment_votes.remove(&vote_id)?;
            }
        }

        Ok(claimed_reward)
    }

    /// Give each curator `max_rewards * weight / total_vote_weight`. The
    /// remainder stays with the author; with curation disabled the whole
    /// pool is forfeited back to the fund.
    fn pay_curators(
        &mut self,
        comment: &ec_state_store::Comment,
        max_rewards: &mut i64,
    ) -> Result<i64, ChainError> {
        let pool = *max_rewards;
        let mut unclaimed_rewards = pool;

        if !comment.allow_curation_rewards {
            unclaimed_rewards = 0;
            *max_rewards = 0;
        } else if comment.total_vote_weight > 0 {
            let total_weight = u128::from(comment.total_vote_weight);
            let comment_id = comment.comment_id();

            // Strongest votes first; ties by voter ascending.
            let mut votes: Vec<(u64, AccountName)> = self
                .state
                .comment_votes
                .range((comment_id.clone(), AccountName::none())..)
                .take_while(|v| v.comment == comment_id)
                .map(|v| (v.weight, v.voter.clone()))
                .collect();
            votes.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

            let has_hf17 = self.has_hardfork(17);
            for (weight, voter) in votes {
                let claim =
                    ((u128::from(pool as u64) * u128::from(weight)) / total_weight) as i64;
                if claim > 0 {
                    unclaimed_rewards -= claim;
                    let reward = self.create_vesting(&voter, Asset::ember(claim), has_hf17)?;
                    self.push_virtual_operation(VirtualOperation::CurationReward {
                        curator: voter.clone(),
                        reward,
                        comment_author: comment.author.clone(),
                        comment_permlink: comment.permlink.clone(),
                    });
                    self.state
                        .accounts
                        .modify(&voter, |a| a.curation_rewards += claim)?;
                }
            }
        }
        *max_rewards -= unclaimed_rewards;

        Ok(unclaimed_rewards)
    }

    fn adjust_total_payout(
        &mut self,
        comment_id: &CommentId,
        eusd_created: Asset,
        curator_eusd_value: Asset,
        beneficiary_value: Asset,
    ) -> Result<(), ChainError> {
        self.state.comments.modify(comment_id, |c| {
            if c.total_payout_value.symbol == eusd_created.symbol {
                c.total_payout_value += eusd_created;
            }
            c.curator_payout_value += curator_eusd_value;
            c.beneficiary_payout_value += beneficiary_value;
        })?;
        Ok(())
    }

    /// When a comment's discussion pays out: its own cashout time, except
    /// pre-fund replies which follow their root post.
    pub(crate) fn calculate_discussion_payout_time(
        &self,
        comment_id: &CommentId,
    ) -> Result<TimePointSec, ChainError> {
        let comment = self.state.comments.get(comment_id)?;
        if self.has_hardfork(17) || comment.parent_author.is_none() {
            Ok(comment.cashout_time)
        } else {
            Ok(self.state.comments.get(&comment.root_comment)?.cashout_time)
        }
    }
}
