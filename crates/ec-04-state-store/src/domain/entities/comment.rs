//! Comments and comment votes.

use crate::domain::table::StateObject;
use serde::{Deserialize, Serialize};
use shared_types::operations::{BeneficiaryRoute, PERCENT_100};
use shared_types::{AccountName, Asset, TimePointSec};

/// A comment's natural key.
pub type CommentId = (AccountName, String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: AccountName,
    pub permlink: String,
    /// Empty author means a root post.
    pub parent_author: AccountName,
    pub parent_permlink: String,
    pub root_comment: CommentId,
    pub depth: u16,
    pub children: u32,

    pub title: String,
    pub body: String,
    pub json_metadata: String,

    pub created: TimePointSec,
    pub last_update: TimePointSec,
    pub last_payout: TimePointSec,
    pub cashout_time: TimePointSec,
    pub max_cashout_time: TimePointSec,

    pub net_rshares: i64,
    pub abs_rshares: i64,
    pub vote_rshares: i64,
    pub children_abs_rshares: i64,
    pub total_vote_weight: u64,
    pub net_votes: i32,

    pub reward_weight: u16,
    pub total_payout_value: Asset,
    pub curator_payout_value: Asset,
    pub beneficiary_payout_value: Asset,
    pub author_rewards: i64,

    pub max_accepted_payout: Asset,
    pub percent_eusd: u16,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub beneficiaries: Vec<BeneficiaryRoute>,
}

impl Comment {
    pub fn new(author: AccountName, permlink: String, created: TimePointSec) -> Self {
        let root = (author.clone(), permlink.clone());
        Comment {
            author,
            permlink,
            parent_author: AccountName::none(),
            parent_permlink: String::new(),
            root_comment: root,
            depth: 0,
            children: 0,
            title: String::new(),
            body: String::new(),
            json_metadata: String::new(),
            created,
            last_update: created,
            last_payout: TimePointSec::MIN,
            cashout_time: TimePointSec::MAX,
            max_cashout_time: TimePointSec::MAX,
            net_rshares: 0,
            abs_rshares: 0,
            vote_rshares: 0,
            children_abs_rshares: 0,
            total_vote_weight: 0,
            net_votes: 0,
            reward_weight: PERCENT_100,
            total_payout_value: Asset::eusd(0),
            curator_payout_value: Asset::eusd(0),
            beneficiary_payout_value: Asset::eusd(0),
            author_rewards: 0,
            max_accepted_payout: Asset::eusd(1_000_000_000_000),
            percent_eusd: PERCENT_100,
            allow_votes: true,
            allow_curation_rewards: true,
            beneficiaries: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_author.is_none()
    }

    pub fn comment_id(&self) -> CommentId {
        (self.author.clone(), self.permlink.clone())
    }
}

impl StateObject for Comment {
    type Id = CommentId;
    type Key = TimePointSec;

    fn id(&self) -> CommentId {
        self.comment_id()
    }

    /// Ordered by cashout time for the payout sweep.
    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.cashout_time]
    }
}

/// One voter's standing vote on one comment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentVote {
    pub comment: CommentId,
    pub voter: AccountName,
    /// Curation weight earned by this vote.
    pub weight: u64,
    pub rshares: i64,
    pub vote_percent: i16,
    pub last_update: TimePointSec,
    /// Edits used; -1 marks a vote spent by a payout.
    pub num_changes: i8,
}

impl StateObject for CommentVote {
    type Id = (CommentId, AccountName);
    type Key = ();

    fn id(&self) -> Self::Id {
        (self.comment.clone(), self.voter.clone())
    }
}
