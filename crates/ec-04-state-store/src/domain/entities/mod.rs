//! The chain's entity (row) types and their table keys.

mod account;
mod comment;
mod global;
mod market;
mod requests;
mod witness;

pub use account::{
    Account, VestingDelegation, VestingDelegationExpiration, WithdrawVestingRoute,
};
pub use comment::{Comment, CommentId, CommentVote};
pub use global::{
    BlockSummary, FeedHistory, GlobalProperties, HardforkProperties, RewardFund,
    TransactionRecord,
};
pub use market::{ConvertRequest, Escrow, LimitOrder, LiquidityRewardBalance, SavingsWithdraw};
pub use requests::{ChangeRecoveryAccountRequest, DeclineVotingRightsRequest};
pub use witness::{Witness, WitnessScheduleSlot, WitnessScheduleState, WitnessVote};
