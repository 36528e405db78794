//! The operation variants carried by transactions, their structural
//! validation, and the authority each one requires.
//!
//! Virtual operations are never carried by transactions; the engine emits
//! them through the notification bus so indexers observe payouts, fills and
//! hardforks in-stream.

use crate::asset::{Asset, AssetSymbol, Price};
use crate::crypto::PublicKey;
use crate::ids::AccountName;
use crate::time::TimePointSec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 100% in basis points. All protocol percentages are u16 basis points.
pub const PERCENT_100: u16 = 10_000;
/// 1% in basis points.
pub const PERCENT_1: u16 = PERCENT_100 / 100;

const MAX_MEMO_SIZE: usize = 2_048;
const MAX_PERMLINK_LENGTH: usize = 256;
const MAX_WITNESS_URL_LENGTH: usize = 2_048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("virtual operation in transaction")]
    VirtualOperation,

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("wrong asset symbol for {0}")]
    WrongSymbol(&'static str),

    #[error("percent out of range")]
    PercentOutOfRange,

    #[error("{0} too long")]
    FieldTooLong(&'static str),

    #[error("{0}")]
    Other(&'static str),
}

/// Which authority class an operation requires of an account.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuthorityKind {
    Owner,
    Active,
    Posting,
}

/// A pre-split share of an author payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryRoute {
    pub account: AccountName,
    /// Basis points of the author reward.
    pub weight: u16,
}

/// Witness-published chain properties, medianized by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
    pub eusd_interest_rate: u16,
}

impl Default for ChainProperties {
    fn default() -> Self {
        ChainProperties {
            account_creation_fee: Asset::ember(1_000),
            maximum_block_size: 65_536,
            eusd_interest_rate: 10 * PERCENT_1,
        }
    }
}

/// Operations emitted by the engine itself, visible only on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualOperation {
    AuthorReward {
        author: AccountName,
        permlink: String,
        eusd_payout: Asset,
        ember_payout: Asset,
        vesting_payout: Asset,
    },
    CurationReward {
        curator: AccountName,
        reward: Asset,
        comment_author: AccountName,
        comment_permlink: String,
    },
    CommentReward {
        author: AccountName,
        permlink: String,
        payout: Asset,
    },
    CommentBenefactorReward {
        benefactor: AccountName,
        author: AccountName,
        permlink: String,
        reward: Asset,
    },
    CommentPayoutUpdate {
        author: AccountName,
        permlink: String,
    },
    FillConvertRequest {
        owner: AccountName,
        request_id: u32,
        amount_in: Asset,
        amount_out: Asset,
    },
    FillVestingWithdraw {
        from_account: AccountName,
        to_account: AccountName,
        withdrawn: Asset,
        deposited: Asset,
    },
    FillOrder {
        current_owner: AccountName,
        current_order_id: u32,
        current_pays: Asset,
        open_owner: AccountName,
        open_order_id: u32,
        open_pays: Asset,
    },
    FillTransferFromSavings {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        request_id: u32,
        memo: String,
    },
    ShutdownWitness {
        owner: AccountName,
    },
    ProducerReward {
        producer: AccountName,
        vesting_shares: Asset,
    },
    Interest {
        owner: AccountName,
        interest: Asset,
    },
    LiquidityReward {
        owner: AccountName,
        payout: Asset,
    },
    ReturnVestingDelegation {
        account: AccountName,
        vesting_shares: Asset,
    },
    Hardfork {
        hardfork_id: u32,
    },
}

/// Every operation a transaction can carry, plus the virtual kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    AccountCreate {
        fee: Asset,
        creator: AccountName,
        new_account_name: AccountName,
        owner: PublicKey,
        active: PublicKey,
        posting: PublicKey,
        memo_key: PublicKey,
    },
    AccountUpdate {
        account: AccountName,
        owner: Option<PublicKey>,
        active: Option<PublicKey>,
        posting: Option<PublicKey>,
        memo_key: Option<PublicKey>,
    },
    Transfer {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        memo: String,
    },
    TransferToVesting {
        from: AccountName,
        /// Empty means "to self".
        to: AccountName,
        amount: Asset,
    },
    WithdrawVesting {
        account: AccountName,
        vesting_shares: Asset,
    },
    SetWithdrawVestingRoute {
        from_account: AccountName,
        to_account: AccountName,
        percent: u16,
        auto_vest: bool,
    },
    WitnessUpdate {
        owner: AccountName,
        url: String,
        block_signing_key: PublicKey,
        props: ChainProperties,
    },
    AccountWitnessVote {
        account: AccountName,
        witness: AccountName,
        approve: bool,
    },
    AccountWitnessProxy {
        account: AccountName,
        /// Empty clears the proxy.
        proxy: AccountName,
    },
    Comment {
        parent_author: AccountName,
        parent_permlink: String,
        author: AccountName,
        permlink: String,
        title: String,
        body: String,
        json_metadata: String,
    },
    CommentOptions {
        author: AccountName,
        permlink: String,
        max_accepted_payout: Asset,
        percent_eusd: u16,
        allow_votes: bool,
        allow_curation_rewards: bool,
        beneficiaries: Vec<BeneficiaryRoute>,
    },
    DeleteComment {
        author: AccountName,
        permlink: String,
    },
    Vote {
        voter: AccountName,
        author: AccountName,
        permlink: String,
        weight: i16,
    },
    Convert {
        owner: AccountName,
        request_id: u32,
        amount: Asset,
    },
    FeedPublish {
        publisher: AccountName,
        exchange_rate: Price,
    },
    LimitOrderCreate {
        owner: AccountName,
        order_id: u32,
        amount_to_sell: Asset,
        min_to_receive: Asset,
        fill_or_kill: bool,
        expiration: TimePointSec,
    },
    LimitOrderCancel {
        owner: AccountName,
        order_id: u32,
    },
    TransferToSavings {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        memo: String,
    },
    TransferFromSavings {
        from: AccountName,
        request_id: u32,
        to: AccountName,
        amount: Asset,
        memo: String,
    },
    CancelTransferFromSavings {
        from: AccountName,
        request_id: u32,
    },
    EscrowTransfer {
        from: AccountName,
        to: AccountName,
        agent: AccountName,
        escrow_id: u32,
        eusd_amount: Asset,
        ember_amount: Asset,
        fee: Asset,
        ratification_deadline: TimePointSec,
        escrow_expiration: TimePointSec,
        json_meta: String,
    },
    EscrowApprove {
        from: AccountName,
        to: AccountName,
        agent: AccountName,
        who: AccountName,
        escrow_id: u32,
        approve: bool,
    },
    EscrowDispute {
        from: AccountName,
        to: AccountName,
        agent: AccountName,
        who: AccountName,
        escrow_id: u32,
    },
    EscrowRelease {
        from: AccountName,
        to: AccountName,
        agent: AccountName,
        who: AccountName,
        receiver: AccountName,
        escrow_id: u32,
        eusd_amount: Asset,
        ember_amount: Asset,
    },
    ChangeRecoveryAccount {
        account_to_recover: AccountName,
        new_recovery_account: AccountName,
    },
    DeclineVotingRights {
        account: AccountName,
        decline: bool,
    },
    ClaimRewardBalance {
        account: AccountName,
        reward_ember: Asset,
        reward_eusd: Asset,
        reward_vests: Asset,
    },
    DelegateVestingShares {
        delegator: AccountName,
        delegatee: AccountName,
        vesting_shares: Asset,
    },
    Custom {
        required_auths: Vec<AccountName>,
        id: u16,
        data: Vec<u8>,
    },
    Virtual(VirtualOperation),
}

fn require_positive(a: &Asset) -> Result<(), OperationError> {
    if a.amount <= 0 {
        return Err(OperationError::NonPositiveAmount);
    }
    Ok(())
}

fn require_symbol(a: &Asset, symbol: AssetSymbol, what: &'static str) -> Result<(), OperationError> {
    if a.symbol != symbol {
        return Err(OperationError::WrongSymbol(what));
    }
    Ok(())
}

fn require_liquid(a: &Asset, what: &'static str) -> Result<(), OperationError> {
    match a.symbol {
        AssetSymbol::Ember | AssetSymbol::Eusd => Ok(()),
        AssetSymbol::Vests => Err(OperationError::WrongSymbol(what)),
    }
}

impl Operation {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Operation::Virtual(_))
    }

    /// The variant tag, used as the evaluator dispatch key and in logs.
    pub fn name(&self) -> &'static str {
        use Operation::*;
        match self {
            AccountCreate { .. } => "account_create",
            AccountUpdate { .. } => "account_update",
            Transfer { .. } => "transfer",
            TransferToVesting { .. } => "transfer_to_vesting",
            WithdrawVesting { .. } => "withdraw_vesting",
            SetWithdrawVestingRoute { .. } => "set_withdraw_vesting_route",
            WitnessUpdate { .. } => "witness_update",
            AccountWitnessVote { .. } => "account_witness_vote",
            AccountWitnessProxy { .. } => "account_witness_proxy",
            Comment { .. } => "comment",
            CommentOptions { .. } => "comment_options",
            DeleteComment { .. } => "delete_comment",
            Vote { .. } => "vote",
            Convert { .. } => "convert",
            FeedPublish { .. } => "feed_publish",
            LimitOrderCreate { .. } => "limit_order_create",
            LimitOrderCancel { .. } => "limit_order_cancel",
            TransferToSavings { .. } => "transfer_to_savings",
            TransferFromSavings { .. } => "transfer_from_savings",
            CancelTransferFromSavings { .. } => "cancel_transfer_from_savings",
            EscrowTransfer { .. } => "escrow_transfer",
            EscrowApprove { .. } => "escrow_approve",
            EscrowDispute { .. } => "escrow_dispute",
            EscrowRelease { .. } => "escrow_release",
            ChangeRecoveryAccount { .. } => "change_recovery_account",
            DeclineVotingRights { .. } => "decline_voting_rights",
            ClaimRewardBalance { .. } => "claim_reward_balance",
            DelegateVestingShares { .. } => "delegate_vesting_shares",
            Custom { .. } => "custom",
            Virtual(_) => "virtual",
        }
    }

    /// Structural validation: everything checkable without chain state.
    pub fn validate(&self) -> Result<(), OperationError> {
        use Operation::*;
        match self {
            AccountCreate { fee, .. } => {
                require_symbol(fee, AssetSymbol::Ember, "account creation fee")?;
                if fee.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                Ok(())
            }
            AccountUpdate {
                owner,
                active,
                posting,
                memo_key,
                ..
            } => {
                if owner.is_none() && active.is_none() && posting.is_none() && memo_key.is_none() {
                    return Err(OperationError::Other("account update changes nothing"));
                }
                Ok(())
            }
            Transfer { amount, memo, .. } | TransferToSavings { amount, memo, .. } => {
                require_positive(amount)?;
                require_liquid(amount, "transfer amount")?;
                if memo.len() > MAX_MEMO_SIZE {
                    return Err(OperationError::FieldTooLong("memo"));
                }
                Ok(())
            }
            TransferToVesting { amount, .. } => {
                require_positive(amount)?;
                require_symbol(amount, AssetSymbol::Ember, "vesting deposit")
            }
            WithdrawVesting { vesting_shares, .. } => {
                require_symbol(vesting_shares, AssetSymbol::Vests, "vesting withdrawal")?;
                if vesting_shares.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                Ok(())
            }
            SetWithdrawVestingRoute {
                from_account,
                to_account,
                percent,
                ..
            } => {
                if *percent > PERCENT_100 {
                    return Err(OperationError::PercentOutOfRange);
                }
                if from_account == to_account {
                    return Err(OperationError::Other("cannot route a withdrawal to itself"));
                }
                Ok(())
            }
            ChangeRecoveryAccount { .. } => Ok(()),
            WitnessUpdate { url, props, .. } => {
                if url.len() > MAX_WITNESS_URL_LENGTH {
                    return Err(OperationError::FieldTooLong("witness url"));
                }
                require_symbol(&props.account_creation_fee, AssetSymbol::Ember, "creation fee")?;
                if props.eusd_interest_rate > PERCENT_100 {
                    return Err(OperationError::PercentOutOfRange);
                }
                Ok(())
            }
            AccountWitnessVote { .. } | AccountWitnessProxy { .. } => Ok(()),
            Comment {
                permlink,
                parent_permlink,
                title,
                body,
                ..
            } => {
                if permlink.len() > MAX_PERMLINK_LENGTH || parent_permlink.len() > MAX_PERMLINK_LENGTH
                {
                    return Err(OperationError::FieldTooLong("permlink"));
                }
                if title.len() > 256 {
                    return Err(OperationError::FieldTooLong("title"));
                }
                if body.is_empty() {
                    return Err(OperationError::Other("comment body is empty"));
                }
                Ok(())
            }
            CommentOptions {
                max_accepted_payout,
                percent_eusd,
                beneficiaries,
                ..
            } => {
                require_symbol(max_accepted_payout, AssetSymbol::Eusd, "max accepted payout")?;
                if max_accepted_payout.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if *percent_eusd > PERCENT_100 {
                    return Err(OperationError::PercentOutOfRange);
                }
                if beneficiaries.len() > 8 {
                    return Err(OperationError::Other("too many beneficiaries"));
                }
                let mut total: u32 = 0;
                let mut prev: Option<&AccountName> = None;
                for route in beneficiaries {
                    if let Some(p) = prev {
                        if p >= &route.account {
                            return Err(OperationError::Other(
                                "beneficiaries must be unique and sorted",
                            ));
                        }
                    }
                    total += u32::from(route.weight);
                    prev = Some(&route.account);
                }
                if total > u32::from(PERCENT_100) {
                    return Err(OperationError::PercentOutOfRange);
                }
                Ok(())
            }
            DeleteComment { permlink, .. } => {
                if permlink.len() > MAX_PERMLINK_LENGTH {
                    return Err(OperationError::FieldTooLong("permlink"));
                }
                Ok(())
            }
            Vote { weight, .. } => {
                if weight.unsigned_abs() > PERCENT_100 {
                    return Err(OperationError::PercentOutOfRange);
                }
                Ok(())
            }
            Convert { amount, .. } => {
                require_positive(amount)?;
                require_symbol(amount, AssetSymbol::Eusd, "conversion amount")
            }
            FeedPublish { exchange_rate, .. } => {
                if exchange_rate.base.symbol != AssetSymbol::Eusd
                    || exchange_rate.quote.symbol != AssetSymbol::Ember
                {
                    return Err(OperationError::WrongSymbol("exchange rate"));
                }
                if exchange_rate.is_null() {
                    return Err(OperationError::Other("null exchange rate"));
                }
                Ok(())
            }
            LimitOrderCreate {
                amount_to_sell,
                min_to_receive,
                ..
            } => {
                require_positive(amount_to_sell)?;
                require_positive(min_to_receive)?;
                require_liquid(amount_to_sell, "order sell amount")?;
                require_liquid(min_to_receive, "order receive amount")?;
                if amount_to_sell.symbol == min_to_receive.symbol {
                    return Err(OperationError::Other("order must cross the market"));
                }
                Ok(())
            }
            LimitOrderCancel { .. } | CancelTransferFromSavings { .. } => Ok(()),
            TransferFromSavings { amount, memo, .. } => {
                require_positive(amount)?;
                require_liquid(amount, "savings withdrawal")?;
                if memo.len() > MAX_MEMO_SIZE {
                    return Err(OperationError::FieldTooLong("memo"));
                }
                Ok(())
            }
            EscrowTransfer {
                from,
                to,
                agent,
                eusd_amount,
                ember_amount,
                fee,
                ratification_deadline,
                escrow_expiration,
                ..
            } => {
                require_symbol(eusd_amount, AssetSymbol::Eusd, "escrow eusd")?;
                require_symbol(ember_amount, AssetSymbol::Ember, "escrow ember")?;
                if eusd_amount.amount < 0 || ember_amount.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if eusd_amount.amount + ember_amount.amount == 0 {
                    return Err(OperationError::Other("escrow must carry funds"));
                }
                require_liquid(fee, "escrow fee")?;
                if fee.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if from == to || from == agent || to == agent {
                    return Err(OperationError::Other("escrow parties must be distinct"));
                }
                if ratification_deadline >= escrow_expiration {
                    return Err(OperationError::Other(
                        "ratification deadline must precede expiration",
                    ));
                }
                Ok(())
            }
            EscrowApprove { who, from, agent, to, .. } | EscrowDispute { who, from, agent, to, .. } => {
                if who != from && who != to && who != agent {
                    return Err(OperationError::Other("who must be a party to the escrow"));
                }
                Ok(())
            }
            EscrowRelease {
                who,
                from,
                to,
                agent,
                receiver,
                eusd_amount,
                ember_amount,
                ..
            } => {
                require_symbol(eusd_amount, AssetSymbol::Eusd, "escrow eusd")?;
                require_symbol(ember_amount, AssetSymbol::Ember, "escrow ember")?;
                if eusd_amount.amount < 0 || ember_amount.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if eusd_amount.amount + ember_amount.amount == 0 {
                    return Err(OperationError::Other("release must carry funds"));
                }
                if who != from && who != to && who != agent {
                    return Err(OperationError::Other("who must be a party to the escrow"));
                }
                if receiver != from && receiver != to {
                    return Err(OperationError::Other("receiver must be from or to"));
                }
                Ok(())
            }
            DeclineVotingRights { .. } => Ok(()),
            ClaimRewardBalance {
                reward_ember,
                reward_eusd,
                reward_vests,
                ..
            } => {
                require_symbol(reward_ember, AssetSymbol::Ember, "reward claim")?;
                require_symbol(reward_eusd, AssetSymbol::Eusd, "reward claim")?;
                require_symbol(reward_vests, AssetSymbol::Vests, "reward claim")?;
                if reward_ember.amount < 0 || reward_eusd.amount < 0 || reward_vests.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if reward_ember.amount + reward_eusd.amount + reward_vests.amount == 0 {
                    return Err(OperationError::Other("must claim something"));
                }
                Ok(())
            }
            DelegateVestingShares {
                delegator,
                delegatee,
                vesting_shares,
            } => {
                require_symbol(vesting_shares, AssetSymbol::Vests, "delegation")?;
                if vesting_shares.amount < 0 {
                    return Err(OperationError::NonPositiveAmount);
                }
                if delegator == delegatee {
                    return Err(OperationError::Other("cannot delegate to self"));
                }
                Ok(())
            }
            Custom { required_auths, .. } => {
                if required_auths.is_empty() {
                    return Err(OperationError::Other("custom op requires an authority"));
                }
                Ok(())
            }
            Virtual(_) => Err(OperationError::VirtualOperation),
        }
    }

    /// Collect the accounts whose authority this operation requires.
    pub fn required_authorities(&self) -> Vec<(AccountName, AuthorityKind)> {
        use Operation::*;
        match self {
            AccountCreate { creator, .. } => vec![(creator.clone(), AuthorityKind::Active)],
            AccountUpdate { account, owner, .. } => {
                let kind = if owner.is_some() {
                    AuthorityKind::Owner
                } else {
                    AuthorityKind::Active
                };
                vec![(account.clone(), kind)]
            }
            Transfer { from, .. }
            | TransferToVesting { from, .. }
            | TransferToSavings { from, .. }
            | TransferFromSavings { from, .. }
            | CancelTransferFromSavings { from, .. }
            | EscrowTransfer { from, .. } => vec![(from.clone(), AuthorityKind::Active)],
            WithdrawVesting { account, .. }
            | AccountWitnessVote { account, .. }
            | AccountWitnessProxy { account, .. } => {
                vec![(account.clone(), AuthorityKind::Active)]
            }
            SetWithdrawVestingRoute { from_account, .. } => {
                vec![(from_account.clone(), AuthorityKind::Active)]
            }
            ChangeRecoveryAccount { account_to_recover, .. } => {
                vec![(account_to_recover.clone(), AuthorityKind::Owner)]
            }
            WitnessUpdate { owner, .. } => vec![(owner.clone(), AuthorityKind::Active)],
            Comment { author, .. } | CommentOptions { author, .. } | DeleteComment { author, .. } => {
                vec![(author.clone(), AuthorityKind::Posting)]
            }
            Vote { voter, .. } => vec![(voter.clone(), AuthorityKind::Posting)],
            Convert { owner, .. } | LimitOrderCreate { owner, .. } | LimitOrderCancel { owner, .. } => {
                vec![(owner.clone(), AuthorityKind::Active)]
            }
            FeedPublish { publisher, .. } => vec![(publisher.clone(), AuthorityKind::Active)],
            EscrowApprove { who, .. } | EscrowDispute { who, .. } | EscrowRelease { who, .. } => {
                vec![(who.clone(), AuthorityKind::Active)]
            }
            DeclineVotingRights { account, .. } => vec![(account.clone(), AuthorityKind::Owner)],
            ClaimRewardBalance { account, .. } => vec![(account.clone(), AuthorityKind::Posting)],
            DelegateVestingShares { delegator, .. } => {
                vec![(delegator.clone(), AuthorityKind::Active)]
            }
            Custom { required_auths, .. } => required_auths
                .iter()
                .map(|a| (a.clone(), AuthorityKind::Active))
                .collect(),
            Virtual(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    #[test]
    fn test_transfer_validation() {
        let op = Operation::Transfer {
            from: name("alice"),
            to: name("bob"),
            amount: Asset::ember(300),
            memo: String::new(),
        };
        assert!(op.validate().is_ok());

        let bad = Operation::Transfer {
            from: name("alice"),
            to: name("bob"),
            amount: Asset::vests(300),
            memo: String::new(),
        };
        assert_eq!(bad.validate(), Err(OperationError::WrongSymbol("transfer amount")));

        let zero = Operation::Transfer {
            from: name("alice"),
            to: name("bob"),
            amount: Asset::ember(0),
            memo: String::new(),
        };
        assert_eq!(zero.validate(), Err(OperationError::NonPositiveAmount));
    }

    #[test]
    fn test_virtual_ops_rejected_in_transactions() {
        let op = Operation::Virtual(VirtualOperation::Hardfork { hardfork_id: 1 });
        assert!(op.is_virtual());
        assert_eq!(op.validate(), Err(OperationError::VirtualOperation));
        assert!(op.required_authorities().is_empty());
    }

    #[test]
    fn test_order_must_cross_market() {
        let op = Operation::LimitOrderCreate {
            owner: name("alice"),
            order_id: 1,
            amount_to_sell: Asset::ember(100),
            min_to_receive: Asset::ember(100),
            fill_or_kill: false,
            expiration: TimePointSec::MAX,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_vote_weight_bounds() {
        let mk = |weight| Operation::Vote {
            voter: name("alice"),
            author: name("bob"),
            permlink: "post".into(),
            weight,
        };
        assert!(mk(10_000).validate().is_ok());
        assert!(mk(-10_000).validate().is_ok());
        assert!(mk(10_001).validate().is_err());
    }

    #[test]
    fn test_beneficiaries_sorted_unique() {
        let mk = |routes: Vec<BeneficiaryRoute>| Operation::CommentOptions {
            author: name("alice"),
            permlink: "post".into(),
            max_accepted_payout: Asset::eusd(1_000_000),
            percent_eusd: PERCENT_100,
            allow_votes: true,
            allow_curation_rewards: true,
            beneficiaries: routes,
        };
        let sorted = vec![
            BeneficiaryRoute { account: name("ann"), weight: 100 },
            BeneficiaryRoute { account: name("bob"), weight: 200 },
        ];
        assert!(mk(sorted).validate().is_ok());

        let unsorted = vec![
            BeneficiaryRoute { account: name("bob"), weight: 100 },
            BeneficiaryRoute { account: name("ann"), weight: 200 },
        ];
        assert!(mk(unsorted).validate().is_err());
    }

    #[test]
    fn test_posting_vs_active_authority() {
        let vote = Operation::Vote {
            voter: name("alice"),
            author: name("bob"),
            permlink: "post".into(),
            weight: 100,
        };
        assert_eq!(vote.required_authorities(), vec![(name("alice"), AuthorityKind::Posting)]);

        let transfer = Operation::Transfer {
            from: name("alice"),
            to: name("bob"),
            amount: Asset::ember(1),
            memo: String::new(),
        };
        assert_eq!(
            transfer.required_authorities(),
            vec![(name("alice"), AuthorityKind::Active)]
        );
    }
}
