//! Accounts, vesting withdraw routes and vesting delegations.

use crate::domain::table::StateObject;
use ec_chain_params::MAX_PROXY_RECURSION_DEPTH;
use serde::{Deserialize, Serialize};
use shared_types::{AccountName, Asset, PublicKey, TimePointSec};

/// An account row.
///
/// Authorities are single keys per role. Vesting withdrawal state tracks the
/// running tranche schedule; `proxied_vsf_votes[i]` carries vote weight
/// proxied through exactly `i + 1` hops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub owner_key: PublicKey,
    pub active_key: PublicKey,
    pub posting_key: PublicKey,
    pub memo_key: PublicKey,
    pub recovery_account: AccountName,
    pub created: TimePointSec,
    pub last_owner_update: TimePointSec,

    pub balance: Asset,
    pub savings_balance: Asset,
    pub eusd_balance: Asset,
    pub eusd_seconds: u128,
    pub eusd_seconds_last_update: TimePointSec,
    pub eusd_last_interest_payment: TimePointSec,
    pub savings_eusd_balance: Asset,
    pub savings_eusd_seconds: u128,
    pub savings_eusd_seconds_last_update: TimePointSec,
    pub savings_eusd_last_interest_payment: TimePointSec,
    pub savings_withdraw_requests: u32,

    pub reward_ember_balance: Asset,
    pub reward_eusd_balance: Asset,
    pub reward_vesting_balance: Asset,
    pub reward_vesting_ember: Asset,

    pub vesting_shares: Asset,
    pub delegated_vesting_shares: Asset,
    pub received_vesting_shares: Asset,
    pub vesting_withdraw_rate: Asset,
    pub next_vesting_withdrawal: TimePointSec,
    pub withdrawn: i64,
    pub to_withdraw: i64,
    pub withdraw_routes: u16,

    pub proxy: AccountName,
    pub proxied_vsf_votes: [i128; MAX_PROXY_RECURSION_DEPTH],
    pub witnesses_voted_for: u16,
    pub can_vote: bool,
    pub voting_power: u16,
    pub last_vote_time: TimePointSec,

    pub last_post: TimePointSec,
    pub last_root_post: TimePointSec,
    pub curation_rewards: i64,
    pub posting_rewards: i64,
}

impl Account {
    pub fn new(name: AccountName, created: TimePointSec) -> Self {
        Account {
            name,
            owner_key: PublicKey::null(),
            active_key: PublicKey::null(),
            posting_key: PublicKey::null(),
            memo_key: PublicKey::null(),
            recovery_account: AccountName::none(),
            created,
            last_owner_update: TimePointSec::MIN,
            balance: Asset::ember(0),
            savings_balance: Asset::ember(0),
            eusd_balance: Asset::eusd(0),
            eusd_seconds: 0,
            eusd_seconds_last_update: created,
            eusd_last_interest_payment: created,
            savings_eusd_balance: Asset::eusd(0),
            savings_eusd_seconds: 0,
            savings_eusd_seconds_last_update: created,
            savings_eusd_last_interest_payment: created,
            savings_withdraw_requests: 0,
            reward_ember_balance: Asset::ember(0),
            reward_eusd_balance: Asset::eusd(0),
            reward_vesting_balance: Asset::vests(0),
            reward_vesting_ember: Asset::ember(0),
            vesting_shares: Asset::vests(0),
            delegated_vesting_shares: Asset::vests(0),
            received_vesting_shares: Asset::vests(0),
            vesting_withdraw_rate: Asset::vests(0),
            next_vesting_withdrawal: TimePointSec::MAX,
            withdrawn: 0,
            to_withdraw: 0,
            withdraw_routes: 0,
            proxy: AccountName::none(),
            proxied_vsf_votes: [0; MAX_PROXY_RECURSION_DEPTH],
            witnesses_voted_for: 0,
            can_vote: true,
            voting_power: shared_types::operations::PERCENT_100,
            last_vote_time: created,
            last_post: TimePointSec::MIN,
            last_root_post: TimePointSec::MIN,
            curation_rewards: 0,
            posting_rewards: 0,
        }
    }

    /// Total proxied vote weight, all depths.
    pub fn proxied_total(&self) -> i128 {
        self.proxied_vsf_votes.iter().sum()
    }

    /// The weight this account casts on witnesses it votes for directly.
    pub fn witness_vote_weight(&self) -> i128 {
        self.proxied_total() + i128::from(self.vesting_shares.amount)
    }

    /// Shares usable for voting: owned plus received minus delegated.
    pub fn effective_vesting_shares(&self) -> i64 {
        self.vesting_shares.amount + self.received_vesting_shares.amount
            - self.delegated_vesting_shares.amount
    }
}

impl StateObject for Account {
    type Id = AccountName;
    type Key = TimePointSec;

    fn id(&self) -> AccountName {
        self.name.clone()
    }

    /// Ordered by the next vesting withdrawal due time.
    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.next_vesting_withdrawal]
    }
}

/// A standing instruction to split vesting withdrawals toward `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawVestingRoute {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub percent: u16,
    pub auto_vest: bool,
}

impl StateObject for WithdrawVestingRoute {
    type Id = (AccountName, AccountName);
    type Key = ();

    fn id(&self) -> Self::Id {
        (self.from_account.clone(), self.to_account.clone())
    }
}

/// An outstanding delegation of vesting shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingDelegation {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    pub vesting_shares: Asset,
    pub min_delegation_time: TimePointSec,
}

impl StateObject for VestingDelegation {
    type Id = (AccountName, AccountName);
    type Key = ();

    fn id(&self) -> Self::Id {
        (self.delegator.clone(), self.delegatee.clone())
    }
}

/// Shares returning to a delegator after a delegation was lowered. Rows for
/// the same delegator and expiration second accumulate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingDelegationExpiration {
    pub delegator: AccountName,
    pub vesting_shares: Asset,
    pub expiration: TimePointSec,
}

impl StateObject for VestingDelegationExpiration {
    type Id = (AccountName, TimePointSec);
    type Key = TimePointSec;

    fn id(&self) -> Self::Id {
        (self.delegator.clone(), self.expiration)
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.expiration]
    }
}
