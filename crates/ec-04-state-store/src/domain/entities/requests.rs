//! Deferred account requests processed by the maintenance pipeline.

use crate::domain::table::StateObject;
use serde::{Deserialize, Serialize};
use shared_types::{AccountName, TimePointSec};

/// An account giving up its voting rights after a cooldown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineVotingRightsRequest {
    pub account: AccountName,
    pub effective_date: TimePointSec,
}

impl StateObject for DeclineVotingRightsRequest {
    type Id = AccountName;
    type Key = TimePointSec;

    fn id(&self) -> AccountName {
        self.account.clone()
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.effective_date]
    }
}

/// A pending change of an account's designated recovery account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountRequest {
    pub account_to_recover: AccountName,
    pub recovery_account: AccountName,
    pub effective_on: TimePointSec,
}

impl StateObject for ChangeRecoveryAccountRequest {
    type Id = AccountName;
    type Key = TimePointSec;

    fn id(&self) -> AccountName {
        self.account_to_recover.clone()
    }

    fn keys(&self) -> Vec<TimePointSec> {
        vec![self.effective_on]
    }
}
