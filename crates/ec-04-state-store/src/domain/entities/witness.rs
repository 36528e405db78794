//! Witnesses, witness votes and the schedule singleton.

use crate::domain::table::StateObject;
use serde::{Deserialize, Serialize};
use shared_types::operations::ChainProperties;
use shared_types::{AccountName, Price, ProtocolVersion, PublicKey, TimePointSec};

/// How a witness earned its slot in the current round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessScheduleSlot {
    /// One of the top slots by approval votes.
    Top,
    /// The timeshare slot, rotated by virtual schedule time.
    Timeshare,
    /// Legacy mining slot; retained for schedule accounting.
    Miner,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub owner: AccountName,
    pub created: TimePointSec,
    pub url: String,
    pub signing_key: PublicKey,
    pub props: ChainProperties,

    pub total_missed: u32,
    pub last_aslot: u64,
    pub last_confirmed_block_num: u32,

    pub eusd_exchange_rate: Price,
    pub last_eusd_exchange_update: TimePointSec,

    pub votes: i64,
    pub schedule: WitnessScheduleSlot,

    pub virtual_last_update: u128,
    pub virtual_position: u128,
    pub virtual_scheduled_time: u128,

    pub running_version: ProtocolVersion,
    pub hardfork_version_vote: ProtocolVersion,
    pub hardfork_time_vote: TimePointSec,
}

impl Witness {
    pub fn new(owner: AccountName, signing_key: PublicKey, created: TimePointSec) -> Self {
        Witness {
            owner,
            created,
            url: String::new(),
            signing_key,
            props: ChainProperties::default(),
            total_missed: 0,
            last_aslot: 0,
            last_confirmed_block_num: 0,
            eusd_exchange_rate: Price::null(),
            last_eusd_exchange_update: TimePointSec::MIN,
            votes: 0,
            schedule: WitnessScheduleSlot::Top,
            virtual_last_update: 0,
            virtual_position: 0,
            virtual_scheduled_time: u128::MAX,
            running_version: ProtocolVersion::default(),
            hardfork_version_vote: ProtocolVersion::default(),
            hardfork_time_vote: TimePointSec::MIN,
        }
    }
}

impl StateObject for Witness {
    type Id = AccountName;
    type Key = ();

    fn id(&self) -> AccountName {
        self.owner.clone()
    }
}

/// An account's standing approval of a witness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessVote {
    pub account: AccountName,
    pub witness: AccountName,
}

impl StateObject for WitnessVote {
    type Id = (AccountName, AccountName);
    type Key = ();

    fn id(&self) -> Self::Id {
        (self.account.clone(), self.witness.clone())
    }
}

/// Singleton: the current shuffled round and virtual-schedule bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessScheduleState {
    pub current_virtual_time: u128,
    pub next_shuffle_block_num: u32,
    pub current_shuffled_witnesses: Vec<AccountName>,
    pub num_scheduled_witnesses: u8,

    pub elected_weight: u8,
    pub timeshare_weight: u8,
    pub witness_pay_normalization_factor: u16,

    pub majority_version: ProtocolVersion,
}

impl Default for WitnessScheduleState {
    fn default() -> Self {
        WitnessScheduleState {
            current_virtual_time: 0,
            next_shuffle_block_num: 1,
            current_shuffled_witnesses: Vec::new(),
            num_scheduled_witnesses: 1,
            elected_weight: 1,
            timeshare_weight: 5,
            witness_pay_normalization_factor: 25,
            majority_version: ProtocolVersion::default(),
        }
    }
}

impl StateObject for WitnessScheduleState {
    type Id = ();
    type Key = ();

    fn id(&self) {}
}
