//! # Integration Tests Crate
//!
//! Cross-crate scenarios driving the whole engine: genesis, production,
//! fork switching, payout economics, replay determinism.
//!
//! ```text
//! integration-tests/
//! ├── src/
//! │   ├── lib.rs            # shared chain-building helpers
//! │   ├── scenarios.rs      # literal end-to-end scenarios
//! │   ├── forks.rs          # fork switching and reorganizations
//! │   └── replay.rs         # block-log replay determinism
//! ```

#[cfg(test)]
mod forks;
#[cfg(test)]
mod replay;
#[cfg(test)]
mod scenarios;

use ec_chain_engine::{Database, GenesisConfig, KeyPair, SkipFlags};
use ec_chain_params::HardforkSchedule;
use shared_types::{AccountName, Asset, Operation, SignedTransaction, TimePointSec};
use std::path::Path;

pub const INITIAL_SUPPLY: i64 = 1_000_000_000_000;

pub fn name(s: &str) -> AccountName {
    AccountName::new(s).expect("test names are valid")
}

pub fn init_key() -> KeyPair {
    KeyPair::from_seed("init_key")
}

/// The genesis every test chain shares: the reference supply at t=0 with
/// every hardfork forced through.
pub fn test_genesis() -> GenesisConfig {
    GenesisConfig {
        initial_supply: INITIAL_SUPPLY,
        genesis_time: TimePointSec::new(0),
        hardfork_schedule: HardforkSchedule::all_at(TimePointSec::new(0)),
        forced_hardfork: Some(19),
    }
}

/// Open a fresh chain at current rules in `dir`.
pub fn open_chain(dir: &Path) -> Database {
    Database::open(dir, test_genesis()).expect("open")
}

/// Produce the next block with whichever witness is scheduled for slot 1.
pub fn produce_block(db: &mut Database) -> shared_types::SignedBlock {
    produce_block_at_slot(db, 1)
}

/// Produce a block for a later slot, leaving the earlier ones missed.
pub fn produce_block_at_slot(db: &mut Database, slot: u32) -> shared_types::SignedBlock {
    let when = db.get_slot_time(slot);
    let witness = db.get_scheduled_witness(slot);
    db.generate_block(when, &witness, &init_key(), SkipFlags::NOTHING)
        .expect("block generation")
}

pub fn sign(db: &Database, mut trx: SignedTransaction) -> SignedTransaction {
    let digest = trx.sig_digest(&db.chain_id());
    trx.signatures.push(init_key().sign(&digest));
    trx
}

pub fn transfer(db: &Database, from: &str, to: &str, amount: Asset) -> SignedTransaction {
    let mut trx = SignedTransaction::new(
        db.head_block_time() + 60,
        vec![Operation::Transfer {
            from: name(from),
            to: name(to),
            amount,
            memo: String::new(),
        }],
    );
    trx.set_reference_block(&db.head_block_id());
    sign(db, trx)
}
