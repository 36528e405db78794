use super::{Database, GenesisConfig};
use crate::domain::error::ChainError;
use crate::domain::skip_flags::SkipFlags;
use crate::ports::signing::KeyPair;
use ec_chain_params::HardforkSchedule;
use shared_types::{AccountName, Asset, Operation, SignedTransaction, TimePointSec};

pub(crate) const INITIAL_SUPPLY: i64 = 1_000_000_000_000;

pub(crate) fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

pub(crate) fn init_key() -> KeyPair {
    KeyPair::from_seed("init_key")
}

/// A fresh chain at current rules: genesis at t=0 with the reference supply,
/// every hardfork forced through.
pub(crate) fn open_db(dir: &std::path::Path) -> Database {
    let genesis = GenesisConfig {
        initial_supply: INITIAL_SUPPLY,
        genesis_time: TimePointSec::new(0),
        hardfork_schedule: HardforkSchedule::all_at(TimePointSec::new(0)),
        forced_hardfork: Some(19),
    };
    Database::open(dir, genesis).unwrap()
}

/// Produce the next block with whichever witness is scheduled.
pub(crate) fn produce_block(db: &mut Database) {
    let when = db.get_slot_time(1);
    let witness = db.get_scheduled_witness(1);
    db.generate_block(when, &witness, &init_key(), SkipFlags::NOTHING)
        .unwrap();
}

pub(crate) fn signed_transfer(
    db: &Database,
    from: &str,
    to: &str,
    amount: i64,
) -> SignedTransaction {
    let mut trx = SignedTransaction::new(
        db.head_block_time() + 60,
        vec![Operation::Transfer {
            from: name(from),
            to: name(to),
            amount: Asset::ember(amount),
            memo: String::new(),
        }],
    );
    trx.set_reference_block(&db.head_block_id());
    let digest = trx.sig_digest(&db.chain_id());
    trx.signatures.push(init_key().sign(&digest));
    trx
}

#[test]
fn test_genesis_state() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path());

    assert_eq!(db.head_block_num(), 0);
    assert_eq!(db.last_irreversible_block_num(), 0);
    assert_eq!(db.state.gpo().current_supply, Asset::ember(INITIAL_SUPPLY));

    for reserved in ["genesis", "null", "temp"] {
        assert!(db.state.accounts.contains(&name(reserved)));
    }

    let init_count = ec_chain_params::NUM_INIT_MINERS + ec_chain_params::NUM_INIT_EXTRAS;
    let each = INITIAL_SUPPLY / init_count as i64;
    assert_eq!(db.state.get_account(&name("miner")).unwrap().balance, Asset::ember(each));
    assert_eq!(db.state.get_account(&name("miner24")).unwrap().balance, Asset::ember(each));

    db.validate_invariants().unwrap();
}

#[test]
fn test_slot_math_at_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path());

    assert_eq!(db.get_slot_at_time(TimePointSec::new(0)), 0);
    assert_eq!(db.get_slot_at_time(TimePointSec::new(3)), 1);
    assert_eq!(db.get_slot_at_time(TimePointSec::new(5)), 1);
    assert_eq!(db.get_slot_at_time(TimePointSec::new(6)), 2);
    assert_eq!(db.get_slot_time(1), TimePointSec::new(3));
}

#[test]
fn test_produce_blocks_advances_head_and_revision() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());

    for expected in 1..=5u32 {
        produce_block(&mut db);
        assert_eq!(db.head_block_num(), expected);
        assert_eq!(db.state.revision(), i64::from(expected));
    }
    db.validate_invariants().unwrap();
}

#[test]
fn test_transfer_conserves_supply() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let supply_before = db.state.gpo().current_supply;
    let miner_before = db.state.get_account(&name("miner")).unwrap().balance;

    let trx = signed_transfer(&db, "miner", "miner1", 300);
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);

    let miner_after = db.state.get_account(&name("miner")).unwrap().balance;
    let other = db.state.get_account(&name("miner1")).unwrap().balance;
    assert_eq!(miner_after, miner_before - Asset::ember(300));
    assert_eq!(other.amount, INITIAL_SUPPLY / 25 + 300);
    // Transfers move tokens; only inflation mints.
    assert!(db.state.gpo().current_supply >= supply_before);
    db.validate_invariants().unwrap();
}

#[test]
fn test_duplicate_transaction_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let trx = signed_transfer(&db, "miner", "miner1", 100);
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    let err = db.push_transaction(&trx, SkipFlags::NOTHING).unwrap_err();
    assert!(matches!(err, ChainError::DuplicateTransaction));
}

#[test]
fn test_missing_signature_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let mut trx = signed_transfer(&db, "miner", "miner1", 100);
    trx.signatures.clear();
    let err = db.push_transaction(&trx, SkipFlags::NOTHING).unwrap_err();
    assert!(matches!(err, ChainError::MissingAuthority { .. }));
}

#[test]
fn test_tapos_mismatch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let mut trx = SignedTransaction::new(
        db.head_block_time() + 60,
        vec![Operation::Transfer {
            from: name("miner"),
            to: name("miner1"),
            amount: Asset::ember(1),
            memo: String::new(),
        }],
    );
    trx.ref_block_num = 1;
    trx.ref_block_prefix = 0xBAD_F00D;
    let digest = trx.sig_digest(&db.chain_id());
    trx.signatures.push(init_key().sign(&digest));

    let err = db.push_transaction(&trx, SkipFlags::NOTHING).unwrap_err();
    assert!(matches!(err, ChainError::TaposMismatch));
}

#[test]
fn test_expiration_window_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let mut premature = signed_transfer(&db, "miner", "miner1", 1);
    premature.expiration = db.head_block_time() + 60 * 60 * 24;
    let digest = premature.sig_digest(&db.chain_id());
    premature.signatures = vec![init_key().sign(&digest)];
    assert!(matches!(
        db.push_transaction(&premature, SkipFlags::NOTHING).unwrap_err(),
        ChainError::PrematureExpiration
    ));

    let mut stale = signed_transfer(&db, "miner", "miner1", 1);
    stale.expiration = db.head_block_time();
    let digest = stale.sig_digest(&db.chain_id());
    stale.signatures = vec![init_key().sign(&digest)];
    assert!(matches!(
        db.push_transaction(&stale, SkipFlags::NOTHING).unwrap_err(),
        ChainError::Expired
    ));
}

#[test]
fn test_failed_transaction_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let digest_before = db.state.state_digest();
    // miner2 holds far less than this.
    let trx = signed_transfer(&db, "miner2", "miner1", INITIAL_SUPPLY);
    let err = db.push_transaction(&trx, SkipFlags::NOTHING).unwrap_err();
    assert!(matches!(err, ChainError::EvaluatorReject(_)));
    assert_eq!(db.state.state_digest(), digest_before);
}

#[test]
fn test_push_then_pop_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());

    // Build up history so the next block is not instantly irreversible.
    for _ in 0..25 {
        produce_block(&mut db);
    }
    let digest_before = db.state.state_digest();
    let head_before = db.head_block_id();

    let trx = signed_transfer(&db, "miner", "miner1", 500);
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);
    assert_ne!(db.state.state_digest(), digest_before);

    db.pop_block().unwrap();
    db.clear_pending();
    assert_eq!(db.state.state_digest(), digest_before);
    assert_eq!(db.head_block_id(), head_before);
}

#[test]
fn test_pending_transaction_survives_block_production() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    produce_block(&mut db);

    let trx = signed_transfer(&db, "miner", "miner1", 77);
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();

    // The produced block includes the pending transaction.
    let when = db.get_slot_time(1);
    let witness = db.get_scheduled_witness(1);
    let block = db
        .generate_block(when, &witness, &init_key(), SkipFlags::NOTHING)
        .unwrap();
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].id(), trx.id());
}

#[test]
fn test_undo_all_returns_to_last_irreversible() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    for _ in 0..30 {
        produce_block(&mut db);
    }
    let lib = db.last_irreversible_block_num();
    assert!(lib > 0 && lib < 30);

    db.clear_pending();
    db.state.undo_all();
    assert_eq!(db.state.revision(), i64::from(lib));
}

#[test]
fn test_irreversibility_lags_by_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    for _ in 0..50 {
        produce_block(&mut db);
    }
    let head = db.head_block_num();
    let lib = db.last_irreversible_block_num();
    // With 21 witnesses and a 75% threshold, irreversibility trails the head
    // by roughly the round minus the offset.
    assert!(lib < head);
    assert!(head - lib <= 21);
}

#[test]
fn test_block_log_follows_irreversibility() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(dir.path());
    for _ in 0..40 {
        produce_block(&mut db);
    }
    let lib = db.last_irreversible_block_num();
    let log_head = db.block_log_mut().head().map(|b| b.block_num()).unwrap_or(0);
    assert_eq!(log_head, lib);
}
